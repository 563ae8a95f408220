//! Sourcing API Library
//!
//! Quote-to-purchase-order settlement service: buyers run quotes,
//! invited suppliers bid through a tokenized portal, winning bids are
//! frozen into a closure snapshot and materialized as purchase orders.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod notifications;
pub mod services;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared state handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Buyer-facing API surface, mounted under `/api/v1`. Every route in
/// here requires a bearer token; per-route permission checks live in
/// the handlers.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::quotes::quote_routes())
        .merge(handlers::purchase_orders::purchase_order_routes())
}

/// Full application router: health, buyer API and the supplier portal.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .nest("/portal", handlers::portal::portal_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
