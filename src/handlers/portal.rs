//! Supplier-facing routes. Authenticated by the invitation token in the
//! path instead of a JWT, so nothing here uses `AuthenticatedUser`.

use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use super::common::success_response;
use crate::{
    errors::ServiceError, handlers::AppState, services::responses::SaveResponseRequest,
};

async fn portal_view(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, ServiceError> {
    let view = state.services.responses.portal_view(&token).await?;
    Ok(success_response(view))
}

async fn save_response(
    State(state): State<AppState>,
    Path((token, item_id)): Path<(String, Uuid)>,
    Json(payload): Json<SaveResponseRequest>,
) -> Result<Response, ServiceError> {
    let response = state
        .services
        .responses
        .save_response(&token, item_id, payload)
        .await?;
    Ok(success_response(response))
}

async fn submit(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, ServiceError> {
    let invitation = state.services.responses.submit(&token).await?;
    Ok(success_response(invitation))
}

pub fn portal_routes() -> Router<AppState> {
    Router::new()
        .route("/quotes/:token", get(portal_view))
        .route("/quotes/:token/items/:item_id", put(save_response))
        .route("/quotes/:token/submit", post(submit))
}
