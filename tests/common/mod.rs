#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use sourcing_api::{
    config::AppConfig,
    db,
    entities::{quote, quote_invitation, quote_item},
    events,
    handlers::AppServices,
    notifications::RecordingNotifier,
    services::{
        quotes::{AddQuoteItemRequest, CreateQuoteRequest},
        responses::SaveResponseRequest,
    },
};
use uuid::Uuid;

/// Service-level harness backed by a fresh in-memory SQLite database.
pub struct TestHarness {
    pub db: Arc<db::DbPool>,
    pub config: AppConfig,
    pub event_sender: events::EventSender,
    pub services: AppServices,
    pub notifier: Arc<RecordingNotifier>,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestHarness {
    pub async fn new() -> Self {
        let cfg = AppConfig::for_tests("sqlite::memory:");
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool).await.expect("migrations failed");
        let db = Arc::new(pool);

        let (event_sender, event_rx) = events::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let notifier = RecordingNotifier::shared();
        let services = AppServices::with_notifier(
            db.clone(),
            Arc::new(event_sender.clone()),
            &cfg,
            notifier.clone(),
        );

        Self {
            db,
            config: cfg,
            event_sender,
            services,
            notifier,
            tenant_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            _event_task: event_task,
        }
    }

    /// Full application router over this harness's state.
    pub fn router(&self) -> axum::Router {
        sourcing_api::app_router(sourcing_api::AppState {
            db: self.db.clone(),
            config: self.config.clone(),
            event_sender: self.event_sender.clone(),
            services: self.services.clone(),
        })
    }

    /// Bearer token for this harness's user carrying `permissions`.
    pub fn token(&self, permissions: &[&str]) -> String {
        sourcing_api::auth::issue_token(
            self.user_id,
            self.tenant_id,
            permissions,
            &self.config.jwt_secret,
        )
        .expect("issue token")
    }

    /// Creates a draft quote with `item_count` items (quantity 10 each).
    pub async fn draft_quote(&self, item_count: usize) -> (quote::Model, Vec<quote_item::Model>) {
        let quote = self
            .services
            .quotes
            .create_quote(
                self.tenant_id,
                self.user_id,
                CreateQuoteRequest {
                    title: "Quarterly restock".to_string(),
                    description: None,
                    deadline: None,
                },
            )
            .await
            .expect("create quote");

        let mut items = Vec::with_capacity(item_count);
        for i in 0..item_count {
            let item = self
                .services
                .quotes
                .add_item(
                    self.tenant_id,
                    quote.id,
                    AddQuoteItemRequest {
                        product_id: Uuid::new_v4(),
                        package_id: None,
                        quantity: 10,
                        notes: None,
                        sort_order: Some(i as i32),
                    },
                )
                .await
                .expect("add item");
            items.push(item);
        }
        (quote, items)
    }

    /// Creates an open quote with `item_count` items.
    pub async fn open_quote(&self, item_count: usize) -> (quote::Model, Vec<quote_item::Model>) {
        let (quote, items) = self.draft_quote(item_count).await;
        let outcome = self
            .services
            .quotes
            .open_quote(self.tenant_id, quote.id)
            .await
            .expect("open quote");
        (outcome.quote, items)
    }

    /// Invites a supplier and returns the invitation (token included).
    pub async fn invite(&self, quote_id: Uuid, supplier_id: Uuid) -> quote_invitation::Model {
        self.services
            .invitations
            .invite_supplier(self.tenant_id, quote_id, supplier_id, None)
            .await
            .expect("invite supplier")
    }

    /// Saves a bid at the given price through the portal channel.
    pub async fn bid(&self, token: &str, item_id: Uuid, price: Decimal) {
        self.services
            .responses
            .save_response(
                token,
                item_id,
                SaveResponseRequest {
                    price,
                    min_order_quantity: None,
                    delivery_days: None,
                    note: None,
                },
            )
            .await
            .expect("save response");
    }
}
