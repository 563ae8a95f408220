pub mod common;
pub mod health;
pub mod portal;
pub mod purchase_orders;
pub mod quotes;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::notifications::{LogNotifier, Notifier};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates the settlement business logic used
/// by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub quotes: Arc<crate::services::QuoteService>,
    pub invitations: Arc<crate::services::InvitationService>,
    pub responses: Arc<crate::services::ResponseService>,
    pub winners: Arc<crate::services::WinnerService>,
    pub snapshots: Arc<crate::services::SnapshotService>,
    pub purchase_orders: Arc<crate::services::PurchaseOrderService>,
}

impl AppServices {
    /// Builds the service container with the default log-only notifier.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        Self::with_notifier(db_pool, event_sender, config, Arc::new(LogNotifier))
    }

    /// Builds the service container with an injected notification
    /// transport (tests use a recording double here).
    pub fn with_notifier(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let quotes = Arc::new(crate::services::QuoteService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
            notifier,
            config.portal_base_url.clone(),
        ));
        let invitations = Arc::new(crate::services::InvitationService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let responses = Arc::new(crate::services::ResponseService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let winners = Arc::new(crate::services::WinnerService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
            config.winner_policy.clone(),
        ));
        let snapshots = Arc::new(crate::services::SnapshotService::new(db_pool.clone()));
        let purchase_orders = Arc::new(crate::services::PurchaseOrderService::new(
            db_pool,
            Some(event_sender),
        ));

        Self {
            quotes,
            invitations,
            responses,
            winners,
            snapshots,
            purchase_orders,
        }
    }
}
