use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Domain events emitted after each committed settlement mutation.
///
/// Emission is best-effort and strictly post-commit; no business
/// decision may depend on an event having been delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    QuoteCreated(Uuid),
    QuoteOpened {
        quote_id: Uuid,
        invitations_notified: usize,
        notification_failures: usize,
    },
    QuoteClosed {
        quote_id: Uuid,
        snapshot_id: Uuid,
        price_history_entries: usize,
    },
    QuoteCancelled(Uuid),
    SupplierInvited {
        quote_id: Uuid,
        supplier_id: Uuid,
        invitation_id: Uuid,
    },
    ResponseSaved {
        invitation_id: Uuid,
        quote_item_id: Uuid,
        price: Decimal,
    },
    ResponsesSubmitted {
        invitation_id: Uuid,
        submitted_at: DateTime<Utc>,
    },
    WinnersAutoSelected {
        quote_id: Uuid,
        resolved: usize,
    },
    WinnerSet {
        quote_item_id: Uuid,
        supplier_id: Uuid,
        manual: bool,
    },
    WinnerCleared(Uuid),
    PurchaseOrderCreated {
        purchase_order_id: Uuid,
        quote_id: Uuid,
        supplier_id: Uuid,
        po_number: String,
    },
    PurchaseOrderStatusChanged {
        purchase_order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    PurchaseOrderTotalsRecomputed {
        purchase_order_id: Uuid,
        subtotal: Decimal,
        total_amount: Decimal,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a connected sender/receiver pair with a bounded buffer.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Audit/reporting
/// consumers read the durable snapshot and price-history tables, so
/// this loop is observability only.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::QuoteClosed {
                quote_id,
                snapshot_id,
                price_history_entries,
            } => {
                info!(
                    quote_id = %quote_id,
                    snapshot_id = %snapshot_id,
                    price_history_entries,
                    "quote closed with audit snapshot"
                );
            }
            Event::PurchaseOrderCreated {
                purchase_order_id,
                po_number,
                ..
            } => {
                info!(purchase_order_id = %purchase_order_id, po_number = %po_number, "purchase order created");
            }
            other => debug!(event = ?other, "domain event"),
        }
    }

    info!("Event processing loop stopped");
}
