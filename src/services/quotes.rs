use crate::{
    db::DbPool,
    entities::quote::{
        self, ActiveModel as QuoteActiveModel, Entity as QuoteEntity, Model as QuoteModel,
        QuoteStatus,
    },
    entities::quote_invitation::{self, Entity as InvitationEntity},
    entities::quote_item::{
        self, ActiveModel as ItemActiveModel, Entity as QuoteItemEntity, Model as ItemModel,
    },
    entities::quote_response::{self, Entity as ResponseEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{Notification, Notifier},
    services::closure,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateQuoteRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct UpdateQuoteRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    /// Explicitly clear the deadline (a bare `None` means "unchanged").
    #[serde(default)]
    pub clear_deadline: bool,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AddQuoteItemRequest {
    pub product_id: Uuid,
    pub package_id: Option<Uuid>,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct UpdateQuoteItemRequest {
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub sort_order: Option<i32>,
}

/// Outcome of opening a quote: the transition plus the per-recipient
/// notification tally (failures are reported, never fatal).
#[derive(Debug, Serialize)]
pub struct OpenOutcome {
    pub quote: QuoteModel,
    pub invitations_notified: usize,
    pub notification_failures: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CloseOutcome {
    pub quote: QuoteModel,
    pub snapshot_id: Uuid,
    pub price_history_entries: usize,
}

#[derive(Debug, Serialize)]
pub struct QuoteListPage {
    pub quotes: Vec<QuoteModel>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Owns quote status and the legality of transitions, and orchestrates
/// the downstream actions a transition triggers: notification dispatch
/// on open, snapshot + ledger recording on close.
#[derive(Clone)]
pub struct QuoteService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    notifier: Arc<dyn Notifier>,
    portal_base_url: String,
}

fn illegal(from: QuoteStatus, to: QuoteStatus) -> ServiceError {
    ServiceError::IllegalTransition {
        entity: "quote",
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    }
}

impl QuoteService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        notifier: Arc<dyn Notifier>,
        portal_base_url: String,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            notifier,
            portal_base_url,
        }
    }

    async fn send_event(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "failed to send quote event");
            }
        }
    }

    #[instrument(skip(self, request), fields(tenant_id = %tenant_id))]
    pub async fn create_quote(
        &self,
        tenant_id: Uuid,
        created_by: Uuid,
        request: CreateQuoteRequest,
    ) -> Result<QuoteModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let quote = QuoteActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            title: Set(request.title),
            description: Set(request.description),
            status: Set(QuoteStatus::Draft),
            deadline: Set(request.deadline),
            is_deleted: Set(false),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
            closed_at: Set(None),
        }
        .insert(db)
        .await?;

        info!(quote_id = %quote.id, "quote created");
        self.send_event(Event::QuoteCreated(quote.id)).await;
        Ok(quote)
    }

    async fn find_quote(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<QuoteModel, ServiceError> {
        let db = &*self.db_pool;
        QuoteEntity::find_by_id(quote_id)
            .filter(quote::Column::TenantId.eq(tenant_id))
            .filter(quote::Column::IsDeleted.eq(false))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote {} not found", quote_id)))
    }

    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn get_quote(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<QuoteModel, ServiceError> {
        self.find_quote(tenant_id, quote_id).await
    }

    /// Items of a quote in explicit sort order.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn list_items(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<Vec<ItemModel>, ServiceError> {
        let db = &*self.db_pool;
        let items = QuoteItemEntity::find()
            .filter(quote_item::Column::TenantId.eq(tenant_id))
            .filter(quote_item::Column::QuoteId.eq(quote_id))
            .order_by_asc(quote_item::Column::SortOrder)
            .all(db)
            .await?;
        Ok(items)
    }

    #[instrument(skip(self))]
    pub async fn list_quotes(
        &self,
        tenant_id: Uuid,
        status: Option<QuoteStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<QuoteListPage, ServiceError> {
        let db = &*self.db_pool;
        let mut query = QuoteEntity::find()
            .filter(quote::Column::TenantId.eq(tenant_id))
            .filter(quote::Column::IsDeleted.eq(false));
        if let Some(status) = status {
            query = query.filter(quote::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(quote::Column::CreatedAt)
            .paginate(db, per_page.max(1));

        let total = paginator.num_items().await?;
        let quotes = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(QuoteListPage {
            quotes,
            total,
            page,
            per_page,
        })
    }

    /// Updates header fields. Legal while the quote is draft or open;
    /// closed and cancelled quotes are immutable.
    #[instrument(skip(self, request), fields(quote_id = %quote_id))]
    pub async fn update_quote(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
        request: UpdateQuoteRequest,
    ) -> Result<QuoteModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let quote = self.find_quote(tenant_id, quote_id).await?;
        if quote.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "quote is {} and can no longer be edited",
                quote.status.as_str()
            )));
        }

        let db = &*self.db_pool;
        let mut active: QuoteActiveModel = quote.into();
        if let Some(title) = request.title {
            active.title = Set(title);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if request.clear_deadline {
            active.deadline = Set(None);
        } else if let Some(deadline) = request.deadline {
            active.deadline = Set(Some(deadline));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(updated)
    }

    /// Soft-deletes a draft quote. Quotes past draft carry supplier
    /// commitments and go through cancel instead.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn delete_quote(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<(), ServiceError> {
        let quote = self.find_quote(tenant_id, quote_id).await?;
        if quote.status != QuoteStatus::Draft {
            return Err(ServiceError::Conflict(format!(
                "only draft quotes can be deleted; this quote is {}",
                quote.status.as_str()
            )));
        }

        let db = &*self.db_pool;
        let mut active: QuoteActiveModel = quote.into();
        active.is_deleted = Set(true);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(quote_id = %quote_id))]
    pub async fn add_item(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
        request: AddQuoteItemRequest,
    ) -> Result<ItemModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let quote = self.find_quote(tenant_id, quote_id).await?;
        if quote.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "quote is {}; items can no longer be added",
                quote.status.as_str()
            )));
        }

        let db = &*self.db_pool;
        let sort_order = match request.sort_order {
            Some(explicit) => explicit,
            None => {
                let count = QuoteItemEntity::find()
                    .filter(quote_item::Column::QuoteId.eq(quote_id))
                    .count(db)
                    .await?;
                count as i32
            }
        };

        let now = Utc::now();
        let item = ItemActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            quote_id: Set(quote_id),
            product_id: Set(request.product_id),
            package_id: Set(request.package_id),
            quantity: Set(request.quantity),
            notes: Set(request.notes),
            sort_order: Set(sort_order),
            winner_supplier_id: Set(None),
            winner_response_id: Set(None),
            winner_reason: Set(None),
            winner_set_at: Set(None),
            winner_set_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        Ok(item)
    }

    #[instrument(skip(self, request), fields(item_id = %item_id))]
    pub async fn update_item(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
        item_id: Uuid,
        request: UpdateQuoteItemRequest,
    ) -> Result<ItemModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let quote = self.find_quote(tenant_id, quote_id).await?;
        if quote.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "quote is {}; items can no longer be edited",
                quote.status.as_str()
            )));
        }

        let db = &*self.db_pool;
        let item = QuoteItemEntity::find_by_id(item_id)
            .filter(quote_item::Column::QuoteId.eq(quote_id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote item {} not found", item_id)))?;

        let mut active: ItemActiveModel = item.into();
        if let Some(quantity) = request.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(sort_order) = request.sort_order {
            active.sort_order = Set(sort_order);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(updated)
    }

    /// Removes an item. Any bids already collected for it are dropped
    /// in the same transaction; they are meaningless without the line.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_item(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), ServiceError> {
        let quote = self.find_quote(tenant_id, quote_id).await?;
        if quote.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "quote is {}; items can no longer be removed",
                quote.status.as_str()
            )));
        }

        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let item = QuoteItemEntity::find_by_id(item_id)
            .filter(quote_item::Column::QuoteId.eq(quote_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote item {} not found", item_id)))?;

        ResponseEntity::delete_many()
            .filter(quote_response::Column::QuoteItemId.eq(item.id))
            .exec(&txn)
            .await?;
        item.delete(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Opens a quote for bidding: `draft -> open`, then a best-effort
    /// notification per invitation with a contact address. Notification
    /// failures are collected and reported; they never roll back the
    /// transition.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn open_quote(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<OpenOutcome, ServiceError> {
        let quote = self.find_quote(tenant_id, quote_id).await?;
        if !quote.status.can_transition_to(QuoteStatus::Open) {
            return Err(illegal(quote.status, QuoteStatus::Open));
        }

        let db = &*self.db_pool;
        let mut active: QuoteActiveModel = quote.into();
        active.status = Set(QuoteStatus::Open);
        active.updated_at = Set(Utc::now());
        let quote = active.update(db).await?;

        info!(quote_id = %quote.id, "quote opened");

        let invitations = InvitationEntity::find()
            .filter(quote_invitation::Column::QuoteId.eq(quote.id))
            .all(db)
            .await?;

        let mut notified = 0usize;
        let mut failures = Vec::new();
        for invitation in invitations {
            let Some(recipient) = invitation.contact_email.clone() else {
                continue;
            };
            let link = format!("{}/{}", self.portal_base_url, invitation.public_token);
            let notification = Notification {
                recipient: recipient.clone(),
                subject: format!("Request for quotation: {}", quote.title),
                body: format!(
                    "You have been invited to bid on \"{}\". Respond here: {}",
                    quote.title, link
                ),
            };
            match self.notifier.notify(notification).await {
                Ok(()) => notified += 1,
                Err(e) => {
                    error!(recipient = %recipient, error = %e, "invitation notification failed");
                    failures.push(recipient);
                }
            }
        }

        self.send_event(Event::QuoteOpened {
            quote_id: quote.id,
            invitations_notified: notified,
            notification_failures: failures.len(),
        })
        .await;

        Ok(OpenOutcome {
            quote,
            invitations_notified: notified,
            notification_failures: failures,
        })
    }

    /// Closes a quote: records the audit snapshot and price-history
    /// ledger, then flips `open -> closed`, all in one transaction. If
    /// recording fails the transaction rolls back and the quote stays
    /// open; closure is never reported successful without its audit
    /// trail.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn close_quote(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<CloseOutcome, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let quote = QuoteEntity::find_by_id(quote_id)
            .filter(quote::Column::TenantId.eq(tenant_id))
            .filter(quote::Column::IsDeleted.eq(false))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote {} not found", quote_id)))?;

        if !quote.status.can_transition_to(QuoteStatus::Closed) {
            return Err(illegal(quote.status, QuoteStatus::Closed));
        }

        let record = closure::record_closure(&txn, &quote).await?;

        let now = Utc::now();
        let mut active: QuoteActiveModel = quote.into();
        active.status = Set(QuoteStatus::Closed);
        active.closed_at = Set(Some(now));
        active.updated_at = Set(now);
        let quote = active.update(&txn).await?;

        txn.commit().await?;

        info!(quote_id = %quote.id, snapshot_id = %record.snapshot_id, "quote closed");

        self.send_event(Event::QuoteClosed {
            quote_id: quote.id,
            snapshot_id: record.snapshot_id,
            price_history_entries: record.price_history_entries,
        })
        .await;

        Ok(CloseOutcome {
            quote,
            snapshot_id: record.snapshot_id,
            price_history_entries: record.price_history_entries,
        })
    }

    /// Cancels a quote from `open` or `closed`. Terminal and
    /// irreversible; no snapshot is taken.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn cancel_quote(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<QuoteModel, ServiceError> {
        let quote = self.find_quote(tenant_id, quote_id).await?;
        if !quote.status.can_transition_to(QuoteStatus::Cancelled) {
            return Err(illegal(quote.status, QuoteStatus::Cancelled));
        }

        let db = &*self.db_pool;
        let mut active: QuoteActiveModel = quote.into();
        active.status = Set(QuoteStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let quote = active.update(db).await?;

        info!(quote_id = %quote.id, "quote cancelled");
        self.send_event(Event::QuoteCancelled(quote.id)).await;
        Ok(quote)
    }
}
