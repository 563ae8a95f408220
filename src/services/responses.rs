use crate::{
    db::DbPool,
    entities::quote::QuoteStatus,
    entities::quote_invitation::{
        ActiveModel as InvitationActiveModel, InvitationStatus, Model as InvitationModel,
    },
    entities::quote_item::{self, Entity as QuoteItemEntity},
    entities::quote_response::{
        self, ActiveModel as ResponseActiveModel, Entity as ResponseEntity,
        Model as ResponseModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::invitations::{ensure_writable, token_prefix, InvitationService},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SaveResponseRequest {
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub min_order_quantity: Option<i32>,
    #[validate(range(min = 0))]
    pub delivery_days: Option<i32>,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

/// Everything the supplier portal screen needs for one invitation.
#[derive(Debug, Serialize)]
pub struct PortalView {
    pub quote_title: String,
    pub quote_description: Option<String>,
    pub quote_status: QuoteStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub invitation_status: InvitationStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub writable: bool,
    pub items: Vec<PortalItem>,
}

#[derive(Debug, Serialize)]
pub struct PortalItem {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub package_id: Option<Uuid>,
    pub quantity: i32,
    pub notes: Option<String>,
    pub sort_order: i32,
    pub response: Option<ResponseModel>,
}

/// Persists per-supplier, per-item bids through the tokenized channel.
/// At most one bid per (invitation, item); saving again overwrites.
#[derive(Clone)]
pub struct ResponseService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl ResponseService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Supplier-facing view of the quote: items plus this invitation's
    /// own responses, never another supplier's data. Records the access
    /// (invited -> viewed on first read).
    #[instrument(skip(self, token), fields(token_prefix = token_prefix(token)))]
    pub async fn portal_view(&self, token: &str) -> Result<PortalView, ServiceError> {
        let db = &*self.db_pool;
        let (invitation, quote) = InvitationService::resolve_on(db, token).await?;

        // The access stamp is monotonic bookkeeping; it is not part of
        // the view's consistency and runs outside any transaction.
        let invitation = InvitationService::record_access_on(db, invitation).await?;

        let items = QuoteItemEntity::find()
            .filter(quote_item::Column::QuoteId.eq(quote.id))
            .order_by_asc(quote_item::Column::SortOrder)
            .all(db)
            .await?;

        let responses = ResponseEntity::find()
            .filter(quote_response::Column::InvitationId.eq(invitation.id))
            .all(db)
            .await?;

        let writable = ensure_writable(&quote, &invitation, Utc::now()).is_ok();
        let items = items
            .into_iter()
            .map(|item| {
                let response = responses.iter().find(|r| r.quote_item_id == item.id).cloned();
                PortalItem {
                    item_id: item.id,
                    product_id: item.product_id,
                    package_id: item.package_id,
                    quantity: item.quantity,
                    notes: item.notes,
                    sort_order: item.sort_order,
                    response,
                }
            })
            .collect();

        Ok(PortalView {
            quote_title: quote.title,
            quote_description: quote.description,
            quote_status: quote.status,
            deadline: quote.deadline,
            invitation_status: invitation.status,
            submitted_at: invitation.submitted_at,
            writable,
            items,
        })
    }

    /// Saves one bid. Upserts the unique (invitation, item) row:
    /// last-write-wins on content, first-write-wins on existence. The
    /// writable precondition is evaluated at this instant, so a save
    /// after the deadline fails even if the session began before it.
    #[instrument(skip(self, token, request), fields(token_prefix = token_prefix(token), item_id = %item_id))]
    pub async fn save_response(
        &self,
        token: &str,
        item_id: Uuid,
        request: SaveResponseRequest,
    ) -> Result<ResponseModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if request.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must not be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let (invitation, quote) = InvitationService::resolve_on(&txn, token).await?;
        ensure_writable(&quote, &invitation, Utc::now())?;

        let item = QuoteItemEntity::find_by_id(item_id)
            .filter(quote_item::Column::QuoteId.eq(quote.id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Quote item {} not found on this quote", item_id))
            })?;

        let now = Utc::now();
        let response = ResponseActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(invitation.tenant_id),
            invitation_id: Set(invitation.id),
            quote_item_id: Set(item.id),
            price: Set(request.price),
            min_order_quantity: Set(request.min_order_quantity),
            delivery_days: Set(request.delivery_days),
            note: Set(request.note),
            filled_at: Set(now),
        };

        ResponseEntity::insert(response)
            .on_conflict(
                OnConflict::columns([
                    quote_response::Column::InvitationId,
                    quote_response::Column::QuoteItemId,
                ])
                .update_columns([
                    quote_response::Column::Price,
                    quote_response::Column::MinOrderQuantity,
                    quote_response::Column::DeliveryDays,
                    quote_response::Column::Note,
                    quote_response::Column::FilledAt,
                ])
                .to_owned(),
            )
            .exec(&txn)
            .await?;

        // Re-read through the unique pair; with an upsert the generated
        // id above may not be the persisted one.
        let saved = ResponseEntity::find()
            .filter(quote_response::Column::InvitationId.eq(invitation.id))
            .filter(quote_response::Column::QuoteItemId.eq(item.id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::ConsistencyViolation("upserted response row missing".to_string())
            })?;

        // First saved bid moves the invitation to partial; submitted is
        // unreachable here because ensure_writable already refused it.
        if matches!(
            invitation.status,
            InvitationStatus::Invited | InvitationStatus::Viewed
        ) {
            let mut active: InvitationActiveModel = invitation.clone().into();
            active.status = Set(InvitationStatus::Partial);
            active.update(&txn).await?;
        }

        txn.commit().await?;

        info!(response_id = %saved.id, invitation_id = %invitation.id, "response saved");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::ResponseSaved {
                    invitation_id: invitation.id,
                    quote_item_id: item.id,
                    price: saved.price,
                })
                .await
            {
                warn!(error = %e, "failed to send response saved event");
            }
        }

        Ok(saved)
    }

    /// Finalizes the supplier's bids: stamps `submitted_at` and
    /// advances the invitation to submitted. Irrevocable; every later
    /// save against the same token fails with `AlreadySubmitted`.
    #[instrument(skip(self, token), fields(token_prefix = token_prefix(token)))]
    pub async fn submit(&self, token: &str) -> Result<InvitationModel, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let (invitation, quote) = InvitationService::resolve_on(&txn, token).await?;
        ensure_writable(&quote, &invitation, Utc::now())?;

        let now = Utc::now();
        let mut active: InvitationActiveModel = invitation.into();
        active.status = Set(InvitationStatus::Submitted);
        active.submitted_at = Set(Some(now));
        active.last_access_at = Set(Some(now));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(invitation_id = %updated.id, "responses submitted");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::ResponsesSubmitted {
                    invitation_id: updated.id,
                    submitted_at: now,
                })
                .await
            {
                warn!(error = %e, "failed to send submission event");
            }
        }

        Ok(updated)
    }

    /// All responses for a quote, for the buyer's comparison screen.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn list_for_quote(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<Vec<ResponseModel>, ServiceError> {
        let db = &*self.db_pool;
        let responses = ResponseEntity::find()
            .filter(quote_response::Column::TenantId.eq(tenant_id))
            .inner_join(QuoteItemEntity)
            .filter(quote_item::Column::QuoteId.eq(quote_id))
            .all(db)
            .await?;
        Ok(responses)
    }
}
