use crate::{
    config::{TieBreak, WinnerPolicy},
    db::DbPool,
    entities::quote,
    entities::quote_invitation::{self, Entity as InvitationEntity},
    entities::quote_item::{self, ActiveModel as ItemActiveModel, Entity as QuoteItemEntity},
    entities::quote_response::{self, Entity as ResponseEntity, Model as ResponseModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A bid considered for selection: the response plus its invitation's
/// supplier.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub response: ResponseModel,
    pub supplier_id: Uuid,
}

/// Pure selection rule: minimum strictly-positive price, ties broken by
/// the configured policy. Returns `None` when no bid qualifies.
pub fn pick_winner(candidates: &[Candidate], tie_break: TieBreak) -> Option<&Candidate> {
    candidates
        .iter()
        .filter(|c| c.response.price > Decimal::ZERO)
        .min_by(|a, b| {
            a.response.price.cmp(&b.response.price).then_with(|| match tie_break {
                TieBreak::EarliestResponse => a.response.filled_at.cmp(&b.response.filled_at),
                TieBreak::LowestSupplierId => a.supplier_id.cmp(&b.supplier_id),
            })
        })
}

/// Computes, per item, the selected supplier/bid: automatically by
/// policy or by manual override. The winner columns always move as one
/// unit (all set or all cleared).
#[derive(Clone)]
pub struct WinnerService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    policy: WinnerPolicy,
}

impl WinnerService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        policy: WinnerPolicy,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            policy,
        }
    }

    async fn load_quote_for_selection<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<quote::Model, ServiceError> {
        let found = quote::Entity::find_by_id(quote_id)
            .filter(quote::Column::TenantId.eq(tenant_id))
            .filter(quote::Column::IsDeleted.eq(false))
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote {} not found", quote_id)))?;

        // Closed quotes are frozen in the snapshot; cancelled quotes
        // have nothing to settle.
        if found.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "quote is {}; winners are frozen",
                found.status.as_str()
            )));
        }
        Ok(found)
    }

    /// Automatically resolves winners for every item of the quote that
    /// has none yet. Items already carrying a winner are skipped, never
    /// overwritten, so re-running is idempotent. Returns the number of
    /// items resolved by this call.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn auto_select_winners(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<usize, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        Self::load_quote_for_selection(&txn, tenant_id, quote_id).await?;

        let items = QuoteItemEntity::find()
            .filter(quote_item::Column::QuoteId.eq(quote_id))
            .order_by_asc(quote_item::Column::SortOrder)
            .all(&txn)
            .await?;

        let supplier_by_invitation: HashMap<Uuid, Uuid> = InvitationEntity::find()
            .filter(quote_invitation::Column::QuoteId.eq(quote_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|inv| (inv.id, inv.supplier_id))
            .collect();

        let now = Utc::now();
        let mut resolved = 0usize;

        for item in items {
            if item.has_winner() {
                continue;
            }

            let responses = ResponseEntity::find()
                .filter(quote_response::Column::QuoteItemId.eq(item.id))
                .all(&txn)
                .await?;

            let candidates: Vec<Candidate> = responses
                .into_iter()
                .filter_map(|response| {
                    supplier_by_invitation
                        .get(&response.invitation_id)
                        .map(|supplier_id| Candidate {
                            supplier_id: *supplier_id,
                            response,
                        })
                })
                .collect();

            let Some(winner) = pick_winner(&candidates, self.policy.tie_break) else {
                continue;
            };

            let reason = format!(
                "automatic: lowest price {} of {} qualifying bid(s)",
                winner.response.price,
                candidates
                    .iter()
                    .filter(|c| c.response.price > Decimal::ZERO)
                    .count()
            );

            let mut active: ItemActiveModel = item.into();
            active.winner_supplier_id = Set(Some(winner.supplier_id));
            active.winner_response_id = Set(Some(winner.response.id));
            active.winner_reason = Set(Some(reason));
            active.winner_set_at = Set(Some(now));
            active.winner_set_by = Set(None);
            active.updated_at = Set(now);
            active.update(&txn).await?;

            resolved += 1;
        }

        txn.commit().await?;

        info!(quote_id = %quote_id, resolved, "automatic winner selection finished");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::WinnersAutoSelected { quote_id, resolved })
                .await
            {
                warn!(error = %e, "failed to send auto-selection event");
            }
        }

        Ok(resolved)
    }

    /// Manually assigns the winner of one item, overriding any
    /// automatic choice. The response must belong to the item and its
    /// invitation's supplier must match, else `WinnerMismatch`.
    #[instrument(skip(self), fields(item_id = %item_id, supplier_id = %supplier_id))]
    pub async fn set_winner_manually(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        supplier_id: Uuid,
        response_id: Uuid,
        reason: String,
        set_by: Uuid,
    ) -> Result<quote_item::Model, ServiceError> {
        if reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "a reason is required for a manual winner".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let item = QuoteItemEntity::find_by_id(item_id)
            .filter(quote_item::Column::TenantId.eq(tenant_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote item {} not found", item_id)))?;

        Self::load_quote_for_selection(&txn, tenant_id, item.quote_id).await?;

        let response = ResponseEntity::find_by_id(response_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Response {} not found", response_id))
            })?;

        if response.quote_item_id != item.id {
            return Err(ServiceError::WinnerMismatch(format!(
                "response {} does not belong to item {}",
                response_id, item_id
            )));
        }

        let invitation = InvitationEntity::find_by_id(response.invitation_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::ConsistencyViolation(format!(
                    "response {} has no invitation",
                    response_id
                ))
            })?;

        if invitation.supplier_id != supplier_id {
            return Err(ServiceError::WinnerMismatch(format!(
                "response {} belongs to supplier {}, not {}",
                response_id, invitation.supplier_id, supplier_id
            )));
        }

        let now = Utc::now();
        let mut active: ItemActiveModel = item.into();
        active.winner_supplier_id = Set(Some(supplier_id));
        active.winner_response_id = Set(Some(response_id));
        active.winner_reason = Set(Some(reason));
        active.winner_set_at = Set(Some(now));
        active.winner_set_by = Set(Some(set_by));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(item_id = %item_id, supplier_id = %supplier_id, "manual winner set");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::WinnerSet {
                    quote_item_id: item_id,
                    supplier_id,
                    manual: true,
                })
                .await
            {
                warn!(error = %e, "failed to send winner set event");
            }
        }

        Ok(updated)
    }

    /// Clears an item's winner: all winner fields return to null
    /// together.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn clear_winner(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<quote_item::Model, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let item = QuoteItemEntity::find_by_id(item_id)
            .filter(quote_item::Column::TenantId.eq(tenant_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote item {} not found", item_id)))?;

        Self::load_quote_for_selection(&txn, tenant_id, item.quote_id).await?;

        let mut active: ItemActiveModel = item.into();
        active.winner_supplier_id = Set(None);
        active.winner_response_id = Set(None);
        active.winner_reason = Set(None);
        active.winner_set_at = Set(None);
        active.winner_set_by = Set(None);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::WinnerCleared(item_id)).await {
                warn!(error = %e, "failed to send winner cleared event");
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn candidate(price: Decimal, filled_offset_secs: i64, supplier_id: Uuid) -> Candidate {
        let now = Utc::now();
        Candidate {
            supplier_id,
            response: ResponseModel {
                id: Uuid::new_v4(),
                tenant_id: Uuid::new_v4(),
                invitation_id: Uuid::new_v4(),
                quote_item_id: Uuid::new_v4(),
                price,
                min_order_quantity: None,
                delivery_days: None,
                note: None,
                filled_at: now + Duration::seconds(filled_offset_secs),
            },
        }
    }

    #[test]
    fn picks_lowest_positive_price() {
        let candidates = vec![
            candidate(dec!(5.00), 0, Uuid::new_v4()),
            candidate(dec!(4.50), 10, Uuid::new_v4()),
            candidate(dec!(6.25), 20, Uuid::new_v4()),
        ];
        let winner = pick_winner(&candidates, TieBreak::EarliestResponse).unwrap();
        assert_eq!(winner.response.price, dec!(4.50));
    }

    #[test]
    fn zero_and_negative_prices_never_qualify() {
        let candidates = vec![
            candidate(dec!(0), 0, Uuid::new_v4()),
            candidate(dec!(-1.00), 5, Uuid::new_v4()),
        ];
        assert!(pick_winner(&candidates, TieBreak::EarliestResponse).is_none());
        assert!(pick_winner(&[], TieBreak::EarliestResponse).is_none());
    }

    #[test]
    fn tie_breaks_by_earliest_response() {
        let late = candidate(dec!(3.00), 60, Uuid::new_v4());
        let early = candidate(dec!(3.00), 0, Uuid::new_v4());
        let candidates = [late, early.clone()];
        let winner = pick_winner(&candidates, TieBreak::EarliestResponse).unwrap();
        assert_eq!(winner.response.id, early.response.id);
    }

    #[test]
    fn tie_breaks_by_supplier_id_when_configured() {
        let hi = Uuid::from_u128(0xffff_ffff_ffff_ffff_ffff_ffff_ffff_ffff);
        let lo = Uuid::from_u128(1);
        let a = candidate(dec!(3.00), 0, hi);
        let b = candidate(dec!(3.00), 60, lo);
        let candidates = [a, b.clone()];
        let winner = pick_winner(&candidates, TieBreak::LowestSupplierId).unwrap();
        assert_eq!(winner.response.id, b.response.id);
    }
}
