use crate::{
    db::DbPool,
    entities::price_history::{self, ActiveModel as PriceHistoryActiveModel},
    entities::quote,
    entities::quote_invitation::{self, Entity as InvitationEntity},
    entities::quote_item::{self, Entity as QuoteItemEntity},
    entities::quote_response::Entity as ResponseEntity,
    entities::quote_snapshot::{self, ActiveModel as SnapshotActiveModel, Entity as SnapshotEntity},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Result of a successful closure recording.
#[derive(Debug, Clone)]
pub struct ClosureRecord {
    pub snapshot_id: Uuid,
    pub price_history_entries: usize,
}

/// Freezes the audit trail of a closing quote: one write-once snapshot
/// of items + responses + winners, plus one price-history row per
/// winnered item. Runs on the caller's transaction so the whole closure
/// (including the status flip) commits or rolls back as one unit.
///
/// A quote is closed exactly once; finding an existing snapshot means
/// the closure event already happened and the call is rejected rather
/// than replayed.
#[instrument(skip(conn, quote), fields(quote_id = %quote.id))]
pub async fn record_closure<C: ConnectionTrait>(
    conn: &C,
    quote: &quote::Model,
) -> Result<ClosureRecord, ServiceError> {
    let existing = SnapshotEntity::find()
        .filter(quote_snapshot::Column::QuoteId.eq(quote.id))
        .count(conn)
        .await?;
    if existing > 0 {
        return Err(ServiceError::Conflict(format!(
            "closure already recorded for quote {}",
            quote.id
        )));
    }

    let items = QuoteItemEntity::find()
        .filter(quote_item::Column::QuoteId.eq(quote.id))
        .order_by_asc(quote_item::Column::SortOrder)
        .all(conn)
        .await?;

    let invitations = InvitationEntity::find()
        .filter(quote_invitation::Column::QuoteId.eq(quote.id))
        .all(conn)
        .await?;

    let responses = ResponseEntity::find()
        .inner_join(QuoteItemEntity)
        .filter(quote_item::Column::QuoteId.eq(quote.id))
        .all(conn)
        .await?;

    let now = Utc::now();
    let mut total_value = Decimal::ZERO;
    let mut ledger_rows: Vec<PriceHistoryActiveModel> = Vec::new();

    for item in &items {
        if !item.winner_fields_consistent() {
            return Err(ServiceError::ConsistencyViolation(format!(
                "quote item {} has partially set winner fields",
                item.id
            )));
        }
        let (Some(winner_supplier), Some(winner_response)) =
            (item.winner_supplier_id, item.winner_response_id)
        else {
            continue;
        };

        let response = responses
            .iter()
            .find(|r| r.id == winner_response && r.quote_item_id == item.id)
            .ok_or_else(|| {
                ServiceError::ConsistencyViolation(format!(
                    "winner response {} of item {} does not exist on that item",
                    winner_response, item.id
                ))
            })?;

        total_value += response.price * Decimal::from(item.quantity);

        ledger_rows.push(PriceHistoryActiveModel {
            id: sea_orm::Set(Uuid::new_v4()),
            tenant_id: sea_orm::Set(quote.tenant_id),
            product_id: sea_orm::Set(item.product_id),
            package_id: sea_orm::Set(item.package_id),
            supplier_id: sea_orm::Set(winner_supplier),
            price: sea_orm::Set(response.price),
            quote_id: sea_orm::Set(quote.id),
            quote_item_id: sea_orm::Set(item.id),
            recorded_at: sea_orm::Set(now),
        });
    }

    let payload = json!({
        "quote": {
            "id": quote.id,
            "title": quote.title,
            "description": quote.description,
            "deadline": quote.deadline,
            "created_at": quote.created_at,
        },
        "items": items.iter().map(|item| {
            json!({
                "id": item.id,
                "product_id": item.product_id,
                "package_id": item.package_id,
                "quantity": item.quantity,
                "notes": item.notes,
                "sort_order": item.sort_order,
                "winner": item.winner_response_id.map(|response_id| json!({
                    "supplier_id": item.winner_supplier_id,
                    "response_id": response_id,
                    "reason": item.winner_reason,
                    "set_at": item.winner_set_at,
                    "set_by": item.winner_set_by,
                })),
                "responses": responses.iter()
                    .filter(|r| r.quote_item_id == item.id)
                    .collect::<Vec<_>>(),
            })
        }).collect::<Vec<_>>(),
        "invitations": invitations.iter().map(|inv| {
            json!({
                "id": inv.id,
                "supplier_id": inv.supplier_id,
                "status": inv.status,
                "invited_at": inv.invited_at,
                "submitted_at": inv.submitted_at,
            })
        }).collect::<Vec<_>>(),
    });

    let snapshot = SnapshotActiveModel {
        id: sea_orm::Set(Uuid::new_v4()),
        tenant_id: sea_orm::Set(quote.tenant_id),
        quote_id: sea_orm::Set(quote.id),
        payload: sea_orm::Set(payload),
        item_count: sea_orm::Set(items.len() as i32),
        supplier_count: sea_orm::Set(invitations.len() as i32),
        response_count: sea_orm::Set(responses.len() as i32),
        total_value: sea_orm::Set(total_value),
        created_at: sea_orm::Set(now),
    }
    .insert(conn)
    .await?;

    let entries = ledger_rows.len();
    if !ledger_rows.is_empty() {
        price_history::Entity::insert_many(ledger_rows)
            .exec(conn)
            .await?;
    }

    info!(
        snapshot_id = %snapshot.id,
        item_count = items.len(),
        price_history_entries = entries,
        "closure recorded"
    );

    Ok(ClosureRecord {
        snapshot_id: snapshot.id,
        price_history_entries: entries,
    })
}

/// Read surface over the durable audit record: snapshots and the
/// price-history ledger, consumed by reporting collaborators.
#[derive(Clone)]
pub struct SnapshotService {
    db_pool: Arc<DbPool>,
}

impl SnapshotService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn get_snapshot(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<quote_snapshot::Model, ServiceError> {
        let db = &*self.db_pool;
        SnapshotEntity::find()
            .filter(quote_snapshot::Column::TenantId.eq(tenant_id))
            .filter(quote_snapshot::Column::QuoteId.eq(quote_id))
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No snapshot recorded for quote {}", quote_id))
            })
    }

    /// Accepted-price rows for one product, newest first.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn price_history_for_product(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<price_history::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let paginator = price_history::Entity::find()
            .filter(price_history::Column::TenantId.eq(tenant_id))
            .filter(price_history::Column::ProductId.eq(product_id))
            .order_by_desc(price_history::Column::RecordedAt)
            .paginate(db, per_page.max(1));

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((rows, total))
    }
}
