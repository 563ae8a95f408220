use crate::{
    db::DbPool,
    entities::purchase_order::{
        self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel,
        PurchaseOrderStatus,
    },
    entities::purchase_order_item::{
        self, ActiveModel as OrderItemActiveModel, Entity as OrderItemEntity,
        Model as OrderItemModel,
    },
    entities::quote::{self, QuoteStatus},
    entities::quote_item::{self, Entity as QuoteItemEntity},
    entities::quote_response::{self, Entity as ResponseEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct GeneratePurchaseOrderRequest {
    #[validate(length(max = 1000))]
    pub delivery_address: Option<String>,
    #[validate(length(max = 200))]
    pub payment_terms: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AddOrderItemRequest {
    pub product_id: Uuid,
    pub package_id: Option<Uuid>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct UpdateOrderItemRequest {
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct UpdateOrderRequest {
    pub tax_amount: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub delivery_address: Option<String>,
    #[validate(length(max = 200))]
    pub payment_terms: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

#[derive(Debug, Serialize)]
pub struct OrderListPage {
    pub orders: Vec<OrderModel>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Header totals derived from the current line items. Always recomputed
/// from scratch — summing the rows as they are now — so concurrent or
/// out-of-order edits cannot drift the header from the truth of its
/// items.
pub fn compute_totals(
    line_totals: &[Decimal],
    tax_amount: Decimal,
    shipping_cost: Decimal,
) -> (Decimal, Decimal) {
    let subtotal: Decimal = line_totals.iter().copied().sum();
    (subtotal, subtotal + tax_amount + shipping_cost)
}

fn illegal(from: PurchaseOrderStatus, to: PurchaseOrderStatus) -> ServiceError {
    ServiceError::IllegalTransition {
        entity: "purchase_order",
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    }
}

fn require_non_negative(name: &str, value: Decimal) -> Result<(), ServiceError> {
    if value < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "{} must not be negative",
            name
        )));
    }
    Ok(())
}

/// Materializes one purchase order per (quote, winning supplier) and
/// keeps its computed totals in sync with its line items.
#[derive(Clone)]
pub struct PurchaseOrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl PurchaseOrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn send_event(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "failed to send purchase order event");
            }
        }
    }

    /// Next po_number for the tenant: date-stamped and monotonically
    /// increasing within the day (`PO-YYYYMMDD-NNNN`). Runs inside the
    /// creating transaction; the unique (tenant, po_number) index backs
    /// it up under concurrency.
    async fn next_po_number<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
    ) -> Result<String, ServiceError> {
        let prefix = format!("PO-{}-", Utc::now().format("%Y%m%d"));
        let todays: Vec<String> = OrderEntity::find()
            .filter(purchase_order::Column::TenantId.eq(tenant_id))
            .filter(purchase_order::Column::PoNumber.starts_with(&prefix))
            .all(conn)
            .await?
            .into_iter()
            .map(|po| po.po_number)
            .collect();

        let max_seq = todays
            .iter()
            .filter_map(|n| n.strip_prefix(&prefix))
            .filter_map(|s| s.parse::<u32>().ok())
            .max()
            .unwrap_or(0);

        Ok(format!("{}{:04}", prefix, max_seq + 1))
    }

    /// Re-derives `subtotal` and `total_amount` from the order's
    /// current rows and persists the header. Guards each row's stored
    /// line total against quantity × unit price; a divergence is a
    /// defect and the write is rejected.
    async fn recompute_totals<C: ConnectionTrait>(
        conn: &C,
        order: OrderModel,
    ) -> Result<OrderModel, ServiceError> {
        let items = OrderItemEntity::find()
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
            .all(conn)
            .await?;

        let mut line_totals = Vec::with_capacity(items.len());
        for item in &items {
            let expected = item.unit_price * Decimal::from(item.quantity);
            if item.total_price != expected {
                return Err(ServiceError::ConsistencyViolation(format!(
                    "line {} stores total {} but quantity x unit price is {}",
                    item.id, item.total_price, expected
                )));
            }
            line_totals.push(item.total_price);
        }

        let (subtotal, total_amount) =
            compute_totals(&line_totals, order.tax_amount, order.shipping_cost);

        let mut active: OrderActiveModel = order.into();
        active.subtotal = Set(subtotal);
        active.total_amount = Set(total_amount);
        active.updated_at = Set(Utc::now());
        let updated = active.update(conn).await?;
        Ok(updated)
    }

    async fn find_order<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .filter(purchase_order::Column::TenantId.eq(tenant_id))
            .filter(purchase_order::Column::IsDeleted.eq(false))
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order {} not found", order_id))
            })
    }

    fn require_editable(order: &OrderModel) -> Result<(), ServiceError> {
        if !order.status.is_editable() {
            return Err(ServiceError::Conflict(format!(
                "purchase order is {}; only draft orders can be edited",
                order.status.as_str()
            )));
        }
        Ok(())
    }

    /// Generates the purchase order for one winning supplier of a
    /// closed quote: copies every quote item won by that supplier at
    /// the winning response's price and the requested quantity, then
    /// computes header totals once after the bulk copy.
    #[instrument(skip(self, request), fields(quote_id = %quote_id, supplier_id = %supplier_id))]
    pub async fn generate_from_quote(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
        supplier_id: Uuid,
        created_by: Uuid,
        request: GeneratePurchaseOrderRequest,
    ) -> Result<OrderWithItems, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let quote = quote::Entity::find_by_id(quote_id)
            .filter(quote::Column::TenantId.eq(tenant_id))
            .filter(quote::Column::IsDeleted.eq(false))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote {} not found", quote_id)))?;

        if quote.status != QuoteStatus::Closed {
            return Err(ServiceError::Conflict(format!(
                "purchase orders are generated from closed quotes; quote is {}",
                quote.status.as_str()
            )));
        }

        let winning_items = QuoteItemEntity::find()
            .filter(quote_item::Column::QuoteId.eq(quote_id))
            .filter(quote_item::Column::WinnerSupplierId.eq(supplier_id))
            .order_by_asc(quote_item::Column::SortOrder)
            .all(&txn)
            .await?;

        if winning_items.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "supplier {} won no items on quote {}",
                supplier_id, quote_id
            )));
        }

        let response_ids: Vec<Uuid> = winning_items
            .iter()
            .filter_map(|item| item.winner_response_id)
            .collect();
        let prices: HashMap<Uuid, Decimal> = ResponseEntity::find()
            .filter(quote_response::Column::Id.is_in(response_ids))
            .all(&txn)
            .await?
            .into_iter()
            .map(|r| (r.id, r.price))
            .collect();

        let now = Utc::now();
        let po_number = Self::next_po_number(&txn, tenant_id).await?;
        let order = OrderActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            quote_id: Set(quote_id),
            supplier_id: Set(supplier_id),
            po_number: Set(po_number.clone()),
            status: Set(PurchaseOrderStatus::Draft),
            subtotal: Set(Decimal::ZERO),
            tax_amount: Set(Decimal::ZERO),
            shipping_cost: Set(Decimal::ZERO),
            total_amount: Set(Decimal::ZERO),
            delivery_address: Set(request.delivery_address),
            payment_terms: Set(request.payment_terms),
            notes: Set(request.notes),
            is_deleted: Set(false),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut rows = Vec::with_capacity(winning_items.len());
        for item in &winning_items {
            let response_id = item.winner_response_id.ok_or_else(|| {
                ServiceError::ConsistencyViolation(format!(
                    "item {} has a winner supplier but no winner response",
                    item.id
                ))
            })?;
            let unit_price = *prices.get(&response_id).ok_or_else(|| {
                ServiceError::ConsistencyViolation(format!(
                    "winner response {} of item {} no longer exists",
                    response_id, item.id
                ))
            })?;
            rows.push(OrderItemActiveModel {
                id: Set(Uuid::new_v4()),
                tenant_id: Set(tenant_id),
                purchase_order_id: Set(order.id),
                product_id: Set(item.product_id),
                package_id: Set(item.package_id),
                quote_item_id: Set(Some(item.id)),
                quote_response_id: Set(Some(response_id)),
                description: Set(item.notes.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(unit_price),
                total_price: Set(unit_price * Decimal::from(item.quantity)),
                created_at: Set(now),
                updated_at: Set(now),
            });
        }
        OrderItemEntity::insert_many(rows).exec(&txn).await?;

        // One recompute after the bulk copy, not one per line.
        let order = Self::recompute_totals(&txn, order).await?;
        let items = OrderItemEntity::find()
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
            .all(&txn)
            .await?;

        txn.commit().await?;

        info!(purchase_order_id = %order.id, po_number = %po_number, "purchase order generated");

        self.send_event(Event::PurchaseOrderCreated {
            purchase_order_id: order.id,
            quote_id,
            supplier_id,
            po_number,
        })
        .await;

        Ok(OrderWithItems { order, items })
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderWithItems, ServiceError> {
        let db = &*self.db_pool;
        let order = Self::find_order(db, tenant_id, order_id).await?;
        let items = OrderItemEntity::find()
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
            .all(db)
            .await?;
        Ok(OrderWithItems { order, items })
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        tenant_id: Uuid,
        status: Option<PurchaseOrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListPage, ServiceError> {
        let db = &*self.db_pool;
        let mut query = OrderEntity::find()
            .filter(purchase_order::Column::TenantId.eq(tenant_id))
            .filter(purchase_order::Column::IsDeleted.eq(false));
        if let Some(status) = status {
            query = query.filter(purchase_order::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(purchase_order::Column::CreatedAt)
            .paginate(db, per_page.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok(OrderListPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Updates header fields of a draft order, then recomputes totals
    /// (tax and shipping feed directly into `total_amount`).
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn update_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        request: UpdateOrderRequest,
    ) -> Result<OrderModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if let Some(tax) = request.tax_amount {
            require_non_negative("tax_amount", tax)?;
        }
        if let Some(shipping) = request.shipping_cost {
            require_non_negative("shipping_cost", shipping)?;
        }

        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let order = Self::find_order(&txn, tenant_id, order_id).await?;
        Self::require_editable(&order)?;

        let mut active: OrderActiveModel = order.into();
        if let Some(tax) = request.tax_amount {
            active.tax_amount = Set(tax);
        }
        if let Some(shipping) = request.shipping_cost {
            active.shipping_cost = Set(shipping);
        }
        if let Some(address) = request.delivery_address {
            active.delivery_address = Set(Some(address));
        }
        if let Some(terms) = request.payment_terms {
            active.payment_terms = Set(Some(terms));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        let order = Self::recompute_totals(&txn, order).await?;
        txn.commit().await?;

        self.send_event(Event::PurchaseOrderTotalsRecomputed {
            purchase_order_id: order.id,
            subtotal: order.subtotal,
            total_amount: order.total_amount,
        })
        .await;

        Ok(order)
    }

    /// Adds a line to a draft order and recomputes the header in the
    /// same transaction.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn add_item(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        request: AddOrderItemRequest,
    ) -> Result<OrderWithItems, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        require_non_negative("unit_price", request.unit_price)?;

        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let order = Self::find_order(&txn, tenant_id, order_id).await?;
        Self::require_editable(&order)?;

        let now = Utc::now();
        OrderItemActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            purchase_order_id: Set(order.id),
            product_id: Set(request.product_id),
            package_id: Set(request.package_id),
            quote_item_id: Set(None),
            quote_response_id: Set(None),
            description: Set(request.description),
            quantity: Set(request.quantity),
            unit_price: Set(request.unit_price),
            total_price: Set(request.unit_price * Decimal::from(request.quantity)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let order = Self::recompute_totals(&txn, order).await?;
        let items = OrderItemEntity::find()
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
            .all(&txn)
            .await?;
        txn.commit().await?;

        self.send_event(Event::PurchaseOrderTotalsRecomputed {
            purchase_order_id: order.id,
            subtotal: order.subtotal,
            total_amount: order.total_amount,
        })
        .await;

        Ok(OrderWithItems { order, items })
    }

    /// Updates a line of a draft order; the stored line total and the
    /// header are both re-derived in the same transaction.
    #[instrument(skip(self, request), fields(order_id = %order_id, item_id = %item_id))]
    pub async fn update_item(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        item_id: Uuid,
        request: UpdateOrderItemRequest,
    ) -> Result<OrderWithItems, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if let Some(price) = request.unit_price {
            require_non_negative("unit_price", price)?;
        }

        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let order = Self::find_order(&txn, tenant_id, order_id).await?;
        Self::require_editable(&order)?;

        let item = OrderItemEntity::find_by_id(item_id)
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order item {} not found", item_id))
            })?;

        let quantity = request.quantity.unwrap_or(item.quantity);
        let unit_price = request.unit_price.unwrap_or(item.unit_price);

        let mut active: OrderItemActiveModel = item.into();
        active.quantity = Set(quantity);
        active.unit_price = Set(unit_price);
        active.total_price = Set(unit_price * Decimal::from(quantity));
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        let order = Self::recompute_totals(&txn, order).await?;
        let items = OrderItemEntity::find()
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
            .all(&txn)
            .await?;
        txn.commit().await?;

        self.send_event(Event::PurchaseOrderTotalsRecomputed {
            purchase_order_id: order.id,
            subtotal: order.subtotal,
            total_amount: order.total_amount,
        })
        .await;

        Ok(OrderWithItems { order, items })
    }

    /// Removes a line from a draft order and recomputes the header.
    #[instrument(skip(self), fields(order_id = %order_id, item_id = %item_id))]
    pub async fn remove_item(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        item_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let order = Self::find_order(&txn, tenant_id, order_id).await?;
        Self::require_editable(&order)?;

        let item = OrderItemEntity::find_by_id(item_id)
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order item {} not found", item_id))
            })?;
        item.delete(&txn).await?;

        let order = Self::recompute_totals(&txn, order).await?;
        txn.commit().await?;

        self.send_event(Event::PurchaseOrderTotalsRecomputed {
            purchase_order_id: order.id,
            subtotal: order.subtotal,
            total_amount: order.total_amount,
        })
        .await;

        Ok(order)
    }

    /// Moves an order along its lifecycle according to the explicit
    /// transition table.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = new_status.as_str()))]
    pub async fn change_status(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        new_status: PurchaseOrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let db = &*self.db_pool;
        let order = Self::find_order(db, tenant_id, order_id).await?;

        if !order.status.can_transition_to(new_status) {
            return Err(illegal(order.status, new_status));
        }

        let old_status = order.status;
        let mut active: OrderActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let order = active.update(db).await?;

        info!(
            order_id = %order.id,
            old_status = old_status.as_str(),
            new_status = new_status.as_str(),
            "purchase order status changed"
        );

        self.send_event(Event::PurchaseOrderStatusChanged {
            purchase_order_id: order.id,
            old_status: old_status.as_str().to_string(),
            new_status: new_status.as_str().to_string(),
        })
        .await;

        Ok(order)
    }

    /// Soft-deletes a draft order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let order = Self::find_order(db, tenant_id, order_id).await?;
        Self::require_editable(&order)?;

        let mut active: OrderActiveModel = order.into();
        active.is_deleted = Set(true);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn totals_are_sum_of_lines_plus_surcharges() {
        let lines = vec![dec!(45.00), dec!(10.50), dec!(0)];
        let (subtotal, total) = compute_totals(&lines, dec!(5.55), dec!(4.45));
        assert_eq!(subtotal, dec!(55.50));
        assert_eq!(total, dec!(65.50));
    }

    #[test]
    fn empty_order_totals_collapse_to_surcharges() {
        let (subtotal, total) = compute_totals(&[], dec!(2.00), dec!(3.00));
        assert_eq!(subtotal, dec!(0));
        assert_eq!(total, dec!(5.00));
    }

    #[test]
    fn negative_amounts_are_rejected_at_the_boundary() {
        assert!(require_non_negative("tax_amount", dec!(-0.01)).is_err());
        assert!(require_non_negative("tax_amount", dec!(0)).is_ok());
    }
}
