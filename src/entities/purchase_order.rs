use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fulfilment state of a purchase order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl PurchaseOrderStatus {
    /// draft → sent → confirmed → delivered, with cancellation only
    /// while the order has not been confirmed.
    pub fn can_transition_to(self, next: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Draft, Sent) | (Sent, Confirmed) | (Confirmed, Delivered) | (Draft, Cancelled) | (Sent, Cancelled)
        )
    }

    /// Only draft orders accept line item edits.
    pub fn is_editable(self) -> bool {
        matches!(self, PurchaseOrderStatus::Draft)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Sent => "sent",
            PurchaseOrderStatus::Confirmed => "confirmed",
            PurchaseOrderStatus::Delivered => "delivered",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Buyer-to-supplier order generated from a closed quote's winning
/// items. `total_amount` is derived: it always equals
/// `subtotal + tax_amount + shipping_cost`, with `subtotal` recomputed
/// from the current line items after every item mutation.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub quote_id: Uuid,
    pub supplier_id: Uuid,
    pub po_number: String,
    pub status: PurchaseOrderStatus,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub delivery_address: Option<String>,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
    pub is_deleted: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::quote::Entity",
        from = "Column::QuoteId",
        to = "super::quote::Column::Id"
    )]
    Quote,
    #[sea_orm(has_many = "super::purchase_order_item::Entity")]
    Items,
}

impl Related<super::quote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Quote.def()
    }
}

impl Related<super::purchase_order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::PurchaseOrderStatus::*;

    #[test]
    fn forward_chain_is_legal() {
        assert!(Draft.can_transition_to(Sent));
        assert!(Sent.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Delivered));
    }

    #[test]
    fn cancellation_only_before_confirmation() {
        assert!(Draft.can_transition_to(Cancelled));
        assert!(Sent.can_transition_to(Cancelled));
        assert!(!Confirmed.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Cancelled));
    }

    #[test]
    fn no_skips_or_reversals() {
        assert!(!Draft.can_transition_to(Confirmed));
        assert!(!Draft.can_transition_to(Delivered));
        assert!(!Sent.can_transition_to(Draft));
        assert!(!Delivered.can_transition_to(Sent));
        assert!(!Cancelled.can_transition_to(Draft));
        assert!(!Cancelled.can_transition_to(Sent));
    }

    #[test]
    fn only_draft_is_editable() {
        assert!(Draft.is_editable());
        for s in [Sent, Confirmed, Delivered, Cancelled] {
            assert!(!s.is_editable());
        }
    }
}
