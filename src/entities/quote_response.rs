use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One supplier's bid for one quote item. Unique per
/// (invitation, quote_item); re-submission overwrites the content
/// fields in place rather than inserting a second row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quote_responses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invitation_id: Uuid,
    pub quote_item_id: Uuid,
    pub price: Decimal,
    pub min_order_quantity: Option<i32>,
    pub delivery_days: Option<i32>,
    pub note: Option<String>,
    pub filled_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::quote_invitation::Entity",
        from = "Column::InvitationId",
        to = "super::quote_invitation::Column::Id"
    )]
    Invitation,
    #[sea_orm(
        belongs_to = "super::quote_item::Entity",
        from = "Column::QuoteItemId",
        to = "super::quote_item::Column::Id"
    )]
    Item,
}

impl Related<super::quote_invitation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invitation.def()
    }
}

impl Related<super::quote_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
