use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One requested line of a quote.
///
/// The `winner_*` columns move together: either `winner_supplier_id`,
/// `winner_response_id`, `winner_reason` and `winner_set_at` are all
/// null or all set. `winner_set_by` is null for automatic selection and
/// carries the acting user for a manual override; it is only ever set
/// while the other four are.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quote_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub quote_id: Uuid,
    pub product_id: Uuid,
    pub package_id: Option<Uuid>,
    pub quantity: i32,
    pub notes: Option<String>,
    pub sort_order: i32,
    pub winner_supplier_id: Option<Uuid>,
    pub winner_response_id: Option<Uuid>,
    pub winner_reason: Option<String>,
    pub winner_set_at: Option<DateTime<Utc>>,
    pub winner_set_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn has_winner(&self) -> bool {
        self.winner_response_id.is_some()
    }

    /// Guard for the all-or-nothing winner invariant. A `false` here is
    /// a defect, not a user error.
    pub fn winner_fields_consistent(&self) -> bool {
        let set = [
            self.winner_supplier_id.is_some(),
            self.winner_response_id.is_some(),
            self.winner_reason.is_some(),
            self.winner_set_at.is_some(),
        ];
        let all = set.iter().all(|s| *s);
        let none = set.iter().all(|s| !*s);
        (all || none) && (self.winner_set_by.is_none() || all)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::quote::Entity",
        from = "Column::QuoteId",
        to = "super::quote::Column::Id"
    )]
    Quote,
    #[sea_orm(has_many = "super::quote_response::Entity")]
    Responses,
}

impl Related<super::quote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Quote.def()
    }
}

impl Related<super::quote_response::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Responses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
