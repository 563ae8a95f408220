use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a quote (RFQ).
///
/// Transitions are owned by [`QuoteStatus::can_transition_to`]; no
/// call site may flip the column without consulting the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl QuoteStatus {
    /// Explicit transition table: draft → open → closed, with
    /// cancellation reachable from open or closed. Draft quotes cannot
    /// be cancelled (they are soft-deleted instead), and terminal
    /// states never move.
    pub fn can_transition_to(self, next: QuoteStatus) -> bool {
        matches!(
            (self, next),
            (QuoteStatus::Draft, QuoteStatus::Open)
                | (QuoteStatus::Open, QuoteStatus::Closed)
                | (QuoteStatus::Open, QuoteStatus::Cancelled)
                | (QuoteStatus::Closed, QuoteStatus::Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, QuoteStatus::Closed | QuoteStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Open => "open",
            QuoteStatus::Closed => "closed",
            QuoteStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quotes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: QuoteStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::quote_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::quote_invitation::Entity")]
    Invitations,
    #[sea_orm(has_many = "super::quote_snapshot::Entity")]
    Snapshots,
}

impl Related<super::quote_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::quote_invitation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invitations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
