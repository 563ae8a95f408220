use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response progress of an invited supplier. Strictly monotonic:
/// invited → viewed → partial → submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    #[sea_orm(string_value = "invited")]
    Invited,
    #[sea_orm(string_value = "viewed")]
    Viewed,
    #[sea_orm(string_value = "partial")]
    Partial,
    #[sea_orm(string_value = "submitted")]
    Submitted,
}

/// Binds one supplier to one quote. `public_token` is the supplier's
/// only credential; it is a bearer capability mapped 1:1 to this row
/// and must never appear in full in logs.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quote_invitations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub quote_id: Uuid,
    pub supplier_id: Uuid,
    #[serde(skip_serializing)]
    pub public_token: String,
    pub status: InvitationStatus,
    pub contact_email: Option<String>,
    pub invited_at: DateTime<Utc>,
    pub last_access_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
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
