use crate::{
    db::DbPool,
    entities::quote::{self, QuoteStatus},
    entities::quote_invitation::{
        self, ActiveModel as InvitationActiveModel, Entity as InvitationEntity,
        InvitationStatus, Model as InvitationModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Issues and validates the opaque per-supplier access tokens that gate
/// all supplier-side reads and writes for one quote.
#[derive(Clone)]
pub struct InvitationService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

/// Generates a bearer token with 256 bits of OS entropy, url-safe so it
/// can be embedded in the portal link unescaped.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Loggable form of a token. The full value is a credential and never
/// appears in logs.
pub fn token_prefix(token: &str) -> &str {
    // Tokens we mint are ASCII, but this runs on the raw path parameter,
    // so the cut has to land on a char boundary.
    token
        .char_indices()
        .nth(8)
        .map_or(token, |(i, _)| &token[..i])
}

/// Writable precondition for the supplier channel, checked at every
/// write rather than cached: the quote is open, the deadline (if any)
/// has not passed at this wall-clock instant, and the invitation has
/// not been finalized.
pub(crate) fn ensure_writable(
    quote: &quote::Model,
    invitation: &InvitationModel,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if invitation.submitted_at.is_some() {
        return Err(ServiceError::AlreadySubmitted);
    }
    if quote.status != QuoteStatus::Open {
        return Err(ServiceError::QuoteNotOpen);
    }
    if let Some(deadline) = quote.deadline {
        if deadline <= now {
            return Err(ServiceError::Expired);
        }
    }
    Ok(())
}

impl InvitationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Invites a supplier to a quote, issuing the invitation token.
    /// Unique per (quote, supplier): a repeat invite is an
    /// `AlreadyInvited` conflict, never a second credential.
    #[instrument(skip(self), fields(quote_id = %quote_id, supplier_id = %supplier_id))]
    pub async fn invite_supplier(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
        supplier_id: Uuid,
        contact_email: Option<String>,
    ) -> Result<InvitationModel, ServiceError> {
        let db = &*self.db_pool;

        let quote = quote::Entity::find_by_id(quote_id)
            .filter(quote::Column::TenantId.eq(tenant_id))
            .filter(quote::Column::IsDeleted.eq(false))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote {} not found", quote_id)))?;

        if quote.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "quote is {}; suppliers can no longer be invited",
                quote.status.as_str()
            )));
        }

        let existing = InvitationEntity::find()
            .filter(quote_invitation::Column::QuoteId.eq(quote_id))
            .filter(quote_invitation::Column::SupplierId.eq(supplier_id))
            .count(db)
            .await?;
        if existing > 0 {
            return Err(ServiceError::AlreadyInvited(format!(
                "supplier {} is already invited to quote {}",
                supplier_id, quote_id
            )));
        }

        let token = generate_token();
        let now = Utc::now();
        let invitation = InvitationActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            quote_id: Set(quote_id),
            supplier_id: Set(supplier_id),
            public_token: Set(token.clone()),
            status: Set(InvitationStatus::Invited),
            contact_email: Set(contact_email),
            invited_at: Set(now),
            last_access_at: Set(None),
            submitted_at: Set(None),
        }
        .insert(db)
        .await?;

        info!(
            invitation_id = %invitation.id,
            token_prefix = token_prefix(&token),
            "supplier invited"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::SupplierInvited {
                    quote_id,
                    supplier_id,
                    invitation_id: invitation.id,
                })
                .await
            {
                warn!(error = %e, "failed to send supplier invited event");
            }
        }

        Ok(invitation)
    }

    /// Lists a quote's invitations for the buyer screen.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn list_invitations(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<Vec<InvitationModel>, ServiceError> {
        let db = &*self.db_pool;
        let invitations = InvitationEntity::find()
            .filter(quote_invitation::Column::TenantId.eq(tenant_id))
            .filter(quote_invitation::Column::QuoteId.eq(quote_id))
            .order_by_asc(quote_invitation::Column::InvitedAt)
            .all(db)
            .await?;
        Ok(invitations)
    }

    /// Looks up an invitation and its quote by bearer token. Does not
    /// check quote status; callers verify writability separately.
    pub(crate) async fn resolve_on<C: ConnectionTrait>(
        conn: &C,
        token: &str,
    ) -> Result<(InvitationModel, quote::Model), ServiceError> {
        let invitation = InvitationEntity::find()
            .filter(quote_invitation::Column::PublicToken.eq(token))
            .one(conn)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        let quote = quote::Entity::find_by_id(invitation.quote_id)
            .filter(quote::Column::IsDeleted.eq(false))
            .one(conn)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        Ok((invitation, quote))
    }

    /// Resolves a token against the pool connection.
    #[instrument(skip(self, token), fields(token_prefix = token_prefix(token)))]
    pub async fn resolve(
        &self,
        token: &str,
    ) -> Result<(InvitationModel, quote::Model), ServiceError> {
        Self::resolve_on(&*self.db_pool, token).await
    }

    /// Records supplier access: stamps `last_access_at` and advances
    /// `invited -> viewed` on first read. Status never moves backward.
    pub(crate) async fn record_access_on<C: ConnectionTrait>(
        conn: &C,
        invitation: InvitationModel,
    ) -> Result<InvitationModel, ServiceError> {
        let status = invitation.status;
        let mut active: InvitationActiveModel = invitation.into();
        active.last_access_at = Set(Some(Utc::now()));
        if status == InvitationStatus::Invited {
            active.status = Set(InvitationStatus::Viewed);
        }
        let updated = active.update(conn).await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote_fixture(status: QuoteStatus, deadline: Option<DateTime<Utc>>) -> quote::Model {
        quote::Model {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            title: "Q1".into(),
            description: None,
            status,
            deadline,
            is_deleted: false,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            closed_at: None,
        }
    }

    fn invitation_fixture(submitted: bool) -> InvitationModel {
        InvitationModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            quote_id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            public_token: generate_token(),
            status: if submitted {
                InvitationStatus::Submitted
            } else {
                InvitationStatus::Invited
            },
            contact_email: None,
            invited_at: Utc::now(),
            last_access_at: None,
            submitted_at: submitted.then(Utc::now),
        }
    }

    #[test]
    fn tokens_are_long_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        // 32 bytes of entropy, base64 without padding
        assert_eq!(a.len(), 43);
        assert!(!a.contains('+') && !a.contains('/'));
    }

    #[test]
    fn token_prefix_truncates() {
        let token = generate_token();
        assert_eq!(token_prefix(&token).len(), 8);
        assert_eq!(token_prefix("ab"), "ab");
    }

    #[test]
    fn token_prefix_cuts_on_char_boundaries() {
        // The path parameter is arbitrary UTF-8, not one of our tokens.
        assert_eq!(token_prefix("aaaaaaaé"), "aaaaaaaé");
        assert_eq!(token_prefix("aaaaaaaé-and-more"), "aaaaaaaé");
        assert_eq!(token_prefix("日本語のトークンです余り"), "日本語のトークン");
    }

    #[test]
    fn writable_requires_open_quote() {
        let now = Utc::now();
        let inv = invitation_fixture(false);
        for status in [QuoteStatus::Draft, QuoteStatus::Closed, QuoteStatus::Cancelled] {
            let quote = quote_fixture(status, None);
            assert!(matches!(
                ensure_writable(&quote, &inv, now),
                Err(ServiceError::QuoteNotOpen)
            ));
        }
        let open = quote_fixture(QuoteStatus::Open, None);
        assert!(ensure_writable(&open, &inv, now).is_ok());
    }

    #[test]
    fn writable_checks_deadline_at_wall_clock() {
        let now = Utc::now();
        let inv = invitation_fixture(false);
        let expired = quote_fixture(QuoteStatus::Open, Some(now - chrono::Duration::seconds(1)));
        assert!(matches!(
            ensure_writable(&expired, &inv, now),
            Err(ServiceError::Expired)
        ));
        let future = quote_fixture(QuoteStatus::Open, Some(now + chrono::Duration::hours(1)));
        assert!(ensure_writable(&future, &inv, now).is_ok());
    }

    #[test]
    fn submission_is_final_even_for_open_quotes() {
        let now = Utc::now();
        let quote = quote_fixture(QuoteStatus::Open, None);
        let inv = invitation_fixture(true);
        assert!(matches!(
            ensure_writable(&quote, &inv, now),
            Err(ServiceError::AlreadySubmitted)
        ));
    }
}
