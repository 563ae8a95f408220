//! Buyer-side authentication boundary.
//!
//! Identity and permission management live in an external collaborator;
//! this module only verifies the HS256 JWT it issues and exposes the
//! claims the settlement pipeline needs: tenant, user, permissions.
//! The pipeline trusts these claims and never re-derives them.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::AppState;

/// Permission strings the routers check before invoking services.
pub mod perm {
    pub const QUOTES_MANAGE: &str = "quotes:manage";
    pub const QUOTES_CLOSE: &str = "quotes:close";
    pub const PURCHASE_ORDERS_MANAGE: &str = "purchase_orders:manage";
}

/// JWT claims issued by the identity collaborator.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Acting user extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub permissions: Vec<String>,
}

impl AuthenticatedUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Capability check before an internal-user operation.
    pub fn require(&self, permission: &str) -> Result<(), ServiceError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "missing permission: {}",
                permission
            )))
        }
    }
}

pub fn verify_token(token: &str, secret: &str) -> Result<AuthenticatedUser, ServiceError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {}", e)))?;

    Ok(AuthenticatedUser {
        user_id: data.claims.sub,
        tenant_id: data.claims.tenant_id,
        permissions: data.claims.permissions,
    })
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing Authorization header".into()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("expected Bearer token".into()))?
            .trim();

        verify_token(token, &state.config.jwt_secret)
    }
}

/// Issues a token for tests and local tooling; production tokens come
/// from the identity collaborator.
pub fn issue_token(
    user_id: Uuid,
    tenant_id: Uuid,
    permissions: &[&str],
    secret: &str,
) -> Result<String, ServiceError> {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user_id,
        tenant_id,
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(1)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("token creation failed: {}", e)))
}
