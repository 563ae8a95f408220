use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error payload returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional detail where the taxonomy carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Business-level error taxonomy for the settlement pipeline.
///
/// Supplier-channel refusals (`InvalidToken`, `Expired`, `QuoteNotOpen`,
/// `AlreadySubmitted`) are deliberately distinct variants so the portal
/// can tell the supplier *why* a write was refused instead of a generic
/// failure.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Illegal {entity} transition: {from} -> {to}")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Invalid invitation token")]
    InvalidToken,

    #[error("Quote deadline has passed")]
    Expired,

    #[error("Quote is not open for responses")]
    QuoteNotOpen,

    #[error("Response already submitted; the invitation is final")]
    AlreadySubmitted,

    #[error("Supplier already invited: {0}")]
    AlreadyInvited(String),

    #[error("Winner mismatch: {0}")]
    WinnerMismatch(String),

    /// Internal guard tripped (partially-set winner fields, order total
    /// diverging from its items, duplicate snapshot). Treated as a
    /// defect: logged loudly and the offending write rejected.
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    fn status_and_category(&self) -> (StatusCode, &'static str) {
        match self {
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            ServiceError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            ServiceError::IllegalTransition { .. } => (StatusCode::CONFLICT, "Conflict"),
            ServiceError::InvalidToken | ServiceError::Unauthorized(_) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized")
            }
            ServiceError::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            ServiceError::Expired
            | ServiceError::QuoteNotOpen
            | ServiceError::AlreadySubmitted
            | ServiceError::AlreadyInvited(_)
            | ServiceError::WinnerMismatch(_)
            | ServiceError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            ServiceError::DatabaseError(_)
            | ServiceError::ConsistencyViolation(_)
            | ServiceError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }

    /// Stable machine-readable code carried in `details`, used by the
    /// portal UI to branch on refusal reasons.
    fn code(&self) -> &'static str {
        match self {
            ServiceError::DatabaseError(_) => "database_error",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::ValidationError(_) => "validation_error",
            ServiceError::IllegalTransition { .. } => "illegal_transition",
            ServiceError::InvalidToken => "invalid_token",
            ServiceError::Expired => "expired",
            ServiceError::QuoteNotOpen => "quote_not_open",
            ServiceError::AlreadySubmitted => "already_submitted",
            ServiceError::AlreadyInvited(_) => "already_invited",
            ServiceError::WinnerMismatch(_) => "winner_mismatch",
            ServiceError::ConsistencyViolation(_) => "consistency_violation",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::InternalError(_) => "internal_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, category) = self.status_and_category();

        // 5xx variants are defects or infrastructure faults; keep the
        // loud log here so no call site can forget it.
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed with internal error");
        }

        let message = match &self {
            ServiceError::DatabaseError(_) | ServiceError::InternalError(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: category.to_string(),
            message,
            details: Some(self.code().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
