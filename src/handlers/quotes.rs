use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{created_response, no_content_response, success_response, PaginationParams};
use crate::{
    auth::{perm, AuthenticatedUser},
    entities::quote::QuoteStatus,
    errors::ServiceError,
    handlers::AppState,
    services::quotes::{
        AddQuoteItemRequest, CreateQuoteRequest, UpdateQuoteItemRequest, UpdateQuoteRequest,
    },
};

#[derive(Debug, Deserialize)]
struct QuoteListQuery {
    #[serde(default)]
    page: Option<u64>,
    #[serde(default)]
    per_page: Option<u64>,
    status: Option<QuoteStatus>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct InviteSupplierRequest {
    pub supplier_id: Uuid,
    #[validate(email)]
    pub contact_email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SetWinnerRequest {
    pub supplier_id: Uuid,
    pub response_id: Uuid,
    #[validate(length(min = 1, max = 500, message = "A reason is required"))]
    pub reason: String,
}

async fn create_quote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateQuoteRequest>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    let quote = state
        .services
        .quotes
        .create_quote(user.tenant_id, user.user_id, payload)
        .await?;
    Ok(created_response(quote))
}

async fn list_quotes(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<QuoteListQuery>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    let page = state
        .services
        .quotes
        .list_quotes(
            user.tenant_id,
            query.status,
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(20),
        )
        .await?;
    Ok(success_response(page))
}

async fn get_quote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(quote_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    let quote = state.services.quotes.get_quote(user.tenant_id, quote_id).await?;
    let items = state.services.quotes.list_items(user.tenant_id, quote_id).await?;
    let invitations = state
        .services
        .invitations
        .list_invitations(user.tenant_id, quote_id)
        .await?;
    let responses = state
        .services
        .responses
        .list_for_quote(user.tenant_id, quote_id)
        .await?;
    Ok(success_response(serde_json::json!({
        "quote": quote,
        "items": items,
        "invitations": invitations,
        "responses": responses,
    })))
}

async fn update_quote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(quote_id): Path<Uuid>,
    Json(payload): Json<UpdateQuoteRequest>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    let quote = state
        .services
        .quotes
        .update_quote(user.tenant_id, quote_id, payload)
        .await?;
    Ok(success_response(quote))
}

async fn delete_quote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(quote_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    state
        .services
        .quotes
        .delete_quote(user.tenant_id, quote_id)
        .await?;
    Ok(no_content_response())
}

async fn add_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(quote_id): Path<Uuid>,
    Json(payload): Json<AddQuoteItemRequest>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    let item = state
        .services
        .quotes
        .add_item(user.tenant_id, quote_id, payload)
        .await?;
    Ok(created_response(item))
}

async fn update_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((quote_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateQuoteItemRequest>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    let item = state
        .services
        .quotes
        .update_item(user.tenant_id, quote_id, item_id, payload)
        .await?;
    Ok(success_response(item))
}

async fn remove_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((quote_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    state
        .services
        .quotes
        .remove_item(user.tenant_id, quote_id, item_id)
        .await?;
    Ok(no_content_response())
}

async fn invite_supplier(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(quote_id): Path<Uuid>,
    Json(payload): Json<InviteSupplierRequest>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    super::common::validate_input(&payload)?;
    let invitation = state
        .services
        .invitations
        .invite_supplier(
            user.tenant_id,
            quote_id,
            payload.supplier_id,
            payload.contact_email,
        )
        .await?;
    Ok(created_response(invitation))
}

async fn list_invitations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(quote_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    let invitations = state
        .services
        .invitations
        .list_invitations(user.tenant_id, quote_id)
        .await?;
    Ok(success_response(invitations))
}

async fn open_quote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(quote_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    let outcome = state
        .services
        .quotes
        .open_quote(user.tenant_id, quote_id)
        .await?;
    Ok(success_response(outcome))
}

async fn close_quote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(quote_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_CLOSE)?;
    let outcome = state
        .services
        .quotes
        .close_quote(user.tenant_id, quote_id)
        .await?;
    Ok(success_response(outcome))
}

async fn cancel_quote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(quote_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_CLOSE)?;
    let quote = state
        .services
        .quotes
        .cancel_quote(user.tenant_id, quote_id)
        .await?;
    Ok(success_response(quote))
}

async fn auto_select_winners(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(quote_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    let resolved = state
        .services
        .winners
        .auto_select_winners(user.tenant_id, quote_id)
        .await?;
    Ok(success_response(serde_json::json!({ "resolved": resolved })))
}

async fn set_winner(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((_quote_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SetWinnerRequest>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    super::common::validate_input(&payload)?;
    let item = state
        .services
        .winners
        .set_winner_manually(
            user.tenant_id,
            item_id,
            payload.supplier_id,
            payload.response_id,
            payload.reason,
            user.user_id,
        )
        .await?;
    Ok(success_response(item))
}

async fn clear_winner(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((_quote_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    let item = state
        .services
        .winners
        .clear_winner(user.tenant_id, item_id)
        .await?;
    Ok(success_response(item))
}

async fn get_snapshot(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(quote_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    let snapshot = state
        .services
        .snapshots
        .get_snapshot(user.tenant_id, quote_id)
        .await?;
    Ok(success_response(snapshot))
}

async fn price_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(product_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    user.require(perm::QUOTES_MANAGE)?;
    let (entries, total) = state
        .services
        .snapshots
        .price_history_for_product(user.tenant_id, product_id, pagination.page, pagination.per_page)
        .await?;
    Ok(success_response(serde_json::json!({
        "entries": entries,
        "total": total,
        "page": pagination.page,
        "per_page": pagination.per_page,
    })))
}

pub fn quote_routes() -> Router<AppState> {
    Router::new()
        .route("/quotes", post(create_quote).get(list_quotes))
        .route(
            "/quotes/:id",
            get(get_quote).put(update_quote).delete(delete_quote),
        )
        .route("/quotes/:id/items", post(add_item))
        .route(
            "/quotes/:id/items/:item_id",
            put(update_item).delete(remove_item),
        )
        .route(
            "/quotes/:id/invitations",
            post(invite_supplier).get(list_invitations),
        )
        .route("/quotes/:id/open", post(open_quote))
        .route("/quotes/:id/close", post(close_quote))
        .route("/quotes/:id/cancel", post(cancel_quote))
        .route("/quotes/:id/winners/auto", post(auto_select_winners))
        .route(
            "/quotes/:id/items/:item_id/winner",
            put(set_winner).delete(clear_winner),
        )
        .route("/quotes/:id/snapshot", get(get_snapshot))
        .route("/price-history/:product_id", get(price_history))
}
