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

use super::common::{created_response, no_content_response, success_response};
use crate::{
    auth::{perm, AuthenticatedUser},
    entities::purchase_order::PurchaseOrderStatus,
    errors::ServiceError,
    handlers::AppState,
    services::purchase_orders::{
        AddOrderItemRequest, GeneratePurchaseOrderRequest, UpdateOrderItemRequest,
        UpdateOrderRequest,
    },
};

#[derive(Debug, Deserialize)]
struct OrderListQuery {
    #[serde(default)]
    page: Option<u64>,
    #[serde(default)]
    per_page: Option<u64>,
    status: Option<PurchaseOrderStatus>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct GenerateFromQuoteRequest {
    pub supplier_id: Uuid,
    #[validate(length(max = 1000))]
    pub delivery_address: Option<String>,
    #[validate(length(max = 200))]
    pub payment_terms: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChangeStatusRequest {
    #[schema(value_type = String)]
    pub status: PurchaseOrderStatus,
}

async fn generate_from_quote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(quote_id): Path<Uuid>,
    Json(payload): Json<GenerateFromQuoteRequest>,
) -> Result<Response, ServiceError> {
    user.require(perm::PURCHASE_ORDERS_MANAGE)?;
    super::common::validate_input(&payload)?;
    let order = state
        .services
        .purchase_orders
        .generate_from_quote(
            user.tenant_id,
            quote_id,
            payload.supplier_id,
            user.user_id,
            GeneratePurchaseOrderRequest {
                delivery_address: payload.delivery_address,
                payment_terms: payload.payment_terms,
                notes: payload.notes,
            },
        )
        .await?;
    Ok(created_response(order))
}

async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Response, ServiceError> {
    user.require(perm::PURCHASE_ORDERS_MANAGE)?;
    let page = state
        .services
        .purchase_orders
        .list_orders(
            user.tenant_id,
            query.status,
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(20),
        )
        .await?;
    Ok(success_response(page))
}

async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    user.require(perm::PURCHASE_ORDERS_MANAGE)?;
    let order = state
        .services
        .purchase_orders
        .get_order(user.tenant_id, order_id)
        .await?;
    Ok(success_response(order))
}

async fn update_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderRequest>,
) -> Result<Response, ServiceError> {
    user.require(perm::PURCHASE_ORDERS_MANAGE)?;
    let order = state
        .services
        .purchase_orders
        .update_order(user.tenant_id, order_id, payload)
        .await?;
    Ok(success_response(order))
}

async fn delete_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    user.require(perm::PURCHASE_ORDERS_MANAGE)?;
    state
        .services
        .purchase_orders
        .delete_order(user.tenant_id, order_id)
        .await?;
    Ok(no_content_response())
}

async fn change_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<ChangeStatusRequest>,
) -> Result<Response, ServiceError> {
    user.require(perm::PURCHASE_ORDERS_MANAGE)?;
    let order = state
        .services
        .purchase_orders
        .change_status(user.tenant_id, order_id, payload.status)
        .await?;
    Ok(success_response(order))
}

async fn add_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<AddOrderItemRequest>,
) -> Result<Response, ServiceError> {
    user.require(perm::PURCHASE_ORDERS_MANAGE)?;
    let item = state
        .services
        .purchase_orders
        .add_item(user.tenant_id, order_id, payload)
        .await?;
    Ok(created_response(item))
}

async fn update_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateOrderItemRequest>,
) -> Result<Response, ServiceError> {
    user.require(perm::PURCHASE_ORDERS_MANAGE)?;
    let item = state
        .services
        .purchase_orders
        .update_item(user.tenant_id, order_id, item_id, payload)
        .await?;
    Ok(success_response(item))
}

async fn remove_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ServiceError> {
    user.require(perm::PURCHASE_ORDERS_MANAGE)?;
    state
        .services
        .purchase_orders
        .remove_item(user.tenant_id, order_id, item_id)
        .await?;
    Ok(no_content_response())
}

pub fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/quotes/:id/purchase-orders", post(generate_from_quote))
        .route("/purchase-orders", get(list_orders))
        .route(
            "/purchase-orders/:id",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/purchase-orders/:id/status", post(change_status))
        .route("/purchase-orders/:id/items", post(add_item))
        .route(
            "/purchase-orders/:id/items/:item_id",
            put(update_item).delete(remove_item),
        )
}
