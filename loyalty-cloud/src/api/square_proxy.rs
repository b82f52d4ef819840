//! Merchant-scoped pass-through to the Square API
//!
//! Every call acts with the authenticated merchant's own access token; the
//! merchant row is attached to the request by the auth middleware.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::Merchant;
use uuid::Uuid;

use super::loyalty::ApiResult;
use crate::square::types::{Customer, LoyaltyProgram, NewCustomer, Order};
use crate::state::AppState;

/// Square rejects order searches above this page size
const MAX_ORDER_SEARCH_LIMIT: u32 = 1000;
const DEFAULT_ORDER_SEARCH_LIMIT: u32 = 50;

/// GET /api/square/loyalty-program
pub async fn loyalty_program(
    State(state): State<AppState>,
    Extension(merchant): Extension<Merchant>,
) -> ApiResult<LoyaltyProgram> {
    let client = state.square_client(&merchant)?;
    let program = client.get_loyalty_program().await?.ok_or_else(|| {
        AppError::with_message(ErrorCode::NotFound, "Merchant has no Square loyalty program")
    })?;
    Ok(Json(program))
}

/// GET /api/square/customers/{customer_id}
pub async fn get_customer(
    State(state): State<AppState>,
    Extension(merchant): Extension<Merchant>,
    Path(customer_id): Path<String>,
) -> ApiResult<Customer> {
    let client = state.square_client(&merchant)?;
    let customer = client
        .get_customer(&customer_id)
        .await?
        .ok_or_else(|| AppError::with_message(ErrorCode::NotFound, "Square customer not found"))?;
    Ok(Json(customer))
}

/// POST /api/square/customers
///
/// An empty `idempotency_key` is replaced with a fresh one.
pub async fn create_customer(
    State(state): State<AppState>,
    Extension(merchant): Extension<Merchant>,
    Json(mut customer): Json<NewCustomer>,
) -> ApiResult<Customer> {
    if customer.idempotency_key.trim().is_empty() {
        customer.idempotency_key = Uuid::new_v4().to_string();
    }
    let client = state.square_client(&merchant)?;
    let created = client.create_customer(&customer).await?;
    tracing::info!(
        merchant_id = %merchant.id,
        customer_id = %created.id,
        "Square customer created"
    );
    Ok(Json(created))
}

#[derive(Debug, Deserialize)]
pub struct OrderSearchRequest {
    pub location_ids: Vec<String>,
    /// Square `SearchOrdersQuery`
    #[serde(default)]
    pub query: Option<serde_json::Value>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// POST /api/square/orders/search
pub async fn search_orders(
    State(state): State<AppState>,
    Extension(merchant): Extension<Merchant>,
    Json(req): Json<OrderSearchRequest>,
) -> ApiResult<Vec<Order>> {
    if req.location_ids.is_empty() {
        return Err(AppError::validation("location_ids must not be empty").into());
    }
    let limit = req
        .limit
        .unwrap_or(DEFAULT_ORDER_SEARCH_LIMIT)
        .clamp(1, MAX_ORDER_SEARCH_LIMIT);
    let query = req.query.unwrap_or_else(|| serde_json::json!({}));

    let client = state.square_client(&merchant)?;
    Ok(Json(client.search_orders(&req.location_ids, query, limit).await?))
}

#[derive(Debug, Deserialize)]
pub struct CatalogUpsertRequest {
    pub idempotency_key: String,
    pub objects: Vec<serde_json::Value>,
}

/// POST /api/square/catalog/batch-upsert
pub async fn batch_upsert_catalog(
    State(state): State<AppState>,
    Extension(merchant): Extension<Merchant>,
    Json(req): Json<CatalogUpsertRequest>,
) -> ApiResult<serde_json::Value> {
    if req.idempotency_key.trim().is_empty() {
        return Err(AppError::validation("idempotency_key is required").into());
    }
    if req.objects.is_empty() {
        return Err(AppError::validation("objects must not be empty").into());
    }
    let client = state.square_client(&merchant)?;
    let count = req.objects.len();
    let response = client
        .batch_upsert_catalog(&req.idempotency_key, req.objects)
        .await?;
    tracing::info!(merchant_id = %merchant.id, count, "Square catalog batch upserted");
    Ok(Json(response))
}
