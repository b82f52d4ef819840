//! Merchant loyalty endpoints: progress, rewards, offers, audit trail
//!
//! The merchant comes from the JWT, never from the path or body.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use shared::error::AppError;
use shared::models::{CustomerOfferProgress, OfferDetail, Reward, RewardStats};

use crate::auth::MerchantIdentity;
use crate::db;
use crate::error::ServiceResult;
use crate::loyalty::RedeemRequest;
use crate::state::AppState;

pub type ApiResult<T> = ServiceResult<Json<T>>;

/// GET /api/loyalty/offers
pub async fn list_offers(
    State(state): State<AppState>,
    Extension(identity): Extension<MerchantIdentity>,
) -> ApiResult<Vec<OfferDetail>> {
    Ok(Json(state.store.active_offers(&identity.merchant_id).await?))
}

/// GET /api/loyalty/customers/{customer_id}/progress
pub async fn customer_progress(
    State(state): State<AppState>,
    Extension(identity): Extension<MerchantIdentity>,
    Path(customer_id): Path<String>,
) -> ApiResult<Vec<CustomerOfferProgress>> {
    let progress = state
        .progress
        .customer_offer_progress(&identity.merchant_id, &customer_id)
        .await?;
    Ok(Json(progress))
}

/// GET /api/loyalty/customers/{customer_id}/offers/{offer_id}/redeemable
pub async fn redeemable_reward(
    State(state): State<AppState>,
    Extension(identity): Extension<MerchantIdentity>,
    Path((customer_id, offer_id)): Path<(String, i64)>,
) -> ApiResult<Option<Reward>> {
    let reward = state
        .rewards
        .redeemable(&identity.merchant_id, &customer_id, offer_id)
        .await?;
    Ok(Json(reward))
}

#[derive(Serialize)]
pub struct CustomerStats {
    #[serde(flatten)]
    pub by_status: RewardStats,
    /// Earned and not yet expired
    pub redeemable: i64,
}

/// GET /api/loyalty/customers/{customer_id}/stats
pub async fn customer_stats(
    State(state): State<AppState>,
    Extension(identity): Extension<MerchantIdentity>,
    Path(customer_id): Path<String>,
) -> ApiResult<CustomerStats> {
    let by_status = state.rewards.stats(&identity.merchant_id, &customer_id).await?;
    let redeemable = state
        .rewards
        .count_earned(&identity.merchant_id, &customer_id)
        .await?;
    Ok(Json(CustomerStats {
        by_status,
        redeemable,
    }))
}

/// POST /api/loyalty/rewards/{reward_id}/redeem
///
/// Body is optional: `{ "order_id": "...", "trace_id": "..." }`
pub async fn redeem_reward(
    State(state): State<AppState>,
    Extension(identity): Extension<MerchantIdentity>,
    Path(reward_id): Path<i64>,
    body: Bytes,
) -> ApiResult<Reward> {
    let request: RedeemRequest = if body.is_empty() {
        RedeemRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::validation(format!("Invalid redeem request: {e}")))?
    };

    let reward = state
        .rewards
        .redeem(&identity.merchant_id, reward_id, &request)
        .await?;
    Ok(Json(reward))
}

#[derive(Serialize)]
pub struct ExpireResponse {
    pub expired_reward_ids: Vec<i64>,
}

/// POST /api/loyalty/rewards/expire
pub async fn expire_rewards(
    State(state): State<AppState>,
    Extension(identity): Extension<MerchantIdentity>,
) -> ApiResult<ExpireResponse> {
    let expired_reward_ids = state.rewards.expire(&identity.merchant_id).await?;
    Ok(Json(ExpireResponse { expired_reward_ids }))
}

#[derive(Deserialize)]
pub struct ExpiryCorrectionRequest {
    pub expires_at: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /api/loyalty/rewards/{reward_id}/expiry
pub async fn correct_expiry(
    State(state): State<AppState>,
    Extension(identity): Extension<MerchantIdentity>,
    Path(reward_id): Path<i64>,
    Json(req): Json<ExpiryCorrectionRequest>,
) -> ApiResult<Reward> {
    let reward = state
        .rewards
        .correct_expiry(
            &identity.merchant_id,
            reward_id,
            req.expires_at,
            req.reason.as_deref(),
        )
        .await?;
    Ok(Json(reward))
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub page: Option<i32>,
    pub per_page: Option<i32>,
}

/// GET /api/loyalty/audit-log
pub async fn audit_log(
    State(state): State<AppState>,
    Extension(identity): Extension<MerchantIdentity>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Vec<db::audit::AuditEntry>> {
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let entries = db::audit::query(&state.pool, &identity.merchant_id, per_page, offset).await?;
    Ok(Json(entries))
}
