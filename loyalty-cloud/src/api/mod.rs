//! API routes for loyalty-cloud

pub mod health;
pub mod loyalty;
pub mod square_proxy;
pub mod square_webhook;

use axum::http::{HeaderName, HeaderValue};
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::merchant_auth::merchant_auth_middleware;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Merchant loyalty and Square pass-through API (JWT authenticated)
    let merchant = Router::new()
        .route("/api/loyalty/offers", get(loyalty::list_offers))
        .route(
            "/api/loyalty/customers/{customer_id}/progress",
            get(loyalty::customer_progress),
        )
        .route(
            "/api/loyalty/customers/{customer_id}/offers/{offer_id}/redeemable",
            get(loyalty::redeemable_reward),
        )
        .route(
            "/api/loyalty/customers/{customer_id}/stats",
            get(loyalty::customer_stats),
        )
        .route(
            "/api/loyalty/rewards/{reward_id}/redeem",
            post(loyalty::redeem_reward),
        )
        .route(
            "/api/loyalty/rewards/{reward_id}/expiry",
            post(loyalty::correct_expiry),
        )
        .route("/api/loyalty/rewards/expire", post(loyalty::expire_rewards))
        .route("/api/loyalty/audit-log", get(loyalty::audit_log))
        .route("/api/square/loyalty-program", get(square_proxy::loyalty_program))
        .route("/api/square/customers", post(square_proxy::create_customer))
        .route(
            "/api/square/customers/{customer_id}",
            get(square_proxy::get_customer),
        )
        .route("/api/square/orders/search", post(square_proxy::search_orders))
        .route(
            "/api/square/catalog/batch-upsert",
            post(square_proxy::batch_upsert_catalog),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            merchant_auth_middleware,
        ));

    // Square webhook (signature-verified, raw body)
    let webhook = Router::new().route("/square/webhook", post(square_webhook::handle_webhook));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(webhook)
        .merge(merchant)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(REQUEST_ID_HEADER),
            XRequestId,
        ))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use http::{Request, StatusCode};
    use sqlx::PgPool;
    use tower::ServiceExt;

    use super::*;
    use crate::config::SquareConfig;
    use crate::crypto::MasterKey;
    use crate::loyalty::memory::MemoryStore;
    use crate::loyalty::{
        LoyaltyStore, OrderCache, ProgressProjector, RewardLifecycle, WebhookProcessor,
    };

    /// State over an in-memory store. The pool is lazy and never connects,
    /// so only paths that stop before touching Postgres can be exercised.
    pub(crate) fn test_state() -> AppState {
        let store: Arc<dyn LoyaltyStore> = Arc::new(MemoryStore::new());
        let pool = PgPool::connect_lazy("postgres://loyalty@localhost/unused")
            .expect("lazy pool");
        AppState {
            pool,
            progress: ProgressProjector::new(store.clone()),
            rewards: RewardLifecycle::new(store.clone()),
            processor: WebhookProcessor::new(
                store.clone(),
                OrderCache::new(std::time::Duration::from_secs(60)),
            ),
            store,
            master_key: Arc::new(MasterKey::generate()),
            square: SquareConfig::default(),
            webhook_signature_key: "sig-key".into(),
            webhook_url: "https://example.test/square/webhook".into(),
            jwt_secret: "jwt-secret".into(),
            platform_owner_merchant_id: None,
        }
    }

    #[tokio::test]
    async fn health_reports_service_and_request_id() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn loyalty_api_requires_bearer_token() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::get("/api/loyalty/offers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
