//! Square webhook handler
//!
//! POST /square/webhook: order, payment, refund, billing and customer events
//! (raw body for signature verification)

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shared::util::now_millis;

use crate::billing::{self, Transition};
use crate::db;
use crate::loyalty::WebhookOutcome;
use crate::square::webhook::verify_signature;
use crate::square::{EventKind, WebhookEvent};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-square-hmacsha256-signature";

/// Handle an incoming Square webhook.
///
/// Once an event is accepted the response is 200 even when loyalty processing
/// fails; the failure is reported in the body. Infrastructure failures release
/// the idempotency record and return 500 so Square redelivers.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // 1. Signature header
    let signature = match headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) {
        Some(s) => s,
        None => {
            tracing::warn!("Missing Square signature header");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    // 2. Verify signature over notification URL + raw body
    if let Err(e) = verify_signature(
        &body,
        signature,
        &state.webhook_signature_key,
        &state.webhook_url,
    ) {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    // 3. Normalize
    let event = match WebhookEvent::parse(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = e, "Malformed webhook payload");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.event_id,
        merchant_id = %event.merchant_id,
        "Received Square webhook"
    );

    // 4. Idempotency: first insert wins
    match db::webhook_events::record(
        &state.pool,
        &event.event_id,
        &event.event_type,
        Some(&event.merchant_id),
        now_millis(),
    )
    .await
    {
        Ok(false) => {
            tracing::info!(event_id = %event.event_id, "Duplicate webhook event, skipping");
            return StatusCode::OK.into_response();
        }
        Err(e) => {
            tracing::error!(%e, "DB error recording webhook event");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Ok(true) => {}
    }

    // 5. Dispatch
    let response = match event.kind() {
        EventKind::Order | EventKind::Payment | EventKind::Refund => {
            handle_loyalty_event(&state, &event).await
        }
        EventKind::Subscription | EventKind::InvoicePaid | EventKind::InvoiceFailed => {
            handle_billing_event(&state, &event).await.into_response()
        }
        EventKind::CustomerDeleted => handle_customer_deleted(&state, &event).await.into_response(),
        EventKind::Other => {
            tracing::debug!(event_type = %event.event_type, "Unhandled webhook event type");
            StatusCode::OK.into_response()
        }
    };

    if response.status().is_server_error() {
        if let Err(e) = db::webhook_events::release(&state.pool, &event.event_id).await {
            tracing::error!(%e, event_id = %event.event_id, "Failed to release webhook event");
        }
    }
    response
}

/// order.* / payment.* / refund.* → loyalty processor
async fn handle_loyalty_event(state: &AppState, event: &WebhookEvent) -> Response {
    let merchant = match db::merchants::find_by_id(&state.pool, &event.merchant_id).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            tracing::warn!(merchant_id = %event.merchant_id, "Webhook for unknown merchant");
            return StatusCode::OK.into_response();
        }
        Err(e) => {
            tracing::error!(%e, "DB error finding merchant");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut outcome = WebhookOutcome::new(event);

    if !merchant.access_state.allows_access() {
        tracing::info!(
            merchant_id = %merchant.id,
            access_state = merchant.access_state.as_db(),
            "Merchant access suspended, loyalty processing skipped"
        );
        outcome.loyalty_error = Some(format!("merchant access {}", merchant.access_state.as_db()));
        return Json(outcome).into_response();
    }

    let client = match state.square_client(&merchant) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(merchant_id = %merchant.id, error = %e, "Cannot build Square client");
            outcome.loyalty_error = Some(e.to_string());
            return Json(outcome).into_response();
        }
    };

    Json(state.processor.process(event, &client).await).into_response()
}

/// subscription.* / invoice.* → merchant access state
async fn handle_billing_event(state: &AppState, event: &WebhookEvent) -> StatusCode {
    let Some(target) = billing::target_state(event) else {
        tracing::debug!(event_type = %event.event_type, "Billing event carries no access change");
        return StatusCode::OK;
    };

    let Some(customer_id) = billing::billing_customer_id(event) else {
        tracing::warn!(event_type = %event.event_type, "Billing event missing customer id");
        return StatusCode::OK;
    };

    let merchant = match db::merchants::find_by_billing_customer(&state.pool, customer_id).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            tracing::warn!(customer_id, "No merchant for billing customer");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(%e, "DB error finding merchant by billing customer");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let now = now_millis();
    match billing::plan_transition(&merchant, target, state.platform_owner_merchant_id.as_deref()) {
        Transition::Unchanged => StatusCode::OK,
        Transition::OwnerProtected => {
            tracing::warn!(
                merchant_id = %merchant.id,
                target = target.as_db(),
                event_type = %event.event_type,
                "Billing event ignored for platform owner"
            );
            let detail = json!({
                "event_id": event.event_id,
                "event_type": event.event_type,
                "requested": target.as_db(),
            });
            let _ = db::audit::log(
                &state.pool,
                &merchant.id,
                "access_change_blocked",
                Some(&detail),
                None,
                now,
            )
            .await;
            StatusCode::OK
        }
        Transition::Apply { from, to } => {
            if let Err(e) = db::merchants::update_access_state(&state.pool, &merchant.id, to, now).await {
                tracing::error!(%e, "Failed to update merchant access state");
                return StatusCode::INTERNAL_SERVER_ERROR;
            }

            tracing::info!(
                merchant_id = %merchant.id,
                from = from.as_db(),
                to = to.as_db(),
                event_type = %event.event_type,
                "Merchant access state changed"
            );

            let detail = json!({
                "event_id": event.event_id,
                "event_type": event.event_type,
                "from": from.as_db(),
                "to": to.as_db(),
            });
            let _ = db::audit::log(
                &state.pool,
                &merchant.id,
                "access_state_changed",
                Some(&detail),
                None,
                now,
            )
            .await;
            StatusCode::OK
        }
    }
}

/// customer.deleted → drop cached attributions; the ledger keeps its history
async fn handle_customer_deleted(state: &AppState, event: &WebhookEvent) -> StatusCode {
    let Some(customer_id) = billing::deleted_customer_id(event) else {
        return StatusCode::OK;
    };

    let dropped = state
        .processor
        .cache()
        .forget_customer(&event.merchant_id, customer_id);

    tracing::info!(
        merchant_id = %event.merchant_id,
        customer_id,
        cache_entries = dropped,
        "Customer deleted"
    );

    let detail = json!({
        "event_id": event.event_id,
        "customer_id": customer_id,
        "cache_entries_dropped": dropped,
    });
    let _ = db::audit::log(
        &state.pool,
        &event.merchant_id,
        "customer_deleted",
        Some(&detail),
        None,
        now_millis(),
    )
    .await;

    StatusCode::OK
}
