//! Subscription billing → merchant access state
//!
//! Merchants pay for the service through a Square subscription on the
//! platform's own account. Billing webhooks identify the merchant by the
//! billing customer id; the handlers live in `api::square_webhook`.

use shared::models::{AccessState, Merchant};

use crate::square::{EventKind, WebhookEvent};

/// Access state implied by a Square subscription status.
/// `None` leaves the merchant unchanged (e.g. `PENDING`).
pub fn access_state_for_subscription(status: &str) -> Option<AccessState> {
    match status {
        "ACTIVE" => Some(AccessState::Active),
        "PAUSED" => Some(AccessState::Suspended),
        "CANCELED" | "DEACTIVATED" => Some(AccessState::Cancelled),
        _ => None,
    }
}

/// Access state a billing event asks for
pub fn target_state(event: &WebhookEvent) -> Option<AccessState> {
    match event.kind() {
        EventKind::Subscription => event
            .object_str("subscription", "status")
            .and_then(access_state_for_subscription),
        EventKind::InvoicePaid => Some(AccessState::Active),
        EventKind::InvoiceFailed => Some(AccessState::Suspended),
        _ => None,
    }
}

/// Billing customer the event refers to
pub fn billing_customer_id(event: &WebhookEvent) -> Option<&str> {
    match event.kind() {
        EventKind::Subscription => event.object_str("subscription", "customer_id"),
        EventKind::InvoicePaid | EventKind::InvoiceFailed => event
            .data
            .get("invoice")?
            .get("primary_recipient")?
            .get("customer_id")?
            .as_str(),
        _ => None,
    }
}

/// Customer removed by a `customer.deleted` event
pub fn deleted_customer_id(event: &WebhookEvent) -> Option<&str> {
    event
        .object_str("customer", "id")
        .or(event.entity_id.as_deref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply { from: AccessState, to: AccessState },
    Unchanged,
    /// Platform owners are never suspended or cancelled
    OwnerProtected,
}

pub fn is_platform_owner(merchant: &Merchant, platform_owner_id: Option<&str>) -> bool {
    merchant.is_platform_owner || platform_owner_id == Some(merchant.id.as_str())
}

pub fn plan_transition(
    merchant: &Merchant,
    target: AccessState,
    platform_owner_id: Option<&str>,
) -> Transition {
    if target == merchant.access_state {
        return Transition::Unchanged;
    }
    if !target.allows_access() && is_platform_owner(merchant, platform_owner_id) {
        return Transition::OwnerProtected;
    }
    Transition::Apply {
        from: merchant.access_state,
        to: target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn merchant(id: &str, state: AccessState, owner: bool) -> Merchant {
        Merchant {
            id: id.into(),
            business_name: None,
            square_access_token_enc: None,
            billing_customer_id: Some(format!("bill_{id}")),
            access_state: state,
            is_platform_owner: owner,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn event(event_type: &str, data: serde_json::Value) -> WebhookEvent {
        WebhookEvent {
            event_id: "evt".into(),
            event_type: event_type.into(),
            merchant_id: "PLATFORM".into(),
            entity_id: None,
            data,
        }
    }

    #[test]
    fn subscription_status_mapping() {
        assert_eq!(access_state_for_subscription("ACTIVE"), Some(AccessState::Active));
        assert_eq!(access_state_for_subscription("CANCELED"), Some(AccessState::Cancelled));
        assert_eq!(access_state_for_subscription("PAUSED"), Some(AccessState::Suspended));
        assert_eq!(
            access_state_for_subscription("DEACTIVATED"),
            Some(AccessState::Cancelled)
        );
        assert_eq!(access_state_for_subscription("PENDING"), None);
    }

    #[test]
    fn invoice_events_target_and_customer() {
        let paid = event(
            "invoice.payment_made",
            json!({ "invoice": { "primary_recipient": { "customer_id": "bill_M1" } } }),
        );
        assert_eq!(target_state(&paid), Some(AccessState::Active));
        assert_eq!(billing_customer_id(&paid), Some("bill_M1"));

        let failed = event("invoice.payment_failed", json!({}));
        assert_eq!(target_state(&failed), Some(AccessState::Suspended));

        let sub = event(
            "subscription.updated",
            json!({ "subscription": { "customer_id": "bill_M2", "status": "PENDING" } }),
        );
        assert_eq!(target_state(&sub), None);
        assert_eq!(billing_customer_id(&sub), Some("bill_M2"));
    }

    #[test]
    fn platform_owner_is_never_suspended() {
        let flagged = merchant("M1", AccessState::Active, true);
        assert_eq!(
            plan_transition(&flagged, AccessState::Suspended, None),
            Transition::OwnerProtected
        );

        let configured = merchant("M2", AccessState::Active, false);
        assert_eq!(
            plan_transition(&configured, AccessState::Cancelled, Some("M2")),
            Transition::OwnerProtected
        );
        assert_eq!(
            plan_transition(&configured, AccessState::Cancelled, Some("M9")),
            Transition::Apply {
                from: AccessState::Active,
                to: AccessState::Cancelled
            }
        );
    }

    #[test]
    fn reactivation_and_no_op() {
        let suspended = merchant("M1", AccessState::Suspended, true);
        assert_eq!(
            plan_transition(&suspended, AccessState::Active, None),
            Transition::Apply {
                from: AccessState::Suspended,
                to: AccessState::Active
            }
        );
        assert_eq!(
            plan_transition(&suspended, AccessState::Suspended, None),
            Transition::Unchanged
        );
    }

    #[test]
    fn deleted_customer_falls_back_to_entity_id() {
        let mut e = event("customer.deleted", json!({ "customer": { "id": "cust_1" } }));
        assert_eq!(deleted_customer_id(&e), Some("cust_1"));
        e.data = json!({});
        e.entity_id = Some("cust_2".into());
        assert_eq!(deleted_customer_id(&e), Some("cust_2"));
    }
}
