//! Square webhook envelope: signature verification and normalization

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

/// Verify `x-square-hmacsha256-signature`: base64(HMAC-SHA256(key, notification_url + body))
pub fn verify_signature(
    payload: &[u8],
    signature_b64: &str,
    signature_key: &str,
    notification_url: &str,
) -> Result<(), &'static str> {
    let expected = base64::engine::general_purpose::STANDARD
        .decode(signature_b64.trim())
        .map_err(|_| "Invalid signature encoding")?;

    let mut mac =
        Hmac::<Sha256>::new_from_slice(signature_key.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(notification_url.as_bytes());
    mac.update(payload);

    mac.verify_slice(&expected)
        .map_err(|_| "Webhook signature mismatch")
}

/// Coarse routing class of an event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Order,
    Payment,
    Refund,
    Subscription,
    InvoicePaid,
    InvoiceFailed,
    CustomerDeleted,
    Other,
}

impl EventKind {
    pub fn classify(event_type: &str) -> Self {
        match event_type {
            "order.created" | "order.updated" | "order.fulfillment.updated" => Self::Order,
            "payment.created" | "payment.updated" => Self::Payment,
            "refund.created" | "refund.updated" => Self::Refund,
            "subscription.created" | "subscription.updated" => Self::Subscription,
            "invoice.payment_made" => Self::InvoicePaid,
            "invoice.payment_failed" => Self::InvoiceFailed,
            "customer.deleted" => Self::CustomerDeleted,
            _ => Self::Other,
        }
    }
}

/// Normalized inbound event
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    pub event_id: String,
    pub event_type: String,
    pub merchant_id: String,
    /// `data.id` (order, payment, refund, subscription... id)
    pub entity_id: Option<String>,
    /// `data.object`
    pub data: serde_json::Value,
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> Result<Self, &'static str> {
        let raw: serde_json::Value =
            serde_json::from_slice(body).map_err(|_| "Invalid webhook JSON")?;

        let event_id = raw["event_id"]
            .as_str()
            .ok_or("Webhook event missing event_id")?
            .to_string();
        let event_type = raw["type"]
            .as_str()
            .ok_or("Webhook event missing type")?
            .to_string();
        let merchant_id = raw["merchant_id"]
            .as_str()
            .ok_or("Webhook event missing merchant_id")?
            .to_string();

        Ok(Self {
            event_id,
            event_type,
            merchant_id,
            entity_id: raw["data"]["id"].as_str().map(String::from),
            data: raw["data"]["object"].clone(),
        })
    }

    pub fn kind(&self) -> EventKind {
        EventKind::classify(&self.event_type)
    }

    /// String field of a nested object under `data.object` (e.g. `payment.order_id`)
    pub fn object_str(&self, object: &str, field: &str) -> Option<&str> {
        self.data.get(object)?.get(field)?.as_str()
    }

    /// Order id carried by an order-class event
    pub fn order_id(&self) -> Option<&str> {
        ["order_created", "order_updated", "order_fulfillment_updated"]
            .iter()
            .find_map(|key| self.object_str(key, "order_id"))
            .or(self.entity_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(key: &str, url: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).unwrap();
        mac.update(url.as_bytes());
        mac.update(body);
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn signature_roundtrip() {
        let body = br#"{"event_id":"e1"}"#;
        let url = "https://loyalty.example.com/square/webhook";
        let sig = sign("sig-key", url, body);
        assert!(verify_signature(body, &sig, "sig-key", url).is_ok());
        assert!(verify_signature(body, &sig, "other-key", url).is_err());
        assert!(verify_signature(body, &sig, "sig-key", "https://elsewhere/hook").is_err());
        assert!(verify_signature(b"tampered", &sig, "sig-key", url).is_err());
        assert!(verify_signature(body, "%%%", "sig-key", url).is_err());
    }

    #[test]
    fn parse_order_event() {
        let body = serde_json::json!({
            "merchant_id": "M1",
            "type": "order.updated",
            "event_id": "evt_1",
            "data": {
                "type": "order_updated",
                "id": "ord_9",
                "object": { "order_updated": { "order_id": "ord_9", "state": "COMPLETED" } }
            }
        });
        let event = WebhookEvent::parse(body.to_string().as_bytes()).unwrap();
        assert_eq!(event.kind(), EventKind::Order);
        assert_eq!(event.merchant_id, "M1");
        assert_eq!(event.order_id(), Some("ord_9"));
        assert_eq!(event.object_str("order_updated", "state"), Some("COMPLETED"));
    }

    #[test]
    fn parse_rejects_incomplete_envelope() {
        assert!(WebhookEvent::parse(b"not json").is_err());
        assert!(WebhookEvent::parse(br#"{"type":"order.updated","merchant_id":"M1"}"#).is_err());
        assert!(WebhookEvent::parse(br#"{"event_id":"e","type":"order.updated"}"#).is_err());
    }

    #[test]
    fn classify_event_types() {
        assert_eq!(EventKind::classify("payment.updated"), EventKind::Payment);
        assert_eq!(EventKind::classify("refund.created"), EventKind::Refund);
        assert_eq!(EventKind::classify("invoice.payment_failed"), EventKind::InvoiceFailed);
        assert_eq!(EventKind::classify("inventory.count.updated"), EventKind::Other);
    }
}
