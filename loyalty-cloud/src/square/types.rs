//! Square API object shapes (subset used by the loyalty engine)
//!
//! Unknown fields are ignored; everything not required for loyalty
//! attribution is optional so partial payloads still decode.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub line_items: Vec<OrderLineItem>,
    #[serde(default)]
    pub tenders: Vec<Tender>,
    #[serde(default)]
    pub fulfillments: Vec<Fulfillment>,
    #[serde(default)]
    pub returns: Vec<OrderReturn>,
    #[serde(default)]
    pub discounts: Vec<OrderDiscount>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub closed_at: Option<String>,
}

impl Order {
    pub fn is_completed(&self) -> bool {
        self.state.as_deref() == Some("COMPLETED")
    }

    /// Best timestamp for when the sale happened
    pub fn completed_at(&self) -> Option<&str> {
        self.closed_at
            .as_deref()
            .or(self.updated_at.as_deref())
            .or(self.created_at.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderLineItem {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Decimal string ("2", "1.5")
    pub quantity: String,
    #[serde(default)]
    pub catalog_object_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tender {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub tender_type: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fulfillment {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default, rename = "type")]
    pub fulfillment_type: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub pickup_details: Option<FulfillmentDetails>,
    #[serde(default)]
    pub delivery_details: Option<FulfillmentDetails>,
    #[serde(default)]
    pub shipment_details: Option<FulfillmentDetails>,
}

impl Fulfillment {
    pub fn recipient(&self) -> Option<&Recipient> {
        [
            &self.pickup_details,
            &self.delivery_details,
            &self.shipment_details,
        ]
        .into_iter()
        .flatten()
        .find_map(|d| d.recipient.as_ref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FulfillmentDetails {
    #[serde(default)]
    pub recipient: Option<Recipient>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderReturn {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub source_order_id: Option<String>,
    #[serde(default)]
    pub return_line_items: Vec<ReturnLineItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReturnLineItem {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub source_line_item_uid: Option<String>,
    pub quantity: String,
    #[serde(default)]
    pub catalog_object_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderDiscount {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub catalog_object_id: Option<String>,
    #[serde(default)]
    pub reward_ids: Vec<String>,
    #[serde(default)]
    pub metadata: Option<std::collections::HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Body for `POST /customers`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    #[serde(default)]
    pub idempotency_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoyaltyProgram {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reward_tiers: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoyaltyEvent {
    pub id: String,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub loyalty_account_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    pub id: String,
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub balance: Option<i64>,
}

// ── Response envelopes ──

#[derive(Debug, Deserialize)]
pub(crate) struct OrderResponse {
    pub order: Order,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchOrdersResponse {
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CustomerResponse {
    pub customer: Customer,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchCustomersResponse {
    #[serde(default)]
    pub customers: Vec<Customer>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoyaltyProgramResponse {
    pub program: LoyaltyProgram,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchLoyaltyEventsResponse {
    #[serde(default)]
    pub events: Vec<LoyaltyEvent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoyaltyAccountResponse {
    pub loyalty_account: LoyaltyAccount,
}

/// Parse a Square decimal quantity string into whole units (fractional part dropped)
pub fn parse_quantity(raw: &str) -> Option<i32> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() || value < 1.0 {
        return None;
    }
    Some(value.floor().min(i32::MAX as f64) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_decodes_with_missing_fields() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "id": "ord_1",
            "state": "COMPLETED",
            "line_items": [{ "uid": "li_1", "quantity": "2", "catalog_object_id": "var_a" }],
            "closed_at": "2026-03-01T10:00:00Z",
            "net_amounts": { "total_money": { "amount": 500, "currency": "USD" } }
        }))
        .unwrap();
        assert!(order.is_completed());
        assert_eq!(order.line_items.len(), 1);
        assert!(order.tenders.is_empty());
        assert_eq!(order.completed_at(), Some("2026-03-01T10:00:00Z"));
    }

    #[test]
    fn fulfillment_recipient_from_any_details() {
        let f: Fulfillment = serde_json::from_value(serde_json::json!({
            "type": "DELIVERY",
            "delivery_details": { "recipient": { "phone_number": "+15550100" } }
        }))
        .unwrap();
        assert_eq!(
            f.recipient().and_then(|r| r.phone_number.as_deref()),
            Some("+15550100")
        );
    }

    #[test]
    fn quantity_parsing() {
        assert_eq!(parse_quantity("2"), Some(2));
        assert_eq!(parse_quantity("3.75"), Some(3));
        assert_eq!(parse_quantity("0.5"), None);
        assert_eq!(parse_quantity("0"), None);
        assert_eq!(parse_quantity("-1"), None);
        assert_eq!(parse_quantity("abc"), None);
    }
}
