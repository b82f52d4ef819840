//! Customer identification chain
//!
//! Strategies run in fixed priority order until one yields a customer id.
//! A failing strategy is logged and skipped; identification itself never errors.

use async_trait::async_trait;
use serde::{Serialize, Serializer};

use super::store::LoyaltyStore;
use crate::square::types::Order;
use crate::square::{SquareClient, SquareError};

/// Square lookups the processor needs
#[async_trait]
pub trait OrderLookup: Send + Sync {
    async fn fetch_order(&self, order_id: &str) -> Result<Option<Order>, SquareError>;

    /// Customer behind the loyalty account that accrued points on the order
    async fn loyalty_customer(&self, order_id: &str) -> Result<Option<String>, SquareError>;

    async fn customer_by_phone(&self, phone: &str) -> Result<Option<String>, SquareError>;

    async fn customer_by_email(&self, email: &str) -> Result<Option<String>, SquareError>;
}

#[async_trait]
impl OrderLookup for SquareClient {
    async fn fetch_order(&self, order_id: &str) -> Result<Option<Order>, SquareError> {
        self.get_order(order_id).await
    }

    async fn loyalty_customer(&self, order_id: &str) -> Result<Option<String>, SquareError> {
        let events = self.search_loyalty_events_for_order(order_id).await?;
        let Some(account_id) = events.iter().find_map(|e| e.loyalty_account_id.as_deref()) else {
            return Ok(None);
        };
        Ok(self
            .get_loyalty_account(account_id)
            .await?
            .and_then(|a| a.customer_id))
    }

    async fn customer_by_phone(&self, phone: &str) -> Result<Option<String>, SquareError> {
        let found = self
            .search_customers(serde_json::json!({ "phone_number": { "exact": phone } }))
            .await?;
        Ok(found.into_iter().next().map(|c| c.id))
    }

    async fn customer_by_email(&self, email: &str) -> Result<Option<String>, SquareError> {
        let found = self
            .search_customers(serde_json::json!({ "email_address": { "exact": email } }))
            .await?;
        Ok(found.into_iter().next().map(|c| c.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    OrderCustomer,
    TenderCustomer,
    LoyaltyAccount,
    PhoneMatch,
    EmailMatch,
    LedgerFallback,
}

impl Strategy {
    pub const CHAIN: [Strategy; 6] = [
        Strategy::OrderCustomer,
        Strategy::TenderCustomer,
        Strategy::LoyaltyAccount,
        Strategy::PhoneMatch,
        Strategy::EmailMatch,
        Strategy::LedgerFallback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::OrderCustomer => "order_customer",
            Strategy::TenderCustomer => "tender_customer",
            Strategy::LoyaltyAccount => "loyalty_account",
            Strategy::PhoneMatch => "phone_match",
            Strategy::EmailMatch => "email_match",
            Strategy::LedgerFallback => "ledger_fallback",
        }
    }
}

/// Where the attributed customer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustomerSource {
    Cached,
    Identified(Strategy),
    #[default]
    Unresolved,
}

impl CustomerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerSource::Cached => "cached",
            CustomerSource::Identified(strategy) => strategy.as_str(),
            CustomerSource::Unresolved => "unresolved",
        }
    }
}

impl Serialize for CustomerSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub customer_id: Option<String>,
    pub source: CustomerSource,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

/// Keep a leading `+` and digits only
fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 7 {
        return None;
    }
    Some(if trimmed.starts_with('+') {
        format!("+{digits}")
    } else {
        digits
    })
}

async fn run_strategy(
    strategy: Strategy,
    merchant_id: &str,
    order: &Order,
    lookup: &dyn OrderLookup,
    store: &dyn LoyaltyStore,
) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
    let recipient = || order.fulfillments.iter().find_map(|f| f.recipient());

    let found = match strategy {
        Strategy::OrderCustomer => non_empty(&order.customer_id),
        Strategy::TenderCustomer => order.tenders.iter().find_map(|t| non_empty(&t.customer_id)),
        Strategy::LoyaltyAccount => lookup.loyalty_customer(&order.id).await?,
        Strategy::PhoneMatch => {
            let phone = recipient()
                .and_then(|r| r.phone_number.as_deref())
                .and_then(normalize_phone);
            match phone {
                Some(phone) => lookup.customer_by_phone(&phone).await?,
                None => None,
            }
        }
        Strategy::EmailMatch => {
            let email = recipient()
                .and_then(|r| r.email_address.as_deref())
                .map(|e| e.trim().to_lowercase())
                .filter(|e| e.contains('@'));
            match email {
                Some(email) => lookup.customer_by_email(&email).await?,
                None => None,
            }
        }
        Strategy::LedgerFallback => store
            .order_events(merchant_id, &order.id)
            .await?
            .into_iter()
            .map(|e| e.customer_id)
            .next(),
    };
    Ok(found)
}

/// Run the chain for one order
pub async fn identify_customer(
    merchant_id: &str,
    order: &Order,
    lookup: &dyn OrderLookup,
    store: &dyn LoyaltyStore,
) -> Identification {
    for strategy in Strategy::CHAIN {
        match run_strategy(strategy, merchant_id, order, lookup, store).await {
            Ok(Some(customer_id)) => {
                tracing::debug!(
                    merchant_id,
                    order_id = %order.id,
                    strategy = strategy.as_str(),
                    "Customer identified"
                );
                return Identification {
                    customer_id: Some(customer_id),
                    source: CustomerSource::Identified(strategy),
                };
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    merchant_id,
                    order_id = %order.id,
                    strategy = strategy.as_str(),
                    error = %e,
                    "Identification strategy failed"
                );
            }
        }
    }

    Identification {
        customer_id: None,
        source: CustomerSource::Unresolved,
    }
}
