//! Merchant & access-state models

use serde::{Deserialize, Serialize};

/// Merchant access state, driven by the billing subscription
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AccessState {
    /// Subscription paid, full access
    Active,
    /// Payment failed or subscription paused
    Suspended,
    /// Subscription canceled or deactivated
    Cancelled,
}

impl AccessState {
    /// Parse from database string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Cancelled => "cancelled",
        }
    }

    /// Does this state allow loyalty processing and API access?
    pub fn allows_access(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl TryFrom<String> for AccessState {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_db(&value).ok_or_else(|| format!("unknown access state: {value}"))
    }
}

/// Merchant record
#[derive(Debug, Clone)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Merchant {
    /// Square merchant id
    pub id: String,
    pub business_name: Option<String>,
    /// AES-256-GCM encrypted Square access token
    pub square_access_token_enc: Option<String>,
    /// Square customer id on the platform's billing account
    pub billing_customer_id: Option<String>,
    #[cfg_attr(feature = "db", sqlx(try_from = "String"))]
    pub access_state: AccessState,
    pub is_platform_owner: bool,
    pub created_at: i64,
    pub updated_at: i64,
}
