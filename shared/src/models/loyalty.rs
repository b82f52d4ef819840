//! Loyalty Offer, Purchase Ledger & Reward Models

use serde::{Deserialize, Serialize};

/// Reward lifecycle status
///
/// `Earned` is the only initial state; the other three are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RewardStatus {
    Earned,
    Redeemed,
    Expired,
    Revoked,
}

impl RewardStatus {
    /// Parse from database string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "earned" => Some(Self::Earned),
            "redeemed" => Some(Self::Redeemed),
            "expired" => Some(Self::Expired),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Earned => "earned",
            Self::Redeemed => "redeemed",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Earned)
    }
}

impl TryFrom<String> for RewardStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_db(&value).ok_or_else(|| format!("unknown reward status: {value}"))
    }
}

impl std::fmt::Display for RewardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db())
    }
}

/// Kind of purchase ledger entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseKind {
    /// Qualifying sale (positive quantity)
    Purchase,
    /// Refund of a recorded sale (negative quantity)
    Refund,
    /// Remainder re-appended when an earn consumed more than the threshold
    Carryover,
}

impl PurchaseKind {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(Self::Purchase),
            "refund" => Some(Self::Refund),
            "carryover" => Some(Self::Carryover),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Refund => "refund",
            Self::Carryover => "carryover",
        }
    }

    /// Whether the entry counts toward lifetime purchase totals
    pub fn counts_toward_lifetime(&self) -> bool {
        !matches!(self, Self::Carryover)
    }
}

impl TryFrom<String> for PurchaseKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_db(&value).ok_or_else(|| format!("unknown purchase kind: {value}"))
    }
}

/// Loyalty offer (buy N within a window, get M)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Offer {
    pub id: i64,
    pub merchant_id: String,
    pub name: String,
    pub required_quantity: i32,
    pub reward_quantity: i32,
    /// Rolling window length in calendar months
    pub window_months: i32,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Offer with its qualifying catalog variations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferDetail {
    #[serde(flatten)]
    pub offer: Offer,
    pub variation_ids: Vec<String>,
}

/// Purchase ledger entry (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct PurchaseEvent {
    pub id: i64,
    pub merchant_id: String,
    pub customer_id: String,
    pub offer_id: i64,
    pub variation_id: String,
    pub square_order_id: String,
    /// Line item uid (sale) or return line item uid (refund)
    pub line_item_uid: String,
    #[cfg_attr(feature = "db", sqlx(try_from = "String"))]
    pub kind: PurchaseKind,
    pub quantity: i32,
    pub purchased_at: i64,
    pub window_start: i64,
    pub window_end: i64,
    /// Reward that consumed this entry
    pub reward_id: Option<i64>,
    pub trace_id: Option<String>,
    pub recorded_at: i64,
}

/// New ledger entry (insert payload)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewPurchaseEvent {
    pub merchant_id: String,
    pub customer_id: String,
    pub offer_id: i64,
    pub variation_id: String,
    pub square_order_id: String,
    pub line_item_uid: String,
    pub kind: PurchaseKind,
    pub quantity: i32,
    pub purchased_at: i64,
    pub window_start: i64,
    pub window_end: i64,
    pub trace_id: Option<String>,
}

/// Reward instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Reward {
    pub id: i64,
    pub merchant_id: String,
    pub customer_id: String,
    pub offer_id: i64,
    #[cfg_attr(feature = "db", sqlx(try_from = "String"))]
    pub status: RewardStatus,
    /// Ledger quantity consumed when the reward was earned
    pub progress_quantity: i32,
    /// Purchase window the reward was earned in (audit only)
    pub window_start: i64,
    pub window_end: i64,
    pub earned_at: i64,
    pub redeemed_at: Option<i64>,
    pub expires_at: i64,
    /// Square order the reward was redeemed on
    pub square_order_id: Option<String>,
    pub trace_id: Option<String>,
    pub updated_at: i64,
}

impl Reward {
    /// Earned and not yet past its expiry
    pub fn is_redeemable_at(&self, now: i64) -> bool {
        self.status == RewardStatus::Earned && self.expires_at > now
    }
}

/// Per-offer progress for one customer (dashboard view)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerOfferProgress {
    pub offer_id: i64,
    pub offer_name: String,
    pub required_quantity: i32,
    pub reward_quantity: i32,
    pub window_months: i32,
    pub current_quantity: i64,
    pub has_earned_reward: bool,
    pub earned_reward_id: Option<i64>,
    pub total_lifetime_purchases: i64,
    pub total_rewards_earned: i64,
    pub total_rewards_redeemed: i64,
}

/// Reward counts by status for one customer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardStats {
    pub earned: i64,
    pub redeemed: i64,
    pub expired: i64,
    pub revoked: i64,
}

impl RewardStats {
    pub fn total(&self) -> i64 {
        self.earned + self.redeemed + self.expired + self.revoked
    }
}
