//! Persistence port for the loyalty engine
//!
//! `PgLoyaltyStore` (crate::db) is the production implementation; tests use
//! the in-memory `MemoryStore`. Every method is merchant-scoped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::models::{NewPurchaseEvent, Offer, OfferDetail, PurchaseEvent, Reward};

use super::error::LoyaltyError;

pub type StoreResult<T> = Result<T, LoyaltyError>;

/// Optional redemption context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedeemRequest {
    /// Square order the reward is applied on
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
}

/// Result of an earn evaluation
#[derive(Debug, Clone)]
pub enum EarnOutcome {
    Earned(Reward),
    /// An `earned` reward is already outstanding for the tuple
    Outstanding { reward_id: i64 },
    BelowThreshold,
}

/// A persisted expiry correction
#[derive(Debug, Clone)]
pub struct ExpiryCorrection {
    pub reward: Reward,
    pub previous_expires_at: i64,
}

#[async_trait]
pub trait LoyaltyStore: Send + Sync {
    /// Active offers with their qualifying variations
    async fn active_offers(&self, merchant_id: &str) -> StoreResult<Vec<OfferDetail>>;

    async fn find_offer(&self, merchant_id: &str, offer_id: i64) -> StoreResult<Option<Offer>>;

    async fn customer_events(
        &self,
        merchant_id: &str,
        customer_id: &str,
    ) -> StoreResult<Vec<PurchaseEvent>>;

    async fn order_events(
        &self,
        merchant_id: &str,
        square_order_id: &str,
    ) -> StoreResult<Vec<PurchaseEvent>>;

    /// Append ledger entries; duplicates of (merchant, order, line item, offer)
    /// are skipped. Returns the number actually inserted.
    async fn append_events(&self, events: &[NewPurchaseEvent], now: i64) -> StoreResult<u64>;

    async fn customer_rewards(&self, merchant_id: &str, customer_id: &str)
    -> StoreResult<Vec<Reward>>;

    async fn find_reward(&self, merchant_id: &str, reward_id: i64) -> StoreResult<Option<Reward>>;

    /// The non-expired `earned` reward for (customer, offer), if any
    async fn redeemable_reward(
        &self,
        merchant_id: &str,
        customer_id: &str,
        offer_id: i64,
        now: i64,
    ) -> StoreResult<Option<Reward>>;

    /// Earn path. Serialized per (merchant, customer, offer). Under the lock a
    /// time-expired `earned` row is flipped to `expired` (and audited) before
    /// the outstanding check, so an unswept reward never blocks a new earn.
    async fn earn(
        &self,
        offer: &Offer,
        customer_id: &str,
        now: i64,
        trace_id: Option<&str>,
    ) -> StoreResult<EarnOutcome>;

    /// Locks the reward row and applies `check_redeemable` before the transition.
    async fn redeem(
        &self,
        merchant_id: &str,
        reward_id: i64,
        request: &RedeemRequest,
        now: i64,
    ) -> StoreResult<Reward>;

    /// `earned` rewards past `expires_at` → `expired`; returns the flipped rows
    async fn expire_due(&self, merchant_id: &str, now: i64) -> StoreResult<Vec<Reward>>;

    async fn merchants_with_due_rewards(&self, now: i64) -> StoreResult<Vec<String>>;

    /// Change `expires_at` of an `earned` reward, auditing old and new values
    /// in the same transaction.
    async fn correct_expiry(
        &self,
        merchant_id: &str,
        reward_id: i64,
        new_expires_at: i64,
        reason: Option<&str>,
        now: i64,
    ) -> StoreResult<ExpiryCorrection>;

    async fn audit(
        &self,
        merchant_id: &str,
        action: &str,
        detail: &serde_json::Value,
        now: i64,
    ) -> StoreResult<()>;
}
