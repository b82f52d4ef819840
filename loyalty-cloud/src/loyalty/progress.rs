//! Customer progress projection
//!
//! Progress is recomputed from the ledger on every read.

use std::sync::Arc;

use shared::models::{
    CustomerOfferProgress, OfferDetail, PurchaseEvent, Reward, RewardStatus,
};
use shared::util::now_millis;

use super::error::{LoyaltyError, require};
use super::ledger;
use super::store::LoyaltyStore;

/// Project one offer for one customer. `events` and `rewards` may contain
/// entries for other offers; they are filtered here.
pub fn project_offer(
    detail: &OfferDetail,
    events: &[PurchaseEvent],
    rewards: &[Reward],
    now: i64,
) -> CustomerOfferProgress {
    let offer = &detail.offer;
    let offer_events: Vec<PurchaseEvent> = events
        .iter()
        .filter(|e| e.offer_id == offer.id)
        .cloned()
        .collect();
    let offer_rewards: Vec<&Reward> = rewards.iter().filter(|r| r.offer_id == offer.id).collect();

    let outstanding = offer_rewards
        .iter()
        .filter(|r| r.is_redeemable_at(now))
        .min_by_key(|r| r.earned_at);

    CustomerOfferProgress {
        offer_id: offer.id,
        offer_name: offer.name.clone(),
        required_quantity: offer.required_quantity,
        reward_quantity: offer.reward_quantity,
        window_months: offer.window_months,
        current_quantity: ledger::current_quantity(&offer_events, now),
        has_earned_reward: outstanding.is_some(),
        earned_reward_id: outstanding.map(|r| r.id),
        total_lifetime_purchases: ledger::lifetime_quantity(&offer_events),
        // every reward starts out earned
        total_rewards_earned: offer_rewards.len() as i64,
        total_rewards_redeemed: offer_rewards
            .iter()
            .filter(|r| r.status == RewardStatus::Redeemed)
            .count() as i64,
    }
}

#[derive(Clone)]
pub struct ProgressProjector {
    store: Arc<dyn LoyaltyStore>,
}

impl ProgressProjector {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self { store }
    }

    /// Progress for every active offer of the merchant (zero rows included)
    pub async fn customer_offer_progress(
        &self,
        merchant_id: &str,
        customer_id: &str,
    ) -> Result<Vec<CustomerOfferProgress>, LoyaltyError> {
        require("merchant_id", merchant_id)?;
        require("customer_id", customer_id)?;

        let loaded = async {
            let offers = self.store.active_offers(merchant_id).await?;
            let events = self.store.customer_events(merchant_id, customer_id).await?;
            let rewards = self.store.customer_rewards(merchant_id, customer_id).await?;
            Ok::<_, LoyaltyError>((offers, events, rewards))
        }
        .await;

        let (offers, events, rewards) = loaded.inspect_err(|e| {
            tracing::error!(merchant_id, customer_id, error = %e, "Failed to load customer progress");
        })?;

        let now = now_millis();
        Ok(offers
            .iter()
            .map(|detail| project_offer(detail, &events, &rewards, now))
            .collect())
    }
}
