//! In-memory `LoyaltyStore` for tests
//!
//! A single async mutex stands in for the Postgres row and advisory locks,
//! so concurrent callers serialize the same way.

use async_trait::async_trait;
use shared::models::{
    NewPurchaseEvent, Offer, OfferDetail, PurchaseEvent, Reward, RewardStatus,
};
use tokio::sync::Mutex;

use super::error::LoyaltyError;
use super::ledger;
use super::rewards::{check_correctable, check_redeemable, stale_expiry_detail};
use super::store::{EarnOutcome, ExpiryCorrection, LoyaltyStore, RedeemRequest, StoreResult};

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub merchant_id: String,
    pub action: String,
    pub detail: serde_json::Value,
}

#[derive(Default)]
struct Inner {
    offers: Vec<OfferDetail>,
    events: Vec<PurchaseEvent>,
    rewards: Vec<Reward>,
    audits: Vec<AuditRecord>,
    next_offer_id: i64,
    next_event_id: i64,
    next_reward_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_offer(
        &self,
        merchant_id: &str,
        name: &str,
        required_quantity: i32,
        window_months: i32,
        variation_ids: &[&str],
    ) -> Offer {
        let mut inner = self.inner.lock().await;
        inner.next_offer_id += 1;
        let offer = Offer {
            id: inner.next_offer_id,
            merchant_id: merchant_id.to_string(),
            name: name.to_string(),
            required_quantity,
            reward_quantity: 1,
            window_months,
            is_active: true,
            created_at: 0,
            updated_at: 0,
        };
        inner.offers.push(OfferDetail {
            offer: offer.clone(),
            variation_ids: variation_ids.iter().map(|v| v.to_string()).collect(),
        });
        offer
    }

    pub async fn deactivate_offer(&self, offer_id: i64) {
        let mut inner = self.inner.lock().await;
        if let Some(o) = inner.offers.iter_mut().find(|o| o.offer.id == offer_id) {
            o.offer.is_active = false;
        }
    }

    /// Seed a reward in any state
    pub async fn insert_reward(&self, mut reward: Reward) -> i64 {
        let mut inner = self.inner.lock().await;
        inner.next_reward_id += 1;
        reward.id = inner.next_reward_id;
        inner.rewards.push(reward);
        inner.next_reward_id
    }

    pub async fn events(&self) -> Vec<PurchaseEvent> {
        self.inner.lock().await.events.clone()
    }

    pub async fn rewards(&self) -> Vec<Reward> {
        self.inner.lock().await.rewards.clone()
    }

    pub async fn audits(&self) -> Vec<AuditRecord> {
        self.inner.lock().await.audits.clone()
    }
}

impl Inner {
    fn push_event(&mut self, event: &NewPurchaseEvent, now: i64) -> bool {
        let duplicate = self.events.iter().any(|e| {
            e.merchant_id == event.merchant_id
                && e.square_order_id == event.square_order_id
                && e.line_item_uid == event.line_item_uid
                && e.offer_id == event.offer_id
        });
        if duplicate {
            return false;
        }
        self.next_event_id += 1;
        self.events.push(PurchaseEvent {
            id: self.next_event_id,
            merchant_id: event.merchant_id.clone(),
            customer_id: event.customer_id.clone(),
            offer_id: event.offer_id,
            variation_id: event.variation_id.clone(),
            square_order_id: event.square_order_id.clone(),
            line_item_uid: event.line_item_uid.clone(),
            kind: event.kind,
            quantity: event.quantity,
            purchased_at: event.purchased_at,
            window_start: event.window_start,
            window_end: event.window_end,
            reward_id: None,
            trace_id: event.trace_id.clone(),
            recorded_at: now,
        });
        true
    }

    fn reward_mut(&mut self, merchant_id: &str, reward_id: i64) -> Option<&mut Reward> {
        self.rewards
            .iter_mut()
            .find(|r| r.merchant_id == merchant_id && r.id == reward_id)
    }
}

#[async_trait]
impl LoyaltyStore for MemoryStore {
    async fn active_offers(&self, merchant_id: &str) -> StoreResult<Vec<OfferDetail>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .offers
            .iter()
            .filter(|o| o.offer.merchant_id == merchant_id && o.offer.is_active)
            .cloned()
            .collect())
    }

    async fn find_offer(&self, merchant_id: &str, offer_id: i64) -> StoreResult<Option<Offer>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .offers
            .iter()
            .find(|o| o.offer.merchant_id == merchant_id && o.offer.id == offer_id)
            .map(|o| o.offer.clone()))
    }

    async fn customer_events(
        &self,
        merchant_id: &str,
        customer_id: &str,
    ) -> StoreResult<Vec<PurchaseEvent>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .events
            .iter()
            .filter(|e| e.merchant_id == merchant_id && e.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn order_events(
        &self,
        merchant_id: &str,
        square_order_id: &str,
    ) -> StoreResult<Vec<PurchaseEvent>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .events
            .iter()
            .filter(|e| e.merchant_id == merchant_id && e.square_order_id == square_order_id)
            .cloned()
            .collect())
    }

    async fn append_events(&self, events: &[NewPurchaseEvent], now: i64) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        let mut inserted = 0;
        for event in events {
            if inner.push_event(event, now) {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn customer_rewards(
        &self,
        merchant_id: &str,
        customer_id: &str,
    ) -> StoreResult<Vec<Reward>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rewards
            .iter()
            .filter(|r| r.merchant_id == merchant_id && r.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn find_reward(&self, merchant_id: &str, reward_id: i64) -> StoreResult<Option<Reward>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rewards
            .iter()
            .find(|r| r.merchant_id == merchant_id && r.id == reward_id)
            .cloned())
    }

    async fn redeemable_reward(
        &self,
        merchant_id: &str,
        customer_id: &str,
        offer_id: i64,
        now: i64,
    ) -> StoreResult<Option<Reward>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rewards
            .iter()
            .filter(|r| {
                r.merchant_id == merchant_id
                    && r.customer_id == customer_id
                    && r.offer_id == offer_id
                    && r.is_redeemable_at(now)
            })
            .min_by_key(|r| r.earned_at)
            .cloned())
    }

    async fn earn(
        &self,
        offer: &Offer,
        customer_id: &str,
        now: i64,
        trace_id: Option<&str>,
    ) -> StoreResult<EarnOutcome> {
        let mut inner = self.inner.lock().await;

        let mut stale = Vec::new();
        for reward in inner.rewards.iter_mut() {
            if reward.merchant_id == offer.merchant_id
                && reward.customer_id == customer_id
                && reward.offer_id == offer.id
                && reward.status == RewardStatus::Earned
                && reward.expires_at <= now
            {
                reward.status = RewardStatus::Expired;
                reward.updated_at = now;
                stale.push(reward.id);
            }
        }
        if !stale.is_empty() {
            inner.audits.push(AuditRecord {
                merchant_id: offer.merchant_id.clone(),
                action: "rewards_expired".into(),
                detail: stale_expiry_detail(customer_id, offer.id, &stale),
            });
        }

        if let Some(existing) = inner.rewards.iter().find(|r| {
            r.merchant_id == offer.merchant_id
                && r.customer_id == customer_id
                && r.offer_id == offer.id
                && r.status == RewardStatus::Earned
        }) {
            return Ok(EarnOutcome::Outstanding {
                reward_id: existing.id,
            });
        }

        let ledger_rows: Vec<PurchaseEvent> = inner
            .events
            .iter()
            .filter(|e| {
                e.merchant_id == offer.merchant_id
                    && e.customer_id == customer_id
                    && e.offer_id == offer.id
            })
            .cloned()
            .collect();
        let Some(plan) = ledger::plan_consumption(&ledger_rows, offer.required_quantity, now)
        else {
            return Ok(EarnOutcome::BelowThreshold);
        };

        inner.next_reward_id += 1;
        let reward = Reward {
            id: inner.next_reward_id,
            merchant_id: offer.merchant_id.clone(),
            customer_id: customer_id.to_string(),
            offer_id: offer.id,
            status: RewardStatus::Earned,
            progress_quantity: plan.consumed_quantity,
            window_start: plan.window_start,
            window_end: plan.window_end,
            earned_at: now,
            redeemed_at: None,
            expires_at: ledger::window_for(now, offer.window_months).1,
            square_order_id: None,
            trace_id: trace_id.map(String::from),
            updated_at: now,
        };
        inner.rewards.push(reward.clone());

        for event in inner.events.iter_mut() {
            if plan.event_ids.contains(&event.id) {
                event.reward_id = Some(reward.id);
            }
        }

        if plan.carryover > 0 {
            let source = ledger_rows
                .iter()
                .find(|e| e.id == plan.crossing_event_id)
                .ok_or_else(|| LoyaltyError::Store("carryover source vanished".into()))?;
            let carry = ledger::carryover_event(source, plan.carryover, reward.id, trace_id);
            inner.push_event(&carry, now);
        }

        Ok(EarnOutcome::Earned(reward))
    }

    async fn redeem(
        &self,
        merchant_id: &str,
        reward_id: i64,
        request: &RedeemRequest,
        now: i64,
    ) -> StoreResult<Reward> {
        let mut inner = self.inner.lock().await;
        let reward = inner.reward_mut(merchant_id, reward_id);
        check_redeemable(reward.as_deref(), reward_id, now)?;
        let reward = reward.ok_or_else(|| LoyaltyError::NotFound(format!("Reward {reward_id}")))?;

        reward.status = RewardStatus::Redeemed;
        reward.redeemed_at = Some(now);
        reward.square_order_id = request.order_id.clone();
        if request.trace_id.is_some() {
            reward.trace_id = request.trace_id.clone();
        }
        reward.updated_at = now;
        Ok(reward.clone())
    }

    async fn expire_due(&self, merchant_id: &str, now: i64) -> StoreResult<Vec<Reward>> {
        let mut inner = self.inner.lock().await;
        let mut expired = Vec::new();
        for reward in inner.rewards.iter_mut() {
            if reward.merchant_id == merchant_id
                && reward.status == RewardStatus::Earned
                && reward.expires_at <= now
            {
                reward.status = RewardStatus::Expired;
                reward.updated_at = now;
                expired.push(reward.clone());
            }
        }
        Ok(expired)
    }

    async fn merchants_with_due_rewards(&self, now: i64) -> StoreResult<Vec<String>> {
        let inner = self.inner.lock().await;
        let mut merchants: Vec<String> = inner
            .rewards
            .iter()
            .filter(|r| r.status == RewardStatus::Earned && r.expires_at <= now)
            .map(|r| r.merchant_id.clone())
            .collect();
        merchants.sort();
        merchants.dedup();
        Ok(merchants)
    }

    async fn correct_expiry(
        &self,
        merchant_id: &str,
        reward_id: i64,
        new_expires_at: i64,
        reason: Option<&str>,
        now: i64,
    ) -> StoreResult<ExpiryCorrection> {
        let mut inner = self.inner.lock().await;
        let reward = inner
            .reward_mut(merchant_id, reward_id)
            .ok_or_else(|| LoyaltyError::NotFound(format!("Reward {reward_id}")))?;
        check_correctable(reward)?;

        let previous_expires_at = reward.expires_at;
        reward.expires_at = new_expires_at;
        reward.updated_at = now;
        let reward = reward.clone();

        inner.audits.push(AuditRecord {
            merchant_id: merchant_id.to_string(),
            action: "reward_expiry_corrected".into(),
            detail: super::rewards::expiry_audit_detail(&reward, previous_expires_at, reason),
        });

        Ok(ExpiryCorrection {
            reward,
            previous_expires_at,
        })
    }

    async fn audit(
        &self,
        merchant_id: &str,
        action: &str,
        detail: &serde_json::Value,
        _now: i64,
    ) -> StoreResult<()> {
        self.inner.lock().await.audits.push(AuditRecord {
            merchant_id: merchant_id.to_string(),
            action: action.to_string(),
            detail: detail.clone(),
        });
        Ok(())
    }
}
