//! Postgres implementation of the loyalty store
//!
//! Earn holds a transaction-scoped advisory lock on (merchant, customer, offer).
//! Under it, a time-expired `earned` row is retired before the outstanding
//! check, which the partial unique index on outstanding rewards backs. Redeem
//! and expiry correction lock the reward row with `FOR UPDATE`.

use async_trait::async_trait;
use shared::models::{NewPurchaseEvent, Offer, OfferDetail, PurchaseEvent, Reward};
use sqlx::PgPool;

use super::{audit, offers, purchase_events, rewards};
use crate::loyalty::error::LoyaltyError;
use crate::loyalty::ledger;
use crate::loyalty::rewards::{
    check_correctable, check_redeemable, expiry_audit_detail, stale_expiry_detail,
};
use crate::loyalty::store::{
    EarnOutcome, ExpiryCorrection, LoyaltyStore, RedeemRequest, StoreResult,
};

#[derive(Clone)]
pub struct PgLoyaltyStore {
    pool: PgPool,
}

impl PgLoyaltyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn earn_lock_key(merchant_id: &str, customer_id: &str, offer_id: i64) -> String {
    format!("loyalty_earn:{merchant_id}:{customer_id}:{offer_id}")
}

#[async_trait]
impl LoyaltyStore for PgLoyaltyStore {
    async fn active_offers(&self, merchant_id: &str) -> StoreResult<Vec<OfferDetail>> {
        Ok(offers::list_active(&self.pool, merchant_id).await?)
    }

    async fn find_offer(&self, merchant_id: &str, offer_id: i64) -> StoreResult<Option<Offer>> {
        Ok(offers::find(&self.pool, merchant_id, offer_id).await?)
    }

    async fn customer_events(
        &self,
        merchant_id: &str,
        customer_id: &str,
    ) -> StoreResult<Vec<PurchaseEvent>> {
        Ok(purchase_events::for_customer(&self.pool, merchant_id, customer_id).await?)
    }

    async fn order_events(
        &self,
        merchant_id: &str,
        square_order_id: &str,
    ) -> StoreResult<Vec<PurchaseEvent>> {
        Ok(purchase_events::for_order(&self.pool, merchant_id, square_order_id).await?)
    }

    async fn append_events(&self, events: &[NewPurchaseEvent], now: i64) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for event in events {
            if purchase_events::insert(&mut *tx, event, now).await? {
                inserted += 1;
            }
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn customer_rewards(
        &self,
        merchant_id: &str,
        customer_id: &str,
    ) -> StoreResult<Vec<Reward>> {
        Ok(rewards::for_customer(&self.pool, merchant_id, customer_id).await?)
    }

    async fn find_reward(&self, merchant_id: &str, reward_id: i64) -> StoreResult<Option<Reward>> {
        Ok(rewards::find(&self.pool, merchant_id, reward_id).await?)
    }

    async fn redeemable_reward(
        &self,
        merchant_id: &str,
        customer_id: &str,
        offer_id: i64,
        now: i64,
    ) -> StoreResult<Option<Reward>> {
        Ok(rewards::redeemable(&self.pool, merchant_id, customer_id, offer_id, now).await?)
    }

    async fn earn(
        &self,
        offer: &Offer,
        customer_id: &str,
        now: i64,
        trace_id: Option<&str>,
    ) -> StoreResult<EarnOutcome> {
        let merchant_id = offer.merchant_id.as_str();
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(earn_lock_key(merchant_id, customer_id, offer.id))
            .execute(&mut *tx)
            .await?;

        let stale = rewards::expire_stale(&mut tx, merchant_id, customer_id, offer.id, now).await?;
        if !stale.is_empty() {
            let detail = stale_expiry_detail(customer_id, offer.id, &stale);
            audit::log(&mut *tx, merchant_id, "rewards_expired", Some(&detail), None, now)
                .await
                .map_err(LoyaltyError::Store)?;
        }

        if let Some(reward_id) =
            rewards::outstanding_id(&mut tx, merchant_id, customer_id, offer.id, now).await?
        {
            tx.rollback().await?;
            return Ok(EarnOutcome::Outstanding { reward_id });
        }

        let ledger_rows =
            purchase_events::for_customer_offer(&mut tx, merchant_id, customer_id, offer.id)
                .await?;
        let Some(plan) = ledger::plan_consumption(&ledger_rows, offer.required_quantity, now)
        else {
            tx.rollback().await?;
            return Ok(EarnOutcome::BelowThreshold);
        };

        let reward = rewards::insert(
            &mut tx,
            &rewards::NewReward {
                merchant_id,
                customer_id,
                offer_id: offer.id,
                progress_quantity: plan.consumed_quantity,
                window_start: plan.window_start,
                window_end: plan.window_end,
                expires_at: ledger::window_for(now, offer.window_months).1,
                trace_id,
                now,
            },
        )
        .await?;

        purchase_events::link_to_reward(&mut tx, merchant_id, &plan.event_ids, reward.id).await?;

        if plan.carryover > 0 {
            let source = ledger_rows
                .iter()
                .find(|e| e.id == plan.crossing_event_id)
                .ok_or_else(|| LoyaltyError::Store("carryover source vanished".into()))?;
            let carry = ledger::carryover_event(source, plan.carryover, reward.id, trace_id);
            purchase_events::insert(&mut *tx, &carry, now).await?;
        }

        tx.commit().await?;
        Ok(EarnOutcome::Earned(reward))
    }

    async fn redeem(
        &self,
        merchant_id: &str,
        reward_id: i64,
        request: &RedeemRequest,
        now: i64,
    ) -> StoreResult<Reward> {
        let mut tx = self.pool.begin().await?;
        let current = rewards::find_for_update(&mut tx, merchant_id, reward_id).await?;
        check_redeemable(current.as_ref(), reward_id, now)?;

        let reward = rewards::mark_redeemed(
            &mut tx,
            merchant_id,
            reward_id,
            request.order_id.as_deref(),
            request.trace_id.as_deref(),
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(reward)
    }

    async fn expire_due(&self, merchant_id: &str, now: i64) -> StoreResult<Vec<Reward>> {
        Ok(rewards::expire_due(&self.pool, merchant_id, now).await?)
    }

    async fn merchants_with_due_rewards(&self, now: i64) -> StoreResult<Vec<String>> {
        Ok(rewards::merchants_with_due(&self.pool, now).await?)
    }

    async fn correct_expiry(
        &self,
        merchant_id: &str,
        reward_id: i64,
        new_expires_at: i64,
        reason: Option<&str>,
        now: i64,
    ) -> StoreResult<ExpiryCorrection> {
        let mut tx = self.pool.begin().await?;
        let current = rewards::find_for_update(&mut tx, merchant_id, reward_id)
            .await?
            .ok_or_else(|| LoyaltyError::NotFound(format!("Reward {reward_id}")))?;
        check_correctable(&current)?;

        let reward = rewards::update_expiry(&mut tx, merchant_id, reward_id, new_expires_at, now)
            .await?;
        let detail = expiry_audit_detail(&reward, current.expires_at, reason);
        audit::log(
            &mut *tx,
            merchant_id,
            "reward_expiry_corrected",
            Some(&detail),
            None,
            now,
        )
        .await
        .map_err(LoyaltyError::Store)?;

        tx.commit().await?;
        Ok(ExpiryCorrection {
            reward,
            previous_expires_at: current.expires_at,
        })
    }

    async fn audit(
        &self,
        merchant_id: &str,
        action: &str,
        detail: &serde_json::Value,
        now: i64,
    ) -> StoreResult<()> {
        audit::log(&self.pool, merchant_id, action, Some(detail), None, now)
            .await
            .map_err(LoyaltyError::Store)
    }
}
