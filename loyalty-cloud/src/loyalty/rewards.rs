//! Reward lifecycle: earned → redeemed | expired | revoked
//!
//! The transactional guards (row lock for redeem, tuple lock for earn) live in
//! the store; this layer validates input, applies the audit trail and logs.

use std::sync::Arc;

use serde_json::json;
use shared::models::{Offer, Reward, RewardStats, RewardStatus};
use shared::util::now_millis;

use super::error::{LoyaltyError, require};
use super::store::{EarnOutcome, LoyaltyStore, RedeemRequest};

/// Redemption checks, in order: exists, not redeemed, not expired, `earned`.
pub fn check_redeemable(
    reward: Option<&Reward>,
    reward_id: i64,
    now: i64,
) -> Result<(), LoyaltyError> {
    let reward = reward.ok_or_else(|| LoyaltyError::NotFound(format!("Reward {reward_id}")))?;

    if reward.status == RewardStatus::Redeemed {
        return Err(LoyaltyError::AlreadyRedeemed {
            redeemed_at: reward.redeemed_at.unwrap_or(reward.updated_at),
        });
    }
    if reward.expires_at <= now {
        return Err(LoyaltyError::Expired {
            expires_at: reward.expires_at,
        });
    }
    if reward.status != RewardStatus::Earned {
        return Err(LoyaltyError::InvalidState {
            status: reward.status,
        });
    }
    Ok(())
}

/// Only outstanding rewards may have their expiry corrected
pub fn check_correctable(reward: &Reward) -> Result<(), LoyaltyError> {
    if reward.status != RewardStatus::Earned {
        return Err(LoyaltyError::InvalidState {
            status: reward.status,
        });
    }
    Ok(())
}

pub(crate) fn expiry_audit_detail(
    reward: &Reward,
    previous_expires_at: i64,
    reason: Option<&str>,
) -> serde_json::Value {
    json!({
        "reward_id": reward.id,
        "customer_id": reward.customer_id,
        "offer_id": reward.offer_id,
        "previous_expires_at": previous_expires_at,
        "expires_at": reward.expires_at,
        "earned_window_start": reward.window_start,
        "earned_window_end": reward.window_end,
        "reason": reason,
    })
}

/// Audit detail for `earned` rows retired inside the earn path
pub(crate) fn stale_expiry_detail(
    customer_id: &str,
    offer_id: i64,
    reward_ids: &[i64],
) -> serde_json::Value {
    json!({
        "reward_ids": reward_ids,
        "customer_id": customer_id,
        "offer_id": offer_id,
        "trigger": "earn",
    })
}

#[derive(Clone)]
pub struct RewardLifecycle {
    store: Arc<dyn LoyaltyStore>,
}

impl RewardLifecycle {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self { store }
    }

    /// Create a reward if the customer's open progress reached the threshold
    pub async fn evaluate(
        &self,
        offer: &Offer,
        customer_id: &str,
        trace_id: Option<&str>,
    ) -> Result<EarnOutcome, LoyaltyError> {
        require("customer_id", customer_id)?;
        let now = now_millis();
        let outcome = self.store.earn(offer, customer_id, now, trace_id).await?;

        match &outcome {
            EarnOutcome::Earned(reward) => {
                tracing::info!(
                    merchant_id = %offer.merchant_id,
                    customer_id,
                    offer_id = offer.id,
                    reward_id = reward.id,
                    progress_quantity = reward.progress_quantity,
                    trace_id = trace_id.unwrap_or(""),
                    "Reward earned"
                );
                let detail = json!({
                    "reward_id": reward.id,
                    "customer_id": customer_id,
                    "offer_id": offer.id,
                    "progress_quantity": reward.progress_quantity,
                    "expires_at": reward.expires_at,
                    "trace_id": trace_id,
                });
                self.audit(&offer.merchant_id, "reward_earned", &detail, now)
                    .await;
            }
            EarnOutcome::Outstanding { reward_id } => {
                tracing::debug!(
                    merchant_id = %offer.merchant_id,
                    customer_id,
                    offer_id = offer.id,
                    reward_id,
                    "Threshold check skipped: reward outstanding"
                );
            }
            EarnOutcome::BelowThreshold => {}
        }
        Ok(outcome)
    }

    /// Redeem a reward. Every branch writes an audit entry.
    pub async fn redeem(
        &self,
        merchant_id: &str,
        reward_id: i64,
        request: &RedeemRequest,
    ) -> Result<Reward, LoyaltyError> {
        require("merchant_id", merchant_id)?;
        let now = now_millis();
        let trace_id = request.trace_id.as_deref().unwrap_or("");
        let result = self.store.redeem(merchant_id, reward_id, request, now).await;

        let (outcome, extra) = match &result {
            Ok(reward) => {
                tracing::info!(
                    merchant_id,
                    reward_id,
                    trace_id,
                    order_id = request.order_id.as_deref().unwrap_or(""),
                    outcome = "redeemed",
                    "Reward redeemed"
                );
                ("redeemed", json!({ "customer_id": reward.customer_id, "offer_id": reward.offer_id }))
            }
            Err(e) if e.is_rejection() => {
                tracing::warn!(
                    merchant_id,
                    reward_id,
                    trace_id,
                    outcome = e.outcome(),
                    "Reward redemption rejected: {e}"
                );
                (e.outcome(), rejection_detail(e))
            }
            Err(e) => {
                tracing::error!(
                    merchant_id,
                    reward_id,
                    trace_id,
                    outcome = e.outcome(),
                    error = %e,
                    "Reward redemption failed"
                );
                (e.outcome(), json!({}))
            }
        };

        let detail = json!({
            "reward_id": reward_id,
            "order_id": request.order_id,
            "trace_id": request.trace_id,
            "outcome": outcome,
            "context": extra,
        });
        self.audit(merchant_id, "reward_redeem", &detail, now).await;

        let reward = result?;
        self.reevaluate(
            &reward.merchant_id,
            &reward.customer_id,
            reward.offer_id,
            request.trace_id.as_deref(),
        )
        .await;
        Ok(reward)
    }

    /// Run the earn check again once an outstanding reward is gone. Carryover
    /// or purchases made while it was outstanding may already cover the next
    /// threshold. Failures are logged and never undo the caller's transition.
    async fn reevaluate(
        &self,
        merchant_id: &str,
        customer_id: &str,
        offer_id: i64,
        trace_id: Option<&str>,
    ) {
        let offer = match self.store.find_offer(merchant_id, offer_id).await {
            Ok(Some(offer)) if offer.is_active => offer,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(merchant_id, customer_id, offer_id, error = %e, "Offer lookup for re-evaluation failed");
                return;
            }
        };
        if let Err(e) = self.evaluate(&offer, customer_id, trace_id).await {
            tracing::warn!(merchant_id, customer_id, offer_id, error = %e, "Re-evaluation failed");
        }
    }

    /// Expiry sweep for one merchant. Each (customer, offer) that lost its
    /// outstanding reward is evaluated again.
    pub async fn expire(&self, merchant_id: &str) -> Result<Vec<i64>, LoyaltyError> {
        require("merchant_id", merchant_id)?;
        let now = now_millis();
        let expired = self.store.expire_due(merchant_id, now).await?;
        let ids: Vec<i64> = expired.iter().map(|r| r.id).collect();
        if ids.is_empty() {
            return Ok(ids);
        }

        tracing::info!(merchant_id, count = ids.len(), reward_ids = ?ids, "Rewards expired");
        self.audit(merchant_id, "rewards_expired", &json!({ "reward_ids": ids }), now)
            .await;

        let mut affected: Vec<(&str, i64)> = expired
            .iter()
            .map(|r| (r.customer_id.as_str(), r.offer_id))
            .collect();
        affected.sort_unstable();
        affected.dedup();
        for (customer_id, offer_id) in affected {
            self.reevaluate(merchant_id, customer_id, offer_id, None).await;
        }
        Ok(ids)
    }

    /// Run the expiry sweep for every merchant with due rewards
    pub async fn expire_all(&self) -> Result<usize, LoyaltyError> {
        let merchants = self.store.merchants_with_due_rewards(now_millis()).await?;
        let mut total = 0;
        for merchant_id in merchants {
            match self.expire(&merchant_id).await {
                Ok(ids) => total += ids.len(),
                Err(e) => tracing::error!(merchant_id = %merchant_id, error = %e, "Expiry sweep failed"),
            }
        }
        Ok(total)
    }

    pub async fn redeemable(
        &self,
        merchant_id: &str,
        customer_id: &str,
        offer_id: i64,
    ) -> Result<Option<Reward>, LoyaltyError> {
        require("merchant_id", merchant_id)?;
        require("customer_id", customer_id)?;
        self.store
            .redeemable_reward(merchant_id, customer_id, offer_id, now_millis())
            .await
    }

    /// Rewards currently redeemable by the customer
    pub async fn count_earned(&self, merchant_id: &str, customer_id: &str) -> Result<i64, LoyaltyError> {
        require("merchant_id", merchant_id)?;
        require("customer_id", customer_id)?;
        let now = now_millis();
        let rewards = self.store.customer_rewards(merchant_id, customer_id).await?;
        Ok(rewards.iter().filter(|r| r.is_redeemable_at(now)).count() as i64)
    }

    pub async fn stats(&self, merchant_id: &str, customer_id: &str) -> Result<RewardStats, LoyaltyError> {
        require("merchant_id", merchant_id)?;
        require("customer_id", customer_id)?;
        let rewards = self.store.customer_rewards(merchant_id, customer_id).await?;
        let mut stats = RewardStats::default();
        for reward in &rewards {
            match reward.status {
                RewardStatus::Earned => stats.earned += 1,
                RewardStatus::Redeemed => stats.redeemed += 1,
                RewardStatus::Expired => stats.expired += 1,
                RewardStatus::Revoked => stats.revoked += 1,
            }
        }
        Ok(stats)
    }

    /// Explicit, audited change of an outstanding reward's expiry.
    /// The recorded earn window is left as it was.
    pub async fn correct_expiry(
        &self,
        merchant_id: &str,
        reward_id: i64,
        new_expires_at: i64,
        reason: Option<&str>,
    ) -> Result<Reward, LoyaltyError> {
        require("merchant_id", merchant_id)?;
        if new_expires_at <= 0 {
            return Err(LoyaltyError::Validation("expires_at must be positive".into()));
        }
        let correction = self
            .store
            .correct_expiry(merchant_id, reward_id, new_expires_at, reason, now_millis())
            .await?;
        tracing::warn!(
            merchant_id,
            reward_id,
            previous_expires_at = correction.previous_expires_at,
            expires_at = correction.reward.expires_at,
            reason = reason.unwrap_or(""),
            "Reward expiry corrected"
        );
        Ok(correction.reward)
    }

    /// Best-effort audit write; a failed audit never fails the operation
    async fn audit(&self, merchant_id: &str, action: &str, detail: &serde_json::Value, now: i64) {
        if let Err(e) = self.store.audit(merchant_id, action, detail, now).await {
            tracing::error!(merchant_id, action, error = %e, "Failed to write audit log");
        }
    }
}

fn rejection_detail(e: &LoyaltyError) -> serde_json::Value {
    match e {
        LoyaltyError::AlreadyRedeemed { redeemed_at } => json!({ "redeemed_at": redeemed_at }),
        LoyaltyError::Expired { expires_at } => json!({ "expires_at": expires_at }),
        LoyaltyError::InvalidState { status } => json!({ "status": status.as_db() }),
        _ => json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loyalty::memory::MemoryStore;
    use shared::models::{NewPurchaseEvent, PurchaseKind};

    const DAY: i64 = 86_400_000;

    pub(crate) fn reward(status: RewardStatus, expires_at: i64) -> Reward {
        Reward {
            id: 0,
            merchant_id: "M1".into(),
            customer_id: "C1".into(),
            offer_id: 1,
            status,
            progress_quantity: 5,
            window_start: 0,
            window_end: 0,
            earned_at: 0,
            redeemed_at: None,
            expires_at,
            square_order_id: None,
            trace_id: None,
            updated_at: 0,
        }
    }

    fn purchase(offer: &Offer, customer: &str, uid: &str, quantity: i32, at: i64) -> NewPurchaseEvent {
        let (window_start, window_end) = crate::loyalty::ledger::window_for(at, offer.window_months);
        NewPurchaseEvent {
            merchant_id: offer.merchant_id.clone(),
            customer_id: customer.into(),
            offer_id: offer.id,
            variation_id: "VAR".into(),
            square_order_id: format!("ord_{uid}"),
            line_item_uid: uid.into(),
            kind: PurchaseKind::Purchase,
            quantity,
            purchased_at: at,
            window_start,
            window_end,
            trace_id: None,
        }
    }

    fn setup() -> (Arc<MemoryStore>, RewardLifecycle) {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = RewardLifecycle::new(store.clone());
        (store, lifecycle)
    }

    #[test]
    fn check_order_not_found_first() {
        assert!(matches!(
            check_redeemable(None, 9, 0),
            Err(LoyaltyError::NotFound(_))
        ));
    }

    #[test]
    fn check_already_redeemed_wins_over_expired() {
        let mut r = reward(RewardStatus::Redeemed, 10);
        r.redeemed_at = Some(5);
        assert!(matches!(
            check_redeemable(Some(&r), 1, 100),
            Err(LoyaltyError::AlreadyRedeemed { redeemed_at: 5 })
        ));
    }

    #[test]
    fn check_expired_before_invalid_state() {
        let r = reward(RewardStatus::Revoked, 10);
        assert!(matches!(
            check_redeemable(Some(&r), 1, 100),
            Err(LoyaltyError::Expired { expires_at: 10 })
        ));
        assert!(matches!(
            check_redeemable(Some(&r), 1, 5),
            Err(LoyaltyError::InvalidState {
                status: RewardStatus::Revoked
            })
        ));
        assert!(check_redeemable(Some(&reward(RewardStatus::Earned, 10)), 1, 5).is_ok());
    }

    #[tokio::test]
    async fn redeem_twice_returns_first_timestamp() {
        let (store, lifecycle) = setup();
        let id = store
            .insert_reward(reward(RewardStatus::Earned, now_millis() + 30 * DAY))
            .await;

        let first = lifecycle
            .redeem(
                "M1",
                id,
                &RedeemRequest {
                    order_id: Some("ord_1".into()),
                    trace_id: Some("t-1".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(first.status, RewardStatus::Redeemed);
        assert_eq!(first.square_order_id.as_deref(), Some("ord_1"));

        let second = lifecycle
            .redeem("M1", id, &RedeemRequest::default())
            .await
            .unwrap_err();
        match second {
            LoyaltyError::AlreadyRedeemed { redeemed_at } => {
                assert_eq!(Some(redeemed_at), first.redeemed_at)
            }
            other => panic!("unexpected {other:?}"),
        }

        let stored = store.find_reward("M1", id).await.unwrap().unwrap();
        assert_eq!(stored.redeemed_at, first.redeemed_at);
        assert_eq!(stored.square_order_id.as_deref(), Some("ord_1"));

        let audits = store.audits().await;
        let outcomes: Vec<&str> = audits
            .iter()
            .filter(|a| a.action == "reward_redeem")
            .map(|a| a.detail["outcome"].as_str().unwrap())
            .collect();
        assert_eq!(outcomes, vec!["redeemed", "already_redeemed"]);
    }

    #[tokio::test]
    async fn redeem_expired_leaves_status_until_sweep() {
        let (store, lifecycle) = setup();
        let id = store
            .insert_reward(reward(RewardStatus::Earned, now_millis() - DAY))
            .await;

        let err = lifecycle
            .redeem("M1", id, &RedeemRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Expired { .. }));
        let stored = store.find_reward("M1", id).await.unwrap().unwrap();
        assert_eq!(stored.status, RewardStatus::Earned);

        let expired = lifecycle.expire("M1").await.unwrap();
        assert_eq!(expired, vec![id]);
        let stored = store.find_reward("M1", id).await.unwrap().unwrap();
        assert_eq!(stored.status, RewardStatus::Expired);
        assert!(lifecycle.expire("M1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn redeem_is_merchant_scoped() {
        let (store, lifecycle) = setup();
        let id = store
            .insert_reward(reward(RewardStatus::Earned, now_millis() + DAY))
            .await;
        assert!(matches!(
            lifecycle.redeem("OTHER", id, &RedeemRequest::default()).await,
            Err(LoyaltyError::NotFound(_))
        ));
        let audits = store.audits().await;
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].detail["outcome"], "not_found");
    }

    #[tokio::test]
    async fn redeem_validates_merchant() {
        let (_store, lifecycle) = setup();
        assert!(matches!(
            lifecycle.redeem("", 1, &RedeemRequest::default()).await,
            Err(LoyaltyError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn earn_once_per_outstanding_reward() {
        let (store, lifecycle) = setup();
        let offer = store.add_offer("M1", "Coffee", 3, 12, &["VAR"]).await;
        let now = now_millis();
        store
            .append_events(
                &[
                    purchase(&offer, "C1", "a", 2, now - 2 * DAY),
                    purchase(&offer, "C1", "b", 2, now - DAY),
                ],
                now,
            )
            .await
            .unwrap();

        let earned = match lifecycle.evaluate(&offer, "C1", Some("t")).await.unwrap() {
            EarnOutcome::Earned(r) => r,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(earned.progress_quantity, 4);
        assert_eq!(
            earned.expires_at,
            crate::loyalty::ledger::window_for(earned.earned_at, 12).1
        );

        // carryover of 1 re-appended, consumed rows linked to the reward
        let events = store.events().await;
        assert_eq!(events.iter().filter(|e| e.reward_id == Some(earned.id)).count(), 2);
        let carry: Vec<_> = events
            .iter()
            .filter(|e| e.kind == PurchaseKind::Carryover)
            .collect();
        assert_eq!(carry.len(), 1);
        assert_eq!(carry[0].quantity, 1);

        // second threshold while one is outstanding: no new reward
        store
            .append_events(&[purchase(&offer, "C1", "c", 5, now)], now)
            .await
            .unwrap();
        assert!(matches!(
            lifecycle.evaluate(&offer, "C1", None).await.unwrap(),
            EarnOutcome::Outstanding { reward_id } if reward_id == earned.id
        ));
        assert_eq!(store.rewards().await.len(), 1);

        // redeeming frees the slot; the banked progress earns immediately
        lifecycle
            .redeem("M1", earned.id, &RedeemRequest::default())
            .await
            .unwrap();
        let rewards = store.rewards().await;
        assert_eq!(rewards.len(), 2);
        assert_eq!(
            rewards.iter().filter(|r| r.status == RewardStatus::Earned).count(),
            1
        );
    }

    #[tokio::test]
    async fn unswept_expired_reward_does_not_block_earn() {
        let (store, lifecycle) = setup();
        let offer = store.add_offer("M1", "Tea", 2, 12, &["VAR"]).await;
        let now = now_millis();
        let mut stale = reward(RewardStatus::Earned, now - DAY / 24);
        stale.offer_id = offer.id;
        let stale_id = store.insert_reward(stale).await;
        store
            .append_events(
                &[
                    purchase(&offer, "C1", "a", 1, now - DAY),
                    purchase(&offer, "C1", "b", 1, now),
                ],
                now,
            )
            .await
            .unwrap();

        let earned = match lifecycle.evaluate(&offer, "C1", None).await.unwrap() {
            EarnOutcome::Earned(r) => r,
            other => panic!("unexpected {other:?}"),
        };
        assert_ne!(earned.id, stale_id);
        let retired = store.find_reward("M1", stale_id).await.unwrap().unwrap();
        assert_eq!(retired.status, RewardStatus::Expired);

        let audit = store
            .audits()
            .await
            .into_iter()
            .find(|a| a.action == "rewards_expired")
            .unwrap();
        assert_eq!(audit.detail["reward_ids"], serde_json::json!([stale_id]));
        assert_eq!(audit.detail["trigger"], "earn");

        // nothing left for the sweep
        assert!(lifecycle.expire("M1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sweep_earns_progress_banked_behind_expired_reward() {
        let (store, lifecycle) = setup();
        let offer = store.add_offer("M1", "Tea", 2, 12, &["VAR"]).await;
        let now = now_millis();
        let mut stale = reward(RewardStatus::Earned, now - DAY / 24);
        stale.offer_id = offer.id;
        let stale_id = store.insert_reward(stale).await;
        store
            .append_events(
                &[
                    purchase(&offer, "C1", "a", 1, now - DAY),
                    purchase(&offer, "C1", "b", 1, now),
                ],
                now,
            )
            .await
            .unwrap();

        assert_eq!(lifecycle.expire("M1").await.unwrap(), vec![stale_id]);

        let progress = crate::loyalty::ProgressProjector::new(store.clone())
            .customer_offer_progress("M1", "C1")
            .await
            .unwrap();
        assert_eq!(progress.len(), 1);
        assert!(progress[0].has_earned_reward);
        assert_eq!(progress[0].current_quantity, 0);

        let fresh = lifecycle
            .redeemable("M1", "C1", offer.id)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(fresh.id, stale_id);
        assert_eq!(fresh.progress_quantity, 2);
    }

    #[tokio::test]
    async fn concurrent_evaluations_create_one_reward() {
        let (store, lifecycle) = setup();
        let offer = store.add_offer("M1", "Bagel", 2, 6, &["VAR"]).await;
        let now = now_millis();
        store
            .append_events(&[purchase(&offer, "C1", "a", 2, now)], now)
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            lifecycle.evaluate(&offer, "C1", None),
            lifecycle.evaluate(&offer, "C1", None)
        );
        let earned = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|o| matches!(o, EarnOutcome::Earned(_)))
            .count();
        assert_eq!(earned, 1);
        assert_eq!(store.rewards().await.len(), 1);
    }

    #[tokio::test]
    async fn stats_and_counts() {
        let (store, lifecycle) = setup();
        let later = now_millis() + DAY;
        store.insert_reward(reward(RewardStatus::Earned, later)).await;
        store.insert_reward(reward(RewardStatus::Redeemed, later)).await;
        store.insert_reward(reward(RewardStatus::Expired, 0)).await;
        store.insert_reward(reward(RewardStatus::Earned, 1)).await; // past expiry, not swept

        let stats = lifecycle.stats("M1", "C1").await.unwrap();
        assert_eq!(stats.earned, 2);
        assert_eq!(stats.redeemed, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.total(), 4);
        assert_eq!(lifecycle.count_earned("M1", "C1").await.unwrap(), 1);

        let redeemable = lifecycle.redeemable("M1", "C1", 1).await.unwrap().unwrap();
        assert_eq!(redeemable.expires_at, later);
        assert!(lifecycle.redeemable("M1", "C1", 2).await.unwrap().is_none());
        assert!(matches!(
            lifecycle.stats("M1", "").await,
            Err(LoyaltyError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn expiry_correction_is_audited_and_keeps_window() {
        let (store, lifecycle) = setup();
        let mut r = reward(RewardStatus::Earned, now_millis() + DAY);
        r.window_start = 100;
        r.window_end = 200;
        let id = store.insert_reward(r).await;

        let past = now_millis() - DAY;
        let corrected = lifecycle
            .correct_expiry("M1", id, past, Some("entered wrong date"))
            .await
            .unwrap();
        assert_eq!(corrected.expires_at, past);
        assert_eq!(corrected.status, RewardStatus::Earned);
        assert_eq!((corrected.window_start, corrected.window_end), (100, 200));

        let audit = store
            .audits()
            .await
            .into_iter()
            .find(|a| a.action == "reward_expiry_corrected")
            .unwrap();
        assert_eq!(audit.detail["expires_at"], past);
        assert_eq!(audit.detail["reason"], "entered wrong date");

        // status flips only through the sweep
        assert_eq!(lifecycle.expire("M1").await.unwrap(), vec![id]);

        let err = lifecycle
            .correct_expiry("M1", id, now_millis() + DAY, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoyaltyError::InvalidState {
                status: RewardStatus::Expired
            }
        ));
    }

    #[tokio::test]
    async fn expire_all_covers_every_merchant() {
        let (store, lifecycle) = setup();
        let mut other = reward(RewardStatus::Earned, 1);
        other.merchant_id = "M2".into();
        store.insert_reward(other).await;
        store.insert_reward(reward(RewardStatus::Earned, 1)).await;
        store
            .insert_reward(reward(RewardStatus::Earned, now_millis() + DAY))
            .await;
        assert_eq!(lifecycle.expire_all().await.unwrap(), 2);
    }
}
