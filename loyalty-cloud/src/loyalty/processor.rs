//! Webhook order/payment/refund processing
//!
//! Turns normalized Square events into ledger writes and reward evaluation.
//! Safe to replay: ledger inserts are deduplicated by (order, line item, offer)
//! and earning is guarded by the store. Loyalty failures are attached to the
//! outcome instead of propagating to the webhook pipeline.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use shared::models::{NewPurchaseEvent, PurchaseKind};
use shared::util::{now_millis, parse_rfc3339_millis};

use super::cache::OrderCache;
use super::catalog::OfferCatalog;
use super::error::LoyaltyError;
use super::identify::{CustomerSource, OrderLookup, Strategy, identify_customer};
use super::ledger::window_for;
use super::rewards::RewardLifecycle;
use super::store::{EarnOutcome, LoyaltyStore, RedeemRequest};
use crate::square::types::{Order, parse_quantity};
use crate::square::{EventKind, WebhookEvent};

/// Discount metadata key naming an internal reward
const REWARD_METADATA_KEY: &str = "loyalty_reward_id";

/// Loyalty side effects of one event
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoyaltyOutcome {
    pub order_id: String,
    pub customer_id: Option<String>,
    pub customer_source: CustomerSource,
    pub events_recorded: u64,
    pub rewards_earned: Vec<i64>,
    pub rewards_redeemed: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<&'static str>,
}

impl LoyaltyOutcome {
    fn skipped(order_id: &str, reason: &'static str) -> Self {
        Self {
            order_id: order_id.to_string(),
            skipped: Some(reason),
            ..Default::default()
        }
    }
}

/// Result object of one webhook delivery
#[derive(Debug, Clone, Serialize)]
pub struct WebhookOutcome {
    pub event_id: String,
    pub event_type: String,
    pub merchant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loyalty: Option<LoyaltyOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loyalty_error: Option<String>,
}

impl WebhookOutcome {
    pub fn new(event: &WebhookEvent) -> Self {
        Self {
            event_id: event.event_id.clone(),
            event_type: event.event_type.clone(),
            merchant_id: event.merchant_id.clone(),
            loyalty: None,
            loyalty_error: None,
        }
    }
}

#[derive(Clone)]
pub struct WebhookProcessor {
    store: Arc<dyn LoyaltyStore>,
    rewards: RewardLifecycle,
    cache: OrderCache,
}

impl WebhookProcessor {
    pub fn new(store: Arc<dyn LoyaltyStore>, cache: OrderCache) -> Self {
        Self {
            rewards: RewardLifecycle::new(store.clone()),
            store,
            cache,
        }
    }

    pub fn cache(&self) -> &OrderCache {
        &self.cache
    }

    /// Process one order/payment/refund event. Never fails: loyalty errors are
    /// logged and reported in `loyalty_error`.
    pub async fn process(&self, event: &WebhookEvent, lookup: &dyn OrderLookup) -> WebhookOutcome {
        let mut outcome = WebhookOutcome::new(event);
        let merchant_id = event.merchant_id.as_str();
        let trace_id = event.event_id.as_str();

        let result = match event.kind() {
            EventKind::Order => match event.order_id() {
                Some(order_id) => {
                    let state = ["order_created", "order_updated", "order_fulfillment_updated"]
                        .iter()
                        .find_map(|key| event.object_str(key, "state"));
                    if state.is_some_and(|s| s != "COMPLETED") {
                        Ok(Some(LoyaltyOutcome::skipped(order_id, "order_not_completed")))
                    } else {
                        self.handle_order(merchant_id, order_id, trace_id, lookup)
                            .await
                            .map(Some)
                    }
                }
                None => Ok(None),
            },
            EventKind::Payment => {
                let status = event.object_str("payment", "status");
                match event.object_str("payment", "order_id") {
                    Some(order_id) if status == Some("COMPLETED") => self
                        .handle_order(merchant_id, order_id, trace_id, lookup)
                        .await
                        .map(Some),
                    _ => Ok(None),
                }
            }
            EventKind::Refund => {
                let status = event.object_str("refund", "status");
                match event.object_str("refund", "order_id") {
                    Some(order_id) if status == Some("COMPLETED") => self
                        .handle_refund(merchant_id, order_id, trace_id, lookup)
                        .await
                        .map(Some),
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        };

        match result {
            Ok(loyalty) => {
                if let Some(l) = &loyalty {
                    tracing::info!(
                        event_type = %event.event_type,
                        merchant_id,
                        order_id = %l.order_id,
                        customer_source = l.customer_source.as_str(),
                        events_recorded = l.events_recorded,
                        rewards_earned = l.rewards_earned.len(),
                        skipped = l.skipped.unwrap_or(""),
                        "Loyalty webhook processed"
                    );
                }
                outcome.loyalty = loyalty;
            }
            Err(e) => {
                tracing::error!(
                    event_type = %event.event_type,
                    merchant_id,
                    event_id = trace_id,
                    error = %e,
                    "Loyalty processing failed"
                );
                outcome.loyalty_error = Some(e.to_string());
            }
        }
        outcome
    }

    async fn handle_order(
        &self,
        merchant_id: &str,
        order_id: &str,
        trace_id: &str,
        lookup: &dyn OrderLookup,
    ) -> Result<LoyaltyOutcome, LoyaltyError> {
        let cached = self.cache.get(merchant_id, order_id).unwrap_or_default();
        if cached.points_awarded && cached.redemption_checked {
            return Ok(LoyaltyOutcome {
                customer_id: cached.customer_id,
                customer_source: CustomerSource::Cached,
                ..LoyaltyOutcome::skipped(order_id, "already_processed")
            });
        }

        let Some(order) = lookup.fetch_order(order_id).await? else {
            return Ok(LoyaltyOutcome::skipped(order_id, "order_not_found"));
        };
        if !order.is_completed() {
            return Ok(LoyaltyOutcome::skipped(order_id, "order_not_completed"));
        }

        let (customer_id, customer_source) = match cached.customer_id.clone() {
            Some(id) => (Some(id), CustomerSource::Cached),
            None => {
                let found = identify_customer(merchant_id, &order, lookup, &*self.store).await;
                let resolved = found.customer_id.clone();
                self.cache
                    .update(merchant_id, order_id, |e| e.customer_id = resolved);
                (found.customer_id, found.source)
            }
        };

        let mut outcome = LoyaltyOutcome {
            order_id: order_id.to_string(),
            customer_id: customer_id.clone(),
            customer_source,
            ..Default::default()
        };

        if !cached.redemption_checked {
            outcome.rewards_redeemed = self.detect_redemptions(merchant_id, &order, trace_id).await?;
            self.cache
                .update(merchant_id, order_id, |e| e.redemption_checked = true);
        }

        let Some(customer_id) = customer_id else {
            tracing::info!(
                merchant_id,
                order_id,
                "Customer identification failed, order processed without loyalty attribution"
            );
            outcome.skipped = Some("customer_unresolved");
            return Ok(outcome);
        };

        if cached.points_awarded {
            return Ok(outcome);
        }

        let catalog = OfferCatalog::load(&*self.store, merchant_id).await?;
        let now = now_millis();
        let purchased_at = order
            .completed_at()
            .and_then(parse_rfc3339_millis)
            .unwrap_or(now);

        let events: Vec<NewPurchaseEvent> = catalog
            .qualifying_lines(&order)
            .into_iter()
            .map(|line| {
                let (window_start, window_end) = window_for(purchased_at, line.offer.window_months);
                NewPurchaseEvent {
                    merchant_id: merchant_id.to_string(),
                    customer_id: customer_id.clone(),
                    offer_id: line.offer.id,
                    variation_id: line.variation_id,
                    square_order_id: order.id.clone(),
                    line_item_uid: line.line_item_uid,
                    kind: PurchaseKind::Purchase,
                    quantity: line.quantity,
                    purchased_at,
                    window_start,
                    window_end,
                    trace_id: Some(trace_id.to_string()),
                }
            })
            .collect();

        if !events.is_empty() {
            outcome.events_recorded = self.store.append_events(&events, now).await?;

            let offer_ids: BTreeSet<i64> = events.iter().map(|e| e.offer_id).collect();
            for offer_id in offer_ids {
                let Some(offer) = catalog.offer(offer_id) else {
                    continue;
                };
                if let EarnOutcome::Earned(reward) = self
                    .rewards
                    .evaluate(offer, &customer_id, Some(trace_id))
                    .await?
                {
                    outcome.rewards_earned.push(reward.id);
                }
            }
        }

        self.cache
            .update(merchant_id, order_id, |e| e.points_awarded = true);
        Ok(outcome)
    }

    /// Redeem internal rewards referenced by the order's discounts
    async fn detect_redemptions(
        &self,
        merchant_id: &str,
        order: &Order,
        trace_id: &str,
    ) -> Result<Vec<i64>, LoyaltyError> {
        let referenced: BTreeSet<i64> = order
            .discounts
            .iter()
            .flat_map(|d| {
                let from_metadata = d
                    .metadata
                    .as_ref()
                    .and_then(|m| m.get(REWARD_METADATA_KEY))
                    .and_then(|v| v.parse::<i64>().ok());
                d.reward_ids
                    .iter()
                    .filter_map(|id| id.parse::<i64>().ok())
                    .chain(from_metadata)
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut redeemed = Vec::new();
        for reward_id in referenced {
            let request = RedeemRequest {
                order_id: Some(order.id.clone()),
                trace_id: Some(trace_id.to_string()),
            };
            match self.rewards.redeem(merchant_id, reward_id, &request).await {
                Ok(_) => redeemed.push(reward_id),
                Err(LoyaltyError::AlreadyRedeemed { .. }) => {}
                Err(e) if e.is_rejection() => {
                    tracing::warn!(merchant_id, order_id = %order.id, reward_id, error = %e, "Discount references unredeemable reward");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(redeemed)
    }

    /// Compensating negative entries for a completed refund. `order_id` is the
    /// return order; its `returns` point at the original sales.
    async fn handle_refund(
        &self,
        merchant_id: &str,
        order_id: &str,
        trace_id: &str,
        lookup: &dyn OrderLookup,
    ) -> Result<LoyaltyOutcome, LoyaltyError> {
        let Some(order) = lookup.fetch_order(order_id).await? else {
            return Ok(LoyaltyOutcome::skipped(order_id, "order_not_found"));
        };

        let now = now_millis();
        let refunded_at = order
            .completed_at()
            .and_then(parse_rfc3339_millis)
            .unwrap_or(now);
        let mut events = Vec::new();

        for ret in &order.returns {
            let Some(source_order_id) = ret.source_order_id.as_deref() else {
                continue;
            };
            let ledger = self.store.order_events(merchant_id, source_order_id).await?;
            let sales: Vec<_> = ledger
                .iter()
                .filter(|e| e.kind == PurchaseKind::Purchase)
                .collect();
            if sales.is_empty() {
                continue;
            }

            for (idx, item) in ret.return_line_items.iter().enumerate() {
                let Some(quantity) = parse_quantity(&item.quantity) else {
                    continue;
                };
                let uid = item
                    .uid
                    .clone()
                    .unwrap_or_else(|| format!("return-{source_order_id}-{idx}"));
                let matched = sales.iter().filter(|sale| match &item.source_line_item_uid {
                    Some(source_uid) => &sale.line_item_uid == source_uid,
                    None => item.catalog_object_id.as_deref() == Some(sale.variation_id.as_str()),
                });

                for sale in matched {
                    events.push(NewPurchaseEvent {
                        merchant_id: merchant_id.to_string(),
                        customer_id: sale.customer_id.clone(),
                        offer_id: sale.offer_id,
                        variation_id: sale.variation_id.clone(),
                        square_order_id: order.id.clone(),
                        line_item_uid: uid.clone(),
                        kind: PurchaseKind::Refund,
                        quantity: -quantity.min(sale.quantity),
                        purchased_at: refunded_at,
                        window_start: sale.window_start,
                        window_end: sale.window_end,
                        trace_id: Some(trace_id.to_string()),
                    });
                }
            }
        }

        let mut outcome = LoyaltyOutcome {
            order_id: order_id.to_string(),
            customer_id: events.first().map(|e| e.customer_id.clone()),
            ..Default::default()
        };
        if events.is_empty() {
            outcome.skipped = Some("no_recorded_sales");
            return Ok(outcome);
        }
        outcome.customer_source = CustomerSource::Identified(Strategy::LedgerFallback);
        outcome.events_recorded = self.store.append_events(&events, now).await?;
        Ok(outcome)
    }
}
