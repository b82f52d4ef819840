//! Purchase ledger rules (pure functions)
//!
//! The ledger is append-only. Progress and earn consumption are derived from it
//! on every read, never stored as a counter.

use shared::models::{NewPurchaseEvent, PurchaseEvent, PurchaseKind};
use shared::util::add_months_millis;

/// `(window_start, window_end)` for a purchase at `purchased_at`
pub fn window_for(purchased_at: i64, window_months: i32) -> (i64, i64) {
    let months = u32::try_from(window_months.max(0)).unwrap_or(0);
    (purchased_at, add_months_millis(purchased_at, months))
}

/// Entry still counts toward current progress
pub fn is_open(event: &PurchaseEvent, now: i64) -> bool {
    event.reward_id.is_none() && event.window_end >= now
}

/// Current in-window progress (never negative)
pub fn current_quantity(events: &[PurchaseEvent], now: i64) -> i64 {
    let sum: i64 = events
        .iter()
        .filter(|e| is_open(e, now))
        .map(|e| i64::from(e.quantity))
        .sum();
    sum.max(0)
}

/// Net lifetime quantity (sales minus refunds, every window)
pub fn lifetime_quantity(events: &[PurchaseEvent]) -> i64 {
    events
        .iter()
        .filter(|e| e.kind.counts_toward_lifetime())
        .map(|e| i64::from(e.quantity))
        .sum()
}

/// Which ledger entries an earn consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionPlan {
    /// Consumed entry ids, oldest first
    pub event_ids: Vec<i64>,
    /// Sum of consumed quantities
    pub consumed_quantity: i32,
    /// Overshoot re-appended as a carryover entry
    pub carryover: i32,
    /// Entry whose quantity crossed the threshold (carryover source)
    pub crossing_event_id: i64,
    /// Earliest window among consumed entries
    pub window_start: i64,
    pub window_end: i64,
}

/// Plan an earn over the open entries of one (customer, offer).
///
/// Entries are consumed oldest first (`purchased_at`, then id) until the running
/// sum reaches `required`. Returns `None` while open progress is below it.
pub fn plan_consumption(
    events: &[PurchaseEvent],
    required: i32,
    now: i64,
) -> Option<ConsumptionPlan> {
    if required <= 0 {
        return None;
    }

    let mut open: Vec<&PurchaseEvent> = events.iter().filter(|e| is_open(e, now)).collect();
    let total: i64 = open.iter().map(|e| i64::from(e.quantity)).sum();
    if total < i64::from(required) {
        return None;
    }
    open.sort_by_key(|e| (e.purchased_at, e.id));

    let mut running: i64 = 0;
    let mut consumed = Vec::new();
    for event in open {
        running += i64::from(event.quantity);
        consumed.push(event);
        if running >= i64::from(required) {
            break;
        }
    }

    let crossing = *consumed.last()?;
    let consumed_quantity = i32::try_from(running).ok()?;
    Some(ConsumptionPlan {
        event_ids: consumed.iter().map(|e| e.id).collect(),
        consumed_quantity,
        carryover: consumed_quantity - required,
        crossing_event_id: crossing.id,
        window_start: consumed.iter().map(|e| e.window_start).min()?,
        window_end: consumed.iter().map(|e| e.window_end).min()?,
    })
}

/// Carryover entry for the overshoot of an earn. Keeps the crossing entry's
/// window so the remainder expires with the purchase it came from.
pub fn carryover_event(
    source: &PurchaseEvent,
    quantity: i32,
    reward_id: i64,
    trace_id: Option<&str>,
) -> NewPurchaseEvent {
    NewPurchaseEvent {
        merchant_id: source.merchant_id.clone(),
        customer_id: source.customer_id.clone(),
        offer_id: source.offer_id,
        variation_id: source.variation_id.clone(),
        square_order_id: source.square_order_id.clone(),
        line_item_uid: format!("{}#carryover:{reward_id}", source.line_item_uid),
        kind: PurchaseKind::Carryover,
        quantity,
        purchased_at: source.purchased_at,
        window_start: source.window_start,
        window_end: source.window_end,
        trace_id: trace_id.map(String::from),
    }
}
