//! Order-processing cache
//!
//! Process-local memo keyed by (order id, merchant id). Remembers the resolved
//! customer and which side effects already ran, so the burst of webhooks Square
//! sends for one order does not rerun the identification chain each time.
//! Never persisted; the database stays authoritative.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderCacheEntry {
    /// Resolved customer, `None` when identification failed
    pub customer_id: Option<String>,
    pub points_awarded: bool,
    pub redemption_checked: bool,
}

struct Slot {
    entry: OrderCacheEntry,
    expires_at: Instant,
}

type Key = (String, String);

#[derive(Clone)]
pub struct OrderCache {
    entries: Arc<DashMap<Key, Slot>>,
    ttl: Duration,
}

impl OrderCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    fn key(order_id: &str, merchant_id: &str) -> Key {
        (order_id.to_string(), merchant_id.to_string())
    }

    /// Live entry, if any (expired entries are dropped on read)
    pub fn get(&self, merchant_id: &str, order_id: &str) -> Option<OrderCacheEntry> {
        let key = Self::key(order_id, merchant_id);
        let now = Instant::now();
        let entry = self.entries.get(&key)?;
        if entry.expires_at > now {
            return Some(entry.entry.clone());
        }
        drop(entry);
        self.entries.remove_if(&key, |_, slot| slot.expires_at <= now);
        None
    }

    /// Create or modify an entry; every write refreshes its lifetime
    pub fn update(&self, merchant_id: &str, order_id: &str, f: impl FnOnce(&mut OrderCacheEntry)) {
        let now = Instant::now();
        let mut slot = self
            .entries
            .entry(Self::key(order_id, merchant_id))
            .or_insert_with(|| Slot {
                entry: OrderCacheEntry::default(),
                expires_at: now,
            });
        if slot.expires_at <= now {
            slot.entry = OrderCacheEntry::default();
        }
        f(&mut slot.entry);
        slot.expires_at = now + self.ttl;
    }

    /// Drop every entry attributed to a customer of the merchant
    pub fn forget_customer(&self, merchant_id: &str, customer_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, merchant), slot| {
            !(merchant == merchant_id && slot.entry.customer_id.as_deref() == Some(customer_id))
        });
        before.saturating_sub(self.entries.len())
    }

    /// Evict expired entries; returns how many were removed
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
