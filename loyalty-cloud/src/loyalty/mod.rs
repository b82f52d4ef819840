//! Frequent-buyer loyalty engine
//!
//! Purchase ledger, reward lifecycle, progress projection and the webhook
//! processor that feeds them from Square orders.

pub mod cache;
pub mod catalog;
pub mod error;
pub mod identify;
pub mod ledger;
pub mod processor;
pub mod progress;
pub mod rewards;
pub mod store;

#[cfg(test)]
pub(crate) mod memory;

pub use cache::OrderCache;
pub use error::LoyaltyError;
pub use identify::{CustomerSource, OrderLookup};
pub use processor::{LoyaltyOutcome, WebhookOutcome, WebhookProcessor};
pub use progress::ProgressProjector;
pub use rewards::RewardLifecycle;
pub use store::{LoyaltyStore, RedeemRequest};
