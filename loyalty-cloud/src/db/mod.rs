//! Database access layer

pub mod audit;
pub mod merchants;
pub mod offers;
pub mod pg_store;
pub mod purchase_events;
pub mod rewards;
pub mod webhook_events;

pub use pg_store::PgLoyaltyStore;
