//! Data models
//!
//! Shared between loyalty-cloud and dashboard code (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! Timestamps are UTC milliseconds (`i64`).

pub mod loyalty;
pub mod merchant;

// Re-exports
pub use loyalty::*;
pub use merchant::*;
