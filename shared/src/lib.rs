//! Shared types for the loyalty service
//!
//! Domain models, the unified error system and time helpers used by
//! `loyalty-cloud` and by dashboard/report code that reads the same tables.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
