//! Square integration via REST API (no SDK dependency)

pub mod client;
pub mod error;
pub mod types;
pub mod webhook;

pub use client::{RetryPolicy, SquareClient};
pub use error::SquareError;
pub use webhook::{EventKind, WebhookEvent};
