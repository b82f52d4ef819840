//! Unified error system for the loyalty service
//!
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ErrorBody`]: JSON error body returned by every endpoint
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 3xxx: Merchant errors
//! - 4xxx: Loyalty errors
//! - 5xxx: Square integration errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorBody, ErrorCode};
//!
//! let err = AppError::new(ErrorCode::RewardNotFound);
//!
//! let err = AppError::with_message(ErrorCode::RewardAlreadyRedeemed, "Reward already applied")
//!     .with_detail("redeemed_at", 1_700_000_000_000_i64);
//!
//! let body = ErrorBody::from(&err);
//! assert_eq!(body.code, 4102);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{AppError, ErrorBody};
