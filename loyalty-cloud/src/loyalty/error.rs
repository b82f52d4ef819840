//! Loyalty engine errors

use shared::error::{AppError, ErrorCode};
use shared::models::RewardStatus;
use thiserror::Error;

use crate::square::SquareError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum LoyaltyError {
    /// Missing or malformed identifier (caller bug, never retried)
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("reward already redeemed at {redeemed_at}")]
    AlreadyRedeemed { redeemed_at: i64 },

    #[error("reward expired at {expires_at}")]
    Expired { expires_at: i64 },

    #[error("reward is {status}, expected earned")]
    InvalidState { status: RewardStatus },

    #[error(transparent)]
    Square(#[from] SquareError),

    #[error("store error: {0}")]
    Store(BoxError),
}

impl From<sqlx::Error> for LoyaltyError {
    fn from(e: sqlx::Error) -> Self {
        LoyaltyError::Store(e.into())
    }
}

impl LoyaltyError {
    /// Stable label for audit entries and logs
    pub fn outcome(&self) -> &'static str {
        match self {
            LoyaltyError::Validation(_) => "validation_failed",
            LoyaltyError::NotFound(_) => "not_found",
            LoyaltyError::AlreadyRedeemed { .. } => "already_redeemed",
            LoyaltyError::Expired { .. } => "expired",
            LoyaltyError::InvalidState { .. } => "invalid_state",
            LoyaltyError::Square(_) => "square_error",
            LoyaltyError::Store(_) => "store_error",
        }
    }

    /// Business-rule rejection (as opposed to an infrastructure failure)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LoyaltyError::NotFound(_)
                | LoyaltyError::AlreadyRedeemed { .. }
                | LoyaltyError::Expired { .. }
                | LoyaltyError::InvalidState { .. }
        )
    }
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), LoyaltyError> {
    if value.trim().is_empty() {
        return Err(LoyaltyError::Validation(format!("{field} is required")));
    }
    Ok(())
}

impl From<LoyaltyError> for AppError {
    fn from(e: LoyaltyError) -> Self {
        match e {
            LoyaltyError::Validation(msg) => AppError::validation(msg),
            LoyaltyError::NotFound(what) => {
                let code = if what.starts_with("Reward") {
                    ErrorCode::RewardNotFound
                } else if what.starts_with("Offer") {
                    ErrorCode::OfferNotFound
                } else {
                    ErrorCode::NotFound
                };
                AppError::with_message(code, format!("{what} not found"))
            }
            LoyaltyError::AlreadyRedeemed { redeemed_at } => {
                AppError::new(ErrorCode::RewardAlreadyRedeemed)
                    .with_detail("redeemed_at", redeemed_at)
            }
            LoyaltyError::Expired { expires_at } => {
                AppError::new(ErrorCode::RewardExpired).with_detail("expires_at", expires_at)
            }
            LoyaltyError::InvalidState { status } => {
                AppError::new(ErrorCode::RewardInvalidState).with_detail("status", status.as_db())
            }
            LoyaltyError::Square(err) => {
                tracing::error!(error = %err, "Square call failed");
                let code = match err {
                    SquareError::RateLimited { .. } => ErrorCode::SquareRateLimited,
                    SquareError::Timeout { .. } => ErrorCode::SquareTimeout,
                    SquareError::Token(_) => ErrorCode::SquareTokenInvalid,
                    _ => ErrorCode::SquareApiError,
                };
                AppError::new(code)
            }
            LoyaltyError::Store(err) => {
                tracing::error!(error = %err, "Loyalty store error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}
