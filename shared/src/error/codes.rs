//! Unified error codes for the loyalty service
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 3xxx: Merchant errors
//! - 4xxx: Loyalty errors
//! - 5xxx: Square integration errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so dashboards and report
/// tooling can switch on them without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 3xxx: Merchant ====================
    /// Merchant not found
    MerchantNotFound = 3001,
    /// Merchant access is suspended
    MerchantSuspended = 3002,

    // ==================== 4xxx: Loyalty ====================
    /// Offer not found
    OfferNotFound = 4001,
    /// Reward not found
    RewardNotFound = 4101,
    /// Reward has already been redeemed
    RewardAlreadyRedeemed = 4102,
    /// Reward has expired
    RewardExpired = 4103,
    /// Reward is not in a redeemable state
    RewardInvalidState = 4104,

    // ==================== 5xxx: Square ====================
    /// Square API returned an error
    SquareApiError = 5001,
    /// Square API rate limit exceeded
    SquareRateLimited = 5002,
    /// Square access token missing or unreadable
    SquareTokenInvalid = 5003,
    /// Square API call timed out
    SquareTimeout = 5004,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",

            // Auth
            ErrorCode::NotAuthenticated => "Caller is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Merchant
            ErrorCode::MerchantNotFound => "Merchant not found",
            ErrorCode::MerchantSuspended => "Merchant access is suspended",

            // Loyalty
            ErrorCode::OfferNotFound => "Offer not found",
            ErrorCode::RewardNotFound => "Reward not found",
            ErrorCode::RewardAlreadyRedeemed => "Reward has already been redeemed",
            ErrorCode::RewardExpired => "Reward has expired",
            ErrorCode::RewardInvalidState => "Reward is not in a redeemable state",

            // Square
            ErrorCode::SquareApiError => "Square API request failed",
            ErrorCode::SquareRateLimited => "Square API rate limit exceeded",
            ErrorCode::SquareTokenInvalid => "Square access token is missing or invalid",
            ErrorCode::SquareTimeout => "Square API request timed out",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Merchant
            3001 => Ok(ErrorCode::MerchantNotFound),
            3002 => Ok(ErrorCode::MerchantSuspended),

            // Loyalty
            4001 => Ok(ErrorCode::OfferNotFound),
            4101 => Ok(ErrorCode::RewardNotFound),
            4102 => Ok(ErrorCode::RewardAlreadyRedeemed),
            4103 => Ok(ErrorCode::RewardExpired),
            4104 => Ok(ErrorCode::RewardInvalidState),

            // Square
            5001 => Ok(ErrorCode::SquareApiError),
            5002 => Ok(ErrorCode::SquareRateLimited),
            5003 => Ok(ErrorCode::SquareTokenInvalid),
            5004 => Ok(ErrorCode::SquareTimeout),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::RewardNotFound.code(), 4101);
        assert_eq!(ErrorCode::RewardAlreadyRedeemed.code(), 4102);
        assert_eq!(ErrorCode::SquareRateLimited.code(), 5002);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_try_from_u16() {
        assert_eq!(ErrorCode::try_from(4103), Ok(ErrorCode::RewardExpired));
        assert_eq!(ErrorCode::try_from(3002), Ok(ErrorCode::MerchantSuspended));
        assert_eq!(ErrorCode::try_from(4999), Err(InvalidErrorCode(4999)));
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorCode::NotFound.to_string(), "3");
        assert_eq!(ErrorCode::RewardExpired.to_string(), "4103");
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::RewardInvalidState).unwrap();
        assert_eq!(json, "4104");
        let parsed: ErrorCode = serde_json::from_str("4104").unwrap();
        assert_eq!(parsed, ErrorCode::RewardInvalidState);
        assert!(serde_json::from_str::<ErrorCode>("4999").is_err());
    }

    #[test]
    fn test_invalid_error_code_display() {
        let err = InvalidErrorCode(999);
        assert_eq!(format!("{}", err), "invalid error code: 999");
    }
}
