//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // 404 Not Found
            Self::NotFound
            | Self::MerchantNotFound
            | Self::OfferNotFound
            | Self::RewardNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::RewardAlreadyRedeemed | Self::RewardInvalidState => StatusCode::CONFLICT,

            // 410 Gone
            Self::RewardExpired => StatusCode::GONE,

            // 401 Unauthorized
            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            Self::MerchantSuspended => StatusCode::FORBIDDEN,

            // 502 Bad Gateway (upstream POS failures)
            Self::SquareApiError | Self::SquareTokenInvalid => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable (transient errors, client can retry)
            Self::SquareRateLimited | Self::SquareTimeout => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::InternalError | Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation/business errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
