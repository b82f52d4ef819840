//! Unified service-layer error type for loyalty-cloud
//!
//! `ServiceError` bridges DB-layer errors (`sqlx::Error`, `BoxError`) and
//! engine errors (`LoyaltyError`) to the API-layer `AppError`, so handlers can
//! propagate with `?`.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

use crate::loyalty::LoyaltyError;
use crate::square::SquareError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub enum ServiceError {
    /// Database or infrastructure error (logged, mapped to InternalError)
    Db(BoxError),
    /// Business-rule error, passed through to the client
    App(AppError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Db(e.into())
    }
}

impl From<BoxError> for ServiceError {
    fn from(e: BoxError) -> Self {
        ServiceError::Db(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<LoyaltyError> for ServiceError {
    fn from(e: LoyaltyError) -> Self {
        match e {
            LoyaltyError::Store(inner) => ServiceError::Db(inner),
            other => ServiceError::App(other.into()),
        }
    }
}

impl From<SquareError> for ServiceError {
    fn from(e: SquareError) -> Self {
        ServiceError::from(LoyaltyError::Square(e))
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "Service database error");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_hide_details() {
        let err: AppError = ServiceError::from(LoyaltyError::Store("connection reset".into())).into();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(!err.message.contains("connection reset"));
    }

    #[test]
    fn rejections_keep_their_code() {
        let err: AppError =
            ServiceError::from(LoyaltyError::AlreadyRedeemed { redeemed_at: 42 }).into();
        assert_eq!(err.code, ErrorCode::RewardAlreadyRedeemed);
    }

    #[test]
    fn square_failures_map_to_gateway_codes() {
        let err: AppError = ServiceError::from(SquareError::RateLimited {
            endpoint: "/orders/search".into(),
            attempts: 4,
        })
        .into();
        assert_eq!(err.code, ErrorCode::SquareRateLimited);

        let err: AppError = ServiceError::from(SquareError::Token("no token".into())).into();
        assert_eq!(err.code, ErrorCode::SquareTokenInvalid);
    }
}
