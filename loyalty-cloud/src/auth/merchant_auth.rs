//! Merchant JWT authentication for the loyalty API

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};

use crate::db;
use crate::error::ServiceError;
use crate::state::AppState;

/// JWT claims for merchant authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct MerchantClaims {
    /// Square merchant id
    pub sub: String,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

/// Authenticated merchant extracted from JWT. Every loyalty query is scoped by it.
#[derive(Debug, Clone)]
pub struct MerchantIdentity {
    pub merchant_id: String,
}

const JWT_EXPIRY_HOURS: i64 = 24;

/// Create a JWT token for a merchant
#[allow(dead_code)]
pub fn create_token(merchant_id: &str, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = MerchantClaims {
        sub: merchant_id.to_string(),
        exp: (now + chrono::Duration::hours(JWT_EXPIRY_HOURS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify a bearer token and return the merchant it was issued to
pub fn verify_token(token: &str, secret: &str) -> Result<MerchantIdentity, jsonwebtoken::errors::Error> {
    let token_data = jsonwebtoken::decode::<MerchantClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(MerchantIdentity {
        merchant_id: token_data.claims.sub,
    })
}

/// Verifies the merchant JWT and access state, then attaches the identity and merchant row
pub async fn merchant_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::with_message(ErrorCode::NotAuthenticated, "Missing Authorization header")
                .into_response()
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::with_message(ErrorCode::TokenInvalid, "Invalid Authorization format")
            .into_response()
    })?;

    let identity = verify_token(token, &state.jwt_secret).map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        let code = match e.kind() {
            ErrorKind::ExpiredSignature => ErrorCode::TokenExpired,
            _ => ErrorCode::TokenInvalid,
        };
        AppError::new(code).into_response()
    })?;

    let merchant = db::merchants::find_by_id(&state.pool, &identity.merchant_id)
        .await
        .map_err(|e| ServiceError::from(e).into_response())?
        .ok_or_else(|| AppError::new(ErrorCode::MerchantNotFound).into_response())?;

    if !merchant.access_state.allows_access() {
        tracing::info!(
            merchant_id = %merchant.id,
            access_state = merchant.access_state.as_db(),
            "Merchant API access denied"
        );
        return Err(AppError::new(ErrorCode::MerchantSuspended)
            .with_detail("access_state", merchant.access_state.as_db())
            .into_response());
    }

    request.extensions_mut().insert(identity);
    request.extensions_mut().insert(merchant);

    Ok(next.run(request).await)
}
