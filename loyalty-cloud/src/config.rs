//! Loyalty service configuration

use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Square API connection settings shared by every per-merchant client
#[derive(Debug, Clone)]
pub struct SquareConfig {
    /// Base URL including the version prefix (e.g. `https://connect.squareup.com/v2`)
    pub base_url: String,
    /// Value of the `Square-Version` header
    pub api_version: String,
}

impl Default for SquareConfig {
    fn default() -> Self {
        Self {
            base_url: "https://connect.squareup.com/v2".into(),
            api_version: "2024-10-17".into(),
        }
    }
}

/// Loyalty service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port (webhooks + merchant API)
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    pub square: SquareConfig,
    /// Square webhook subscription signature key
    pub square_webhook_signature_key: String,
    /// Notification URL registered with Square (part of the signed payload)
    pub square_webhook_url: String,
    /// Base64 AES-256-GCM key for stored Square access tokens
    pub token_encryption_key: String,
    /// JWT secret for merchant API authentication
    pub jwt_secret: String,
    /// Lifetime of an order-processing cache entry
    pub order_cache_ttl: Duration,
    /// Interval between reward expiry sweeps
    pub expiry_sweep_interval: Duration,
    /// Merchant that owns the platform (never suspended by billing events)
    pub platform_owner_merchant_id: Option<String>,
    /// Emit JSON logs instead of the human-readable format
    pub log_json: bool,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    fn parse_secs(name: &str, default: u64) -> Duration {
        let secs = std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default);
        Duration::from_secs(secs)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let defaults = SquareConfig::default();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: environment.clone(),
            square: SquareConfig {
                base_url: std::env::var("SQUARE_BASE_URL").unwrap_or(defaults.base_url),
                api_version: std::env::var("SQUARE_API_VERSION").unwrap_or(defaults.api_version),
            },
            square_webhook_signature_key: Self::require_secret(
                "SQUARE_WEBHOOK_SIGNATURE_KEY",
                &environment,
            )?,
            square_webhook_url: std::env::var("SQUARE_WEBHOOK_URL")
                .unwrap_or_else(|_| "http://localhost:8080/square/webhook".into()),
            token_encryption_key: Self::require_secret("TOKEN_ENCRYPTION_KEY", &environment)?,
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            order_cache_ttl: Self::parse_secs("ORDER_CACHE_TTL_SECS", 300),
            expiry_sweep_interval: Self::parse_secs("EXPIRY_SWEEP_INTERVAL_SECS", 3600),
            platform_owner_merchant_id: std::env::var("PLATFORM_OWNER_MERCHANT_ID")
                .ok()
                .filter(|s| !s.is_empty()),
            log_json: std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }
}
