//! Application state for loyalty-cloud

use std::sync::Arc;

use shared::models::Merchant;
use sqlx::PgPool;

use crate::config::{Config, SquareConfig};
use crate::crypto::MasterKey;
use crate::db::PgLoyaltyStore;
use crate::loyalty::{
    LoyaltyStore, OrderCache, ProgressProjector, RewardLifecycle, WebhookProcessor,
};
use crate::square::{SquareClient, SquareError};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    pub store: Arc<dyn LoyaltyStore>,
    pub progress: ProgressProjector,
    pub rewards: RewardLifecycle,
    pub processor: WebhookProcessor,
    /// Decrypts stored Square access tokens
    pub master_key: Arc<MasterKey>,
    pub square: SquareConfig,
    pub webhook_signature_key: String,
    pub webhook_url: String,
    /// JWT secret for merchant API authentication
    pub jwt_secret: String,
    pub platform_owner_merchant_id: Option<String>,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let master_key = match MasterKey::from_base64(&config.token_encryption_key) {
            Ok(key) => key,
            Err(e) if config.environment == "development" => {
                tracing::warn!(
                    error = %e,
                    "TOKEN_ENCRYPTION_KEY unusable, generated an ephemeral key (stored tokens will not decrypt)"
                );
                MasterKey::generate()
            }
            Err(e) => return Err(e),
        };

        let store: Arc<dyn LoyaltyStore> = Arc::new(PgLoyaltyStore::new(pool.clone()));
        let cache = OrderCache::new(config.order_cache_ttl);

        Ok(Self {
            pool,
            progress: ProgressProjector::new(store.clone()),
            rewards: RewardLifecycle::new(store.clone()),
            processor: WebhookProcessor::new(store.clone(), cache),
            store,
            master_key: Arc::new(master_key),
            square: config.square.clone(),
            webhook_signature_key: config.square_webhook_signature_key.clone(),
            webhook_url: config.square_webhook_url.clone(),
            jwt_secret: config.jwt_secret.clone(),
            platform_owner_merchant_id: config.platform_owner_merchant_id.clone(),
        })
    }

    /// Square client acting with the merchant's own access token
    pub fn square_client(&self, merchant: &Merchant) -> Result<SquareClient, SquareError> {
        SquareClient::for_merchant(&self.square, &self.master_key, merchant)
    }
}
