//! loyalty-cloud: frequent-buyer loyalty for Square merchants
//!
//! Long-running service that:
//! - Receives Square webhooks (orders, payments, refunds, billing)
//! - Records qualifying purchases in an append-only ledger
//! - Issues, redeems and expires rewards
//! - Serves the merchant loyalty API (JWT authenticated)

mod api;
mod auth;
mod billing;
mod config;
mod crypto;
mod db;
mod error;
mod loyalty;
mod square;
mod state;

use std::time::Duration;

use config::Config;
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Idempotency records older than this are purged
const WEBHOOK_RETENTION_MILLIS: i64 = 7 * 24 * 3600 * 1000;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "loyalty_cloud=info,tower_http=info".into());
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("Starting loyalty-cloud (env: {})", config.environment);

    // Initialize application state
    let state = AppState::new(&config).await?;

    let app = api::create_router(state.clone());

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("loyalty-cloud HTTP listening on {http_addr}");

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            tracing::error!("HTTP server error: {e}");
        }
    });

    // Periodic cache + idempotency cleanup (every 5 minutes)
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let evicted = cleanup_state.processor.cache().cleanup();
            if evicted > 0 {
                tracing::debug!(evicted, "Order cache cleanup");
            }
            let cutoff = shared::util::now_millis() - WEBHOOK_RETENTION_MILLIS;
            if let Err(e) = db::webhook_events::purge_before(&cleanup_state.pool, cutoff).await {
                tracing::warn!(%e, "Failed to purge processed webhook events");
            }
        }
    });

    // Periodic reward expiry sweep
    let rewards = state.rewards.clone();
    let sweep_every = config.expiry_sweep_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            match rewards.expire_all().await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "Expiry sweep finished"),
                Err(e) => tracing::error!(error = %e, "Expiry sweep failed"),
            }
        }
    });

    http_handle.await?;

    Ok(())
}
