//! Per-merchant Square REST client
//!
//! One instance per merchant and unit of work: the stored access token is
//! decrypted once in [`SquareClient::for_merchant`] and kept zeroized-on-drop.
//! Every request logs merchant, endpoint, method, duration and outcome.
//! HTTP 429 is retried honoring `Retry-After`; 404 on get-style calls
//! becomes `Ok(None)`.

use std::time::{Duration, Instant};

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;
use shared::models::Merchant;
use zeroize::Zeroizing;

use super::error::SquareError;
use super::types::*;
use crate::config::SquareConfig;
use crate::crypto::MasterKey;

/// Timeout for single-object reads
const LIGHT_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for searches and writes
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Timeout for catalog batch operations
const HEAVY_TIMEOUT: Duration = Duration::from_secs(20);

/// Rate-limit retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Base delay when the server sends no `Retry-After` (doubled per attempt)
    pub base_delay: Duration,
    /// Upper bound for any single wait
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `attempt` (1-based) was rate limited
    pub fn delay_for(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        // hint is clamped before conversion; huge values would not fit a Duration
        let delay = retry_after
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64())))
            .unwrap_or_else(|| {
                self.base_delay
                    .checked_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
                    .unwrap_or(self.max_delay)
            });
        delay.min(self.max_delay)
    }
}

pub struct SquareClient {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
    merchant_id: String,
    access_token: Zeroizing<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for SquareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SquareClient")
            .field("base_url", &self.base_url)
            .field("merchant_id", &self.merchant_id)
            .finish_non_exhaustive()
    }
}

impl SquareClient {
    pub fn new(
        config: &SquareConfig,
        merchant_id: &str,
        access_token: String,
    ) -> Result<Self, SquareError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| SquareError::Transport {
                endpoint: "client-init".into(),
                source: e,
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            merchant_id: merchant_id.to_string(),
            access_token: Zeroizing::new(access_token),
            retry: RetryPolicy::default(),
        })
    }

    /// Build a client from a merchant row, decrypting its stored access token
    pub fn for_merchant(
        config: &SquareConfig,
        key: &MasterKey,
        merchant: &Merchant,
    ) -> Result<Self, SquareError> {
        let encrypted = merchant
            .square_access_token_enc
            .as_deref()
            .ok_or_else(|| SquareError::Token(format!("merchant {} has no Square token", merchant.id)))?;
        let token = key
            .decrypt_string(encrypted)
            .map_err(|e| SquareError::Token(e.to_string()))?;
        Self::new(config, &merchant.id, token)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
        timeout: Duration,
    ) -> Result<T, SquareError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let started = Instant::now();

            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(self.access_token.as_str())
                .header("Square-Version", &self.api_version)
                .timeout(timeout);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    tracing::warn!(
                        merchant_id = %self.merchant_id,
                        endpoint,
                        method = %method,
                        duration_ms,
                        error = %e,
                        "Square request failed"
                    );
                    return Err(if e.is_timeout() {
                        SquareError::Timeout {
                            endpoint: endpoint.to_string(),
                        }
                    } else {
                        SquareError::Transport {
                            endpoint: endpoint.to_string(),
                            source: e,
                        }
                    });
                }
            };

            let status = response.status().as_u16();
            let duration_ms = started.elapsed().as_millis() as u64;

            if status == 429 {
                if attempt >= self.retry.max_attempts {
                    tracing::error!(
                        merchant_id = %self.merchant_id,
                        endpoint,
                        method = %method,
                        duration_ms,
                        attempts = attempt,
                        "Square rate limit retries exhausted"
                    );
                    return Err(SquareError::RateLimited {
                        endpoint: endpoint.to_string(),
                        attempts: attempt,
                    });
                }
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok());
                let delay = self.retry.delay_for(attempt, retry_after);
                tracing::warn!(
                    merchant_id = %self.merchant_id,
                    endpoint,
                    method = %method,
                    duration_ms,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Square rate limited, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !(200..300).contains(&status) {
                let text = response.text().await.unwrap_or_default();
                tracing::warn!(
                    merchant_id = %self.merchant_id,
                    endpoint,
                    method = %method,
                    duration_ms,
                    status,
                    "Square request rejected"
                );
                return Err(SquareError::api(status, endpoint, text));
            }

            tracing::debug!(
                merchant_id = %self.merchant_id,
                endpoint,
                method = %method,
                duration_ms,
                status,
                "Square request ok"
            );

            let bytes = response.bytes().await.map_err(|e| {
                if e.is_timeout() {
                    SquareError::Timeout {
                        endpoint: endpoint.to_string(),
                    }
                } else {
                    SquareError::Transport {
                        endpoint: endpoint.to_string(),
                        source: e,
                    }
                }
            })?;
            return serde_json::from_slice(&bytes).map_err(|e| SquareError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            });
        }
    }

    /// Same as `execute` but 404 becomes `None`
    async fn execute_optional<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
        timeout: Duration,
    ) -> Result<Option<T>, SquareError> {
        match self.execute(method, endpoint, body, timeout).await {
            Ok(v) => Ok(Some(v)),
            Err(SquareError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ── Orders ──

    pub async fn get_order(&self, order_id: &str) -> Result<Option<Order>, SquareError> {
        let endpoint = format!("/orders/{order_id}");
        let resp: Option<OrderResponse> = self
            .execute_optional(Method::GET, &endpoint, None, LIGHT_TIMEOUT)
            .await?;
        Ok(resp.map(|r| r.order))
    }

    /// Search orders at the given locations (`query` is Square's `SearchOrdersQuery`)
    pub async fn search_orders(
        &self,
        location_ids: &[String],
        query: serde_json::Value,
        limit: u32,
    ) -> Result<Vec<Order>, SquareError> {
        let body = json!({
            "location_ids": location_ids,
            "query": query,
            "limit": limit,
        });
        let resp: SearchOrdersResponse = self
            .execute(Method::POST, "/orders/search", Some(&body), DEFAULT_TIMEOUT)
            .await?;
        Ok(resp.orders)
    }

    // ── Customers ──

    pub async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, SquareError> {
        let endpoint = format!("/customers/{customer_id}");
        let resp: Option<CustomerResponse> = self
            .execute_optional(Method::GET, &endpoint, None, LIGHT_TIMEOUT)
            .await?;
        Ok(resp.map(|r| r.customer))
    }

    /// Search customers with a Square `CustomerFilter`
    pub async fn search_customers(
        &self,
        filter: serde_json::Value,
    ) -> Result<Vec<Customer>, SquareError> {
        let body = json!({ "query": { "filter": filter }, "limit": 10 });
        let resp: SearchCustomersResponse = self
            .execute(Method::POST, "/customers/search", Some(&body), DEFAULT_TIMEOUT)
            .await?;
        Ok(resp.customers)
    }

    pub async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer, SquareError> {
        let body = serde_json::to_value(customer).map_err(|e| SquareError::Decode {
            endpoint: "/customers".into(),
            message: e.to_string(),
        })?;
        let resp: CustomerResponse = self
            .execute(Method::POST, "/customers", Some(&body), DEFAULT_TIMEOUT)
            .await?;
        Ok(resp.customer)
    }

    // ── Loyalty ──

    pub async fn get_loyalty_program(&self) -> Result<Option<LoyaltyProgram>, SquareError> {
        let resp: Option<LoyaltyProgramResponse> = self
            .execute_optional(Method::GET, "/loyalty/programs/main", None, LIGHT_TIMEOUT)
            .await?;
        Ok(resp.map(|r| r.program))
    }

    pub async fn search_loyalty_events_for_order(
        &self,
        order_id: &str,
    ) -> Result<Vec<LoyaltyEvent>, SquareError> {
        let body = json!({
            "query": { "filter": { "order_filter": { "order_id": order_id } } },
            "limit": 30,
        });
        let resp: SearchLoyaltyEventsResponse = self
            .execute(Method::POST, "/loyalty/events/search", Some(&body), DEFAULT_TIMEOUT)
            .await?;
        Ok(resp.events)
    }

    pub async fn get_loyalty_account(
        &self,
        account_id: &str,
    ) -> Result<Option<LoyaltyAccount>, SquareError> {
        let endpoint = format!("/loyalty/accounts/{account_id}");
        let resp: Option<LoyaltyAccountResponse> = self
            .execute_optional(Method::GET, &endpoint, None, LIGHT_TIMEOUT)
            .await?;
        Ok(resp.map(|r| r.loyalty_account))
    }

    // ── Catalog ──

    /// Upsert catalog objects in one batch; returns Square's raw response
    pub async fn batch_upsert_catalog(
        &self,
        idempotency_key: &str,
        objects: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, SquareError> {
        let body = json!({
            "idempotency_key": idempotency_key,
            "batches": [{ "objects": objects }],
        });
        self.execute(Method::POST, "/catalog/batch-upsert", Some(&body), HEAVY_TIMEOUT)
            .await
    }
}
