//! Reward queries

use shared::models::{Reward, RewardStatus};
use sqlx::{PgConnection, PgPool};

const REWARD_COLUMNS: &str = "id, merchant_id, customer_id, offer_id, status, progress_quantity, \
     window_start, window_end, earned_at, redeemed_at, expires_at, square_order_id, trace_id, \
     updated_at";

pub struct NewReward<'a> {
    pub merchant_id: &'a str,
    pub customer_id: &'a str,
    pub offer_id: i64,
    pub progress_quantity: i32,
    pub window_start: i64,
    pub window_end: i64,
    pub expires_at: i64,
    pub trace_id: Option<&'a str>,
    pub now: i64,
}

pub async fn insert(conn: &mut PgConnection, reward: &NewReward<'_>) -> Result<Reward, sqlx::Error> {
    let sql = format!(
        "INSERT INTO loyalty_rewards
            (merchant_id, customer_id, offer_id, status, progress_quantity, window_start,
             window_end, earned_at, expires_at, trace_id, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $8)
         RETURNING {REWARD_COLUMNS}"
    );
    sqlx::query_as(&sql)
        .bind(reward.merchant_id)
        .bind(reward.customer_id)
        .bind(reward.offer_id)
        .bind(RewardStatus::Earned.as_db())
        .bind(reward.progress_quantity)
        .bind(reward.window_start)
        .bind(reward.window_end)
        .bind(reward.now)
        .bind(reward.expires_at)
        .bind(reward.trace_id)
        .fetch_one(conn)
        .await
}

pub async fn find(
    pool: &PgPool,
    merchant_id: &str,
    reward_id: i64,
) -> Result<Option<Reward>, sqlx::Error> {
    let sql = format!("SELECT {REWARD_COLUMNS} FROM loyalty_rewards WHERE merchant_id = $1 AND id = $2");
    sqlx::query_as(&sql)
        .bind(merchant_id)
        .bind(reward_id)
        .fetch_optional(pool)
        .await
}

/// Row-locked read for state transitions
pub async fn find_for_update(
    conn: &mut PgConnection,
    merchant_id: &str,
    reward_id: i64,
) -> Result<Option<Reward>, sqlx::Error> {
    let sql = format!(
        "SELECT {REWARD_COLUMNS} FROM loyalty_rewards WHERE merchant_id = $1 AND id = $2 FOR UPDATE"
    );
    sqlx::query_as(&sql)
        .bind(merchant_id)
        .bind(reward_id)
        .fetch_optional(conn)
        .await
}

pub async fn for_customer(
    pool: &PgPool,
    merchant_id: &str,
    customer_id: &str,
) -> Result<Vec<Reward>, sqlx::Error> {
    let sql = format!(
        "SELECT {REWARD_COLUMNS} FROM loyalty_rewards
         WHERE merchant_id = $1 AND customer_id = $2 ORDER BY earned_at, id"
    );
    sqlx::query_as(&sql)
        .bind(merchant_id)
        .bind(customer_id)
        .fetch_all(pool)
        .await
}

/// Oldest non-expired `earned` reward of (customer, offer)
pub async fn redeemable(
    pool: &PgPool,
    merchant_id: &str,
    customer_id: &str,
    offer_id: i64,
    now: i64,
) -> Result<Option<Reward>, sqlx::Error> {
    let sql = format!(
        "SELECT {REWARD_COLUMNS} FROM loyalty_rewards
         WHERE merchant_id = $1 AND customer_id = $2 AND offer_id = $3
           AND status = 'earned' AND expires_at > $4
         ORDER BY earned_at LIMIT 1"
    );
    sqlx::query_as(&sql)
        .bind(merchant_id)
        .bind(customer_id)
        .bind(offer_id)
        .bind(now)
        .fetch_optional(pool)
        .await
}

/// Flip time-expired `earned` rows of one (customer, offer) to `expired`
pub async fn expire_stale(
    conn: &mut PgConnection,
    merchant_id: &str,
    customer_id: &str,
    offer_id: i64,
    now: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "UPDATE loyalty_rewards SET status = 'expired', updated_at = $4
         WHERE merchant_id = $1 AND customer_id = $2 AND offer_id = $3
           AND status = 'earned' AND expires_at <= $4
         RETURNING id",
    )
    .bind(merchant_id)
    .bind(customer_id)
    .bind(offer_id)
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Outstanding `earned` reward id of (customer, offer)
pub async fn outstanding_id(
    conn: &mut PgConnection,
    merchant_id: &str,
    customer_id: &str,
    offer_id: i64,
    now: i64,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM loyalty_rewards
         WHERE merchant_id = $1 AND customer_id = $2 AND offer_id = $3
           AND status = 'earned' AND expires_at > $4
         LIMIT 1",
    )
    .bind(merchant_id)
    .bind(customer_id)
    .bind(offer_id)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|r| r.0))
}

pub async fn mark_redeemed(
    conn: &mut PgConnection,
    merchant_id: &str,
    reward_id: i64,
    square_order_id: Option<&str>,
    trace_id: Option<&str>,
    now: i64,
) -> Result<Reward, sqlx::Error> {
    let sql = format!(
        "UPDATE loyalty_rewards
         SET status = 'redeemed', redeemed_at = $1, square_order_id = $2,
             trace_id = COALESCE($3, trace_id), updated_at = $1
         WHERE merchant_id = $4 AND id = $5
         RETURNING {REWARD_COLUMNS}"
    );
    sqlx::query_as(&sql)
        .bind(now)
        .bind(square_order_id)
        .bind(trace_id)
        .bind(merchant_id)
        .bind(reward_id)
        .fetch_one(conn)
        .await
}

pub async fn update_expiry(
    conn: &mut PgConnection,
    merchant_id: &str,
    reward_id: i64,
    expires_at: i64,
    now: i64,
) -> Result<Reward, sqlx::Error> {
    let sql = format!(
        "UPDATE loyalty_rewards SET expires_at = $1, updated_at = $2
         WHERE merchant_id = $3 AND id = $4
         RETURNING {REWARD_COLUMNS}"
    );
    sqlx::query_as(&sql)
        .bind(expires_at)
        .bind(now)
        .bind(merchant_id)
        .bind(reward_id)
        .fetch_one(conn)
        .await
}

/// Flip due `earned` rewards of one merchant to `expired`
pub async fn expire_due(
    pool: &PgPool,
    merchant_id: &str,
    now: i64,
) -> Result<Vec<Reward>, sqlx::Error> {
    let sql = format!(
        "UPDATE loyalty_rewards SET status = 'expired', updated_at = $2
         WHERE merchant_id = $1 AND status = 'earned' AND expires_at <= $2
         RETURNING {REWARD_COLUMNS}"
    );
    sqlx::query_as(&sql)
        .bind(merchant_id)
        .bind(now)
        .fetch_all(pool)
        .await
}

pub async fn merchants_with_due(pool: &PgPool, now: i64) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT merchant_id FROM loyalty_rewards
         WHERE status = 'earned' AND expires_at <= $1 ORDER BY merchant_id",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}
