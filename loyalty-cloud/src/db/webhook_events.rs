use sqlx::PgPool;

/// Record a delivery. INSERT first and check rows_affected, so two concurrent
/// deliveries of the same event cannot both pass. `false` means duplicate.
pub async fn record(
    pool: &PgPool,
    event_id: &str,
    event_type: &str,
    merchant_id: Option<&str>,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO processed_webhook_events (event_id, event_type, merchant_id, processed_at)
         VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
    )
    .bind(event_id)
    .bind(event_type)
    .bind(merchant_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Forget a delivery so Square's retry is processed again
pub async fn release(pool: &PgPool, event_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM processed_webhook_events WHERE event_id = $1")
        .bind(event_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop idempotency records older than `cutoff`
pub async fn purge_before(pool: &PgPool, cutoff: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM processed_webhook_events WHERE processed_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
