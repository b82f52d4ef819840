//! Audit log operations

use sqlx::{PgExecutor, PgPool};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Write an audit log entry. Accepts a pool or an open transaction.
pub async fn log<'e>(
    executor: impl PgExecutor<'e>,
    merchant_id: &str,
    action: &str,
    detail: Option<&serde_json::Value>,
    ip_address: Option<&str>,
    now: i64,
) -> Result<(), BoxError> {
    sqlx::query(
        "INSERT INTO audit_logs (merchant_id, action, detail, ip_address, created_at) VALUES ($1, $2, $3, $4, $5)"
    )
    .bind(merchant_id)
    .bind(action)
    .bind(detail)
    .bind(ip_address)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

#[derive(sqlx::FromRow, serde::Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub action: String,
    pub detail: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub created_at: i64,
}

/// Audit entries of a merchant, newest first (paginated)
pub async fn query(
    pool: &PgPool,
    merchant_id: &str,
    limit: i32,
    offset: i32,
) -> Result<Vec<AuditEntry>, BoxError> {
    let rows: Vec<AuditEntry> = sqlx::query_as(
        "SELECT id, action, detail, ip_address, created_at FROM audit_logs WHERE merchant_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
    )
    .bind(merchant_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
