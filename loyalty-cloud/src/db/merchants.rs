use shared::models::{AccessState, Merchant};
use sqlx::PgPool;

const MERCHANT_COLUMNS: &str = "id, business_name, square_access_token_enc, billing_customer_id, \
     access_state, is_platform_owner, created_at, updated_at";

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Merchant>, sqlx::Error> {
    let sql = format!("SELECT {MERCHANT_COLUMNS} FROM merchants WHERE id = $1");
    sqlx::query_as(&sql).bind(id).fetch_optional(pool).await
}

/// Merchant behind a customer of the platform's billing account
pub async fn find_by_billing_customer(
    pool: &PgPool,
    customer_id: &str,
) -> Result<Option<Merchant>, sqlx::Error> {
    let sql = format!("SELECT {MERCHANT_COLUMNS} FROM merchants WHERE billing_customer_id = $1");
    sqlx::query_as(&sql)
        .bind(customer_id)
        .fetch_optional(pool)
        .await
}

pub async fn update_access_state(
    pool: &PgPool,
    merchant_id: &str,
    state: AccessState,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE merchants SET access_state = $1, updated_at = $2 WHERE id = $3")
        .bind(state.as_db())
        .bind(now)
        .bind(merchant_id)
        .execute(pool)
        .await?;
    Ok(())
}
