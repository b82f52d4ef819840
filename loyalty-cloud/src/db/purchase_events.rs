//! Purchase ledger queries
//!
//! Entries are never updated except for linking them to the reward that
//! consumed them.

use shared::models::{NewPurchaseEvent, PurchaseEvent};
use sqlx::{PgConnection, PgExecutor, PgPool};

const EVENT_COLUMNS: &str = "id, merchant_id, customer_id, offer_id, variation_id, square_order_id, \
     line_item_uid, kind, quantity, purchased_at, window_start, window_end, reward_id, \
     trace_id, recorded_at";

/// Insert one entry; `false` when (merchant, order, line item, offer) exists
pub async fn insert<'e>(
    executor: impl PgExecutor<'e>,
    event: &NewPurchaseEvent,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO loyalty_purchase_events
            (merchant_id, customer_id, offer_id, variation_id, square_order_id, line_item_uid,
             kind, quantity, purchased_at, window_start, window_end, trace_id, recorded_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
         ON CONFLICT (merchant_id, square_order_id, line_item_uid, offer_id) DO NOTHING",
    )
    .bind(&event.merchant_id)
    .bind(&event.customer_id)
    .bind(event.offer_id)
    .bind(&event.variation_id)
    .bind(&event.square_order_id)
    .bind(&event.line_item_uid)
    .bind(event.kind.as_db())
    .bind(event.quantity)
    .bind(event.purchased_at)
    .bind(event.window_start)
    .bind(event.window_end)
    .bind(&event.trace_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn for_customer(
    pool: &PgPool,
    merchant_id: &str,
    customer_id: &str,
) -> Result<Vec<PurchaseEvent>, sqlx::Error> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM loyalty_purchase_events
         WHERE merchant_id = $1 AND customer_id = $2 ORDER BY purchased_at, id"
    );
    sqlx::query_as(&sql)
        .bind(merchant_id)
        .bind(customer_id)
        .fetch_all(pool)
        .await
}

pub async fn for_order(
    pool: &PgPool,
    merchant_id: &str,
    square_order_id: &str,
) -> Result<Vec<PurchaseEvent>, sqlx::Error> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM loyalty_purchase_events
         WHERE merchant_id = $1 AND square_order_id = $2 ORDER BY id"
    );
    sqlx::query_as(&sql)
        .bind(merchant_id)
        .bind(square_order_id)
        .fetch_all(pool)
        .await
}

/// Ledger of one (customer, offer), read inside the earn transaction
pub async fn for_customer_offer(
    conn: &mut PgConnection,
    merchant_id: &str,
    customer_id: &str,
    offer_id: i64,
) -> Result<Vec<PurchaseEvent>, sqlx::Error> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM loyalty_purchase_events
         WHERE merchant_id = $1 AND customer_id = $2 AND offer_id = $3
         ORDER BY purchased_at, id"
    );
    sqlx::query_as(&sql)
        .bind(merchant_id)
        .bind(customer_id)
        .bind(offer_id)
        .fetch_all(conn)
        .await
}

/// Mark entries as consumed by `reward_id`. Already-linked rows are left alone.
pub async fn link_to_reward(
    conn: &mut PgConnection,
    merchant_id: &str,
    event_ids: &[i64],
    reward_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE loyalty_purchase_events SET reward_id = $1
         WHERE merchant_id = $2 AND id = ANY($3) AND reward_id IS NULL",
    )
    .bind(reward_id)
    .bind(merchant_id)
    .bind(event_ids)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
