//! Offer catalog queries

use std::collections::HashMap;

use shared::models::{Offer, OfferDetail};
use sqlx::PgPool;

const OFFER_COLUMNS: &str = "id, merchant_id, name, required_quantity, reward_quantity, \
     window_months, is_active, created_at, updated_at";

/// Active offers of a merchant with their qualifying variations
pub async fn list_active(pool: &PgPool, merchant_id: &str) -> Result<Vec<OfferDetail>, sqlx::Error> {
    let sql = format!(
        "SELECT {OFFER_COLUMNS} FROM loyalty_offers
         WHERE merchant_id = $1 AND is_active = TRUE ORDER BY id"
    );
    let offers: Vec<Offer> = sqlx::query_as(&sql)
        .bind(merchant_id)
        .fetch_all(pool)
        .await?;
    if offers.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = offers.iter().map(|o| o.id).collect();
    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT v.offer_id, v.variation_id
         FROM loyalty_offer_variations v
         JOIN loyalty_offers o ON o.id = v.offer_id
         WHERE o.merchant_id = $1 AND v.offer_id = ANY($2)
         ORDER BY v.variation_id",
    )
    .bind(merchant_id)
    .bind(&ids[..])
    .fetch_all(pool)
    .await?;

    let mut variations: HashMap<i64, Vec<String>> = HashMap::new();
    for (offer_id, variation_id) in rows {
        variations.entry(offer_id).or_default().push(variation_id);
    }

    Ok(offers
        .into_iter()
        .map(|offer| OfferDetail {
            variation_ids: variations.remove(&offer.id).unwrap_or_default(),
            offer,
        })
        .collect())
}

pub async fn find(
    pool: &PgPool,
    merchant_id: &str,
    offer_id: i64,
) -> Result<Option<Offer>, sqlx::Error> {
    let sql = format!("SELECT {OFFER_COLUMNS} FROM loyalty_offers WHERE merchant_id = $1 AND id = $2");
    sqlx::query_as(&sql)
        .bind(merchant_id)
        .bind(offer_id)
        .fetch_optional(pool)
        .await
}
