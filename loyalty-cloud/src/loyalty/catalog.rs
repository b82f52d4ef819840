//! Offer catalog snapshot: active offers and their qualifying variations

use std::collections::HashMap;

use shared::models::{Offer, OfferDetail};

use super::error::LoyaltyError;
use super::store::LoyaltyStore;
use crate::square::types::{Order, parse_quantity};

/// Order line matched to one offer
#[derive(Debug, Clone)]
pub struct QualifyingLine<'a> {
    pub offer: &'a Offer,
    pub line_item_uid: String,
    pub variation_id: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Default)]
pub struct OfferCatalog {
    offers: Vec<OfferDetail>,
    by_variation: HashMap<String, Vec<usize>>,
}

impl OfferCatalog {
    pub fn from_offers(offers: Vec<OfferDetail>) -> Self {
        let mut by_variation: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, detail) in offers.iter().enumerate() {
            if !detail.offer.is_active {
                continue;
            }
            for variation in &detail.variation_ids {
                by_variation.entry(variation.clone()).or_default().push(idx);
            }
        }
        Self {
            offers,
            by_variation,
        }
    }

    pub async fn load(store: &dyn LoyaltyStore, merchant_id: &str) -> Result<Self, LoyaltyError> {
        Ok(Self::from_offers(store.active_offers(merchant_id).await?))
    }

    pub fn is_empty(&self) -> bool {
        self.by_variation.is_empty()
    }

    pub fn offer(&self, offer_id: i64) -> Option<&Offer> {
        self.offers
            .iter()
            .map(|d| &d.offer)
            .find(|o| o.id == offer_id)
    }

    /// Offers a variation qualifies for (possibly several)
    pub fn offers_for_variation(&self, variation_id: &str) -> Vec<&Offer> {
        self.by_variation
            .get(variation_id)
            .map(|idxs| idxs.iter().map(|&i| &self.offers[i].offer).collect())
            .unwrap_or_default()
    }

    /// Pair every order line with each offer its variation qualifies for.
    /// Lines without a uid get a positional key so replays stay deduplicated.
    pub fn qualifying_lines<'a>(&'a self, order: &Order) -> Vec<QualifyingLine<'a>> {
        let mut lines = Vec::new();
        for (idx, item) in order.line_items.iter().enumerate() {
            let Some(variation_id) = item.catalog_object_id.as_deref() else {
                continue;
            };
            let Some(quantity) = parse_quantity(&item.quantity) else {
                continue;
            };
            let uid = item
                .uid
                .clone()
                .unwrap_or_else(|| format!("line-{idx}"));
            for offer in self.offers_for_variation(variation_id) {
                lines.push(QualifyingLine {
                    offer,
                    line_item_uid: uid.clone(),
                    variation_id: variation_id.to_string(),
                    quantity,
                });
            }
        }
        lines
    }
}
