//! Offer records and the intermediate extraction types that feed them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MarketplaceId;

/// One seller row lifted from an aggregator listing page.
///
/// Ephemeral - scoped to a single aggregator fetch. `seller_nickname`
/// disambiguates multiple storefronts under one marketplace name and is
/// empty when it would just repeat the vendor name.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSellerEntry {
    pub vendor_name: String,
    pub seller_nickname: String,
    /// Currency-normalized positive price.
    pub price: f64,
    /// Absolute outbound link on the aggregator.
    pub outbound_link: String,
}

/// A single customer review collected from a marketplace page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub text: String,
    /// Star rating, 1-5, when the star state could be determined.
    pub rating: Option<u8>,
    pub date: Option<String>,
}

/// Facts extracted from one marketplace product page.
///
/// Every field is independently best-effort; a page that only yields a
/// review count is a valid extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceDetail {
    /// Aggregate product rating, 1.0-5.0.
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub reviews: Vec<ReviewEntry>,
    /// 4-5 star review bucket count (marketplace-specific).
    pub high_rating_count: Option<u32>,
    /// 1-2 star review bucket count (marketplace-specific).
    pub low_rating_count: Option<u32>,
}

impl MarketplaceDetail {
    /// True when nothing at all could be extracted.
    pub fn is_empty(&self) -> bool {
        self.rating.is_none()
            && self.review_count.is_none()
            && self.reviews.is_empty()
            && self.high_rating_count.is_none()
            && self.low_rating_count.is_none()
    }
}

/// Natural key identifying an offer for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OfferKey {
    pub product_id: String,
    pub site: MarketplaceId,
    pub vendor_name: String,
    /// Normalized: empty string when the seller has no distinct nickname.
    pub seller_nickname: String,
}

/// The reconciled fact record persisted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub product_id: String,
    pub product_name: String,
    pub category: Option<String>,
    pub site: MarketplaceId,
    pub vendor_name: String,
    pub seller_nickname: String,
    pub price: f64,
    /// The aggregator outbound link this offer was resolved from.
    pub source_url: String,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub high_rating_count: Option<u32>,
    pub low_rating_count: Option<u32>,
    pub reviews: Vec<ReviewEntry>,
    pub scrape_ts: DateTime<Utc>,
}

impl Offer {
    /// Assemble an offer from the per-task extraction outputs.
    pub fn from_extraction(
        product_id: &str,
        product_name: &str,
        category: Option<&str>,
        site: MarketplaceId,
        entry: &RawSellerEntry,
        detail: MarketplaceDetail,
    ) -> Self {
        Self {
            product_id: product_id.to_string(),
            product_name: product_name.to_string(),
            category: category.map(|s| s.to_string()),
            site,
            vendor_name: entry.vendor_name.clone(),
            seller_nickname: entry.seller_nickname.clone(),
            price: entry.price,
            source_url: entry.outbound_link.clone(),
            rating: detail.rating,
            review_count: detail.review_count,
            high_rating_count: detail.high_rating_count,
            low_rating_count: detail.low_rating_count,
            reviews: detail.reviews,
            scrape_ts: Utc::now(),
        }
    }

    pub fn key(&self) -> OfferKey {
        OfferKey {
            product_id: self.product_id.clone(),
            site: self.site,
            vendor_name: self.vendor_name.clone(),
            seller_nickname: self.seller_nickname.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(vendor: &str, nickname: &str) -> RawSellerEntry {
        RawSellerEntry {
            vendor_name: vendor.to_string(),
            seller_nickname: nickname.to_string(),
            price: 199.90,
            outbound_link: "https://www.akakce.com/r/1".to_string(),
        }
    }

    #[test]
    fn nickname_distinguishes_keys() {
        let a = Offer::from_extraction(
            "p1",
            "Product",
            None,
            MarketplaceId::Pazarama,
            &entry("Pazarama", "ABC Store"),
            MarketplaceDetail::default(),
        );
        let b = Offer::from_extraction(
            "p1",
            "Product",
            None,
            MarketplaceId::Pazarama,
            &entry("Pazarama", "XYZ Store"),
            MarketplaceDetail::default(),
        );
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn empty_detail_is_detected() {
        assert!(MarketplaceDetail::default().is_empty());
        let detail = MarketplaceDetail {
            review_count: Some(12),
            ..Default::default()
        };
        assert!(!detail.is_empty());
    }
}
