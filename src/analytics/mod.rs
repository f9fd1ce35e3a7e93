//! Read-only aggregations over stored offers.
//!
//! Everything here reduces the offer history of one product: latest
//! state per seller, price trend, competitor table, the dynamic price
//! suggestion and the review keyword analysis that feeds the chat
//! context. The store is never written from this module.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{MarketplaceId, Offer};

/// Turkish stop words filtered out of the keyword analysis. Includes
/// domain words ("ürün", "fiyat") that appear in nearly every review.
const STOP_WORDS: &[&str] = &[
    "bir", "bu", "şu", "ve", "ile", "için", "de", "da", "ki", "mi", "mu", "mü", "çok", "az", "en",
    "gibi", "kadar", "daha", "var", "yok", "ama", "ancak", "fakat", "şey", "her", "hiç", "kim",
    "ne", "nasıl", "neden", "ben", "sen", "biz", "siz", "göre", "sonra", "önce", "içinde",
    "üzerinde", "altında", "ürün", "ürünü", "ürünün", "fiyat", "fiyatı", "satıcı", "aldım",
    "geldi", "oldu", "iyi", "kötü", "güzel", "beğendim", "tavsiye", "ederim",
];

/// Latest snapshot of one seller's offer, with the empty nickname
/// normalized back to null for consumers.
#[derive(Debug, Clone, Serialize)]
pub struct OfferSummary {
    pub site: MarketplaceId,
    pub vendor_name: String,
    pub seller_nickname: Option<String>,
    pub price: f64,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
}

impl OfferSummary {
    fn from_offer(offer: &Offer) -> Self {
        Self {
            site: offer.site,
            vendor_name: offer.vendor_name.clone(),
            seller_nickname: (!offer.seller_nickname.is_empty())
                .then(|| offer.seller_nickname.clone()),
            price: offer.price,
            rating: offer.rating,
            review_count: offer.review_count,
        }
    }

    /// "Vendor (nickname)" display form.
    pub fn seller_display(&self) -> String {
        match &self.seller_nickname {
            Some(nick) => format!("{} ({})", self.vendor_name, nick),
            None => self.vendor_name.clone(),
        }
    }
}

/// Reduce the history to the most recent offer per
/// (site, vendor, nickname), sorted by price ascending.
pub fn latest_offers(offers: &[Offer]) -> Vec<Offer> {
    let mut latest: HashMap<(MarketplaceId, String, String), &Offer> = HashMap::new();
    for offer in offers {
        let key = (
            offer.site,
            offer.vendor_name.clone(),
            offer.seller_nickname.clone(),
        );
        match latest.get(&key) {
            Some(existing) if existing.scrape_ts >= offer.scrape_ts => {}
            _ => {
                latest.insert(key, offer);
            }
        }
    }

    let mut rows: Vec<Offer> = latest.into_values().cloned().collect();
    rows.sort_by(|a, b| a.price.total_cmp(&b.price));
    rows
}

/// Competitor table: latest price/rating/review count per seller.
pub fn competitor_analysis(offers: &[Offer]) -> Vec<OfferSummary> {
    latest_offers(offers)
        .iter()
        .map(OfferSummary::from_offer)
        .collect()
}

/// One point of the min/max/mean price trend.
#[derive(Debug, Clone, Serialize)]
pub struct PricePoint {
    pub scrape_ts: DateTime<Utc>,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Price trend over capture timestamps.
pub fn price_trend(offers: &[Offer]) -> Vec<PricePoint> {
    let mut buckets: HashMap<DateTime<Utc>, Vec<f64>> = HashMap::new();
    for offer in offers {
        buckets.entry(offer.scrape_ts).or_default().push(offer.price);
    }

    let mut points: Vec<PricePoint> = buckets
        .into_iter()
        .map(|(ts, prices)| {
            let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
            let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = prices.iter().sum::<f64>() / prices.len() as f64;
            PricePoint {
                scrape_ts: ts,
                min,
                max,
                mean,
            }
        })
        .collect();
    points.sort_by_key(|p| p.scrape_ts);
    points
}

/// Dynamic price suggestion relative to the lowest current competitor.
#[derive(Debug, Clone, Serialize)]
pub struct PriceSuggestion {
    pub product_id: String,
    pub min_competitor_price: f64,
    pub suggested_price: f64,
    pub margin_pct: f64,
}

pub fn price_suggestion(
    product_id: &str,
    offers: &[Offer],
    margin_pct: f64,
) -> Option<PriceSuggestion> {
    let latest = latest_offers(offers);
    let min_price = latest.first().map(|o| o.price)?;
    let suggested = (min_price * (1.0 + margin_pct / 100.0) * 100.0).round() / 100.0;

    Some(PriceSuggestion {
        product_id: product_id.to_string(),
        min_competitor_price: min_price,
        suggested_price: suggested,
        margin_pct,
    })
}

/// Per-site rating summary over the whole history.
#[derive(Debug, Clone, Serialize)]
pub struct SiteRatingSummary {
    pub site: MarketplaceId,
    pub avg_rating: Option<f64>,
    pub total_reviews: u64,
    pub offer_count: usize,
}

pub fn site_rating_summary(offers: &[Offer]) -> Vec<SiteRatingSummary> {
    let mut by_site: HashMap<MarketplaceId, (Vec<f64>, u64, usize)> = HashMap::new();
    for offer in offers {
        let entry = by_site.entry(offer.site).or_default();
        if let Some(rating) = offer.rating {
            entry.0.push(rating);
        }
        entry.1 += offer.review_count.unwrap_or(0) as u64;
        entry.2 += 1;
    }

    let mut rows: Vec<SiteRatingSummary> = by_site
        .into_iter()
        .map(|(site, (ratings, total_reviews, offer_count))| SiteRatingSummary {
            site,
            avg_rating: (!ratings.is_empty())
                .then(|| ratings.iter().sum::<f64>() / ratings.len() as f64),
            total_reviews,
            offer_count,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.avg_rating
            .unwrap_or(0.0)
            .total_cmp(&a.avg_rating.unwrap_or(0.0))
    });
    rows
}

#[derive(Debug, Clone, Serialize)]
pub struct KeywordCount {
    pub word: String,
    pub count: usize,
}

/// Common words in high-rated (>= 4) vs low-rated (<= 2) reviews.
#[derive(Debug, Clone, Serialize)]
pub struct KeywordAnalysis {
    pub high_keywords: Vec<KeywordCount>,
    pub low_keywords: Vec<KeywordCount>,
    pub high_review_count: usize,
    pub low_review_count: usize,
    pub avg_high_rating: Option<f64>,
    pub avg_low_rating: Option<f64>,
}

pub fn review_keyword_analysis(offers: &[Offer], top_k: usize) -> Option<KeywordAnalysis> {
    let mut high_texts: Vec<&str> = Vec::new();
    let mut low_texts: Vec<&str> = Vec::new();
    let mut high_ratings: Vec<f64> = Vec::new();
    let mut low_ratings: Vec<f64> = Vec::new();

    for offer in offers {
        for review in &offer.reviews {
            if review.text.trim().len() < 10 {
                continue;
            }
            match review.rating {
                Some(r) if (1..=5).contains(&r) => {
                    if r >= 4 {
                        high_texts.push(&review.text);
                        high_ratings.push(r as f64);
                    } else if r <= 2 {
                        low_texts.push(&review.text);
                        low_ratings.push(r as f64);
                    }
                }
                Some(_) => {}
                // Rating-less reviews count as positive; several sites
                // omit the stars for older reviews
                None => high_texts.push(&review.text),
            }
        }
    }

    if high_texts.is_empty() && low_texts.is_empty() {
        return None;
    }

    let avg = |values: &[f64]| {
        (!values.is_empty()).then(|| {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            (mean * 100.0).round() / 100.0
        })
    };

    Some(KeywordAnalysis {
        high_keywords: word_frequency(&high_texts, top_k),
        low_keywords: word_frequency(&low_texts, top_k),
        high_review_count: high_texts.len(),
        low_review_count: low_texts.len(),
        avg_high_rating: avg(&high_ratings),
        avg_low_rating: avg(&low_ratings),
    })
}

fn word_frequency(texts: &[&str], top_k: usize) -> Vec<KeywordCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for word in tokenize(text) {
            *counts.entry(word).or_default() += 1;
        }
    }

    let mut rows: Vec<KeywordCount> = counts
        .into_iter()
        .map(|(word, count)| KeywordCount { word, count })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    rows.truncate(top_k);
    rows
}

/// Lowercase, keep Turkish letters only, drop stop words and short tokens.
fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || "çğıöşü".contains(c) {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

/// Everything the chat boundary needs to answer questions about one
/// product. `None` when the product has no offers at all.
#[derive(Debug, Clone, Serialize)]
pub struct ProductContext {
    pub product_id: String,
    pub product_name: String,
    pub category: Option<String>,
    pub cheapest: OfferSummary,
    pub best_rated: Option<OfferSummary>,
    pub price_suggestion: Option<PriceSuggestion>,
    pub offers: Vec<OfferSummary>,
    pub keyword_analysis: Option<KeywordAnalysis>,
}

pub fn product_context(product_id: &str, offers: &[Offer], margin_pct: f64) -> Option<ProductContext> {
    let latest = latest_offers(offers);
    let cheapest_offer = latest.first()?;

    let best_rated = latest
        .iter()
        .filter(|o| o.rating.is_some())
        .max_by(|a, b| {
            a.rating
                .unwrap_or(0.0)
                .total_cmp(&b.rating.unwrap_or(0.0))
                .then_with(|| a.review_count.unwrap_or(0).cmp(&b.review_count.unwrap_or(0)))
        })
        .map(OfferSummary::from_offer);

    Some(ProductContext {
        product_id: product_id.to_string(),
        product_name: cheapest_offer.product_name.clone(),
        category: cheapest_offer.category.clone(),
        cheapest: OfferSummary::from_offer(cheapest_offer),
        best_rated,
        price_suggestion: price_suggestion(product_id, offers, margin_pct),
        offers: latest.iter().map(OfferSummary::from_offer).collect(),
        keyword_analysis: review_keyword_analysis(offers, 20),
    })
}
