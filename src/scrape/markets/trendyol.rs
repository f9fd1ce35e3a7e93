//! Trendyol product page extractor.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use super::{
    div_path, element_text, first_text, longest_text, review_date, scroll_until_loaded,
    MarketplaceExtractor, MIN_REVIEW_LEN,
};
use crate::browser::BrowserSession;
use crate::models::{MarketplaceDetail, MarketplaceId, ReviewEntry};
use crate::scrape::stars;
use crate::utils::{digits_only, parse_decimal_comma};

/// Aggregate rating inside the product header's review link.
const RATING_SELECTORS: &[&str] = &[
    "#envoy-mobile a div:first-child span",
    "#envoy-mobile a span",
    "[class*='rating-score'] span",
];

/// Review count sits in the second block of the same link.
const REVIEW_COUNT_SELECTORS: &[&str] = &[
    "#envoy-mobile a div:nth-child(2)",
    "#envoy-mobile a [class*='count']",
    "a[href*='yorumlar'] span",
];

/// Review list root on the /yorumlar page.
const REVIEW_LIST_SELECTORS: &[&str] = &[
    "#review-detail > div > div:nth-child(3)",
    "#review-detail [class*='review-list']",
];

pub struct TrendyolExtractor;

#[async_trait]
impl MarketplaceExtractor for TrendyolExtractor {
    fn site(&self) -> MarketplaceId {
        MarketplaceId::Trendyol
    }

    async fn extract_details(
        &self,
        session: &BrowserSession,
        product_url: &str,
        max_reviews: usize,
    ) -> MarketplaceDetail {
        let mut detail = MarketplaceDetail::default();

        if session.navigate(product_url).await.is_err() {
            return detail;
        }
        session.settle(5000, 7000).await;

        if let Ok(html) = session.content().await {
            let (rating, count) = parse_summary(&html);
            detail.rating = rating;
            detail.review_count = count;
        }

        // Reviews live on a dedicated sub-page
        if detail.review_count.unwrap_or(0) > 0 {
            let review_url = review_page_url(product_url);
            if session.navigate(&review_url).await.is_ok() {
                session.settle(2500, 3500).await;
                scroll_until_loaded(session, max_reviews, count_review_containers).await;
                if let Ok(html) = session.content().await {
                    detail.reviews = parse_reviews(&html, max_reviews);
                }
            }
        }

        detail
    }
}

fn parse_summary(html: &str) -> (Option<f64>, Option<u32>) {
    let doc = Html::parse_document(html);
    let rating = first_text(&doc, RATING_SELECTORS)
        .and_then(|t| parse_decimal_comma(&t))
        .filter(|r| (1.0..=5.0).contains(r));
    let count = first_text(&doc, REVIEW_COUNT_SELECTORS).and_then(|t| digits_only(&t));
    (rating, count)
}

/// The reviews page is the product URL with a `/yorumlar` suffix.
fn review_page_url(product_url: &str) -> String {
    if product_url.contains("/yorumlar") {
        product_url.to_string()
    } else {
        format!("{}/yorumlar", product_url.trim_end_matches('/'))
    }
}

fn review_list_containers(doc: &Html) -> Vec<ElementRef<'_>> {
    for raw in REVIEW_LIST_SELECTORS {
        let Ok(sel) = Selector::parse(raw) else {
            continue;
        };
        if let Some(list) = doc.select(&sel).next() {
            let containers = super::div_children(&list);
            if !containers.is_empty() {
                return containers;
            }
        }
    }
    Vec::new()
}

fn count_review_containers(html: &str) -> usize {
    let doc = Html::parse_document(html);
    review_list_containers(&doc).len()
}

fn parse_reviews(html: &str, cap: usize) -> Vec<ReviewEntry> {
    let doc = Html::parse_document(html);
    let mut reviews = Vec::new();

    for container in review_list_containers(&doc).into_iter().take(cap) {
        let Some(text) = review_text(&container) else {
            continue;
        };
        reviews.push(ReviewEntry {
            text,
            rating: Some(review_rating(&container)),
            date: review_date(&container),
        });
    }

    reviews
}

fn review_text(container: &ElementRef) -> Option<String> {
    // div[1]/div[2]/div/span holds the comment body
    if let Some(region) = div_path(*container, &[0, 1]) {
        let span_sel = Selector::parse("span").unwrap();
        if let Some(span) = region.select(&span_sel).next() {
            let text = element_text(&span);
            if text.len() >= MIN_REVIEW_LEN {
                return Some(text);
            }
        }
    }
    longest_text(container, MIN_REVIEW_LEN)
}

/// Filled stars carry a "full" class; when the star row cannot be found
/// at all, the rating defaults to 5 (the page hides the row for some
/// all-positive reviews).
fn review_rating(container: &ElementRef) -> u8 {
    let full_sel = Selector::parse("div[class*='full']").unwrap();
    let filled = container.select(&full_sel).count();
    stars::rating_from_count(filled).unwrap_or(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_parses_comma_decimal_rating() {
        let html = r#"<html><body><div id="envoy-mobile"><div><div>
            <div><a href="/p/yorumlar">
                <div><span>4,3</span></div>
                <div>256 Değerlendirme</div>
            </a></div>
        </div></div></div></body></html>"#;
        let (rating, count) = parse_summary(html);
        assert_eq!(rating, Some(4.3));
        assert_eq!(count, Some(256));
    }

    #[test]
    fn review_url_suffix_is_idempotent() {
        assert_eq!(
            review_page_url("https://www.trendyol.com/x/urun-p-1"),
            "https://www.trendyol.com/x/urun-p-1/yorumlar"
        );
        assert_eq!(
            review_page_url("https://www.trendyol.com/x/urun-p-1/yorumlar"),
            "https://www.trendyol.com/x/urun-p-1/yorumlar"
        );
    }

    fn review_div(text: &str, full_stars: usize) -> String {
        let stars: String = (0..5)
            .map(|i| {
                if i < full_stars {
                    r#"<div class="star full"></div>"#.to_string()
                } else {
                    r#"<div class="star"></div>"#.to_string()
                }
            })
            .collect();
        format!(
            r#"<div>
                <div>
                    <div>{stars}</div>
                    <div><div><span>{text}</span></div></div>
                </div>
            </div>"#
        )
    }

    #[test]
    fn reviews_count_full_star_markers() {
        let html = format!(
            r#"<html><body><div id="review-detail"><div>
                <div>header</div>
                <div>filters</div>
                <div>{}{}</div>
            </div></div></body></html>"#,
            review_div("Kargo çok hızlıydı, ürün orijinal görünüyor.", 4),
            review_div("Rengi soluk geldi, iade ettim üzgünüm.", 1),
        );
        let reviews = parse_reviews(&html, 10);
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].rating, Some(4));
        assert_eq!(reviews[1].rating, Some(1));
    }

    #[test]
    fn missing_star_row_defaults_to_five() {
        let html = format!(
            r#"<html><body><div id="review-detail"><div>
                <div>h</div><div>f</div>
                <div><div><div><div><span>Harika bir ürün, tekrar alırım kesinlikle.</span></div></div></div></div>
            </div></div></body></html>"#
        );
        let reviews = parse_reviews(&html, 10);
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].rating, Some(5));
    }
}
