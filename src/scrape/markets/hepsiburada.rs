//! Hepsiburada product page extractor.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{
    absolutize, click_text_button, div_path, element_text, first_attr, first_text, longest_text,
    review_date, scroll_until_loaded, MarketplaceExtractor, MIN_REVIEW_LEN,
};
use crate::browser::BrowserSession;
use crate::models::{MarketplaceDetail, MarketplaceId, ReviewEntry};
use crate::scrape::stars;
use crate::utils::{digits_only, parse_decimal_comma};

const ORIGIN: &str = "https://www.hepsiburada.com";

/// Aggregate rating, from the product header block.
const RATING_SELECTORS: &[&str] = &[
    "#container main section div[class*='rating'] span",
    "span[itemprop='ratingValue']",
    "[class*='rating-score'] span",
];

/// Review-count link next to the rating; its href is also the way into
/// the reviews page.
const REVIEW_LINK_SELECTORS: &[&str] = &[
    "#container main section a[href*='yorum']",
    "a[href*='-yorumlari']",
    "a[href*='degerlendirme']",
];

/// The reviews page mounts everything under this widget root.
const REVIEW_ROOT: &str = "#hermes-voltran-comments";

fn star_filter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d)\s*yıldız").unwrap())
}

fn paren_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((\d+)\)").unwrap())
}

pub struct HepsiburadaExtractor;

#[async_trait]
impl MarketplaceExtractor for HepsiburadaExtractor {
    fn site(&self) -> MarketplaceId {
        MarketplaceId::Hepsiburada
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
        session.settle(5000, 8000).await;

        let summary = match session.content().await {
            Ok(html) => parse_summary(&html),
            Err(_) => Summary::default(),
        };
        detail.rating = summary.rating;
        detail.review_count = summary.review_count;

        let cap = adaptive_review_cap(summary.review_count, max_reviews);

        // Reach the reviews page when the count element links to one;
        // otherwise the reviews (if any) are on the current page.
        if let Some(href) = summary.review_href {
            let href = absolutize(&href, ORIGIN);
            debug!("Opening reviews page {}", href);
            if session.navigate(&href).await.is_ok() {
                session.settle(3000, 5000).await;
                if let Ok(html) = session.content().await {
                    let (high, low) = parse_rating_buckets(&html);
                    detail.high_rating_count = high;
                    detail.low_rating_count = low;
                }
            }
        }

        let _ = click_text_button(session, "daha fazla").await;
        scroll_until_loaded(session, cap, count_review_containers).await;

        if let Ok(html) = session.content().await {
            detail.reviews = parse_reviews(&html, cap);
        }

        detail
    }
}

#[derive(Debug, Default)]
struct Summary {
    rating: Option<f64>,
    review_count: Option<u32>,
    review_href: Option<String>,
}

fn parse_summary(html: &str) -> Summary {
    let doc = Html::parse_document(html);

    let rating = first_text(&doc, RATING_SELECTORS)
        .and_then(|t| parse_decimal_comma(&t))
        .filter(|r| (1.0..=5.0).contains(r));

    let review_count = first_text(&doc, REVIEW_LINK_SELECTORS).and_then(|t| digits_only(&t));
    let review_href = first_attr(&doc, REVIEW_LINK_SELECTORS, "href");

    Summary {
        rating,
        review_count,
        review_href,
    }
}

/// Bound review collection by the page's own volume: heavily reviewed
/// products get a slightly higher cap, everything else stays small to
/// keep the scroll loop short.
fn adaptive_review_cap(total: Option<u32>, requested: usize) -> usize {
    let derived = match total {
        Some(t) if t > 1000 => 20,
        Some(t) if t > 100 => 30,
        _ => 15,
    };
    derived.min(requested.max(15)).min(100)
}

/// Review containers on the reviews page, through the fallback chain.
fn review_containers(doc: &Html) -> Vec<ElementRef<'_>> {
    let root_sel = Selector::parse(REVIEW_ROOT).unwrap();
    let Some(root) = doc.select(&root_sel).next() else {
        return Vec::new();
    };

    // Primary: each top-level widget div holds the review in its third
    // div child
    let containers: Vec<ElementRef> = super::div_children(&root)
        .into_iter()
        .filter_map(|child| div_path(child, &[2]))
        .collect();
    if !containers.is_empty() {
        return containers;
    }

    for fallback in [
        "div[class*='hermes-ReviewCard-module']",
        "div[class*='review'], div[class*='Review'], div[class*='comment']",
    ] {
        let sel = Selector::parse(fallback).unwrap();
        let found: Vec<ElementRef> = root.select(&sel).collect();
        if !found.is_empty() {
            return found;
        }
    }

    Vec::new()
}

fn count_review_containers(html: &str) -> usize {
    let doc = Html::parse_document(html);
    review_containers(&doc).len()
}

fn parse_reviews(html: &str, cap: usize) -> Vec<ReviewEntry> {
    let doc = Html::parse_document(html);
    let mut reviews = Vec::new();

    for container in review_containers(&doc).into_iter().take(cap) {
        let Some(text) = review_text(&container) else {
            continue;
        };
        reviews.push(ReviewEntry {
            text,
            rating: review_rating(&container),
            date: review_date(&container),
        });
    }

    reviews
}

/// Review body: structural path first, then progressively looser text
/// probes inside the same region, then anywhere in the container.
fn review_text(container: &ElementRef) -> Option<String> {
    if let Some(node) = div_path(*container, &[1, 1, 1]) {
        let text = element_text(&node);
        if text.len() >= MIN_REVIEW_LEN {
            return Some(text);
        }
        if let Some(text) = longest_text(&node, MIN_REVIEW_LEN) {
            return Some(text);
        }
    }
    if let Some(region) = div_path(*container, &[1, 1]) {
        if let Some(text) = longest_text(&region, MIN_REVIEW_LEN) {
            return Some(text);
        }
    }
    longest_text(container, MIN_REVIEW_LEN)
}

/// Per-review star rating: count filled star indicators, then fall back
/// to a digit in the rating region's text.
fn review_rating(container: &ElementRef) -> Option<u8> {
    let star_sel = Selector::parse("[class*='star'], svg").unwrap();
    if let Some(rating) = stars::count_filled(container, &star_sel) {
        return Some(rating);
    }

    let region = div_path(*container, &[1, 1, 0])?;
    let leaf_sel = Selector::parse("div").unwrap();
    let filled = region.select(&leaf_sel).filter(stars::is_filled_star).count();
    if let Some(rating) = stars::rating_from_count(filled) {
        return Some(rating);
    }

    element_text(&region)
        .chars()
        .find(|c| ('1'..='5').contains(c))
        .and_then(|c| c.to_digit(10))
        .map(|d| d as u8)
}

/// Star-filter buckets on the reviews page: 4-5 stars counted as high,
/// 1-2 as low. The counts sit in parentheses in the filter labels.
fn parse_rating_buckets(html: &str) -> (Option<u32>, Option<u32>) {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(
        "button[aria-label*='yıldız'], div[aria-label*='yıldız'], \
         [class*='rating'] button, [class*='filter'] button",
    )
    .unwrap();

    let mut high = 0u32;
    let mut low = 0u32;
    for el in doc.select(&sel) {
        let label = el.value().attr("aria-label").unwrap_or("");
        let text = element_text(&el);
        let haystack = format!("{} {}", label, text);

        let Some(star_num) = star_filter_re()
            .captures(&haystack)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            continue;
        };
        let Some(count) = paren_count_re()
            .captures(&haystack)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            continue;
        };

        if star_num >= 4 {
            high += count;
        } else if star_num <= 2 {
            low += count;
        }
    }

    (
        (high > 0).then_some(high),
        (low > 0).then_some(low),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_parses_rating_count_and_href() {
        let html = r#"<html><body><div id="container"><main><section>
            <div class="rating-wrapper"><span>4,6</span></div>
            <a href="/urun-yorumlari">1.204 Değerlendirme</a>
        </section></main></div></body></html>"#;
        let summary = parse_summary(html);
        assert_eq!(summary.rating, Some(4.6));
        assert_eq!(summary.review_count, Some(1204));
        assert_eq!(summary.review_href.as_deref(), Some("/urun-yorumlari"));
    }

    #[test]
    fn missing_rating_leaves_count_intact() {
        let html = r#"<html><body><div id="container"><main><section>
            <a href="/urun-yorumlari">87 Değerlendirme</a>
        </section></main></div></body></html>"#;
        let summary = parse_summary(html);
        assert_eq!(summary.rating, None);
        assert_eq!(summary.review_count, Some(87));
    }

    #[test]
    fn adaptive_cap_tracks_review_volume() {
        assert_eq!(adaptive_review_cap(Some(5000), 20), 20);
        assert_eq!(adaptive_review_cap(Some(500), 40), 30);
        assert_eq!(adaptive_review_cap(Some(50), 20), 15);
        assert_eq!(adaptive_review_cap(None, 20), 15);
    }

    fn review_card(text: &str, filled: usize) -> String {
        let stars: String = (0..5)
            .map(|i| {
                if i < filled {
                    r#"<div class="star-filled"></div>"#.to_string()
                } else {
                    r#"<div class="star-empty"></div>"#.to_string()
                }
            })
            .collect();
        format!(
            r#"<div>
                <div>header</div>
                <div>
                    <div>meta</div>
                    <div>
                        <div><div>{stars}</div></div>
                        <div>score</div>
                        <div>{text}</div>
                    </div>
                </div>
                <div>
                    <div>avatar</div>
                    <div>
                        <div>meta</div>
                        <div>
                            <div><div>{stars}</div></div>
                            <div>{text}</div>
                        </div>
                    </div>
                    <time datetime="2024-03-12"></time>
                </div>
            </div>"#
        )
    }

    #[test]
    fn reviews_are_collected_with_ratings() {
        let html = format!(
            r#"<html><body><div id="hermes-voltran-comments">{}{}</div></body></html>"#,
            review_card("Ürün gayet güzel, kargo hızlı geldi. Tavsiye ederim.", 5),
            review_card("Beklediğim gibi çıkmadı, kutusu ezikti maalesef.", 2),
        );
        let reviews = parse_reviews(&html, 10);
        assert_eq!(reviews.len(), 2);
        assert!(reviews[0].text.contains("Tavsiye ederim"));
        assert_eq!(reviews[0].rating, Some(5));
        assert_eq!(reviews[1].rating, Some(2));
        assert_eq!(reviews[0].date.as_deref(), Some("2024-03-12"));
    }

    #[test]
    fn short_reviews_are_dropped() {
        let html = format!(
            r#"<html><body><div id="hermes-voltran-comments">{}</div></body></html>"#,
            review_card("ok", 4),
        );
        assert!(parse_reviews(&html, 10).is_empty());
    }

    #[test]
    fn rating_buckets_sum_high_and_low() {
        let html = r#"<html><body>
            <button aria-label="5 yıldız">5 yıldız (120)</button>
            <button aria-label="4 yıldız">4 yıldız (40)</button>
            <button aria-label="3 yıldız">3 yıldız (10)</button>
            <button aria-label="2 yıldız">2 yıldız (5)</button>
            <button aria-label="1 yıldız">1 yıldız (7)</button>
        </body></html>"#;
        let (high, low) = parse_rating_buckets(html);
        assert_eq!(high, Some(160));
        assert_eq!(low, Some(12));
    }

    #[test]
    fn bucket_parse_handles_missing_filters() {
        let (high, low) = parse_rating_buckets("<html><body><p>yok</p></body></html>");
        assert_eq!(high, None);
        assert_eq!(low, None);
    }
}
