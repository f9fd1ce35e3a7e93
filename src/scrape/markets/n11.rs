//! N11 product page extractor.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{
    absolutize, div_path, element_text, first_attr, first_text, longest_text, review_date,
    scroll_until_loaded, MarketplaceExtractor, MIN_REVIEW_LEN,
};
use crate::browser::BrowserSession;
use crate::models::{MarketplaceDetail, MarketplaceId, ReviewEntry};
use crate::scrape::stars;
use crate::utils::{digits_only, parse_decimal_comma};

const ORIGIN: &str = "https://www.n11.com";

const RATING_SELECTORS: &[&str] = &[
    "#unf-p-id div[class*='rating'] strong",
    "#unf-p-id strong",
    "[class*='ratingScore'] strong",
];

/// The "read reviews" link doubles as the count element.
const REVIEW_LINK_SELECTORS: &[&str] = &[
    "#readReviews span",
    "#readReviews",
    "a[href*='degerlendirmeler']",
];

/// Reviews mount under the SPA root.
const REVIEW_PARENT_SELECTORS: &[&str] = &[
    "#app > div > div:nth-child(3) > div:nth-child(2)",
    "#app [class*='reviews']",
];

pub struct N11Extractor;

#[async_trait]
impl MarketplaceExtractor for N11Extractor {
    fn site(&self) -> MarketplaceId {
        MarketplaceId::N11
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

        let mut review_href = None;
        if let Ok(html) = session.content().await {
            let summary = parse_summary(&html);
            detail.rating = summary.0;
            detail.review_count = summary.1;
            review_href = summary.2;
        }

        // Follow the reviews link when the count element is (or sits in)
        // an anchor; otherwise the reviews may already be on this page.
        if let Some(href) = review_href {
            let href = absolutize(&href, ORIGIN);
            debug!("Opening reviews page {}", href);
            if session.navigate(&href).await.is_ok() {
                session.settle(3000, 5000).await;
            }
        }

        scroll_until_loaded(session, max_reviews, count_review_containers).await;
        if let Ok(html) = session.content().await {
            detail.reviews = parse_reviews(&html, max_reviews);
        }

        detail
    }
}

fn parse_summary(html: &str) -> (Option<f64>, Option<u32>, Option<String>) {
    let doc = Html::parse_document(html);

    let rating = first_text(&doc, RATING_SELECTORS)
        .and_then(|t| parse_decimal_comma(&t))
        .filter(|r| (1.0..=5.0).contains(r));
    let count = first_text(&doc, REVIEW_LINK_SELECTORS).and_then(|t| digits_only(&t));

    // #readReviews is sometimes itself the anchor, sometimes nested in one
    let href = first_attr(
        &doc,
        &[
            "a#readReviews",
            "a[href*='degerlendirmeler']",
            "a[href*='yorum']",
        ],
        "href",
    );

    (rating, count, href)
}

/// A div counts as a review container only when it actually carries a
/// review body at the expected structural position.
fn review_containers(doc: &Html) -> Vec<ElementRef<'_>> {
    for raw in REVIEW_PARENT_SELECTORS {
        let Ok(sel) = Selector::parse(raw) else {
            continue;
        };
        let Some(parent) = doc.select(&sel).next() else {
            continue;
        };

        let containers: Vec<ElementRef> = super::div_children(&parent)
            .into_iter()
            .filter(|div| {
                container_text(div)
                    .map(|t| t.len() > MIN_REVIEW_LEN)
                    .unwrap_or(false)
            })
            .collect();
        if !containers.is_empty() {
            return containers;
        }
    }
    Vec::new()
}

fn count_review_containers(html: &str) -> usize {
    let doc = Html::parse_document(html);
    review_containers(&doc).len()
}

/// Primary structural body locator: div[2]/div[2]/span.
fn container_text(container: &ElementRef) -> Option<String> {
    let region = div_path(*container, &[1, 1])?;
    let span_sel = Selector::parse("span").unwrap();
    let span = region.select(&span_sel).next()?;
    let text = element_text(&span);
    (!text.is_empty()).then_some(text)
}

fn parse_reviews(html: &str, cap: usize) -> Vec<ReviewEntry> {
    let doc = Html::parse_document(html);
    let mut reviews = Vec::new();

    for container in review_containers(&doc).into_iter().take(cap) {
        let text = match container_text(&container) {
            Some(t) if t.len() >= MIN_REVIEW_LEN => t,
            _ => match longest_text(&container, MIN_REVIEW_LEN) {
                Some(t) => t,
                None => continue,
            },
        };
        reviews.push(ReviewEntry {
            text,
            rating: review_rating(&container),
            date: review_date(&container),
        });
    }

    reviews
}

/// Star icons live in div[2]/div[1]; filled ones are marked by class.
fn review_rating(container: &ElementRef) -> Option<u8> {
    let region = div_path(*container, &[1, 0]).unwrap_or(*container);
    let star_sel = Selector::parse(
        "i[class*='star'], span[class*='star'], svg[class*='star'], div[class*='star']",
    )
    .unwrap();

    let stars_found: Vec<ElementRef> = region.select(&star_sel).collect();
    if stars_found.is_empty() {
        return None;
    }

    let filled = stars_found
        .iter()
        .filter(|el| {
            let class = el.value().attr("class").unwrap_or("").to_lowercase();
            class.contains("fill") || class.contains("active") || class.contains("text-orange")
        })
        .count();
    if let Some(rating) = stars::rating_from_count(filled) {
        return Some(rating);
    }

    // All-star-markup with no fill markers: fall back to the generic
    // heuristics before giving up
    let filled = stars_found.iter().filter(|el| stars::is_filled_star(el)).count();
    stars::rating_from_count(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reads_rating_and_review_link() {
        let html = r#"<html><body><div id="unf-p-id">
            <div class="rating-box"><strong>4,2</strong></div>
        </div>
        <a id="readReviews" href="/urun/degerlendirmeler"><span>310 Değerlendirme</span></a>
        </body></html>"#;
        let (rating, count, href) = parse_summary(html);
        assert_eq!(rating, Some(4.2));
        assert_eq!(count, Some(310));
        assert_eq!(href.as_deref(), Some("/urun/degerlendirmeler"));
    }

    fn review_div(text: &str, filled: usize) -> String {
        let stars: String = (0..5)
            .map(|i| {
                if i < filled {
                    r#"<span class="star star-fill"></span>"#.to_string()
                } else {
                    r#"<span class="star"></span>"#.to_string()
                }
            })
            .collect();
        format!(
            r#"<div>
                <div>user</div>
                <div>
                    <div><div>{stars}</div></div>
                    <div><span>{text}</span></div>
                </div>
            </div>"#
        )
    }

    #[test]
    fn containers_require_a_review_body() {
        let html = format!(
            r#"<html><body><div id="app"><div>
                <div>header</div>
                <div>nav</div>
                <div>
                    <div>banner</div>
                    <div>
                        {}<div><div>ad</div></div>{}
                    </div>
                </div>
            </div></div></body></html>"#,
            review_div("Güzel ürün, iki gün içinde elime ulaştı.", 5),
            review_div("Fiyatına göre performansı idare eder diyebilirim.", 3),
        );
        let reviews = parse_reviews(&html, 10);
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].rating, Some(5));
        assert_eq!(reviews[1].rating, Some(3));
        assert!(reviews[0].text.contains("elime ulaştı"));
    }

    #[test]
    fn partial_page_keeps_count_without_rating() {
        let html = r#"<html><body>
            <a id="readReviews" href="/d"><span>42 Değerlendirme</span></a>
        </body></html>"#;
        let (rating, count, _) = parse_summary(html);
        assert_eq!(rating, None);
        assert_eq!(count, Some(42));
    }
}
