//! Pazarama product page extractor.
//!
//! Pazarama often renders the aggregate rating only as a star widget, so
//! this variant reconstructs the value from filled-star spans plus the
//! partial-star width when the numeric element is missing.

use async_trait::async_trait;
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

const ORIGIN: &str = "https://www.pazarama.com";

const RATING_SELECTORS: &[&str] = &[
    "#app [class*='product'] [class*='rating'] span",
    "#app [class*='score'] span",
];

const REVIEW_LINK_SELECTORS: &[&str] = &[
    "#app a[href*='yorum']",
    "#app [class*='comment'] a",
    "a[href*='degerlendirme']",
];

/// The star row widget used when no numeric rating is shown.
const STAR_WIDGET: &str = "div.flex.pointer-events-none";

/// Comments tab header on the reviews view.
const COMMENT_TAB: &str = "#product__comment__tab-header";

pub struct PazaramaExtractor;

#[async_trait]
impl MarketplaceExtractor for PazaramaExtractor {
    fn site(&self) -> MarketplaceId {
        MarketplaceId::Pazarama
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

        if let Some(href) = review_href {
            let href = absolutize(&href, ORIGIN);
            debug!("Opening reviews page {}", href);
            if session.navigate(&href).await.is_ok() {
                // The comments view takes noticeably longer to mount
                session.settle(5000, 8000).await;
            }
        } else {
            // No link: the comments tab on the product page is the way in
            let _ = session.click(COMMENT_TAB).await;
            let _ = click_text_button(session, "yorum").await;
            session.settle(2000, 3000).await;
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
        .filter(|r| (1.0..=5.0).contains(r))
        .or_else(|| star_widget_rating(&doc));

    let count = first_text(&doc, REVIEW_LINK_SELECTORS).and_then(|t| digits_only(&t));
    let href = first_attr(&doc, REVIEW_LINK_SELECTORS, "href");

    (rating, count, href)
}

/// Aggregate rating from the star row: filled stars plus the clipped
/// partial star's width fraction.
fn star_widget_rating(doc: &Html) -> Option<f64> {
    let widget_sel = Selector::parse(STAR_WIDGET).ok()?;
    let widget = doc.select(&widget_sel).next()?;

    let filled_sel = Selector::parse("span.text-orange-500").unwrap();
    let filled = widget.select(&filled_sel).count();

    let partial_sel = Selector::parse("div.rating").unwrap();
    let partial = widget
        .select(&partial_sel)
        .next()
        .and_then(|el| el.value().attr("style"))
        .and_then(stars::style_width_fraction)
        .unwrap_or(0.0);

    let total = filled as f64 + partial;
    if total > 0.0 && total <= 5.0 {
        Some((total * 100.0).round() / 100.0)
    } else {
        None
    }
}

/// Containers on the comments view, validated by the structural body
/// position (div[1]/div[2]/p).
fn review_containers(doc: &Html) -> Vec<ElementRef<'_>> {
    for raw in [
        "#app div[class*='comment-item']",
        "#app div[class*='comment']",
    ] {
        let sel = Selector::parse(raw).unwrap();
        let found: Vec<ElementRef> = doc
            .select(&sel)
            .filter(|el| container_text(el).is_some() || longest_text(el, MIN_REVIEW_LEN).is_some())
            .collect();
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

fn container_text(container: &ElementRef) -> Option<String> {
    let region = div_path(*container, &[0, 1])?;
    let p_sel = Selector::parse("p").unwrap();
    let p = region.select(&p_sel).next()?;
    let text = element_text(&p);
    (text.len() >= MIN_REVIEW_LEN).then_some(text)
}

fn parse_reviews(html: &str, cap: usize) -> Vec<ReviewEntry> {
    let doc = Html::parse_document(html);
    let mut reviews = Vec::new();

    for container in review_containers(&doc).into_iter().take(cap) {
        let text = match container_text(&container) {
            Some(t) => t,
            None => {
                let sel = Selector::parse("p, span, div[class*='comment']").unwrap();
                match container
                    .select(&sel)
                    .map(|el| element_text(&el))
                    .filter(|t| t.len() >= MIN_REVIEW_LEN)
                    .max_by_key(String::len)
                {
                    Some(t) => t,
                    None => continue,
                }
            }
        };
        reviews.push(ReviewEntry {
            text,
            rating: review_rating(&container),
            date: review_date(&container),
        });
    }

    reviews
}

/// Stars in the review header block (div[1]/div[1]).
fn review_rating(container: &ElementRef) -> Option<u8> {
    let region = div_path(*container, &[0, 0]).unwrap_or(*container);
    let star_sel = Selector::parse(
        "i[class*='star'], span[class*='star'], svg[class*='star'], span.text-orange-500",
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
            class.contains("text-orange") || stars::is_filled_star(el)
        })
        .count();
    stars::rating_from_count(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_rating_wins_over_star_widget() {
        let html = r#"<html><body><div id="app">
            <div class="product-detail"><div class="rating-area"><span>4,7</span></div></div>
            <a href="/p/yorumlar">(92) yorum</a>
        </div></body></html>"#;
        let (rating, count, href) = parse_summary(html);
        assert_eq!(rating, Some(4.7));
        assert_eq!(count, Some(92));
        assert_eq!(href.as_deref(), Some("/p/yorumlar"));
    }

    #[test]
    fn star_widget_reconstructs_partial_ratings() {
        let html = r#"<html><body><div id="app">
            <div class="flex pointer-events-none">
                <span class="text-orange-500">★</span>
                <span class="text-orange-500">★</span>
                <span class="text-orange-500">★</span>
                <span class="text-orange-500">★</span>
                <div class="rating" style="width: 60%"></div>
            </div>
        </div></body></html>"#;
        let doc = Html::parse_document(html);
        assert_eq!(star_widget_rating(&doc), Some(4.6));
    }

    fn comment(text: &str, filled: usize) -> String {
        let stars: String = (0..5)
            .map(|i| {
                if i < filled {
                    r#"<span class="star text-orange-500">★</span>"#.to_string()
                } else {
                    r#"<span class="star text-gray-300"></span>"#.to_string()
                }
            })
            .collect();
        format!(
            r#"<div class="comment-item">
                <div>
                    <div>{stars}</div>
                    <div><p>{text}</p></div>
                </div>
            </div>"#
        )
    }

    #[test]
    fn reviews_use_structural_body_locator() {
        let html = format!(
            r#"<html><body><div id="app">{}{}</div></body></html>"#,
            comment("Cilt tipime çok uygun, yapışkanlık yapmıyor.", 5),
            comment("Kokusu biraz ağır geldi, yine de kullanıyorum.", 4),
        );
        let reviews = parse_reviews(&html, 10);
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].rating, Some(5));
        assert_eq!(reviews[1].rating, Some(4));
        assert!(reviews[0].text.contains("yapışkanlık"));
    }
}
