//! PttAVM product page extractor.
//!
//! Reviews live in a tab on the product page itself, so this variant
//! tries the current page first and only then clicks the comments tab.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use super::{
    click_text_button, div_path, element_text, longest_text, review_date, scroll_until_loaded,
    MarketplaceExtractor, MIN_REVIEW_LEN,
};
use crate::browser::BrowserSession;
use crate::models::{MarketplaceDetail, MarketplaceId, ReviewEntry};
use crate::scrape::stars;
use crate::utils::{digits_only, parse_decimal_comma};

/// Everything review-related hangs off the comments tab panel.
const TAB_ROOT: &str = "#tc-tab-comments";

pub struct PttavmExtractor;

#[async_trait]
impl MarketplaceExtractor for PttavmExtractor {
    fn site(&self) -> MarketplaceId {
        MarketplaceId::Pttavm
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

        if let Ok(html) = session.content().await {
            let (rating, count) = parse_summary(&html);
            detail.rating = rating;
            detail.review_count = count;
        }

        scroll_until_loaded(session, max_reviews, count_review_containers).await;
        if let Ok(html) = session.content().await {
            detail.reviews = parse_reviews(&html, max_reviews);
        }

        // Nothing visible yet: the tab probably needs an explicit click
        if detail.reviews.is_empty() {
            let clicked = session.click("a[href*='comment']").await.unwrap_or(false)
                || click_text_button(session, "yorum").await;
            if clicked {
                session.settle(2000, 4000).await;
                scroll_until_loaded(session, max_reviews, count_review_containers).await;
                if let Ok(html) = session.content().await {
                    detail.reviews = parse_reviews(&html, max_reviews);
                }
            }
        }

        detail
    }
}

fn tab_root(doc: &Html) -> Option<ElementRef<'_>> {
    let sel = Selector::parse(TAB_ROOT).unwrap();
    doc.select(&sel).next()
}

/// Aggregate rating and review count from the tab header block
/// (div[2]/div/div/div[1]/div[1]/div[2] and div[2]/div/div/div[1]/div[2]).
fn parse_summary(html: &str) -> (Option<f64>, Option<u32>) {
    let doc = Html::parse_document(html);
    let Some(root) = tab_root(&doc) else {
        return (None, None);
    };

    let rating = div_path(root, &[1, 0, 0, 0, 0, 1])
        .map(|el| element_text(&el))
        .and_then(|t| parse_decimal_comma(&t))
        .filter(|r| (1.0..=5.0).contains(r))
        .or_else(|| {
            // Looser probe: any score-looking node in the header
            let sel = Selector::parse("[class*='rating'], [class*='score']").unwrap();
            root.select(&sel)
                .map(|el| element_text(&el))
                .find_map(|t| parse_decimal_comma(&t))
                .filter(|r| (1.0..=5.0).contains(r))
        });

    let count = div_path(root, &[1, 0, 0, 0, 1])
        .map(|el| element_text(&el))
        .and_then(|t| digits_only(&t))
        .or_else(|| {
            let sel = Selector::parse("[class*='count'], [class*='total']").unwrap();
            root.select(&sel)
                .map(|el| element_text(&el))
                .find_map(|t| digits_only(&t))
        });

    (rating, count)
}

fn review_containers(doc: &Html) -> Vec<ElementRef<'_>> {
    let Some(root) = tab_root(doc) else {
        return Vec::new();
    };

    for raw in [
        "div[class*='comment-item']",
        "div[class*='comment']",
        "div[class*='review']",
    ] {
        let sel = Selector::parse(raw).unwrap();
        let found: Vec<ElementRef> = root
            .select(&sel)
            .filter(|el| longest_text(el, MIN_REVIEW_LEN).is_some())
            .collect();
        if !found.is_empty() {
            return found;
        }
    }

    // Structural fallback: the second tab block lists one div per review
    div_path(root, &[1, 0])
        .map(|list| super::div_children(&list))
        .unwrap_or_default()
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

/// Body at div/div/div[2]/div, then looser text probes.
fn review_text(container: &ElementRef) -> Option<String> {
    if let Some(node) = div_path(*container, &[0, 0, 1, 0]) {
        let text = element_text(&node);
        if text.len() >= MIN_REVIEW_LEN {
            return Some(text);
        }
    }

    let sel = Selector::parse("p, span, div[class*='comment'], div[class*='review']").unwrap();
    if let Some(text) = container
        .select(&sel)
        .map(|el| element_text(&el))
        .filter(|t| t.len() >= MIN_REVIEW_LEN)
        .max_by_key(String::len)
    {
        return Some(text);
    }

    longest_text(container, MIN_REVIEW_LEN)
}

fn review_rating(container: &ElementRef) -> Option<u8> {
    let region = div_path(*container, &[0, 0, 0, 0, 1]).unwrap_or(*container);
    let star_sel =
        Selector::parse("i[class*='star'], span[class*='star'], svg[class*='star']").unwrap();
    let stars_found: Vec<ElementRef> = region.select(&star_sel).collect();
    if stars_found.is_empty() {
        return None;
    }
    let filled = stars_found.iter().filter(|el| stars::is_filled_star(el)).count();
    stars::rating_from_count(filled)
}
