//! Marketplace detail extractors.
//!
//! One variant per marketplace, all behind `MarketplaceExtractor`. Every
//! variant follows the same skeleton: navigate, settle, read the
//! aggregate rating and review count, reach the reviews section, scroll
//! lazy-loaded content in, then collect review texts and star ratings.
//! Each field is attempted through an ordered fallback locator chain and
//! fails independently - partial extraction is a normal outcome, and the
//! only way to get an entirely empty result is a page that never loads.

mod hepsiburada;
mod n11;
mod pazarama;
mod pttavm;
mod trendyol;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::browser::BrowserSession;
use crate::models::{MarketplaceDetail, MarketplaceId};

pub use hepsiburada::HepsiburadaExtractor;
pub use n11::N11Extractor;
pub use pazarama::PazaramaExtractor;
pub use pttavm::PttavmExtractor;
pub use trendyol::TrendyolExtractor;

/// Reviews shorter than this are noise (emoji-only, "ok", etc).
pub(crate) const MIN_REVIEW_LEN: usize = 10;

/// Extracts rating/review facts from one marketplace's product pages.
#[async_trait]
pub trait MarketplaceExtractor: Send + Sync {
    fn site(&self) -> MarketplaceId;

    /// Best-effort extraction; never fails, only degrades.
    async fn extract_details(
        &self,
        session: &BrowserSession,
        product_url: &str,
        max_reviews: usize,
    ) -> MarketplaceDetail;
}

/// Dispatch to the variant that knows this marketplace's page structure.
pub fn extractor_for(site: MarketplaceId) -> Box<dyn MarketplaceExtractor> {
    match site {
        MarketplaceId::Hepsiburada => Box::new(HepsiburadaExtractor),
        MarketplaceId::Trendyol => Box::new(TrendyolExtractor),
        MarketplaceId::N11 => Box::new(N11Extractor),
        MarketplaceId::Pttavm => Box::new(PttavmExtractor),
        MarketplaceId::Pazarama => Box::new(PazaramaExtractor),
    }
}

// ---------------------------------------------------------------------------
// Shared locator helpers used by every variant
// ---------------------------------------------------------------------------

/// Direct `<div>` children of an element, in document order.
pub(crate) fn div_children<'a>(el: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "div")
        .collect()
}

/// Descend a chain of direct-div-child indices (0-based), mirroring the
/// structural paths the marketplaces' frontends emit.
pub(crate) fn div_path<'a>(el: ElementRef<'a>, path: &[usize]) -> Option<ElementRef<'a>> {
    let mut current = el;
    for &idx in path {
        current = div_children(&current).into_iter().nth(idx)?;
    }
    Some(current)
}

/// Whitespace-collapsed text content of an element.
pub(crate) fn element_text(el: &ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Try an ordered selector chain against the document; first non-empty
/// text wins.
pub(crate) fn first_text(doc: &Html, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let Ok(sel) = Selector::parse(raw) else {
            continue;
        };
        if let Some(el) = doc.select(&sel).next() {
            let text = element_text(&el);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// First attribute value found through an ordered selector chain.
pub(crate) fn first_attr(doc: &Html, selectors: &[&str], attr: &str) -> Option<String> {
    for raw in selectors {
        let Ok(sel) = Selector::parse(raw) else {
            continue;
        };
        if let Some(value) = doc
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr(attr))
        {
            return Some(value.to_string());
        }
    }
    None
}

/// Resolve a possibly-relative href against a marketplace origin.
pub(crate) fn absolutize(href: &str, origin: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}{}", origin.trim_end_matches('/'), href)
    }
}

/// Loosest text fallback: the longest text-bearing descendant. Page
/// structures vary even between listings of the same site, so when the
/// structural locators miss, the review body is usually still the
/// longest text node in the container.
pub(crate) fn longest_text(el: &ElementRef, min_len: usize) -> Option<String> {
    let sel = Selector::parse("span, p, div").unwrap();
    el.select(&sel)
        .map(|e| element_text(&e))
        .filter(|t| t.len() >= min_len)
        .max_by_key(String::len)
}

/// Optional review date from the usual suspects.
pub(crate) fn review_date(container: &ElementRef) -> Option<String> {
    let sel = Selector::parse("time, span[class*='date'], div[class*='date']").unwrap();
    let el = container.select(&sel).next()?;
    let text = element_text(&el);
    if !text.is_empty() {
        return Some(text);
    }
    el.value().attr("datetime").map(|s| s.to_string())
}

/// Click the first button/anchor whose text contains `needle`
/// (case-insensitive). CSS cannot match on text, so this goes through the
/// page's own DOM.
pub(crate) async fn click_text_button(session: &BrowserSession, needle: &str) -> bool {
    let script = format!(
        r#"(() => {{
            const els = [...document.querySelectorAll('button, a')];
            const el = els.find(e => e.textContent.toLowerCase().includes('{}'));
            if (el) {{ el.click(); return true; }}
            return false;
        }})()"#,
        needle.to_lowercase()
    );
    session.evaluate_bool(&script).await
}

/// Scroll in increments until enough review containers are visible or
/// the scroll height plateaus (no new lazy-loaded content).
pub(crate) async fn scroll_until_loaded<F>(
    session: &BrowserSession,
    max_reviews: usize,
    count_visible: F,
) where
    F: Fn(&str) -> usize,
{
    // "Load more" gates come before any lazy loading on some sites
    let _ = click_text_button(session, "daha fazla").await;

    let mut positions: Vec<i64> = vec![300, 600, 900, 1200, 1500];
    if max_reviews > 10 {
        positions.extend([1800, 2100]);
    }
    if max_reviews > 20 {
        positions.extend([2400, 2700]);
    }

    for y in positions {
        if session.scroll_to(y).await.is_err() {
            return;
        }
        session.settle(1000, 1500).await;
        if let Ok(html) = session.content().await {
            if count_visible(&html) >= max_reviews {
                return;
            }
        }
    }

    // Bottom-scroll until the height stops growing
    let mut last_height = session.scroll_height().await.unwrap_or(0);
    for _ in 0..3 {
        if let Ok(html) = session.content().await {
            if count_visible(&html) >= max_reviews {
                break;
            }
        }
        if session.scroll_to_bottom().await.is_err() {
            break;
        }
        session.settle(1500, 2000).await;
        let new_height = session.scroll_height().await.unwrap_or(last_height);
        if new_height == last_height {
            // Plateau: one more chance via a load-more button, else stop
            if !click_text_button(session, "daha fazla").await {
                break;
            }
        }
        last_height = new_height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_path_descends_structural_markup() {
        let doc = Html::parse_fragment(
            r#"<div id="root">
                <div>a</div>
                <div>
                    <span>noise</span>
                    <div>b0</div>
                    <div><div>target</div></div>
                </div>
            </div>"#,
        );
        let root_sel = Selector::parse("#root").unwrap();
        let root = doc.select(&root_sel).next().unwrap();

        let target = div_path(root, &[1, 1, 0]).unwrap();
        assert_eq!(element_text(&target), "target");
        assert!(div_path(root, &[5]).is_none());
    }

    #[test]
    fn longest_text_prefers_the_review_body() {
        let doc = Html::parse_fragment(
            r#"<div id="c">
                <span>4,5</span>
                <div><p>Ürün gayet güzel, kargo hızlı geldi. Tavsiye ederim.</p></div>
                <span>12 Mart 2024</span>
            </div>"#,
        );
        let sel = Selector::parse("#c").unwrap();
        let el = doc.select(&sel).next().unwrap();
        let text = longest_text(&el, MIN_REVIEW_LEN).unwrap();
        assert!(text.contains("Tavsiye ederim"));
    }

    #[test]
    fn review_date_falls_back_to_datetime_attr() {
        let doc = Html::parse_fragment(r#"<div id="c"><time datetime="2024-03-12"></time></div>"#);
        let sel = Selector::parse("#c").unwrap();
        let el = doc.select(&sel).next().unwrap();
        assert_eq!(review_date(&el).as_deref(), Some("2024-03-12"));
    }
}
