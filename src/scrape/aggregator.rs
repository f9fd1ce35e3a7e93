//! Aggregator listing extractor.
//!
//! Pulls the product name and the seller rows (vendor, nickname, price,
//! outbound link) from a price-comparison listing page. The page is
//! rendered in the task's browser session, then parsed from a DOM
//! snapshot so the row extraction itself stays pure and testable.

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::ScrapeError;
use crate::browser::BrowserSession;
use crate::config::AggregatorSettings;
use crate::models::RawSellerEntry;
use crate::utils::clean_and_parse_price;

/// Vendor shown when the seller row carries no usable vendor image.
const UNKNOWN_VENDOR: &str = "Bilinmiyor";

/// Parsed aggregator listing page.
#[derive(Debug, Clone, Default)]
pub struct AggregatorListing {
    /// Canonical product name from the listing header, when present.
    pub product_name: Option<String>,
    pub sellers: Vec<RawSellerEntry>,
}

/// Navigate to the listing page and extract its seller rows.
///
/// A listing without a recognizable seller container yields zero sellers,
/// not an error; the caller decides how to report that.
pub async fn extract(
    session: &BrowserSession,
    url: &str,
    settings: &AggregatorSettings,
) -> Result<AggregatorListing, ScrapeError> {
    session.navigate(url).await.map_err(|e| {
        ScrapeError::AggregatorTimeout(format!("listing page {} did not load: {}", url, e))
    })?;

    let found = session
        .wait_for_selector("ul#PL", Duration::from_secs(settings.wait_secs))
        .await;
    if !found {
        warn!("Seller list container did not appear on {}", url);
    }
    // Let async seller widgets settle before snapshotting
    session.settle(3000, 5000).await;

    let html = session.content().await?;
    Ok(parse_listing(&html, &settings.base_url, settings.seller_cap))
}

/// Parse a rendered listing document.
pub fn parse_listing(html: &str, base_url: &str, cap: usize) -> AggregatorListing {
    let document = Html::parse_document(html);

    let name_sel = Selector::parse("div.pdt_v8 h1").unwrap();
    let product_name = document
        .select(&name_sel)
        .next()
        .map(|h1| collapse_text(&h1))
        .filter(|s| !s.is_empty());

    let list_sel = Selector::parse("ul#PL").unwrap();
    let Some(seller_list) = document.select(&list_sel).next() else {
        debug!("No seller list container in document");
        return AggregatorListing {
            product_name,
            sellers: Vec::new(),
        };
    };

    let row_sel = Selector::parse("li").unwrap();
    let mut sellers = Vec::new();
    for row in seller_list.select(&row_sel).take(cap) {
        match parse_seller_row(&row, base_url) {
            Some(entry) => sellers.push(entry),
            // A malformed row skips only itself
            None => debug!("Skipping unparseable seller row"),
        }
    }

    AggregatorListing {
        product_name,
        sellers,
    }
}

/// Extract one seller row. Returns None when the row has no vendor cell
/// or its price does not parse to a positive value.
fn parse_seller_row(row: &ElementRef, base_url: &str) -> Option<RawSellerEntry> {
    let price_sel = Selector::parse("span.pt_v8").unwrap();
    let vendor_sel = Selector::parse("span.v_v8").unwrap();
    let img_sel = Selector::parse("img").unwrap();
    let link_sel = Selector::parse("a").unwrap();

    let price_text = row
        .select(&price_sel)
        .next()
        .map(|el| collapse_text(&el))
        .unwrap_or_default();
    let price = clean_and_parse_price(&price_text);
    if price <= 0.0 {
        return None;
    }

    let vendor_cell = row.select(&vendor_sel).next()?;

    let vendor_name = vendor_cell
        .select(&img_sel)
        .next()
        .and_then(|img| img.value().attr("alt"))
        .map(|alt| alt.replace('/', "").trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_VENDOR.to_string());

    let seller_nickname = extract_nickname(&collapse_text(&vendor_cell), &vendor_name);

    let link = row
        .select(&link_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .unwrap_or("#");
    let outbound_link = if link.starts_with("http") {
        link.to_string()
    } else {
        format!("{}{}", base_url.trim_end_matches('/'), link)
    };

    Some(RawSellerEntry {
        vendor_name,
        seller_nickname,
        price,
        outbound_link,
    })
}

/// The nickname is whatever text remains in the vendor cell once the
/// vendor name itself is removed. Identical values mean "no nickname".
fn extract_nickname(cell_text: &str, vendor_name: &str) -> String {
    let nickname = if let Some(rest) = cell_text.strip_prefix(vendor_name) {
        rest.trim().to_string()
    } else if cell_text.contains(vendor_name) {
        cell_text.replacen(vendor_name, "", 1).trim().to_string()
    } else {
        cell_text.trim().to_string()
    };

    if nickname == vendor_name {
        String::new()
    } else {
        nickname
    }
}

/// Join an element's text nodes with single spaces.
fn collapse_text(el: &ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.akakce.com";

    fn listing_html(rows: &str) -> String {
        format!(
            r#"<html><body>
            <div class="pdt_v8"><h1>Missha Güneş Kremi 50ml</h1></div>
            <ul id="PL">{}</ul>
            </body></html>"#,
            rows
        )
    }

    fn row(vendor: &str, nickname: &str, price: &str, href: &str) -> String {
        format!(
            r#"<li>
              <a href="{href}">
                <span class="v_v8"><img alt="{vendor}" src="v.png">{nickname}</span>
                <span class="pt_v8">{price}</span>
              </a>
            </li>"#
        )
    }

    #[test]
    fn parses_sellers_and_product_name() {
        let html = listing_html(&format!(
            "{}{}",
            row("Hepsiburada", "", "199,90 TL", "/c/?p=1"),
            row("N11", "ABC Store", "210,00 TL", "https://www.akakce.com/c/?p=2"),
        ));
        let listing = parse_listing(&html, BASE, 10);

        assert_eq!(
            listing.product_name.as_deref(),
            Some("Missha Güneş Kremi 50ml")
        );
        assert_eq!(listing.sellers.len(), 2);

        let first = &listing.sellers[0];
        assert_eq!(first.vendor_name, "Hepsiburada");
        assert_eq!(first.seller_nickname, "");
        assert_eq!(first.price, 199.90);
        assert_eq!(first.outbound_link, "https://www.akakce.com/c/?p=1");

        let second = &listing.sellers[1];
        assert_eq!(second.seller_nickname, "ABC Store");
        assert_eq!(second.price, 210.00);
    }

    #[test]
    fn zero_price_rows_are_dropped() {
        let html = listing_html(&format!(
            "{}{}",
            row("Trendyol", "", "0,00 TL", "/c/?p=1"),
            row("Trendyol", "", "fiyat yok", "/c/?p=2"),
        ));
        let listing = parse_listing(&html, BASE, 10);
        assert!(listing.sellers.is_empty());
    }

    #[test]
    fn missing_container_yields_empty_list() {
        let listing = parse_listing("<html><body><p>404</p></body></html>", BASE, 10);
        assert!(listing.sellers.is_empty());
        assert!(listing.product_name.is_none());
    }

    #[test]
    fn row_cap_is_enforced() {
        let rows: String = (0..15)
            .map(|i| row("Pazarama", &format!("Store {}", i), "99,90 TL", "/c"))
            .collect();
        let listing = parse_listing(&listing_html(&rows), BASE, 10);
        assert_eq!(listing.sellers.len(), 10);
    }

    #[test]
    fn nickname_equal_to_vendor_becomes_empty() {
        assert_eq!(extract_nickname("Hepsiburada", "Hepsiburada"), "");
        assert_eq!(extract_nickname("N11 ABC Store", "N11"), "ABC Store");
        // Vendor name not present in the cell text at all
        assert_eq!(extract_nickname("Standalone", "Pazarama"), "Standalone");
    }

    #[test]
    fn bad_rows_do_not_abort_siblings() {
        let html = listing_html(&format!(
            "{}<li><span class=\"pt_v8\">149,00 TL</span></li>{}",
            row("Hepsiburada", "", "199,90 TL", "/a"),
            row("N11", "", "205,00 TL", "/b"),
        ));
        // Middle row has a price but no vendor cell
        let listing = parse_listing(&html, BASE, 10);
        assert_eq!(listing.sellers.len(), 2);
    }
}
