//! End-to-end reconciliation scenarios over fixture listing pages.
//!
//! These drive the extraction-to-store path without a browser: the
//! aggregator parser consumes rendered-DOM fixtures and the resulting
//! offers reconcile into a temporary SQLite store.

use pricewatch::models::{MarketplaceDetail, MarketplaceId, Offer};
use pricewatch::repository::{OfferRepository, ReconcileOutcome};
use pricewatch::scrape::aggregator::parse_listing;

const BASE: &str = "https://www.akakce.com";

fn seller_row(vendor: &str, nickname: &str, price: &str) -> String {
    format!(
        r#"<li>
          <a href="/c/?p={vendor}">
            <span class="v_v8"><img alt="{vendor}" src="v.png">{nickname}</span>
            <span class="pt_v8">{price}</span>
          </a>
        </li>"#
    )
}

fn listing_page(rows: &str) -> String {
    format!(
        r#"<html><body>
        <div class="pdt_v8"><h1>Missha Güneş Kremi 50ml</h1></div>
        <ul id="PL">{rows}</ul>
        </body></html>"#
    )
}

/// Reconcile every seller row of a listing that matches `site`, the way
/// a worker does after marketplace extraction.
fn reconcile_listing(
    repo: &OfferRepository,
    html: &str,
    product_id: &str,
    site: MarketplaceId,
) -> (usize, usize) {
    let listing = parse_listing(html, BASE, 10);
    let product_name = listing.product_name.unwrap_or_else(|| product_id.to_string());

    let mut written = 0;
    let mut skipped = 0;
    for entry in listing
        .sellers
        .iter()
        .filter(|e| site.matches_vendor(&e.vendor_name, &e.outbound_link))
    {
        let offer = Offer::from_extraction(
            product_id,
            &product_name,
            Some("Gunes Kremi"),
            site,
            entry,
            MarketplaceDetail::default(),
        );
        match repo.insert_once(&offer).unwrap() {
            ReconcileOutcome::Inserted => written += 1,
            ReconcileOutcome::SkippedDuplicate => skipped += 1,
        }
    }
    (written, skipped)
}

#[test]
fn duplicate_seller_rows_collapse_to_one_offer() {
    let dir = tempfile::tempdir().unwrap();
    let repo = OfferRepository::open(&dir.path().join("offers.db")).unwrap();

    // Three rows, one of them an exact duplicate of the first
    let html = listing_page(&format!(
        "{}{}{}",
        seller_row("Hepsiburada", "", "199,90 TL"),
        seller_row("N11 Mağaza", "ABC Store", "210,00 TL"),
        seller_row("Hepsiburada", "", "199,90 TL"),
    ));

    let (written, skipped) =
        reconcile_listing(&repo, &html, "missha_krem", MarketplaceId::Hepsiburada);
    assert_eq!(written, 1);
    assert_eq!(skipped, 1);

    let offers = repo.offers_for_product("missha_krem").unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].price, 199.90);
    assert_eq!(offers[0].site, MarketplaceId::Hepsiburada);
    assert_eq!(offers[0].product_name, "Missha Güneş Kremi 50ml");
}

#[test]
fn rerunning_an_unchanged_listing_reports_all_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let repo = OfferRepository::open(&dir.path().join("offers.db")).unwrap();

    let html = listing_page(&format!(
        "{}{}",
        seller_row("Trendyol", "", "149,50 TL"),
        seller_row("Trendyol", "TY Official", "151,00 TL"),
    ));

    let first = reconcile_listing(&repo, &html, "missha_krem", MarketplaceId::Trendyol);
    assert_eq!(first, (2, 0));

    let second = reconcile_listing(&repo, &html, "missha_krem", MarketplaceId::Trendyol);
    assert_eq!(second, (0, 2));

    assert_eq!(repo.offers_for_product("missha_krem").unwrap().len(), 2);
}

#[test]
fn same_vendor_different_nicknames_stay_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let repo = OfferRepository::open(&dir.path().join("offers.db")).unwrap();

    let html = listing_page(&format!(
        "{}{}",
        seller_row("Pazarama", "ABC Store", "205,00 TL"),
        seller_row("Pazarama", "XYZ Store", "207,50 TL"),
    ));

    let (written, _) = reconcile_listing(&repo, &html, "missha_krem", MarketplaceId::Pazarama);
    assert_eq!(written, 2);

    let offers = repo.offers_for_product("missha_krem").unwrap();
    let nicknames: Vec<&str> = offers.iter().map(|o| o.seller_nickname.as_str()).collect();
    assert!(nicknames.contains(&"ABC Store"));
    assert!(nicknames.contains(&"XYZ Store"));
}

#[test]
fn offers_feed_the_analytics_context() {
    let dir = tempfile::tempdir().unwrap();
    let repo = OfferRepository::open(&dir.path().join("offers.db")).unwrap();

    let html = listing_page(&format!(
        "{}{}",
        seller_row("Hepsiburada", "", "199,90 TL"),
        seller_row("N11 Mağaza", "ABC Store", "210,00 TL"),
    ));
    reconcile_listing(&repo, &html, "missha_krem", MarketplaceId::Hepsiburada);
    reconcile_listing(&repo, &html, "missha_krem", MarketplaceId::N11);

    let offers = repo.offers_for_product("missha_krem").unwrap();
    let context = pricewatch::analytics::product_context("missha_krem", &offers, 5.0).unwrap();

    assert_eq!(context.cheapest.price, 199.90);
    assert_eq!(context.cheapest.site, MarketplaceId::Hepsiburada);
    let suggestion = context.price_suggestion.unwrap();
    assert_eq!(suggestion.min_competitor_price, 199.90);
    assert!((suggestion.suggested_price - 209.90).abs() < 0.01);
}
