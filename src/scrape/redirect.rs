//! Redirect resolution from aggregator outbound links to marketplace pages.
//!
//! The aggregator's redirect mechanism is not a stable contract: links
//! sometimes carry the destination in an `f=` forwarding parameter
//! (embedded in the fragment or the query string), sometimes open a new
//! tab, and sometimes need a second hop. The resolver probes each
//! observed behavior in order instead of assuming one.

use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use super::ScrapeError;
use crate::browser::BrowserSession;
use crate::config::{AggregatorSettings, BrowserSettings, ScrapeSettings};
use crate::models::MarketplaceId;

/// Domain of the aggregator itself; redirects are complete once the
/// session has left it.
const AGGREGATOR_DOMAIN: &str = "akakce.com";

/// Decode the forwarding parameter and rebuild a direct redirect URL on
/// the aggregator's own domain. Links without one pass through unchanged.
pub fn build_redirect_url(link: &str, base_url: &str) -> String {
    let Ok(parsed) = Url::parse(link) else {
        return link.to_string();
    };

    let from_query = parsed
        .query_pairs()
        .find(|(k, _)| k == "f")
        .map(|(_, v)| v.into_owned());
    let from_fragment = parsed.fragment().and_then(|frag| {
        url::form_urlencoded::parse(frag.trim_start_matches('#').as_bytes())
            .find(|(k, _)| k == "f")
            .map(|(_, v)| v.into_owned())
    });

    match from_fragment.or(from_query) {
        Some(f_param) => {
            let decoded = urlencoding::decode(&f_param)
                .map(|s| s.into_owned())
                .unwrap_or(f_param);
            let base = base_url.trim_end_matches('/');
            if decoded.starts_with('/') {
                format!("{}{}", base, decoded)
            } else {
                format!("{}/{}", base, decoded)
            }
        }
        None => link.to_string(),
    }
}

/// True once the current URL satisfies the redirect goal.
pub fn redirect_complete(current_url: &str, target_domain: &str) -> bool {
    current_url.contains(target_domain) || !current_url.contains(AGGREGATOR_DOMAIN)
}

/// Follow an outbound link until the session lands on the marketplace.
///
/// Returns the live session positioned on the resolved page together with
/// the final URL, or `None` when the marketplace was never reached - a
/// recoverable condition for the caller (the seller row is skipped).
pub async fn resolve(
    outbound_link: &str,
    site: MarketplaceId,
    browser_settings: &BrowserSettings,
    aggregator: &AggregatorSettings,
    scrape: &ScrapeSettings,
) -> Result<Option<(BrowserSession, String)>, ScrapeError> {
    let start_url = build_redirect_url(outbound_link, &aggregator.base_url);
    let target_domain = site.domain();

    let mut session = BrowserSession::launch(browser_settings).await?;

    if let Err(e) = session.navigate(&start_url).await {
        warn!("Redirect navigation failed for {}: {}", start_url, e);
        session.close().await;
        return Ok(None);
    }

    // The aggregator sometimes opens the marketplace in a new tab
    if let Err(e) = session.focus_latest_page().await {
        debug!("Tab focus failed: {}", e);
    }

    // Wait, bounded, for the redirect chain to finish
    let deadline =
        tokio::time::Instant::now() + Duration::from_secs(scrape.redirect_timeout_secs);
    loop {
        let current = session.current_url().await.unwrap_or_default();
        if redirect_complete(&current, target_domain) {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            debug!("Redirect wait timed out at {}", current);
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    session.settle(2000, 4000).await;

    let mut final_url = session.current_url().await.unwrap_or_default();

    // Still on the aggregator: look for a direct marketplace anchor as a
    // last resort
    if !final_url.contains(target_domain) && final_url.contains(AGGREGATOR_DOMAIN) {
        let anchor_sel = format!("a[href*='{}']", target_domain);
        if let Some(href) = session.find_href(&anchor_sel).await {
            info!("Found direct {} link on page, navigating", target_domain);
            if session.navigate(&href).await.is_ok() {
                let hop_deadline = tokio::time::Instant::now() + Duration::from_secs(20);
                loop {
                    final_url = session.current_url().await.unwrap_or_default();
                    if final_url.contains(target_domain)
                        || tokio::time::Instant::now() >= hop_deadline
                    {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    }

    if !final_url.contains(target_domain) {
        warn!(
            "Redirect never reached {} (final URL: {})",
            target_domain, final_url
        );
        session.close().await;
        return Ok(None);
    }

    debug!("Resolved {} -> {}", outbound_link, final_url);
    Ok(Some((session, final_url)))
}
