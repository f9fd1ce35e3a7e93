//! Task expansion: one task per (product, marketplace) pair.

use std::collections::HashSet;

use tracing::info;

use super::ScrapeTask;
use crate::browser::BrowserSession;
use crate::config::Settings;
use crate::models::{MarketplaceId, ProductTarget};
use crate::scrape::{aggregator, ScrapeError};

/// Pure expansion: one task per requested marketplace, no filtering.
pub fn expand(
    target: &ProductTarget,
    sites: &[MarketplaceId],
    max_reviews: usize,
) -> Vec<ScrapeTask> {
    sites
        .iter()
        .map(|&site| ScrapeTask::from_target(target, site, max_reviews))
        .collect()
}

/// Expansion with an availability pre-check: fetch the aggregator listing
/// once and emit tasks only for marketplaces that actually appear among
/// the product's sellers. Saves whole browser sessions on sites where the
/// product is not sold.
pub async fn expand_available(
    target: &ProductTarget,
    sites: &[MarketplaceId],
    settings: &Settings,
) -> Result<Vec<ScrapeTask>, ScrapeError> {
    let session = BrowserSession::launch(&settings.browser).await?;
    let result = aggregator::extract(&session, &target.url, &settings.aggregator).await;
    session.close().await;
    let listing = result?;

    let present: HashSet<MarketplaceId> = listing
        .sellers
        .iter()
        .flat_map(|entry| {
            sites
                .iter()
                .copied()
                .filter(|site| site.matches_vendor(&entry.vendor_name, &entry.outbound_link))
        })
        .collect();

    let tasks: Vec<ScrapeTask> = sites
        .iter()
        .filter(|site| present.contains(*site))
        .map(|&site| ScrapeTask::from_target(target, site, settings.scrape.max_reviews))
        .collect();

    info!(
        "'{}' is listed on {}/{} marketplaces",
        target.product_name,
        tasks.len(),
        sites.len()
    );
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_task_per_site_in_order() {
        let target = ProductTarget::new("p1", "Product", None, "https://www.akakce.com/p.html");
        let tasks = expand(&target, MarketplaceId::all(), 20);

        assert_eq!(tasks.len(), 5);
        assert_eq!(tasks[0].target_site, MarketplaceId::Hepsiburada);
        assert_eq!(tasks[4].target_site, MarketplaceId::Pazarama);
        assert!(tasks.iter().all(|t| t.product_id == "p1"));
    }

    #[test]
    fn expansion_is_pure() {
        let target = ProductTarget::new("p1", "Product", None, "https://www.akakce.com/p.html");
        let a = expand(&target, MarketplaceId::all(), 20);
        let b = expand(&target, MarketplaceId::all(), 20);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.product_id, y.product_id);
            assert_eq!(x.target_site, y.target_site);
        }
    }
}
