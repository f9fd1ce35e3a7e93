//! Scrape pipeline: task expansion, the bounded worker pool and the
//! per-task execution body.

pub mod expander;
pub mod orchestrator;
pub mod outcome;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use expander::{expand, expand_available};
pub use orchestrator::Orchestrator;
pub use outcome::{TaskOutcome, TaskReport, OUTCOME_SEPARATOR};

use crate::models::{MarketplaceId, ProductTarget};

fn default_max_reviews() -> usize {
    20
}

/// One (product, marketplace) unit of work.
///
/// Serialized as a JSON object and handed to the per-task subprocess as
/// a command-line argument; consumed exactly once, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeTask {
    pub product_id: String,
    pub product_name: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Aggregator listing page URL.
    pub url: String,
    #[serde(default)]
    pub collection: Option<String>,
    pub target_site: MarketplaceId,
    #[serde(default = "default_max_reviews")]
    pub max_reviews: usize,
}

impl ScrapeTask {
    pub fn from_target(target: &ProductTarget, site: MarketplaceId, max_reviews: usize) -> Self {
        Self {
            product_id: target.product_id.clone(),
            product_name: target.product_name.clone(),
            category: target.category.clone(),
            url: target.url.clone(),
            collection: Some(target.collection.clone()),
            target_site: site,
            max_reviews,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_json_matches_the_subprocess_contract() {
        let target = ProductTarget::new(
            "gunes_kremi",
            "Güneş Kremi 50ml",
            Some("Gunes Kremi"),
            "https://www.akakce.com/x.html",
        );
        let task = ScrapeTask::from_target(&target, MarketplaceId::N11, 20);
        let json = serde_json::to_string(&task).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["product_id"], "gunes_kremi");
        assert_eq!(value["target_site"], "n11");
        assert_eq!(value["collection"], "e_ticaret_offers");

        let back: ScrapeTask = serde_json::from_str(&json).unwrap();
        assert_eq!(back.target_site, MarketplaceId::N11);
    }

    #[test]
    fn max_reviews_defaults_when_absent() {
        let raw = r#"{
            "product_id": "p",
            "product_name": "P",
            "url": "https://www.akakce.com/p.html",
            "target_site": "trendyol"
        }"#;
        let task: ScrapeTask = serde_json::from_str(raw).unwrap();
        assert_eq!(task.max_reviews, 20);
    }
}
