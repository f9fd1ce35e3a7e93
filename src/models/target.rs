//! Products tracked by the pipeline.

use serde::{Deserialize, Serialize};

/// A product to track, as stored in the targets file.
///
/// `product_id` is the de-duplication key across discovery runs. Targets
/// are never hard-deleted by the pipeline itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTarget {
    pub product_id: String,
    pub product_name: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Aggregator listing page URL.
    pub url: String,
    /// Logical namespace for the product's offers.
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "e_ticaret_offers".to_string()
}

impl ProductTarget {
    pub fn new(product_id: &str, product_name: &str, category: Option<&str>, url: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            product_name: product_name.to_string(),
            category: category.map(|s| s.to_string()),
            url: url.to_string(),
            collection: default_collection(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_defaults_when_missing() {
        let raw = r#"{
            "product_id": "gunes_kremi_50ml",
            "product_name": "Güneş Kremi 50ml",
            "category": "Gunes Kremi",
            "url": "https://www.akakce.com/x.html"
        }"#;
        let target: ProductTarget = serde_json::from_str(raw).unwrap();
        assert_eq!(target.collection, "e_ticaret_offers");
    }
}
