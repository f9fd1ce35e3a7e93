//! Product discovery: the targets file and aggregator category scans.
//!
//! `targets.json` is the discovery input/output file: a JSON array of
//! tracked products, de-duplicated by `product_id` across runs. A
//! missing or corrupt file is pipeline-fatal at scrape startup, so those
//! errors surface here instead of inside workers.

use std::path::Path;

use anyhow::Context;
use scraper::{Html, Selector};
use tracing::{info, warn};

use crate::browser::BrowserSession;
use crate::config::Settings;
use crate::models::ProductTarget;
use crate::scrape::ScrapeError;
use crate::utils::slugify_product_id;

/// An aggregator category listing to harvest product targets from.
#[derive(Debug, Clone)]
pub struct CategoryPage {
    pub name: String,
    pub url: String,
}

/// Categories scanned when none are configured.
pub fn default_categories() -> Vec<CategoryPage> {
    [
        ("Gunes Kremi", "https://www.akakce.com/gunes-kremi.html"),
        ("Kahve Makinesi", "https://www.akakce.com/turk-kahve-makinesi.html"),
        ("Deterjan", "https://www.akakce.com/toz-deterjan.html"),
    ]
    .into_iter()
    .map(|(name, url)| CategoryPage {
        name: name.to_string(),
        url: url.to_string(),
    })
    .collect()
}

/// Load the targets file. Missing or corrupt files abort the run.
pub fn load_targets(path: &Path) -> anyhow::Result<Vec<ProductTarget>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("targets file {} is unreadable", path.display()))?;
    let targets: Vec<ProductTarget> = serde_json::from_str(&raw)
        .with_context(|| format!("targets file {} is corrupt", path.display()))?;
    Ok(targets)
}

pub fn save_targets(path: &Path, targets: &[ProductTarget]) -> anyhow::Result<()> {
    let raw = serde_json::to_string_pretty(targets)?;
    std::fs::write(path, raw)
        .with_context(|| format!("cannot write targets file {}", path.display()))?;
    Ok(())
}

/// Add one product, de-duplicated by id. A missing file starts empty.
/// Returns whether the product was new.
pub fn add_target(path: &Path, target: ProductTarget) -> anyhow::Result<bool> {
    let mut targets = if path.exists() {
        load_targets(path)?
    } else {
        Vec::new()
    };

    if targets.iter().any(|t| t.product_id == target.product_id) {
        return Ok(false);
    }
    targets.push(target);
    save_targets(path, &targets)?;
    Ok(true)
}

/// Scan category pages for products and rewrite the targets file with
/// what was found.
pub async fn discover(
    settings: &Settings,
    categories: &[CategoryPage],
    per_category: usize,
) -> Result<Vec<ProductTarget>, ScrapeError> {
    let session = BrowserSession::launch(&settings.browser).await?;
    let mut targets: Vec<ProductTarget> = Vec::new();

    for category in categories {
        info!("Scanning category '{}'", category.name);
        if let Err(e) = session.navigate(&category.url).await {
            warn!("Category page {} did not load: {}", category.url, e);
            continue;
        }
        session.settle(5000, 7000).await;
        // One scroll is enough to materialize the card grid
        let _ = session.scroll_to(1000).await;
        session.settle(1500, 2500).await;

        match session.content().await {
            Ok(html) => {
                let found = parse_category_products(
                    &html,
                    &settings.aggregator.base_url,
                    &category.name,
                    per_category,
                );
                info!("Category '{}' yielded {} products", category.name, found.len());
                for target in found {
                    if !targets.iter().any(|t| t.product_id == target.product_id) {
                        targets.push(target);
                    }
                }
            }
            Err(e) => warn!("Could not snapshot category page: {}", e),
        }

        // Pace between categories
        session.settle(3000, 5000).await;
    }

    session.close().await;
    Ok(targets)
}

/// Parse product cards (`li.pd_v8`) out of a category listing.
pub fn parse_category_products(
    html: &str,
    base_url: &str,
    category: &str,
    cap: usize,
) -> Vec<ProductTarget> {
    let doc = Html::parse_document(html);
    let card_sel = Selector::parse("li.pd_v8").unwrap();
    let name_sel = Selector::parse("h3").unwrap();
    let link_sel = Selector::parse("a").unwrap();

    let mut targets = Vec::new();
    for card in doc.select(&card_sel).take(cap) {
        let Some(name) = card.select(&name_sel).next().map(|h3| {
            h3.text().collect::<String>().trim().to_string()
        }) else {
            continue;
        };
        let Some(href) = card
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        if name.is_empty() || href.is_empty() {
            continue;
        }

        let url = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{}{}", base_url.trim_end_matches('/'), href)
        };
        let product_id = slugify_product_id(&name);
        if product_id.is_empty() {
            continue;
        }

        targets.push(ProductTarget::new(&product_id, &name, Some(category), &url));
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_cards_become_targets() {
        let html = r#"<html><body><ul>
            <li class="pd_v8"><a href="/missha-krem.html"><h3>Missha Güneş Kremi</h3></a></li>
            <li class="pd_v8"><a href="https://www.akakce.com/nivea.html"><h3>Nivea Sun SPF50</h3></a></li>
            <li class="pd_v8"><a href="/no-name.html"></a></li>
        </ul></body></html>"#;
        let targets = parse_category_products(html, "https://www.akakce.com", "Gunes Kremi", 10);

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].product_id, "missha_güneş_kremi");
        assert_eq!(targets[0].url, "https://www.akakce.com/missha-krem.html");
        assert_eq!(targets[1].url, "https://www.akakce.com/nivea.html");
        assert_eq!(targets[0].category.as_deref(), Some("Gunes Kremi"));
    }

    #[test]
    fn targets_file_roundtrip_and_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");

        let t1 = ProductTarget::new("p1", "One", None, "https://www.akakce.com/1.html");
        assert!(add_target(&path, t1.clone()).unwrap());
        assert!(!add_target(&path, t1).unwrap());
        assert!(add_target(
            &path,
            ProductTarget::new("p2", "Two", None, "https://www.akakce.com/2.html")
        )
        .unwrap());

        let loaded = load_targets(&path).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn corrupt_targets_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_targets(&path).is_err());
    }
}
