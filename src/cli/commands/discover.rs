//! Category discovery command.

use crate::config::Settings;
use crate::discovery;

pub async fn run(settings: &Settings, per_category: usize) -> anyhow::Result<()> {
    let categories = discovery::default_categories();
    println!(
        "Scanning {} categories ({} products each)...",
        categories.len(),
        per_category
    );

    let targets = discovery::discover(settings, &categories, per_category)
        .await
        .map_err(|e| anyhow::anyhow!("discovery failed: {}", e))?;
    anyhow::ensure!(!targets.is_empty(), "discovery found no products");

    discovery::save_targets(&settings.targets_file, &targets)?;
    println!(
        "Done. {} products written to {}.",
        targets.len(),
        settings.targets_file.display()
    );
    Ok(())
}
