//! The batch scrape command.

use std::path::PathBuf;
use std::time::Duration;

use console::style;
use tracing::warn;

use crate::config::Settings;
use crate::discovery;
use crate::models::{MarketplaceId, ProductTarget};
use crate::pipeline::{expand, expand_available, Orchestrator, ScrapeTask, TaskOutcome};
use crate::repository::{OfferRepository, TargetRepository};

pub async fn run(
    settings: &Settings,
    config_path: Option<PathBuf>,
    new_only: bool,
    product: Option<String>,
    available_only: bool,
    sites: Vec<MarketplaceId>,
) -> anyhow::Result<()> {
    // Pipeline-fatal preconditions: targets file and store must be usable
    // before any worker starts
    let targets = discovery::load_targets(&settings.targets_file)?;
    anyhow::ensure!(
        !targets.is_empty(),
        "targets file {} lists no products",
        settings.targets_file.display()
    );

    let target_repo = TargetRepository::open(&settings.database_path)?;
    let offer_repo = OfferRepository::open(&settings.database_path)?;

    let added = target_repo.sync(&targets)?;
    if added > 0 {
        println!("{} new products mirrored into the store.", added);
    }

    let selected: Vec<ProductTarget> = if let Some(product_id) = product {
        let selected: Vec<ProductTarget> = targets
            .into_iter()
            .filter(|t| t.product_id == product_id)
            .collect();
        anyhow::ensure!(
            !selected.is_empty(),
            "product '{}' is not in the targets file",
            product_id
        );
        selected
    } else if new_only {
        let scraped = offer_repo.distinct_product_ids_with_any_scrape()?;
        let fresh: Vec<ProductTarget> = targets
            .into_iter()
            .filter(|t| !scraped.contains(&t.product_id))
            .collect();
        if fresh.is_empty() {
            println!("No new products; everything has been scraped at least once.");
            return Ok(());
        }
        println!("{} products have no offers yet:", fresh.len());
        for target in &fresh {
            println!("  - {}", target.product_name);
        }
        fresh
    } else {
        targets
    };

    let sites: Vec<MarketplaceId> = if sites.is_empty() {
        MarketplaceId::all().to_vec()
    } else {
        sites
    };

    let mut tasks: Vec<ScrapeTask> = Vec::new();
    if available_only {
        for target in &selected {
            match expand_available(target, &sites, settings).await {
                Ok(expanded) => tasks.extend(expanded),
                Err(e) => warn!(
                    "Availability pre-check failed for '{}', skipping it: {}",
                    target.product_id, e
                ),
            }
        }
    } else {
        for target in &selected {
            tasks.extend(expand(target, &sites, settings.scrape.max_reviews));
        }
    }

    if tasks.is_empty() {
        println!("Nothing to scrape.");
        return Ok(());
    }

    let slots = settings.pool.cap.min(tasks.len());
    println!(
        "Starting: {} products | {} tasks | {} slots",
        selected.len(),
        tasks.len(),
        slots
    );

    let orchestrator = Orchestrator::new(
        settings.pool.cap,
        Duration::from_secs(settings.pool.task_deadline_secs),
        config_path,
        settings.database_path.clone(),
    );
    let reports = orchestrator.run(tasks).await;

    // Always print the full per-task result list, failures included
    println!("\n{:=^60}", " RESULTS ");
    let mut succeeded = 0;
    let mut partial = 0;
    let mut failed = 0;
    for report in &reports {
        println!("{}", report.outcome.stdout_line());
        match report.outcome {
            TaskOutcome::Succeeded { .. } => succeeded += 1,
            TaskOutcome::Partial { .. } => partial += 1,
            TaskOutcome::Failed { .. } => failed += 1,
        }
    }
    println!(
        "\n{} succeeded, {} partial, {} failed",
        style(succeeded).green(),
        style(partial).yellow(),
        style(failed).red()
    );

    Ok(())
}
