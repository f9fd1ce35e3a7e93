//! Targets file management.

use crate::config::Settings;
use crate::discovery;
use crate::models::ProductTarget;
use crate::repository::TargetRepository;

pub fn add(
    settings: &Settings,
    product_id: &str,
    product_name: &str,
    category: &str,
    url: &str,
) -> anyhow::Result<()> {
    let target = ProductTarget::new(product_id, product_name, Some(category), url);
    if discovery::add_target(&settings.targets_file, target)? {
        println!("'{}' added.", product_id);
        // Keep the store mirror current as well
        let repo = TargetRepository::open(&settings.database_path)?;
        let targets = discovery::load_targets(&settings.targets_file)?;
        repo.sync(&targets)?;
    } else {
        println!("'{}' is already tracked.", product_id);
    }
    Ok(())
}

pub fn list(settings: &Settings) -> anyhow::Result<()> {
    let targets = discovery::load_targets(&settings.targets_file)?;
    for target in &targets {
        println!(
            "{:30} {} [{}]",
            target.product_id,
            target.product_name,
            target.category.as_deref().unwrap_or("-")
        );
    }
    println!("{} products tracked.", targets.len());
    Ok(())
}

pub fn sync(settings: &Settings) -> anyhow::Result<()> {
    let targets = discovery::load_targets(&settings.targets_file)?;
    let repo = TargetRepository::open(&settings.database_path)?;
    let added = repo.sync(&targets)?;
    if added > 0 {
        println!("{} new products mirrored into the store.", added);
    } else {
        println!("Store is already in sync.");
    }
    Ok(())
}
