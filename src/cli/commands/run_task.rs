//! Internal subprocess entry point for one scrape task.
//!
//! The parent pool reads this process's stdout; whatever happens, it
//! must see exactly one tagged outcome line between separators.

use crate::config::Settings;
use crate::pipeline::{worker, ScrapeTask, TaskOutcome, OUTCOME_SEPARATOR};

pub async fn run(settings: &Settings, payload: &str) -> anyhow::Result<()> {
    let outcome = match serde_json::from_str::<ScrapeTask>(payload) {
        Ok(task) => worker::execute(&task, settings).await,
        Err(e) => TaskOutcome::Failed {
            error: format!("invalid task payload: {}", e),
        },
    };

    println!("\n{}", OUTCOME_SEPARATOR);
    println!("{}", outcome.stdout_line());
    println!("{}\n", OUTCOME_SEPARATOR);
    Ok(())
}
