//! Per-task execution body, run inside a `run-task` subprocess.
//!
//! Owns one browser session per phase (aggregator listing, then one per
//! resolved marketplace page) and guarantees every session is closed on
//! every exit path. All failures terminate in a descriptive outcome,
//! never a propagated panic.

use tracing::{info, warn};

use super::outcome::TaskOutcome;
use super::ScrapeTask;
use crate::browser::BrowserSession;
use crate::config::Settings;
use crate::models::{Offer, RawSellerEntry};
use crate::repository::{OfferRepository, ReconcileOutcome};
use crate::scrape::{aggregator, extractor_for, redirect};

/// Execute one (product, marketplace) task end to end.
pub async fn execute(task: &ScrapeTask, settings: &Settings) -> TaskOutcome {
    let site = task.target_site;

    // Store problems are fatal before any browser work starts
    let repo = match OfferRepository::open(&settings.database_path) {
        Ok(repo) => repo,
        Err(e) => {
            return TaskOutcome::Failed {
                error: format!("{}: offer store unavailable: {}", site, e),
            }
        }
    };

    // Phase 1: aggregator listing, with its own short-lived session
    let listing = {
        let session = match BrowserSession::launch(&settings.browser).await {
            Ok(session) => session,
            Err(e) => {
                return TaskOutcome::Failed {
                    error: format!("{}: browser session could not start: {}", site, e),
                }
            }
        };
        let result = aggregator::extract(&session, &task.url, &settings.aggregator).await;
        session.close().await;
        match result {
            Ok(listing) => listing,
            Err(e) => {
                return TaskOutcome::Failed {
                    error: format!("{}: aggregator extraction failed: {}", site, e),
                }
            }
        }
    };

    let product_name = listing
        .product_name
        .clone()
        .unwrap_or_else(|| task.product_name.clone());

    if listing.sellers.is_empty() {
        return TaskOutcome::Partial {
            reason: format!(
                "{}: no sellers found on the aggregator listing for '{}'",
                site, product_name
            ),
        };
    }

    let matching: Vec<&RawSellerEntry> = listing
        .sellers
        .iter()
        .filter(|entry| site.matches_vendor(&entry.vendor_name, &entry.outbound_link))
        .collect();

    if matching.is_empty() {
        let seen: Vec<&str> = listing
            .sellers
            .iter()
            .take(5)
            .map(|e| e.vendor_name.as_str())
            .collect();
        return TaskOutcome::Partial {
            reason: format!(
                "{}: marketplace not among sellers for '{}' (found: {})",
                site,
                product_name,
                seen.join(", ")
            ),
        };
    }

    // Phase 2: resolve each matching seller row and extract details.
    // Row failures skip only that row.
    let mut offers: Vec<Offer> = Vec::new();
    for entry in matching {
        let resolved = match redirect::resolve(
            &entry.outbound_link,
            site,
            &settings.browser,
            &settings.aggregator,
            &settings.scrape,
        )
        .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                // Session startup stopped working mid-task; keep whatever
                // was already collected instead of losing it
                warn!("{}: session error while resolving seller: {}", site, e);
                if offers.is_empty() {
                    return TaskOutcome::Failed {
                        error: format!("{}: browser session could not start: {}", site, e),
                    };
                }
                break;
            }
        };

        let Some((session, final_url)) = resolved else {
            info!(
                "{}: redirect did not reach the marketplace for vendor '{}'",
                site, entry.vendor_name
            );
            continue;
        };

        let extractor = extractor_for(site);
        let detail = extractor
            .extract_details(&session, &final_url, task.max_reviews)
            .await;
        session.close().await;

        offers.push(Offer::from_extraction(
            &task.product_id,
            &product_name,
            task.category.as_deref(),
            site,
            entry,
            detail,
        ));
    }

    if offers.is_empty() {
        return TaskOutcome::Partial {
            reason: format!(
                "{}: no seller row could be resolved to a marketplace page for '{}'",
                site, product_name
            ),
        };
    }

    // Phase 3: reconcile under the insert-once policy
    let mut written = 0usize;
    let mut skipped = 0usize;
    for offer in &offers {
        match repo.insert_once(offer) {
            Ok(ReconcileOutcome::Inserted) => written += 1,
            Ok(ReconcileOutcome::SkippedDuplicate) => skipped += 1,
            Err(e) => {
                return TaskOutcome::Failed {
                    error: format!("{}: offer write failed: {}", site, e),
                }
            }
        }
    }

    let message = if written > 0 {
        format!(
            "{}: '{}' {} new offers recorded ({} already current)",
            site, product_name, written, skipped
        )
    } else {
        format!(
            "{}: '{}' all offers already current ({} duplicates)",
            site, product_name, skipped
        )
    };

    TaskOutcome::Succeeded {
        written,
        skipped,
        message,
    }
}
