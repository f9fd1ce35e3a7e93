//! Extraction layer: aggregator listing, redirect resolution and the
//! per-marketplace detail extractors.

pub mod aggregator;
pub mod markets;
pub mod redirect;
pub mod stars;

use thiserror::Error;

pub use aggregator::AggregatorListing;
pub use markets::{extractor_for, MarketplaceExtractor};

/// Task-fatal extraction failures.
///
/// Everything recoverable (a missing rating element, one bad seller row,
/// a redirect that never lands) is expressed as `Option`s and empty
/// collections instead and never reaches this type.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("browser session error: {0}")]
    Session(#[from] crate::browser::SessionError),
    #[error("aggregator page never became ready: {0}")]
    AggregatorTimeout(String),
}
