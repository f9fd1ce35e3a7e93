//! Pricewatch - multi-marketplace price and review acquisition pipeline.
//!
//! Discovers product listings on a price-comparison aggregator, resolves
//! each seller's outbound link to its marketplace page, extracts
//! price/rating/review data per marketplace, and reconciles the results
//! into a local offer store that feeds the analytics and chat APIs.

pub mod analytics;
pub mod browser;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod scrape;
pub mod server;
pub mod utils;
