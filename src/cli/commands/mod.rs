//! Command implementations.

pub mod discover;
pub mod run_task;
pub mod scrape;
pub mod targets;
