//! Repository layer for SQLite persistence.
//!
//! Hand-written SQL over rusqlite. The offer store is the only resource
//! shared across concurrent scrape processes; every mutation is a
//! key-scoped insert or upsert whose check-and-write happens inside one
//! SQLite statement, so the insert-once policy holds under concurrency
//! without an external lock.

mod offer;
mod target;

pub use offer::{OfferRepository, ReconcileOutcome};
pub use target::TargetRepository;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Open a connection with the pragmas the multi-process pipeline needs.
pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    // Writers from sibling scrape processes wait instead of erroring
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Both repositories share one database file; the schema is created as a
/// whole whichever repository opens first.
pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS targets (
            product_id TEXT PRIMARY KEY,
            product_name TEXT NOT NULL,
            category TEXT,
            url TEXT NOT NULL,
            collection TEXT NOT NULL,
            added_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS offers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id TEXT NOT NULL,
            product_name TEXT NOT NULL,
            category TEXT,
            site TEXT NOT NULL,
            vendor_name TEXT NOT NULL,
            seller_nickname TEXT NOT NULL DEFAULT '',
            price REAL NOT NULL,
            source_url TEXT NOT NULL,
            rating REAL,
            review_count INTEGER,
            high_rating_count INTEGER,
            low_rating_count INTEGER,
            reviews TEXT NOT NULL DEFAULT '[]',
            scrape_ts TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_offers_natural_key
            ON offers (product_id, site, vendor_name, seller_nickname);
        CREATE INDEX IF NOT EXISTS idx_offers_product
            ON offers (product_id);
    "#,
    )?;
    Ok(())
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
