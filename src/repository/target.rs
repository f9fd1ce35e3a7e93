//! Target repository: the store-side mirror of the targets file.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::Result;
use crate::models::ProductTarget;

pub struct TargetRepository {
    db_path: PathBuf,
}

impl TargetRepository {
    pub fn open(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        let conn = repo.connect()?;
        super::init_schema(&conn)?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    /// Add a target unless its product id is already tracked. Returns
    /// whether a row was written.
    pub fn add(&self, target: &ProductTarget) -> Result<bool> {
        let conn = self.connect()?;
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO targets
                (product_id, product_name, category, url, collection, added_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                target.product_id,
                target.product_name,
                target.category,
                target.url,
                target.collection,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Mirror the targets file into the store; returns how many new
    /// products were added.
    pub fn sync(&self, targets: &[ProductTarget]) -> Result<usize> {
        let mut added = 0;
        for target in targets {
            if self.add(target)? {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn get(&self, product_id: &str) -> Result<Option<ProductTarget>> {
        let conn = self.connect()?;
        let target = conn
            .query_row(
                r#"SELECT product_id, product_name, category, url, collection
                   FROM targets WHERE product_id = ?1"#,
                params![product_id],
                Self::map_row,
            )
            .optional()?;
        Ok(target)
    }

    pub fn all(&self) -> Result<Vec<ProductTarget>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"SELECT product_id, product_name, category, url, collection
               FROM targets ORDER BY product_id"#,
        )?;
        let targets = stmt
            .query_map([], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(targets)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProductTarget> {
        Ok(ProductTarget {
            product_id: row.get(0)?,
            product_name: row.get(1)?,
            category: row.get(2)?,
            url: row.get(3)?,
            collection: row.get(4)?,
        })
    }
}
