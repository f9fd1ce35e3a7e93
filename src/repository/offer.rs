//! Offer repository: the reconciliation store.
//!
//! Natural key: `(product_id, site, vendor_name, seller_nickname)` with
//! the nickname normalized to an empty string. The pipeline reconciles
//! through `insert_once`; the overwrite variant stays available on the
//! API surface but is not wired into any pipeline call site.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::{parse_datetime, Result};
use crate::models::{MarketplaceId, Offer, OfferKey, ReviewEntry};

/// Result of reconciling one offer under the insert-once policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Inserted,
    SkippedDuplicate,
}

/// SQLite-backed offer store.
pub struct OfferRepository {
    db_path: PathBuf,
}

impl OfferRepository {
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

    /// Insert the offer unless its natural key is already present.
    ///
    /// The uniqueness check and the write are one statement, so two
    /// concurrent workers racing on the same key cannot both insert.
    pub fn insert_once(&self, offer: &Offer) -> Result<ReconcileOutcome> {
        let conn = self.connect()?;
        let reviews = serde_json::to_string(&offer.reviews)?;

        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO offers (
                product_id, product_name, category, site, vendor_name,
                seller_nickname, price, source_url, rating, review_count,
                high_rating_count, low_rating_count, reviews, scrape_ts
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                offer.product_id,
                offer.product_name,
                offer.category,
                offer.site.as_str(),
                offer.vendor_name,
                offer.seller_nickname,
                offer.price,
                offer.source_url,
                offer.rating,
                offer.review_count,
                offer.high_rating_count,
                offer.low_rating_count,
                reviews,
                offer.scrape_ts.to_rfc3339(),
            ],
        )?;

        if inserted > 0 {
            Ok(ReconcileOutcome::Inserted)
        } else {
            Ok(ReconcileOutcome::SkippedDuplicate)
        }
    }

    /// Overwrite-in-place variant: the latest state wins for the key.
    pub fn upsert_latest(&self, offer: &Offer) -> Result<()> {
        let conn = self.connect()?;
        let reviews = serde_json::to_string(&offer.reviews)?;

        conn.execute(
            r#"
            INSERT INTO offers (
                product_id, product_name, category, site, vendor_name,
                seller_nickname, price, source_url, rating, review_count,
                high_rating_count, low_rating_count, reviews, scrape_ts
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(product_id, site, vendor_name, seller_nickname) DO UPDATE SET
                product_name = excluded.product_name,
                category = excluded.category,
                price = excluded.price,
                source_url = excluded.source_url,
                rating = excluded.rating,
                review_count = excluded.review_count,
                high_rating_count = excluded.high_rating_count,
                low_rating_count = excluded.low_rating_count,
                reviews = excluded.reviews,
                scrape_ts = excluded.scrape_ts
            "#,
            params![
                offer.product_id,
                offer.product_name,
                offer.category,
                offer.site.as_str(),
                offer.vendor_name,
                offer.seller_nickname,
                offer.price,
                offer.source_url,
                offer.rating,
                offer.review_count,
                offer.high_rating_count,
                offer.low_rating_count,
                reviews,
                offer.scrape_ts.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Check a natural key without writing.
    pub fn exists(&self, key: &OfferKey) -> Result<bool> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            r#"SELECT COUNT(*) FROM offers
               WHERE product_id = ?1 AND site = ?2
                 AND vendor_name = ?3 AND seller_nickname = ?4"#,
            params![
                key.product_id,
                key.site.as_str(),
                key.vendor_name,
                key.seller_nickname
            ],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Every product id known to the store (tracked or scraped).
    pub fn distinct_product_ids(&self) -> Result<HashSet<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT product_id FROM targets UNION SELECT DISTINCT product_id FROM offers",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// Product ids that have at least one scraped offer. The complement
    /// against the targets is "never yet scraped".
    pub fn distinct_product_ids_with_any_scrape(&self) -> Result<HashSet<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT DISTINCT product_id FROM offers")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// All offers recorded for one product.
    pub fn offers_for_product(&self, product_id: &str) -> Result<Vec<Offer>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"SELECT product_id, product_name, category, site, vendor_name,
                      seller_nickname, price, source_url, rating, review_count,
                      high_rating_count, low_rating_count, reviews, scrape_ts
               FROM offers WHERE product_id = ?1 ORDER BY scrape_ts"#,
        )?;

        let offers = stmt
            .query_map(params![product_id], |row| {
                let site_text: String = row.get("site")?;
                let site = MarketplaceId::parse(&site_text).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        format!("unknown marketplace '{}'", site_text).into(),
                    )
                })?;
                let reviews_json: String = row.get("reviews")?;
                let reviews: Vec<ReviewEntry> =
                    serde_json::from_str(&reviews_json).unwrap_or_default();

                Ok(Offer {
                    product_id: row.get("product_id")?,
                    product_name: row.get("product_name")?,
                    category: row.get("category")?,
                    site,
                    vendor_name: row.get("vendor_name")?,
                    seller_nickname: row.get("seller_nickname")?,
                    price: row.get("price")?,
                    source_url: row.get("source_url")?,
                    rating: row.get("rating")?,
                    review_count: row.get("review_count")?,
                    high_rating_count: row.get("high_rating_count")?,
                    low_rating_count: row.get("low_rating_count")?,
                    reviews,
                    scrape_ts: parse_datetime(&row.get::<_, String>("scrape_ts")?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(offers)
    }

    /// Products with offers, with a display name and category for listings.
    pub fn product_summaries(&self) -> Result<Vec<(String, String, Option<String>)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"SELECT product_id, MAX(product_name), MAX(category)
               FROM offers GROUP BY product_id ORDER BY MAX(product_name)"#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarketplaceDetail, RawSellerEntry};

    fn repo() -> (tempfile::TempDir, OfferRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = OfferRepository::open(&dir.path().join("test.db")).unwrap();
        (dir, repo)
    }

    fn offer(product: &str, site: MarketplaceId, vendor: &str, nickname: &str) -> Offer {
        let entry = RawSellerEntry {
            vendor_name: vendor.to_string(),
            seller_nickname: nickname.to_string(),
            price: 199.90,
            outbound_link: "https://www.akakce.com/r/1".to_string(),
        };
        Offer::from_extraction(product, "Product", None, site, &entry, MarketplaceDetail::default())
    }

    #[test]
    fn insert_once_is_idempotent() {
        let (_dir, repo) = repo();
        let o = offer("p1", MarketplaceId::Hepsiburada, "Hepsiburada", "");

        assert_eq!(repo.insert_once(&o).unwrap(), ReconcileOutcome::Inserted);
        assert_eq!(
            repo.insert_once(&o).unwrap(),
            ReconcileOutcome::SkippedDuplicate
        );
        assert_eq!(repo.offers_for_product("p1").unwrap().len(), 1);
    }

    #[test]
    fn nicknames_split_the_natural_key() {
        let (_dir, repo) = repo();
        let a = offer("p1", MarketplaceId::Pazarama, "Pazarama", "ABC Store");
        let b = offer("p1", MarketplaceId::Pazarama, "Pazarama", "XYZ Store");

        assert_eq!(repo.insert_once(&a).unwrap(), ReconcileOutcome::Inserted);
        assert_eq!(repo.insert_once(&b).unwrap(), ReconcileOutcome::Inserted);
        assert_eq!(repo.offers_for_product("p1").unwrap().len(), 2);
    }

    #[test]
    fn upsert_latest_overwrites_in_place() {
        let (_dir, repo) = repo();
        let mut o = offer("p1", MarketplaceId::N11, "N11", "");
        repo.upsert_latest(&o).unwrap();

        o.price = 149.50;
        o.rating = Some(4.4);
        repo.upsert_latest(&o).unwrap();

        let stored = repo.offers_for_product("p1").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].price, 149.50);
        assert_eq!(stored[0].rating, Some(4.4));
    }

    #[test]
    fn reviews_survive_the_roundtrip() {
        let (_dir, repo) = repo();
        let mut o = offer("p1", MarketplaceId::Trendyol, "Trendyol", "");
        o.reviews = vec![ReviewEntry {
            text: "Kargo hızlıydı, ürün sağlam geldi.".to_string(),
            rating: Some(5),
            date: Some("2024-03-12".to_string()),
        }];
        repo.insert_once(&o).unwrap();

        let stored = repo.offers_for_product("p1").unwrap();
        assert_eq!(stored[0].reviews.len(), 1);
        assert_eq!(stored[0].reviews[0].rating, Some(5));
        assert!(stored[0].reviews[0].text.contains("sağlam"));
    }

    #[test]
    fn scraped_ids_are_a_subset_of_known_ids() {
        let (_dir, repo) = repo();
        repo.insert_once(&offer("p1", MarketplaceId::N11, "N11", ""))
            .unwrap();

        let targets = TargetRepositoryHelper::seed(&repo.db_path);
        assert!(targets);

        let known = repo.distinct_product_ids().unwrap();
        let scraped = repo.distinct_product_ids_with_any_scrape().unwrap();
        assert!(known.contains("p1"));
        assert!(known.contains("p2"));
        assert!(scraped.contains("p1"));
        assert!(!scraped.contains("p2"));
    }

    #[test]
    fn exists_checks_the_full_key() {
        let (_dir, repo) = repo();
        let o = offer("p1", MarketplaceId::Pttavm, "PttAVM", "Store A");
        repo.insert_once(&o).unwrap();

        assert!(repo.exists(&o.key()).unwrap());
        let mut other = o.key();
        other.seller_nickname = "Store B".to_string();
        assert!(!repo.exists(&other).unwrap());
    }

    /// Seed a target row through the sibling repository.
    struct TargetRepositoryHelper;
    impl TargetRepositoryHelper {
        fn seed(db_path: &std::path::Path) -> bool {
            let targets = crate::repository::TargetRepository::open(db_path).unwrap();
            targets
                .add(&crate::models::ProductTarget::new(
                    "p2",
                    "Other product",
                    None,
                    "https://www.akakce.com/p2.html",
                ))
                .unwrap()
        }
    }
}
