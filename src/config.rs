//! Configuration management.
//!
//! All runtime knobs live in a single `Settings` struct that is loaded
//! once at startup and injected into the orchestrator, never read from
//! ambient global state. Values come from an optional TOML file with
//! environment overrides for secrets (loaded via dotenv in main).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level settings, deserialized from `pricewatch.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path to the SQLite offer store.
    pub database_path: PathBuf,
    /// Path to the discovery/targets file.
    pub targets_file: PathBuf,
    /// Logical namespace recorded on targets without an explicit one.
    pub default_collection: String,
    pub aggregator: AggregatorSettings,
    pub browser: BrowserSettings,
    pub pool: PoolSettings,
    pub scrape: ScrapeSettings,
    pub chat: ChatSettings,
    pub server: ServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("pricewatch.db"),
            targets_file: PathBuf::from("targets.json"),
            default_collection: "e_ticaret_offers".to_string(),
            aggregator: AggregatorSettings::default(),
            browser: BrowserSettings::default(),
            pool: PoolSettings::default(),
            scrape: ScrapeSettings::default(),
            chat: ChatSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults when the
    /// file does not exist. A present-but-invalid file is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(|| Path::new("pricewatch.toml"));
        let mut settings = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?
        } else {
            Self::default()
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Environment overrides for values that should not sit in a config
    /// file checked into version control.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("PRICEWATCH_CHAT_API_KEY") {
            if !key.trim().is_empty() {
                self.chat.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(url) = std::env::var("PRICEWATCH_CHAT_API_URL") {
            if !url.trim().is_empty() {
                self.chat.api_url = Some(url.trim().to_string());
            }
        }
        if let Ok(db) = std::env::var("PRICEWATCH_DB") {
            if !db.trim().is_empty() {
                self.database_path = PathBuf::from(db);
            }
        }
    }
}

/// Aggregator (price-comparison site) access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorSettings {
    /// Origin used to absolutize relative outbound links.
    pub base_url: String,
    /// How many seller rows to take from a listing page.
    pub seller_cap: usize,
    /// Bounded wait for the seller-list container, seconds.
    pub wait_secs: u64,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.akakce.com".to_string(),
            seller_cap: 10,
            wait_secs: 30,
        }
    }
}

/// Browser session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run Chrome headless. Disable only for local debugging.
    pub headless: bool,
    /// Explicit Chrome binary; auto-detected when unset.
    pub chrome_binary: Option<PathBuf>,
    /// Navigation timeout, seconds.
    pub nav_timeout_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_binary: None,
            nav_timeout_secs: 30,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum concurrent scrape tasks regardless of batch size.
    pub cap: usize,
    /// Overall per-task deadline enforced by the pool, seconds.
    pub task_deadline_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            cap: 10,
            task_deadline_secs: 420,
        }
    }
}

/// Per-task scrape settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    /// Upper bound on review texts collected per offer.
    pub max_reviews: usize,
    /// Bounded wait for the redirect chain to leave the aggregator, seconds.
    pub redirect_timeout_secs: u64,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            max_reviews: 20,
            redirect_timeout_secs: 40,
        }
    }
}

/// Chat / text-generation boundary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Text-generation endpoint; the rule-based responder is used when unset.
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    /// Margin applied by the dynamic price suggestion, percent.
    pub price_margin_pct: f64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            price_margin_pct: 5.0,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5001".to_string(),
        }
    }
}
