//! Browser session provider.
//!
//! Each scrape task owns exactly one session for its whole lifetime;
//! sessions are never pooled or reused across tasks, so cookie and
//! redirect state cannot leak between them. The session is a headless
//! Chrome instance driven over CDP with anti-detection overrides applied
//! before the first navigation.

mod stealth;

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::BrowserSettings;
use stealth::STEALTH_SCRIPTS;

/// Rotation pool for the session identity string.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/120.0.2210.91 Safari/537.36",
];

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(
        "Chrome/Chromium not found. Install it or set browser.chrome_binary in pricewatch.toml"
    )]
    ChromeNotFound,
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

/// One exclusive browser session, positioned on a single page.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    nav_timeout: Duration,
}

impl BrowserSession {
    /// Launch a fresh, configured session.
    ///
    /// Anti-detection overrides (user agent from the rotation pool,
    /// webdriver mask, tr-TR locale) are installed before any navigation.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, SessionError> {
        let chrome_path = match &settings.chrome_binary {
            Some(path) => path.clone(),
            None => find_chrome()?,
        };

        info!(
            "Launching browser (headless={}) from {}",
            settings.headless,
            chrome_path.display()
        );

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(1200, 800)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--log-level=3")
            .arg("--lang=tr-TR");

        // with_head means NOT headless, confusingly
        if !settings.headless {
            builder = builder.with_head();
        }

        let config = builder.build().map_err(SessionError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        // Drain CDP events for the lifetime of the browser
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        let user_agent = USER_AGENTS[rand::rng().random_range(0..USER_AGENTS.len())];
        page.execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await?;

        for script in STEALTH_SCRIPTS {
            let params = AddScriptToEvaluateOnNewDocumentParams::builder()
                .source(script.to_string())
                .build()
                .map_err(SessionError::Launch)?;
            if let Err(e) = page.execute(params).await {
                debug!("Stealth script injection skipped: {}", e);
            }
        }

        Ok(Self {
            browser,
            page,
            nav_timeout: Duration::from_secs(settings.nav_timeout_secs),
        })
    }

    /// Navigate the session's page, bounded by the configured timeout.
    pub async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        debug!("Navigating to {}", url);
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(SessionError::Launch)?;

        tokio::time::timeout(self.nav_timeout, self.page.execute(params))
            .await
            .map_err(|_| {
                SessionError::Launch(format!(
                    "navigation timed out after {}s for {}",
                    self.nav_timeout.as_secs(),
                    url
                ))
            })??;
        Ok(())
    }

    /// Poll for an element until it appears or the timeout elapses.
    pub async fn wait_for_selector(&self, css: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(css).await.is_ok() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("Timed out waiting for selector {}", css);
                return false;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    /// Snapshot of the rendered DOM.
    pub async fn content(&self) -> Result<String, SessionError> {
        Ok(self.page.content().await?)
    }

    /// Current URL of the focused page.
    pub async fn current_url(&self) -> Result<String, SessionError> {
        Ok(self
            .page
            .url()
            .await?
            .map(|u| u.to_string())
            .unwrap_or_default())
    }

    /// Scroll the page to an absolute vertical position.
    pub async fn scroll_to(&self, y: i64) -> Result<(), SessionError> {
        self.page
            .evaluate(format!("window.scrollTo(0, {});", y))
            .await?;
        Ok(())
    }

    /// Scroll to the bottom of the document.
    pub async fn scroll_to_bottom(&self) -> Result<(), SessionError> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight);".to_string())
            .await?;
        Ok(())
    }

    /// Current document scroll height, used for lazy-load plateau detection.
    pub async fn scroll_height(&self) -> Result<i64, SessionError> {
        let result = self
            .page
            .evaluate("document.body.scrollHeight".to_string())
            .await?;
        Ok(result.into_value::<i64>().unwrap_or(0))
    }

    /// Evaluate a script, coercing the result to bool (false on failure).
    pub async fn evaluate_bool(&self, script: &str) -> bool {
        match self.page.evaluate(script.to_string()).await {
            Ok(result) => result.into_value::<bool>().unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Click the first element matching the selector. Returns false when
    /// no such element exists.
    pub async fn click(&self, css: &str) -> Result<bool, SessionError> {
        match self.page.find_element(css).await {
            Ok(element) => {
                element.click().await?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Read the `href` attribute of the first element matching the selector.
    pub async fn find_href(&self, css: &str) -> Option<String> {
        let element = self.page.find_element(css).await.ok()?;
        element.attribute("href").await.ok()?
    }

    /// If navigation spawned additional tabs, move focus to the newest one.
    pub async fn focus_latest_page(&mut self) -> Result<(), SessionError> {
        let pages = self.browser.pages().await?;
        if pages.len() > 1 {
            debug!("Switching to most recently opened tab ({} open)", pages.len());
            if let Some(last) = pages.into_iter().next_back() {
                self.page = last;
            }
        }
        Ok(())
    }

    /// Jittered settle delay for anti-bot pacing. Not correctness-critical.
    pub async fn settle(&self, min_ms: u64, max_ms: u64) {
        let wait = rand::rng().random_range(min_ms..=max_ms);
        tokio::time::sleep(Duration::from_millis(wait)).await;
    }

    /// Tear the session down. Must run on every task exit path.
    pub async fn close(mut self) {
        let _ = self.page.close().await;
        if let Err(e) = self.browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
    }
}

/// Find a Chrome executable on well-known paths or in $PATH.
fn find_chrome() -> Result<PathBuf, SessionError> {
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    info!("Found Chrome in PATH: {}", path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(SessionError::ChromeNotFound)
}
