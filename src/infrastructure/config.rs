//! Configuration infrastructure.
//!
//! Settings are grouped by the pipeline stage they steer (site addresses,
//! browser session, collector pacing, storage, logging) and live in a JSON
//! file under the user config directory, created with defaults on first run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub session: SessionConfig,
    pub collector: CollectorConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Addresses of the scraped site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// League landing page; the results listing hangs off it.
    pub base_url: String,
}

impl SiteConfig {
    /// Finished-matches listing page.
    pub fn results_url(&self) -> String {
        format!("{}results/", self.base_url)
    }

    /// Resolve a listing-row href (usually root-relative) against the site
    /// origin. Already-absolute links pass through untouched.
    pub fn resolve(&self, href: &str) -> String {
        if href.starts_with("http") {
            return href.to_string();
        }
        match url::Url::parse(&self.base_url) {
            Ok(base) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            Err(_) => href.to_string(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.flashscorekz.com/hockey/usa/nhl/".to_string(),
        }
    }
}

/// Browser session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Fixed client identity; a bare automation UA gets served a different,
    /// emptier page.
    pub user_agent: String,
    pub headless: bool,
    /// Top-level container present on both the listing and match pages.
    pub readiness_selector: String,
    /// Upper bound on waiting for the readiness marker.
    pub readiness_timeout_secs: u64,
    /// Extra wait after readiness so page scripts can populate content.
    pub settle_secs: u64,
    /// Browser-side idle watchdog.
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            headless: true,
            readiness_selector: ".sportName, #detail".to_string(),
            readiness_timeout_secs: 10,
            settle_secs: 3,
            idle_timeout_secs: 90,
        }
    }
}

/// Collector pacing and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Attempts per match detail fetch.
    pub max_retries: u32,
    /// Pause before a plain retry (non-connection fault).
    pub retry_pause_ms: u64,
    /// Pause between closing and reopening a recycled session.
    pub recycle_pause_ms: u64,
    /// Randomized inter-match pause bounds.
    pub pause_min_ms: u64,
    pub pause_max_ms: u64,
    /// Proactively recycle the session after this many processed matches.
    pub recycle_every: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_pause_ms: 2_000,
            recycle_pause_ms: 5_000,
            pause_min_ms: 2_500,
            pause_max_ms: 5_000,
            recycle_every: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store file path; the parent directory is created on demand.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/nhl_matches.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level filter when RUST_LOG is unset.
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// Loads and persists the configuration file.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Default location: `<user config dir>/rinkscore/config.json`.
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("rinkscore");
        Ok(Self {
            config_path: config_dir.join("config.json"),
        })
    }

    /// Use an explicit config file path instead of the default location.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the configuration, writing defaults on first run. An unreadable
    /// file falls back to defaults rather than aborting a collection run.
    pub async fn load(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(
                    "configuration file {:?} is not parseable ({e}), using defaults",
                    self.config_path
                );
                Ok(AppConfig::default())
            }
        }
    }

    pub async fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }
        let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
        fs::write(&self.config_path, json)
            .await
            .context("Failed to write configuration file")?;
        Ok(())
    }
}
