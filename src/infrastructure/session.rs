//! Browser session management for page extraction.
//!
//! The target site renders everything client-side, so plain HTTP fetches
//! return an empty shell; every page load goes through one driven Chrome
//! session. A session is an explicit handle: opened, recycled and closed by
//! the collector, with the browser process itself reaped on drop as a
//! backstop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use tracing::{debug, warn};

use crate::infrastructure::config::SessionConfig;

/// Failures raised while driving the browser.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("readiness marker '{selector}' did not appear on {url} within {waited_secs}s")]
    NavigationTimeout {
        url: String,
        selector: String,
        waited_secs: u64,
    },

    #[error("browser session failure: {message}")]
    Session { message: String },

    #[error("script evaluation failed: {message}")]
    Script { message: String },
}

impl FetchError {
    fn session(err: impl std::fmt::Display) -> Self {
        Self::Session {
            message: err.to_string(),
        }
    }

    /// Connection-level faults warrant a session recycle before the next
    /// retry; anything else retries in place. Classification is textual
    /// since the underlying automation errors are stringly typed.
    pub fn is_connection_fault(&self) -> bool {
        match self {
            Self::NavigationTimeout { .. } => true,
            Self::Session { message } | Self::Script { message } => {
                let lower = message.to_lowercase();
                lower.contains("connection")
                    || lower.contains("timeout")
                    || lower.contains("timed out")
                    || lower.contains("websocket")
                    || lower.contains("channel")
            }
        }
    }
}

/// The operations the extraction code needs from a live page session.
///
/// `PageSession` is the production implementation; tests substitute scripted
/// fakes to exercise retry and partial-failure paths without a browser.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load `url`, wait for the readiness marker, then let client-side
    /// scripts settle.
    async fn navigate(&self, url: &str) -> Result<(), FetchError>;

    /// Fully rendered markup of the current page.
    async fn content(&self) -> Result<String, FetchError>;

    /// Evaluate a script expression and return its JSON value
    /// (`Value::Null` when the expression yields nothing).
    async fn run_script(&self, script: &str) -> Result<Value, FetchError>;

    /// Apply the settle delay once more, e.g. after a programmatic tab click.
    async fn settle(&self);

    /// Release the session. Consumes the handle; the browser process is gone
    /// afterwards.
    async fn close(self: Box<Self>);
}

/// Opens fresh sessions. The collector goes through this seam so that
/// session recycling stays testable.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageDriver>, FetchError>;
}

/// One live Chrome session with a single tab.
pub struct PageSession {
    // Held for its Drop impl, which kills the Chrome process.
    _browser: Browser,
    tab: Arc<Tab>,
    config: SessionConfig,
}

impl PageSession {
    /// Launch Chrome and open one tab with the configured client identity.
    /// Blocking; callers wrap it in `spawn_blocking`.
    pub fn open(config: &SessionConfig) -> Result<Self, FetchError> {
        let args = vec![
            std::ffi::OsStr::new("--disable-gpu"),
            std::ffi::OsStr::new("--disable-dev-shm-usage"),
            std::ffi::OsStr::new("--window-size=1400,1000"),
        ];

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false)
            .idle_browser_timeout(Duration::from_secs(config.idle_timeout_secs))
            .args(args)
            .build()
            .map_err(FetchError::session)?;

        let browser = Browser::new(options).map_err(FetchError::session)?;
        let tab = browser.new_tab().map_err(FetchError::session)?;
        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(FetchError::session)?;

        debug!("browser session opened (headless: {})", config.headless);

        Ok(Self {
            _browser: browser,
            tab,
            config: config.clone(),
        })
    }

    fn settle_duration(&self) -> Duration {
        Duration::from_secs(self.config.settle_secs)
    }
}

#[async_trait]
impl PageDriver for PageSession {
    async fn navigate(&self, url: &str) -> Result<(), FetchError> {
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();
        let selector = self.config.readiness_selector.clone();
        let timeout_secs = self.config.readiness_timeout_secs;
        let settle = self.settle_duration();

        tokio::task::spawn_blocking(move || {
            tab.navigate_to(&url).map_err(FetchError::session)?;

            // The initial document is an empty shell; the marker appearing is
            // the first sign the page scripts are alive.
            tab.wait_for_element_with_custom_timeout(
                &selector,
                Duration::from_secs(timeout_secs),
            )
            .map_err(|_| FetchError::NavigationTimeout {
                url: url.clone(),
                selector: selector.clone(),
                waited_secs: timeout_secs,
            })?;

            // The marker precedes the dynamic content it anchors.
            std::thread::sleep(settle);
            Ok(())
        })
        .await
        .map_err(FetchError::session)?
    }

    async fn content(&self) -> Result<String, FetchError> {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || tab.get_content().map_err(FetchError::session))
            .await
            .map_err(FetchError::session)?
    }

    async fn run_script(&self, script: &str) -> Result<Value, FetchError> {
        let tab = Arc::clone(&self.tab);
        let script = script.to_string();
        tokio::task::spawn_blocking(move || {
            let result = tab.evaluate(&script, false).map_err(|e| FetchError::Script {
                message: e.to_string(),
            })?;
            Ok(result.value.unwrap_or(Value::Null))
        })
        .await
        .map_err(FetchError::session)?
    }

    async fn settle(&self) {
        tokio::time::sleep(self.settle_duration()).await;
    }

    async fn close(self: Box<Self>) {
        // Dropping the Browser kills the Chrome process; do it off the
        // async runtime since process teardown blocks.
        let result = tokio::task::spawn_blocking(move || drop(self)).await;
        if let Err(e) = result {
            warn!("browser session teardown failed: {e}");
        } else {
            debug!("browser session closed");
        }
    }
}

/// Production factory: every `open` launches a fresh Chrome process.
pub struct ChromeSessionFactory {
    config: SessionConfig,
}

impl ChromeSessionFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self) -> Result<Box<dyn PageDriver>, FetchError> {
        let config = self.config.clone();
        let session = tokio::task::spawn_blocking(move || PageSession::open(&config))
            .await
            .map_err(FetchError::session)??;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_faults_are_classified_textually() {
        let timeout = FetchError::NavigationTimeout {
            url: "https://example.com".into(),
            selector: ".sportName".into(),
            waited_secs: 10,
        };
        assert!(timeout.is_connection_fault());

        let conn = FetchError::Session {
            message: "Connection reset by peer".into(),
        };
        assert!(conn.is_connection_fault());

        let ws = FetchError::Session {
            message: "Unable to make method calls because underlying connection is closed".into(),
        };
        assert!(ws.is_connection_fault());

        let other = FetchError::Script {
            message: "ReferenceError: rows is not defined".into(),
        };
        assert!(!other.is_connection_fault());
    }
}
