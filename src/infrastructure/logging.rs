//! Logging initialization.
//!
//! Console output by default, with an optional non-blocking file layer. The
//! file writer guard is parked globally so the worker thread outlives the
//! init call.

use std::sync::Mutex;

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::infrastructure::config::LoggingConfig;

static LOG_GUARDS: Lazy<Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

/// Initialize the tracing subscriber from the logging configuration.
/// `RUST_LOG` overrides the configured level when set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(&config.level)
            // The CDP transport is chatty at debug level.
            .add_directive("headless_chrome=warn".parse().expect("static directive"))
            .add_directive("tungstenite=warn".parse().expect("static directive"))
    });

    let registry = Registry::default().with(env_filter);

    match (config.file_output, config.console_output) {
        (true, true) => {
            let file_appender = rolling::never(&config.log_dir, "rinkscore.log");
            let (file_writer, guard) = non_blocking(file_appender);
            LOG_GUARDS.lock().unwrap().push(guard);

            let file_layer = fmt::Layer::new()
                .with_writer(file_writer)
                .with_target(false)
                .with_ansi(false);
            let console_layer = fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_target(false);

            registry.with(file_layer).with(console_layer).init();
        }
        (true, false) => {
            let file_appender = rolling::never(&config.log_dir, "rinkscore.log");
            let (file_writer, guard) = non_blocking(file_appender);
            LOG_GUARDS.lock().unwrap().push(guard);

            let file_layer = fmt::Layer::new()
                .with_writer(file_writer)
                .with_target(false)
                .with_ansi(false);
            registry.with(file_layer).init();
        }
        (false, true) => {
            let console_layer = fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_target(false);
            registry.with(console_layer).init();
        }
        (false, false) => return Err(anyhow!("No logging output configured")),
    }

    info!("logging initialized (level: {})", config.level);
    Ok(())
}
