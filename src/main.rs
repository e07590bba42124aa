//! Command-line entry point.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use rinkscore::Collector;
use rinkscore::infrastructure::config::{AppConfig, ConfigManager};
use rinkscore::infrastructure::logging::init_logging;
use rinkscore::infrastructure::session::ChromeSessionFactory;
use rinkscore::infrastructure::storage::MatchStore;

#[derive(Parser)]
#[command(name = "rinkscore", version, about = "Incremental NHL match-result collector")]
struct Cli {
    /// Config file path (defaults to the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store file path, overriding the configured one.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Run the browser with a visible window.
    #[arg(long, global = true)]
    headful: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Collect finished matches into the store (default).
    Collect,
    /// List upcoming matches from the schedule page.
    Upcoming,
    /// Show store statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::at(path.clone()),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load().await?;
    if let Some(store) = &cli.store {
        config.storage.path = store.clone();
    }
    if cli.headful {
        config.session.headless = false;
    }

    init_logging(&config.logging)?;

    match cli.command.unwrap_or(Command::Collect) {
        Command::Collect => collect(config).await,
        Command::Upcoming => upcoming(config).await,
        Command::Stats => stats(config).await,
    }
}

async fn collect(config: AppConfig) -> Result<()> {
    let store = MatchStore::load(&config.storage.path).await;
    let factory = Box::new(ChromeSessionFactory::new(config.session.clone()));
    let mut collector = Collector::new(factory, &config, store)?;

    // An interrupt cancels between matches; the session-close step still
    // runs before the process exits.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current match");
            signal_cancel.cancel();
        }
    });

    collector.run(&cancel).await?;
    Ok(())
}

async fn upcoming(config: AppConfig) -> Result<()> {
    let store = MatchStore::load(&config.storage.path).await;
    let factory = Box::new(ChromeSessionFactory::new(config.session.clone()));
    let collector = Collector::new(factory, &config, store)?;

    let matches = collector.fetch_upcoming().await?;
    if matches.is_empty() {
        println!("No upcoming matches found.");
        return Ok(());
    }
    for m in &matches {
        println!("{:>6}  {} vs {}", m.time.as_deref().unwrap_or("--:--"), m.home, m.away);
    }
    Ok(())
}

async fn stats(config: AppConfig) -> Result<()> {
    let store = MatchStore::load(&config.storage.path).await;
    println!("store:   {}", config.storage.path.display());
    println!("matches: {}", store.len());
    Ok(())
}
