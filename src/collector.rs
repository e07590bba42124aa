//! Collection orchestration.
//!
//! One run: list the finished matches, drop everything already stored, then
//! walk the remainder in listing order fetching details, merging and
//! persisting one match at a time. The browser session is the expensive,
//! fragile resource here: it is opened per phase, recycled on connection
//! faults and every few matches to bound its memory growth, and closed on
//! every exit path.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{MatchDetail, MatchRecord, MatchSummary};
use crate::infrastructure::config::{AppConfig, CollectorConfig, SiteConfig};
use crate::infrastructure::parsing::{MatchDetailParser, MatchListParser};
use crate::infrastructure::session::{FetchError, PageDriver, SessionFactory};
use crate::infrastructure::storage::MatchStore;

/// What a run saw and did; logged as the closing summary even when
/// individual matches failed.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunReport {
    /// Rows recognized on the results page.
    pub found: usize,
    /// Rows filtered out for lacking a final score.
    pub without_score: usize,
    /// Rows whose id was already in the store.
    pub already_known: usize,
    /// Rows selected for detail fetching.
    pub new_matches: usize,
    /// Records merged and written this run.
    pub persisted: usize,
    /// New rows with no detail link.
    pub skipped_no_url: usize,
    /// New rows that exhausted their retries or could not be written.
    pub failed: usize,
}

pub struct Collector {
    factory: Box<dyn SessionFactory>,
    list_parser: MatchListParser,
    detail_parser: MatchDetailParser,
    store: MatchStore,
    site: SiteConfig,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(
        factory: Box<dyn SessionFactory>,
        config: &AppConfig,
        store: MatchStore,
    ) -> Result<Self> {
        Ok(Self {
            factory,
            list_parser: MatchListParser::new().context("listing selectors failed to compile")?,
            detail_parser: MatchDetailParser::new(config.site.clone()),
            store,
            site: config.site.clone(),
            config: config.collector.clone(),
        })
    }

    pub fn store(&self) -> &MatchStore {
        &self.store
    }

    /// Fetch the upcoming-matches schedule with a short-lived session.
    pub async fn fetch_upcoming(&self) -> Result<Vec<MatchSummary>, FetchError> {
        let html = self.fetch_page(&self.site.base_url).await?;
        Ok(self.list_parser.extract_upcoming(&html))
    }

    /// Run one full collection pass. Only a failure to establish the session
    /// for the initial listing fetch aborts the run; everything afterwards is
    /// contained per match.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<RunReport> {
        info!("collection run started ({})", self.site.results_url());

        let summaries = self
            .fetch_listing()
            .await
            .context("initial listing fetch failed")?;

        let mut report = RunReport {
            found: summaries.len(),
            ..RunReport::default()
        };

        // Incremental-fetch guarantee: anything already keyed in the store is
        // never detail-fetched again.
        let mut new_matches = Vec::new();
        for summary in summaries {
            if !summary.has_score() {
                report.without_score += 1;
            } else if self.store.exists(&summary.id) {
                report.already_known += 1;
            } else {
                new_matches.push(summary);
            }
        }
        report.new_matches = new_matches.len();

        info!(
            "listing: {} found, {} without score, {} already stored, {} new",
            report.found, report.without_score, report.already_known, report.new_matches
        );

        if new_matches.is_empty() {
            info!("nothing new to collect");
            self.log_summary(&report);
            return Ok(report);
        }

        // One session serves the whole detail phase.
        let mut slot: Option<Box<dyn PageDriver>> = match self.factory.open().await {
            Ok(session) => Some(session),
            Err(e) => {
                error!("could not open a session for the detail phase: {e}");
                report.failed = new_matches.len();
                self.log_summary(&report);
                return Ok(report);
            }
        };

        let mut processed = 0u32;
        let total = new_matches.len();

        for (index, summary) in new_matches.into_iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("cancellation requested, stopping after {index} of {total} matches");
                break;
            }

            info!(
                "processing {}/{total}: {} vs {}",
                index + 1,
                summary.home,
                summary.away
            );

            let Some(url) = summary.url.clone() else {
                warn!("skipping match {}: no detail link on the listing row", summary.id);
                report.skipped_no_url += 1;
                continue;
            };

            match self.fetch_details_with_retry(&mut slot, &url, &summary.id).await {
                Ok(detail) => {
                    let record = MatchRecord::from_parts(&summary, detail);
                    debug!("match {} start time: {}", record.id, record.start_time);
                    match self.store.write(record).await {
                        Ok(()) => report.persisted += 1,
                        Err(e) => {
                            warn!("match {} not stored: {e}", summary.id);
                            report.failed += 1;
                            continue;
                        }
                    }

                    processed += 1;

                    // Pace the next fetch like a reader, not a crawler.
                    let pause = self.random_pause();
                    debug!("pausing for {pause:?}");
                    tokio::select! {
                        () = tokio::time::sleep(pause) => {}
                        () = cancel.cancelled() => {}
                    }

                    // A long-lived browser process grows without bound;
                    // trade a restart for the memory back.
                    if self.config.recycle_every > 0 && processed % self.config.recycle_every == 0 {
                        info!("recycling browser session after {processed} matches");
                        if self.recycle(&mut slot).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!(
                        "match {} failed after {} attempts: {e}",
                        summary.id, self.config.max_retries
                    );
                    report.failed += 1;
                    // The session state after repeated failures is suspect.
                    if self.recycle(&mut slot).await.is_err() {
                        break;
                    }
                }
            }
        }

        if let Some(session) = slot.take() {
            session.close().await;
        }

        self.log_summary(&report);
        Ok(report)
    }

    /// Fetch the finished-matches listing through its own short-lived
    /// session.
    async fn fetch_listing(&self) -> Result<Vec<MatchSummary>, FetchError> {
        let html = self.fetch_page(&self.site.results_url()).await?;
        Ok(self.list_parser.extract_finished(&html))
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let session = self.factory.open().await?;
        let result = async {
            session.navigate(url).await?;
            session.content().await
        }
        .await;
        session.close().await;
        result
    }

    /// Up to `max_retries` attempts at one match's details. Connection-level
    /// faults recycle the session before the next attempt; other faults just
    /// pause. The final error propagates so the caller can skip the match.
    async fn fetch_details_with_retry(
        &self,
        slot: &mut Option<Box<dyn PageDriver>>,
        url: &str,
        match_id: &str,
    ) -> Result<MatchDetail, FetchError> {
        let max = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=max {
            let Some(session) = slot.as_deref() else {
                break;
            };

            match self.detail_parser.fetch(session, url).await {
                Ok(detail) => return Ok(detail),
                Err(e) => {
                    warn!("[attempt {attempt}/{max}] detail fetch failed for {match_id}: {e}");
                    let connection_fault = e.is_connection_fault();
                    last_error = Some(e);

                    if attempt == max {
                        break;
                    }
                    if connection_fault {
                        info!("connection issue detected, recycling browser session");
                        if self.recycle(slot).await.is_err() {
                            break;
                        }
                    } else {
                        tokio::time::sleep(Duration::from_millis(self.config.retry_pause_ms))
                            .await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(FetchError::Session {
            message: "no session available".to_string(),
        }))
    }

    /// Close the current session, pause, open a fresh one. On reopen failure
    /// the slot stays empty and the error propagates; the run winds down
    /// rather than hammering a broken browser install.
    async fn recycle(&self, slot: &mut Option<Box<dyn PageDriver>>) -> Result<(), FetchError> {
        if let Some(old) = slot.take() {
            old.close().await;
        }
        tokio::time::sleep(Duration::from_millis(self.config.recycle_pause_ms)).await;

        match self.factory.open().await {
            Ok(session) => {
                *slot = Some(session);
                Ok(())
            }
            Err(e) => {
                error!("session reopen failed: {e}");
                Err(e)
            }
        }
    }

    fn random_pause(&self) -> Duration {
        let min = self.config.pause_min_ms.min(self.config.pause_max_ms);
        let span = self.config.pause_max_ms.saturating_sub(min);
        let jitter = if span == 0 { 0 } else { fastrand::u64(..=span) };
        Duration::from_millis(min + jitter)
    }

    fn log_summary(&self, report: &RunReport) {
        info!(
            "run complete: {} found / {} already stored / {} persisted / {} failed / {} skipped (store: {} total)",
            report.found,
            report.already_known,
            report.persisted,
            report.failed,
            report.skipped_no_url,
            self.store.len()
        );
    }
}
