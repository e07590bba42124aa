//! Listing-page parser.
//!
//! The schedule and results pages repeat one "match row" element per game.
//! Class names on the site are versioned suffix-style and drift between
//! revisions, so every selector here matches on a class-name fragment
//! (`[class*="…"]`) rather than an exact class, and each field is tried
//! against an ordered selector list.

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::domain::{MatchSummary, UNKNOWN_SCORE};

/// Selector lists for the listing pages, ordered by preference.
#[derive(Debug, Clone)]
pub struct ListSelectors {
    pub match_row: Vec<String>,
    pub row_link: Vec<String>,
    pub home_team: Vec<String>,
    pub away_team: Vec<String>,
    pub kickoff_time: Vec<String>,
    pub home_score: Vec<String>,
    pub away_score: Vec<String>,
}

impl Default for ListSelectors {
    fn default() -> Self {
        Self {
            match_row: vec!["div[class*=\"event__match\"]".into()],
            row_link: vec!["a[class*=\"eventRowLink\"]".into()],
            home_team: vec!["[class*=\"event__participant--home\"]".into()],
            away_team: vec!["[class*=\"event__participant--away\"]".into()],
            kickoff_time: vec!["[class*=\"event__time\"]".into()],
            // The score element has flipped between span and div before;
            // prefer the span, accept anything carrying the class fragment.
            home_score: vec![
                "span[class*=\"event__score--home\"]".into(),
                "[class*=\"event__score--home\"]".into(),
            ],
            away_score: vec![
                "span[class*=\"event__score--away\"]".into(),
                "[class*=\"event__score--away\"]".into(),
            ],
        }
    }
}

/// Parser for the upcoming-matches and finished-results listing pages.
pub struct MatchListParser {
    match_row: Vec<Selector>,
    row_link: Vec<Selector>,
    home_team: Vec<Selector>,
    away_team: Vec<Selector>,
    kickoff_time: Vec<Selector>,
    home_score: Vec<Selector>,
    away_score: Vec<Selector>,
}

impl MatchListParser {
    pub fn new() -> Result<Self> {
        Self::with_selectors(&ListSelectors::default())
    }

    pub fn with_selectors(selectors: &ListSelectors) -> Result<Self> {
        Ok(Self {
            match_row: compile_selectors(&selectors.match_row)?,
            row_link: compile_selectors(&selectors.row_link)?,
            home_team: compile_selectors(&selectors.home_team)?,
            away_team: compile_selectors(&selectors.away_team)?,
            kickoff_time: compile_selectors(&selectors.kickoff_time)?,
            home_score: compile_selectors(&selectors.home_score)?,
            away_score: compile_selectors(&selectors.away_score)?,
        })
    }

    /// Extract upcoming matches from the schedule page. Rows without an id
    /// or a full team pair are dropped silently; an empty page is a valid
    /// empty result.
    pub fn extract_upcoming(&self, html: &str) -> Vec<MatchSummary> {
        let document = Html::parse_document(html);
        let mut matches = Vec::new();
        let mut skipped = 0usize;
        let mut total = 0usize;

        for selector in &self.match_row {
            let rows: Vec<ElementRef> = document.select(selector).collect();
            if rows.is_empty() {
                continue;
            }
            total = rows.len();

            for row in rows {
                match self.summary_from_row(&row, None) {
                    Some(summary) => matches.push(summary),
                    None => skipped += 1,
                }
            }
            break;
        }

        debug!("schedule page: {total} rows, {} extracted, {skipped} skipped", matches.len());
        matches
    }

    /// Extract finished matches with scores from the results page. Each row
    /// is located through its detail-page anchor; a row whose anchor has no
    /// usable href still yields a summary, just one that can never be
    /// detail-fetched.
    pub fn extract_finished(&self, html: &str) -> Vec<MatchSummary> {
        let document = Html::parse_document(html);
        let mut matches = Vec::new();
        let mut skipped = 0usize;
        let mut total = 0usize;

        for selector in &self.row_link {
            let anchors: Vec<ElementRef> = document.select(selector).collect();
            if anchors.is_empty() {
                continue;
            }
            total = anchors.len();

            for anchor in anchors {
                let row = enclosing_match_row(&anchor);
                let url = anchor
                    .value()
                    .attr("href")
                    .map(str::trim)
                    .filter(|href| !href.is_empty())
                    .map(String::from);

                match self.summary_from_row(&row, url) {
                    Some(summary) => matches.push(summary),
                    None => skipped += 1,
                }
            }
            break;
        }

        if total == 0 {
            debug!("results page: no match rows found");
        } else {
            debug!("results page: {total} rows, {} extracted, {skipped} skipped", matches.len());
        }
        matches
    }

    fn summary_from_row(&self, row: &ElementRef, url: Option<String>) -> Option<MatchSummary> {
        let id = row
            .value()
            .attr("id")
            .map(str::trim)
            .filter(|id| !id.is_empty())?
            .to_string();

        let home = text_with_fallbacks(row, &self.home_team)?;
        let away = text_with_fallbacks(row, &self.away_team)?;

        let home_score =
            text_with_fallbacks(row, &self.home_score).unwrap_or_else(|| UNKNOWN_SCORE.to_string());
        let away_score =
            text_with_fallbacks(row, &self.away_score).unwrap_or_else(|| UNKNOWN_SCORE.to_string());
        let time = text_with_fallbacks(row, &self.kickoff_time);

        Some(MatchSummary {
            id,
            home,
            away,
            home_score,
            away_score,
            url,
            time,
        })
    }
}

/// Compile selector strings, skipping invalid ones with a warning as long as
/// at least one compiles.
fn compile_selectors(selector_strings: &[String]) -> Result<Vec<Selector>> {
    let mut selectors = Vec::new();
    for selector_str in selector_strings {
        match Selector::parse(selector_str) {
            Ok(selector) => selectors.push(selector),
            Err(e) => warn!("failed to compile selector '{selector_str}': {e}"),
        }
    }
    if selectors.is_empty() {
        anyhow::bail!("no valid selectors in {selector_strings:?}");
    }
    Ok(selectors)
}

fn text_with_fallbacks(element: &ElementRef, selectors: &[Selector]) -> Option<String> {
    for selector in selectors {
        if let Some(text) = element
            .select(selector)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
        {
            return Some(text);
        }
    }
    None
}

/// Walk up from the detail anchor to the enclosing match row; the anchor
/// itself is the fallback when the row wrapper is missing.
fn enclosing_match_row<'a>(anchor: &ElementRef<'a>) -> ElementRef<'a> {
    for node in anchor.ancestors() {
        if let Some(el) = ElementRef::wrap(node) {
            if el
                .value()
                .attr("class")
                .is_some_and(|class| class.contains("event__match"))
            {
                return el;
            }
        }
    }
    *anchor
}
