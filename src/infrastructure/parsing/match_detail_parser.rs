//! Detail-page extraction.
//!
//! A match detail lives behind three logical tabs (head-to-head, team
//! statistics, player statistics), each reached by appending a fragment to
//! the base match URL and each populated by client-side code. The three
//! sub-extractions run independently: one failing tab costs its field, not
//! the whole fetch.
//!
//! The statistics tab is the least stable surface on the site. The primary
//! strategy reads the structured label/value rows; when the class contract
//! is absent or renamed and fewer than a handful of labels surface, a text
//! scan over all row-like elements recovers `number label number` triples.
//! Everything found by either strategy is kept in the raw map, so a renamed
//! category is preserved even before it gets a canonical mapping.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::scripts;
use crate::domain::{
    GoalieLine, H2HData, MatchDetail, MatchStatistics, PlayerStats, SkaterLine, StatCategory,
    StatPair, UNKNOWN_FIELD,
};
use crate::infrastructure::config::SiteConfig;
use crate::infrastructure::session::{FetchError, PageDriver};

/// Below this many structured labels, the primary strategy is considered to
/// have missed the table and the text scan runs as well.
const STRUCTURED_STAT_MIN: usize = 5;
/// Head-to-head row text is clipped to this many characters.
const H2H_CLIP_CHARS: usize = 100;
/// Rows shorter than this are section chrome, not match lines.
const H2H_MIN_CHARS: usize = 10;

static TOI_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+:\d+").expect("static regex"));
static TOI_FULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+:\d+$").expect("static regex"));
static SAVES_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+-\d+").expect("static regex"));
static SAVES_FULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+-\d+$").expect("static regex"));
static PCT_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\d+%").expect("static regex"));
static PCT_FULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\d+%$").expect("static regex"));
static NUMBER_FULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("static regex"));

#[derive(Debug, Default, Deserialize)]
struct H2hPayload {
    #[serde(default)]
    rows: Vec<String>,
    #[serde(default)]
    sections: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct StructuredStat {
    label: String,
    home: String,
    away: String,
}

#[derive(Debug, Default, Deserialize)]
struct StatsPayload {
    #[serde(default)]
    structured: Vec<StructuredStat>,
    #[serde(default)]
    rows: Vec<String>,
}

/// Extracts a full `MatchDetail` by driving a page session across the three
/// detail tabs.
pub struct MatchDetailParser {
    site: SiteConfig,
}

impl MatchDetailParser {
    pub fn new(site: SiteConfig) -> Self {
        Self { site }
    }

    /// Fetch head-to-head, statistics and player statistics for one match.
    ///
    /// Sub-extraction failures are contained and logged; the corresponding
    /// field stays absent. Only when every tab fails is the error propagated,
    /// which lets the caller's retry logic distinguish a dead session from a
    /// sparse page.
    pub async fn fetch(
        &self,
        driver: &dyn PageDriver,
        match_url: &str,
    ) -> Result<MatchDetail, FetchError> {
        let full_url = self.site.resolve(match_url);
        let base = base_detail_url(&full_url);
        let mut detail = MatchDetail::empty(full_url.clone());

        let mut first_error: Option<FetchError> = None;
        let mut failures = 0u8;

        match self.fetch_h2h(driver, &base).await {
            Ok((start_time, h2h)) => {
                if let Some(time) = start_time {
                    detail.start_time = time;
                }
                detail.h2h = Some(h2h);
            }
            Err(e) => {
                warn!("h2h extraction failed for {base}: {e}");
                failures += 1;
                first_error.get_or_insert(e);
            }
        }

        match self.fetch_statistics(driver, &base).await {
            Ok(stats) => detail.stats = Some(stats),
            Err(e) => {
                warn!("statistics extraction failed for {base}: {e}");
                failures += 1;
                first_error.get_or_insert(e);
            }
        }

        match self.fetch_player_stats(driver, &base).await {
            Ok(players) => detail.player_stats = Some(players),
            Err(e) => {
                warn!("player statistics extraction failed for {base}: {e}");
                failures += 1;
                first_error.get_or_insert(e);
            }
        }

        if failures == 3 {
            // Nothing at all came back; treat as a failed fetch so the
            // caller can retry or recycle the session.
            return Err(first_error.expect("three failures imply an error"));
        }

        Ok(detail)
    }

    async fn fetch_h2h(
        &self,
        driver: &dyn PageDriver,
        base: &str,
    ) -> Result<(Option<String>, H2HData), FetchError> {
        driver.navigate(&format!("{base}#/h2h")).await?;

        // The start time sits in the page header, outside the tab content;
        // its absence costs nothing.
        let start_time = match driver.run_script(scripts::READ_START_TIME).await {
            Ok(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                debug!("start time read failed: {e}");
                None
            }
        };

        driver.run_script(scripts::CLICK_H2H_TAB).await?;
        driver.settle().await;

        let payload: H2hPayload =
            script_payload(driver.run_script(scripts::COLLECT_H2H_ROWS).await?)?;
        Ok((start_time, build_h2h(payload.rows, payload.sections)))
    }

    async fn fetch_statistics(
        &self,
        driver: &dyn PageDriver,
        base: &str,
    ) -> Result<MatchStatistics, FetchError> {
        driver
            .navigate(&format!("{base}#/match-summary/match-statistics"))
            .await?;
        driver.run_script(scripts::CLICK_STATS_TAB).await?;
        driver.settle().await;

        let payload: StatsPayload =
            script_payload(driver.run_script(scripts::COLLECT_STAT_ROWS).await?)?;
        Ok(build_statistics(payload.structured, &payload.rows))
    }

    async fn fetch_player_stats(
        &self,
        driver: &dyn PageDriver,
        base: &str,
    ) -> Result<PlayerStats, FetchError> {
        driver
            .navigate(&format!("{base}#/match-summary/player-statistics"))
            .await?;
        driver.run_script(scripts::CLICK_PLAYER_TAB).await?;
        driver.settle().await;

        let rows: Vec<String> =
            script_payload(driver.run_script(scripts::COLLECT_PLAYER_ROWS).await?)?;
        Ok(build_player_stats(&rows))
    }
}

/// Base match URL for tab fragments: query string and trailing slash
/// stripped.
fn base_detail_url(url: &str) -> String {
    url.split('?')
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
        .to_string()
}

/// Decode a `JSON.stringify`-ed script payload.
fn script_payload<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, FetchError> {
    let text = value.as_str().ok_or_else(|| FetchError::Script {
        message: format!("script returned non-string payload: {value}"),
    })?;
    serde_json::from_str(text).map_err(|e| FetchError::Script {
        message: format!("script payload decode failed: {e}"),
    })
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn usable_row(text: &str) -> bool {
    text.chars().count() > H2H_MIN_CHARS
}

/// Partition head-to-head rows by their section position: the first section
/// is the home side's recent form, the second the away side's, everything
/// after that the direct meetings. Pages without section markup still yield
/// the flat list.
fn build_h2h(rows: Vec<String>, sections: Vec<Vec<String>>) -> H2HData {
    let mut data = H2HData::default();

    data.all_matches = rows
        .iter()
        .filter(|text| usable_row(text))
        .map(|text| clip(text, H2H_CLIP_CHARS))
        .take(15)
        .collect();

    for (index, section_rows) in sections.into_iter().enumerate() {
        for text in section_rows {
            if !usable_row(&text) {
                continue;
            }
            let clipped = clip(&text, H2H_CLIP_CHARS);
            match index {
                0 => data.home_last5.push(clipped),
                1 => data.away_last5.push(clipped),
                _ => data.head_to_head.push(clipped),
            }
        }
    }

    data.home_last5.truncate(5);
    data.away_last5.truncate(5);
    data.head_to_head.truncate(10);
    data
}

/// Build the statistics mapping from the structured rows, falling back to
/// the text scan when the structured strategy came up short. Both strategies
/// feed the raw map; structured values win on label collision.
fn build_statistics(structured: Vec<StructuredStat>, rows: &[String]) -> MatchStatistics {
    let mut stats = MatchStatistics::default();

    for entry in structured {
        if entry.label.is_empty() {
            continue;
        }
        stats.raw.insert(
            entry.label,
            StatPair {
                home: entry.home,
                away: entry.away,
            },
        );
    }

    if stats.raw.len() < STRUCTURED_STAT_MIN {
        debug!(
            "structured stat rows below threshold ({} < {STRUCTURED_STAT_MIN}), running text scan",
            stats.raw.len()
        );
        for row in rows {
            if let Some((label, pair)) = scan_stat_row(row) {
                stats.raw.entry(label).or_insert(pair);
            }
        }
    }

    let classified: Vec<(StatCategory, StatPair)> = stats
        .raw
        .iter()
        .filter_map(|(label, pair)| {
            classify_stat_label(label).map(|category| (category, pair.clone()))
        })
        .collect();
    for (category, pair) in classified {
        stats.set(category, pair);
    }

    stats
}

/// Recognize a `number label-tokens number` line and read the two numbers as
/// the home/away values.
fn scan_stat_row(row: &str) -> Option<(String, StatPair)> {
    let parts: Vec<&str> = row
        .split(['\n', '\t'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 3 {
        return None;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !NUMBER_FULL.is_match(first) || !NUMBER_FULL.is_match(last) {
        return None;
    }

    let label = parts[1..parts.len() - 1].join(" ").trim().to_string();
    if label.chars().count() <= 2 {
        return None;
    }

    Some((
        label,
        StatPair {
            home: first.to_string(),
            away: last.to_string(),
        },
    ))
}

/// Map a statistics label to its canonical category. Pure function of the
/// label text; labels on the site are Cyrillic and the fragments below
/// survive the site's periodic re-wordings better than full labels would.
pub fn classify_stat_label(label: &str) -> Option<StatCategory> {
    let lower = label.to_lowercase();
    if (lower.contains("удар") || lower.contains("брос")) && lower.contains("створ") {
        Some(StatCategory::ShotsOnGoal)
    } else if lower.contains("отраж") || lower.contains("сейв") {
        Some(StatCategory::Saves)
    } else if lower.contains("штраф") {
        Some(StatCategory::PenaltyMinutes)
    } else if lower.contains("большинств") {
        Some(StatCategory::PowerplayGoals)
    } else if lower.contains("блок") {
        Some(StatCategory::BlockedShots)
    } else if lower.contains("вбрас") {
        Some(StatCategory::FaceoffsWon)
    } else if lower.contains("мимо") {
        Some(StatCategory::ShotsMissed)
    } else {
        None
    }
}

/// Which part of the player table a row belongs to. The table announces its
/// goalie section with a marker row, so membership is a property of row
/// order, threaded through a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RosterSection {
    Skaters,
    Goalies,
}

/// Classify and extract player rows in listing order.
fn build_player_stats(rows: &[String]) -> PlayerStats {
    let mut players = PlayerStats::default();
    let mut section = RosterSection::Skaters;

    for row in rows {
        let text = row.trim();
        let lower = text.to_lowercase();

        if lower.contains("вратар") || lower.contains("goalie") {
            section = RosterSection::Goalies;
            continue;
        }
        // Column-header rows are uppercase chrome, not data.
        if text.contains("ИГРОК") {
            continue;
        }

        // A data row carries a time-on-ice token and enough columns to be
        // worth reading.
        if !TOI_TOKEN.is_match(text) {
            continue;
        }
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() < 5 {
            continue;
        }

        let has_goalie_stats = SAVES_TOKEN.is_match(text) && PCT_TOKEN.is_match(text);
        let is_short_row = tokens.len() < 12;

        if has_goalie_stats || (is_short_row && section == RosterSection::Goalies) {
            players.goalies.push(goalie_from_tokens(&tokens));
        } else {
            players.skaters.push(skater_from_tokens(&tokens));
        }
    }

    players
}

fn token_or_unknown<'a>(tokens: &[&'a str], index: usize) -> &'a str {
    tokens.get(index).copied().unwrap_or(UNKNOWN_FIELD)
}

fn find_token(tokens: &[&str], pattern: &Regex) -> String {
    tokens
        .iter()
        .find(|t| pattern.is_match(t))
        .map_or_else(|| UNKNOWN_FIELD.to_string(), |t| (*t).to_string())
}

fn goalie_from_tokens(tokens: &[&str]) -> GoalieLine {
    GoalieLine {
        name: format!("{} {}", tokens[0], token_or_unknown(tokens, 1)).trim().to_string(),
        team: token_or_unknown(tokens, 2).to_string(),
        time_on_ice: find_token(tokens, &TOI_FULL),
        saves: find_token(tokens, &SAVES_FULL),
        save_pct: find_token(tokens, &PCT_FULL),
    }
}

fn skater_from_tokens(tokens: &[&str]) -> SkaterLine {
    SkaterLine {
        name: format!("{} {}", tokens[0], token_or_unknown(tokens, 1)).trim().to_string(),
        team: token_or_unknown(tokens, 2).to_string(),
        goals: token_or_unknown(tokens, 3).to_string(),
        assists: token_or_unknown(tokens, 4).to_string(),
        points: token_or_unknown(tokens, 5).to_string(),
        plus_minus: token_or_unknown(tokens, 6).to_string(),
        penalty_minutes: token_or_unknown(tokens, 7).to_string(),
        shots: token_or_unknown(tokens, 8).to_string(),
        time_on_ice: tokens.last().copied().unwrap_or(UNKNOWN_FIELD).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Броски в створ", Some(StatCategory::ShotsOnGoal))]
    #[case("Удары в створ ворот", Some(StatCategory::ShotsOnGoal))]
    #[case("Отраженные броски", Some(StatCategory::Saves))]
    #[case("Сейвы", Some(StatCategory::Saves))]
    #[case("Штрафные минуты", Some(StatCategory::PenaltyMinutes))]
    #[case("Голы в большинстве", Some(StatCategory::PowerplayGoals))]
    #[case("Блокированные броски", Some(StatCategory::BlockedShots))]
    #[case("Выигранные вбрасывания", Some(StatCategory::FaceoffsWon))]
    #[case("Броски мимо", Some(StatCategory::ShotsMissed))]
    #[case("Владение шайбой", None)]
    #[case("", None)]
    fn stat_labels_classify_deterministically(
        #[case] label: &str,
        #[case] expected: Option<StatCategory>,
    ) {
        assert_eq!(classify_stat_label(label), expected);
        // Same text, same category, every time.
        assert_eq!(classify_stat_label(label), classify_stat_label(label));
    }

    #[test]
    fn base_url_strips_query_and_trailing_slash() {
        assert_eq!(
            base_detail_url("https://example.com/match/hockey/a/b/?mid=E588Co9j"),
            "https://example.com/match/hockey/a/b"
        );
        assert_eq!(
            base_detail_url("https://example.com/match/hockey/a/b"),
            "https://example.com/match/hockey/a/b"
        );
    }

    fn structured(label: &str, home: &str, away: &str) -> StructuredStat {
        StructuredStat {
            label: label.into(),
            home: home.into(),
            away: away.into(),
        }
    }

    #[test]
    fn structured_rows_alone_satisfy_the_threshold() {
        let stats = build_statistics(
            vec![
                structured("Броски в створ", "33", "28"),
                structured("Сейвы", "26", "30"),
                structured("Штрафные минуты", "8", "4"),
                structured("Голы в большинстве", "1", "0"),
                structured("Выигранные вбрасывания", "31", "29"),
            ],
            &["7\nБроски мимо\n5".to_string()],
        );

        assert_eq!(stats.shots_on_goal.home, "33");
        assert_eq!(stats.faceoffs_won.away, "29");
        // Threshold met, so the fallback scan never ran.
        assert!(!stats.raw.contains_key("Броски мимо"));
        assert_eq!(stats.shots_missed, StatPair::unknown());
    }

    #[test]
    fn sparse_structured_rows_trigger_the_text_scan() {
        let rows = vec![
            "33\nБроски в створ\n28".to_string(),
            "7\nБроски мимо\n5".to_string(),
            "не строка статистики".to_string(),
            "8\nШтрафные минуты\n4".to_string(),
            "1\nXX\n2".to_string(), // label too short
        ];
        let stats = build_statistics(vec![structured("Сейвы", "26", "30")], &rows);

        // The structured entry survives untouched.
        assert_eq!(stats.saves, StatPair { home: "26".into(), away: "30".into() });
        // Scanned entries joined the raw superset and classified.
        assert_eq!(stats.shots_on_goal, StatPair { home: "33".into(), away: "28".into() });
        assert_eq!(stats.shots_missed, StatPair { home: "7".into(), away: "5".into() });
        assert_eq!(stats.penalty_minutes, StatPair { home: "8".into(), away: "4".into() });
        assert!(stats.raw.contains_key("Броски мимо"));
        assert!(!stats.raw.contains_key("XX"));
        // Unknown categories stay at the sentinel pair.
        assert_eq!(stats.powerplay_goals, StatPair::unknown());
    }

    #[test]
    fn structured_value_wins_label_collisions() {
        let rows = vec!["99\nСейвы\n99".to_string()];
        let stats = build_statistics(vec![structured("Сейвы", "26", "30")], &rows);
        assert_eq!(stats.raw["Сейвы"], StatPair { home: "26".into(), away: "30".into() });
    }

    #[test]
    fn player_rows_split_by_section_marker() {
        let rows: Vec<String> = [
            "ИГРОК КОМАНДА Г П О +/- ШТР БВ ВП",
            "Мэттьюс Остон TOR 2 1 3 +2 0 6 21:35",
            "Марнер Митч TOR 0 2 2 +1 2 4 20:11",
            "Вратари",
            "Воробьев Илья TOR 0 58:59 28-30 93.3%",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect();

        let players = build_player_stats(&rows);

        assert_eq!(players.skaters.len(), 2);
        assert_eq!(players.goalies.len(), 1);

        let skater = &players.skaters[0];
        assert_eq!(skater.name, "Мэттьюс Остон");
        assert_eq!(skater.team, "TOR");
        assert_eq!(skater.goals, "2");
        assert_eq!(skater.assists, "1");
        assert_eq!(skater.time_on_ice, "21:35");

        let goalie = &players.goalies[0];
        assert_eq!(goalie.name, "Воробьев Илья");
        assert_eq!(goalie.time_on_ice, "58:59");
        assert_eq!(goalie.saves, "28-30");
        assert_eq!(goalie.save_pct, "93.3%");
    }

    #[test]
    fn goalie_stats_pattern_overrides_the_section_flag() {
        // A goalie line appearing before any section marker still classifies
        // as a goalie because it carries both the record and the percentage.
        let rows = vec!["Сорокин Илья NYI 0 59:43 31-33 93.9%".to_string()];
        let players = build_player_stats(&rows);
        assert!(players.skaters.is_empty());
        assert_eq!(players.goalies.len(), 1);
    }

    #[test]
    fn rows_without_time_token_are_ignored() {
        let rows = vec![
            "реклама".to_string(),
            "Мэттьюс Остон TOR 2 1 3".to_string(), // no TOI token
        ];
        let players = build_player_stats(&rows);
        assert!(players.skaters.is_empty());
        assert!(players.goalies.is_empty());
    }

    #[test]
    fn h2h_sections_partition_positionally() {
        let row = |s: &str| format!("{s} 01.03.25 дома 3:2");
        let sections = vec![
            vec![row("Торонто"), row("Торонто"), row("Торонто")],
            vec![row("Бостон"), row("Бостон")],
            vec![row("очная встреча"), row("очная встреча")],
        ];
        let rows: Vec<String> = sections.iter().flatten().cloned().collect();

        let h2h = build_h2h(rows, sections);
        assert_eq!(h2h.home_last5.len(), 3);
        assert_eq!(h2h.away_last5.len(), 2);
        assert_eq!(h2h.head_to_head.len(), 2);
        assert_eq!(h2h.all_matches.len(), 7);
    }

    #[test]
    fn h2h_without_sections_falls_back_to_flat_list() {
        let rows: Vec<String> = (0..20)
            .map(|i| format!("встреча номер {i} 01.03.25 3:2"))
            .collect();
        let h2h = build_h2h(rows, Vec::new());

        assert!(h2h.home_last5.is_empty());
        assert!(h2h.away_last5.is_empty());
        assert!(h2h.head_to_head.is_empty());
        assert_eq!(h2h.all_matches.len(), 15); // capped
    }

    #[test]
    fn h2h_rows_are_clipped_and_noise_dropped() {
        let long = "м".repeat(300);
        let rows = vec![long.clone(), "кор".to_string()];
        let h2h = build_h2h(rows, Vec::new());

        assert_eq!(h2h.all_matches.len(), 1);
        assert_eq!(h2h.all_matches[0].chars().count(), 100);
    }
}
