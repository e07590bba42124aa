use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel for a score the results page did not expose.
pub const UNKNOWN_SCORE: &str = "?";
/// Sentinel for a missing match start time.
pub const UNKNOWN_TIME: &str = "N/A";
/// Sentinel for a player-table column that could not be located.
pub const UNKNOWN_FIELD: &str = "-";

/// One row of the listing page: the minimum needed to decide whether a match
/// is worth a detail fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Page-assigned identifier (e.g. `g_4_E588Co9j`); the store key.
    pub id: String,
    pub home: String,
    pub away: String,
    pub home_score: String,
    pub away_score: String,
    /// Detail-page link; absent rows stay in the summary set but are never
    /// detail-fetched.
    pub url: Option<String>,
    /// Kickoff time as printed on the schedule page; finished rows leave it
    /// empty.
    pub time: Option<String>,
}

impl MatchSummary {
    /// Both scores present and non-sentinel. The results page only lists
    /// completed games, so this doubles as the "finished" check.
    pub fn has_score(&self) -> bool {
        !self.home_score.is_empty()
            && !self.away_score.is_empty()
            && self.home_score != UNKNOWN_SCORE
            && self.away_score != UNKNOWN_SCORE
    }
}

/// Head-to-head tab content: recent form plus direct meetings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct H2HData {
    pub home_last5: Vec<String>,
    pub away_last5: Vec<String>,
    pub head_to_head: Vec<String>,
    /// Flat superset kept as a fallback for when section markup is absent.
    pub all_matches: Vec<String>,
}

/// Home/away value pair for one statistic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatPair {
    pub home: String,
    pub away: String,
}

impl StatPair {
    pub fn unknown() -> Self {
        Self {
            home: UNKNOWN_SCORE.to_string(),
            away: UNKNOWN_SCORE.to_string(),
        }
    }
}

impl Default for StatPair {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Canonical statistic categories recognized on the statistics tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatCategory {
    ShotsOnGoal,
    ShotsMissed,
    Saves,
    PenaltyMinutes,
    PowerplayGoals,
    BlockedShots,
    FaceoffsWon,
}

/// Match statistics: the canonical categories plus the raw label→pair map
/// preserving everything the page exposed, known or not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStatistics {
    pub shots_on_goal: StatPair,
    pub shots_missed: StatPair,
    pub saves: StatPair,
    pub penalty_minutes: StatPair,
    pub powerplay_goals: StatPair,
    pub blocked_shots: StatPair,
    pub faceoffs_won: StatPair,
    pub raw: BTreeMap<String, StatPair>,
}

impl MatchStatistics {
    pub fn set(&mut self, category: StatCategory, pair: StatPair) {
        match category {
            StatCategory::ShotsOnGoal => self.shots_on_goal = pair,
            StatCategory::ShotsMissed => self.shots_missed = pair,
            StatCategory::Saves => self.saves = pair,
            StatCategory::PenaltyMinutes => self.penalty_minutes = pair,
            StatCategory::PowerplayGoals => self.powerplay_goals = pair,
            StatCategory::BlockedShots => self.blocked_shots = pair,
            StatCategory::FaceoffsWon => self.faceoffs_won = pair,
        }
    }
}

/// One skater row from the player-statistics tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkaterLine {
    pub name: String,
    pub team: String,
    pub goals: String,
    pub assists: String,
    pub points: String,
    pub plus_minus: String,
    pub penalty_minutes: String,
    pub shots: String,
    pub time_on_ice: String,
}

/// One goalie row from the player-statistics tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalieLine {
    pub name: String,
    pub team: String,
    pub time_on_ice: String,
    /// Saves record as printed, e.g. `28-30`.
    pub saves: String,
    pub save_pct: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub skaters: Vec<SkaterLine>,
    pub goalies: Vec<GoalieLine>,
}

/// Everything extracted from one match's detail pages. Any tab may have
/// failed independently; its field is then simply absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDetail {
    pub url: String,
    pub start_time: String,
    pub h2h: Option<H2HData>,
    pub stats: Option<MatchStatistics>,
    pub player_stats: Option<PlayerStats>,
}

impl MatchDetail {
    pub fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            start_time: UNKNOWN_TIME.to_string(),
            h2h: None,
            stats: None,
            player_stats: None,
        }
    }
}

/// The persisted unit: listing summary merged with detail data, keyed by the
/// page-assigned id. Detail fields win where the two overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: String,
    pub home: String,
    pub away: String,
    pub home_score: String,
    pub away_score: String,
    pub url: String,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h2h: Option<H2HData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<MatchStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_stats: Option<PlayerStats>,
    pub collected_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Merge a listing summary with its detail fetch. The detail's absolute
    /// `url` and `start_time` take precedence over the summary's relative
    /// link and kickoff time.
    pub fn from_parts(summary: &MatchSummary, detail: MatchDetail) -> Self {
        let start_time = if detail.start_time != UNKNOWN_TIME {
            detail.start_time
        } else {
            summary.time.clone().unwrap_or_else(|| UNKNOWN_TIME.to_string())
        };

        Self {
            id: summary.id.clone(),
            home: summary.home.clone(),
            away: summary.away.clone(),
            home_score: summary.home_score.clone(),
            away_score: summary.away_score.clone(),
            url: detail.url,
            start_time,
            h2h: detail.h2h,
            stats: detail.stats,
            player_stats: detail.player_stats,
            collected_at: Utc::now(),
        }
    }
}
