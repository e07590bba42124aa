//! Domain module - match entities and the merge rules between them.

pub mod match_record;

pub use match_record::{
    GoalieLine, H2HData, MatchDetail, MatchRecord, MatchStatistics, MatchSummary, PlayerStats,
    SkaterLine, StatCategory, StatPair, UNKNOWN_FIELD, UNKNOWN_SCORE, UNKNOWN_TIME,
};
