//! Page extraction: listing-page HTML parsing and detail-tab scripting.

pub mod match_detail_parser;
pub mod match_list_parser;
pub mod scripts;

pub use match_detail_parser::{MatchDetailParser, classify_stat_label};
pub use match_list_parser::{ListSelectors, MatchListParser};
