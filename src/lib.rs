//! rinkscore - incremental NHL match-result collection.
//!
//! Drives a headless browser against a script-heavy results site, extracts
//! finished-match records (scores, head-to-head history, team and player
//! statistics) and persists them incrementally into a local JSON store,
//! never re-fetching a match it already holds.

pub mod collector;
pub mod domain;
pub mod infrastructure;

pub use collector::{Collector, RunReport};
