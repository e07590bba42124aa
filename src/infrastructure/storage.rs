//! JSON-backed match store.
//!
//! A single document of shape `{ "matches": { "<id>": { … } } }`, rewritten
//! in full after every accepted record. The file is the unit of durability:
//! each successfully processed match is on disk before the next fetch
//! starts, so an interrupted run never has to re-collect what it already
//! saw.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::domain::MatchRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record is missing its match id")]
    MissingKey,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    matches: BTreeMap<String, MatchRecord>,
}

/// Keyed record set with existence check and whole-file persistence.
pub struct MatchStore {
    path: PathBuf,
    data: StoreData,
}

impl MatchStore {
    /// Load the store from `path`. A missing or unparsable backing file
    /// yields an empty store; collection must be able to start from nothing.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<StoreData>(&content) {
                Ok(data) => {
                    info!("store loaded: {} matches from {:?}", data.matches.len(), path);
                    data
                }
                Err(e) => {
                    warn!("store file {path:?} is corrupt ({e}), starting empty");
                    StoreData::default()
                }
            },
            Err(_) => {
                debug!("no store file at {path:?}, starting empty");
                StoreData::default()
            }
        };
        Self { path, data }
    }

    pub fn exists(&self, id: &str) -> bool {
        self.data.matches.contains_key(id)
    }

    /// Insert or overwrite a record, then persist the whole store.
    ///
    /// A record without an id is rejected; a persistence failure is logged
    /// and swallowed, leaving the in-memory state updated but unsaved; the
    /// next successful write flushes it along.
    pub async fn write(&mut self, record: MatchRecord) -> Result<(), StoreError> {
        if record.id.is_empty() {
            return Err(StoreError::MissingKey);
        }

        let id = record.id.clone();
        self.data.matches.insert(id.clone(), record);
        self.persist().await;
        debug!("stored match {id}");
        Ok(())
    }

    async fn persist(&self) {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent).await {
                    warn!("failed to create store directory {parent:?}: {e}");
                    return;
                }
            }
        }

        // serde_json keeps non-ASCII text verbatim, so team and player names
        // land in the file in their original script.
        match serde_json::to_string_pretty(&self.data) {
            Ok(json) => {
                if let Err(e) = fs::write(&self.path, json).await {
                    warn!("failed to persist store to {:?}: {e}", self.path);
                }
            }
            Err(e) => warn!("failed to serialize store: {e}"),
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &MatchRecord> {
        self.data.matches.values()
    }

    pub fn len(&self) -> usize {
        self.data.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.matches.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MatchDetail, MatchSummary};

    fn record(id: &str) -> MatchRecord {
        let summary = MatchSummary {
            id: id.into(),
            home: "Тампа-Бэй".into(),
            away: "Даллас".into(),
            home_score: "4".into(),
            away_score: "1".into(),
            url: Some("/m/1".into()),
            time: None,
        };
        MatchRecord::from_parts(&summary, MatchDetail::empty("https://example.com/m/1"))
    }

    #[tokio::test]
    async fn missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatchStore::load(dir.path().join("none.json")).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matches.json");
        fs::write(&path, "not json at all").await.unwrap();

        let store = MatchStore::load(&path).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn write_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("matches.json");

        let mut store = MatchStore::load(&path).await;
        store.write(record("g_4_aaa")).await.unwrap();
        store.write(record("g_4_bbb")).await.unwrap();
        assert_eq!(store.len(), 2);

        let reloaded = MatchStore::load(&path).await;
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.exists("g_4_aaa"));
        assert!(reloaded.exists("g_4_bbb"));
        assert!(!reloaded.exists("g_4_ccc"));

        // Cyrillic team names are stored verbatim, not \u-escaped.
        let raw = fs::read_to_string(&path).await.unwrap();
        assert!(raw.contains("Тампа-Бэй"));
        assert!(!raw.contains("\\u0422"));
    }

    #[tokio::test]
    async fn overwriting_an_id_keeps_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MatchStore::load(dir.path().join("matches.json")).await;

        store.write(record("g_4_aaa")).await.unwrap();
        let mut updated = record("g_4_aaa");
        updated.home_score = "5".into();
        store.write(updated).await.unwrap();

        assert_eq!(store.len(), 1);
        let stored = store.all().next().unwrap();
        assert_eq!(stored.home_score, "5");
    }

    #[tokio::test]
    async fn record_without_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MatchStore::load(dir.path().join("matches.json")).await;

        let mut bad = record("x");
        bad.id = String::new();
        assert!(matches!(store.write(bad).await, Err(StoreError::MissingKey)));
        assert!(store.is_empty());
    }
}
