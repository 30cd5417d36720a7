//! Durable sync checkpoints
//!
//! A flat JSON mapping from tracked-table name to the timestamp of its last
//! successfully processed change. A missing or corrupt file is an empty
//! mapping, never an error, so a damaged checkpoint only costs re-processing.

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// JSON-file backing for the checkpoint mapping
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole mapping. Absence or corruption yields an empty map.
    pub fn retrieve(&self) -> HashMap<String, String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return HashMap::new(),
        };

        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                warn!("Checkpoint file {:?} is corrupt ({}), starting empty", self.path, e);
                HashMap::new()
            }
        }
    }

    /// Replace the whole mapping on disk. Writes to a sibling temp file and
    /// renames over the target so readers never observe a partial file.
    pub fn persist(&self, state: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("Persisted {} checkpoint(s) to {:?}", state.len(), self.path);
        Ok(())
    }
}

/// Per-table checkpoint state over a [`JsonFileStorage`]
///
/// Single-writer: the sync loop is the only mutator, so whole-map
/// read-modify-write per key update is sufficient.
pub struct SyncState {
    storage: JsonFileStorage,
}

impl SyncState {
    pub fn new(storage: JsonFileStorage) -> Self {
        Self { storage }
    }

    /// Last processed change time for a tracked table. A value that fails to
    /// parse counts as absent.
    pub fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        let state = self.storage.retrieve();
        let raw = state.get(key)?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(e) => {
                warn!("Ignoring unparseable checkpoint for '{}': {}", key, e);
                None
            }
        }
    }

    /// Advance the checkpoint for a tracked table.
    pub fn set(&self, key: &str, value: DateTime<Utc>) -> Result<()> {
        let mut state = self.storage.retrieve();
        state.insert(key.to_string(), value.to_rfc3339());
        self.storage.persist(&state)
    }

    /// All stored checkpoints, parsed. Unparseable entries are skipped.
    pub fn all(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut entries: Vec<(String, DateTime<Utc>)> = self
            .storage
            .retrieve()
            .into_iter()
            .filter_map(|(key, raw)| {
                DateTime::parse_from_rfc3339(&raw)
                    .ok()
                    .map(|ts| (key, ts.with_timezone(&Utc)))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn state_in(dir: &TempDir) -> SyncState {
        SyncState::new(JsonFileStorage::new(dir.path().join("checkpoints.json")))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let state = state_in(&tmp);
        assert_eq!(state.get("content.person"), None);
        assert!(state.all().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("checkpoints.json");
        std::fs::write(&path, "{not json").unwrap();

        let state = SyncState::new(JsonFileStorage::new(path));
        assert_eq!(state.get("content.person"), None);
    }

    #[test]
    fn test_set_get_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let state = state_in(&tmp);

        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        state.set("content.film_work", ts).unwrap();
        assert_eq!(state.get("content.film_work"), Some(ts));
    }

    #[test]
    fn test_set_preserves_other_keys() {
        let tmp = TempDir::new().unwrap();
        let state = state_in(&tmp);

        let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        state.set("content.person", t1).unwrap();
        state.set("content.genre", t2).unwrap();

        assert_eq!(state.get("content.person"), Some(t1));
        assert_eq!(state.get("content.genre"), Some(t2));
        assert_eq!(state.all().len(), 2);
    }

    #[test]
    fn test_unparseable_value_counts_as_absent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("checkpoints.json");
        std::fs::write(&path, r#"{"content.person": "yesterday"}"#).unwrap();

        let state = SyncState::new(JsonFileStorage::new(path));
        assert_eq!(state.get("content.person"), None);
        assert!(state.all().is_empty());
    }

    #[test]
    fn test_persist_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("dir").join("checkpoints.json");
        let state = SyncState::new(JsonFileStorage::new(path.clone()));

        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        state.set("content.genre", ts).unwrap();
        assert!(path.exists());
    }
}
