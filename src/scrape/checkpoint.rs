//! Checkpoint of fully scraped channels
//!
//! The checkpoint file holds `{"completed_channels": [...]}`. It is read once
//! at startup and rewritten after every completed channel, so a crash loses
//! at most the channel that was in progress.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::scrape::writer::write_atomic;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    #[serde(default)]
    completed_channels: Vec<String>,
}

impl CheckpointState {
    pub fn completed_channels(&self) -> &[String] {
        &self.completed_channels
    }

    pub fn is_completed(&self, channel: &str) -> bool {
        self.completed_channels.iter().any(|c| c == channel)
    }

    /// Record a channel as done. Returns `false` if it already was.
    pub fn mark_completed(&mut self, channel: &str) -> bool {
        if self.is_completed(channel) {
            return false;
        }
        self.completed_channels.push(channel.to_string());
        true
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the checkpoint. A missing, unreadable or malformed file yields
    /// an empty state; output files still guard finished channels.
    pub fn load(&self) -> CheckpointState {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No checkpoint yet");
                return CheckpointState::default();
            }
            Err(err) => {
                warn!(path = %self.path.display(), "Cannot read checkpoint, starting empty: {}", err);
                return CheckpointState::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                warn!(path = %self.path.display(), "Malformed checkpoint, starting empty: {}", err);
                CheckpointState::default()
            }
        }
    }

    /// Overwrite the checkpoint file with `state`.
    pub fn save(&self, state: &CheckpointState) -> Result<()> {
        let json = serde_json::to_string_pretty(state).map_err(Error::from)?;
        write_atomic(&self.path, json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_empty() {
        let temp = tempdir().unwrap();
        let store = CheckpointStore::new(temp.path().join("checkpoint.json"));
        assert_eq!(store.load(), CheckpointState::default());
    }

    #[test]
    fn malformed_file_loads_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("checkpoint.json");
        fs::write(&path, "{ not json").unwrap();

        let store = CheckpointStore::new(&path);
        assert!(store.load().completed_channels().is_empty());
    }

    #[test]
    fn file_without_field_loads_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("checkpoint.json");
        fs::write(&path, "{}").unwrap();

        assert!(CheckpointStore::new(&path).load().completed_channels().is_empty());
    }

    #[test]
    fn save_then_load_preserves_order() {
        let temp = tempdir().unwrap();
        let store = CheckpointStore::new(temp.path().join("state/checkpoint.json"));

        let mut state = CheckpointState::default();
        state.mark_completed("zeta");
        state.mark_completed("alpha");
        store.save(&state).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.completed_channels(), ["zeta", "alpha"]);
    }

    #[test]
    fn saved_file_has_expected_shape() {
        let temp = tempdir().unwrap();
        let store = CheckpointStore::new(temp.path().join("checkpoint.json"));

        let mut state = CheckpointState::default();
        state.mark_completed("B");
        store.save(&state).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"completed_channels": ["B"]}));
    }

    #[test]
    fn mark_completed_ignores_duplicates() {
        let mut state = CheckpointState::default();
        assert!(state.mark_completed("news"));
        assert!(!state.mark_completed("news"));
        assert_eq!(state.completed_channels().len(), 1);
        assert!(state.is_completed("news"));
        assert!(!state.is_completed("other"));
    }
}
