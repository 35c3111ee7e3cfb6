//! Persisted client state.
//!
//! A small JSON file keeps what must survive between runs: the study counters
//! and the access token. Keys match what the web client stores
//! (`documentsProcessed`, `currentStreak`, `access_token`) so a state file can
//! be inspected or seeded by hand.
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the target, so a crash never leaves a half-written file.

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Document counts that unlock an achievement.
pub const MILESTONES: &[u64] = &[5, 10, 15, 20];

/// Returns the milestone reached when the counter is exactly at one.
pub fn milestone_reached(documents_processed: u64) -> Option<u64> {
    MILESTONES
        .iter()
        .copied()
        .find(|m| *m == documents_processed)
}

/// Contents of the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    #[serde(rename = "documentsProcessed", default)]
    pub documents_processed: u64,
    #[serde(rename = "currentStreak", default)]
    pub current_streak: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Owns the [`ClientState`] and, unless in-memory, the file backing it.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    path: Option<PathBuf>,
    state: ClientState,
}

impl StateStore {
    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the state file at `path`. A missing file yields fresh state.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => ClientState::default(),
            Ok(text) => {
                serde_json::from_str(&text).map_err(|e| ClientError::StateCorrupt {
                    path: path.clone(),
                    detail: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting fresh", path.display());
                ClientState::default()
            }
            Err(source) => return Err(ClientError::StateIo { path, source }),
        };
        Ok(Self {
            path: Some(path),
            state,
        })
    }

    /// Load the state file at [`StateStore::default_path`].
    pub fn open_default() -> Result<Self, ClientError> {
        match Self::default_path() {
            Some(path) => Self::open(path),
            None => {
                warn!("No config directory on this platform; state will not be saved");
                Ok(Self::in_memory())
            }
        }
    }

    /// `<config dir>/studybuddy/state.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("studybuddy").join("state.json"))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn documents_processed(&self) -> u64 {
        self.state.documents_processed
    }

    pub fn current_streak(&self) -> u64 {
        self.state.current_streak
    }

    pub fn access_token(&self) -> Option<&str> {
        self.state.access_token.as_deref()
    }

    /// Bump both counters for one finished document, with a single write.
    pub fn record_completion(&mut self) -> Result<(), ClientError> {
        self.state.documents_processed += 1;
        self.state.current_streak += 1;
        self.save()
    }

    pub fn reset_streak(&mut self) -> Result<(), ClientError> {
        self.state.current_streak = 0;
        self.save()
    }

    pub fn set_access_token(&mut self, token: Option<String>) -> Result<(), ClientError> {
        self.state.access_token = token;
        self.save()
    }

    /// Write the state file atomically. No-op for in-memory stores.
    pub fn save(&self) -> Result<(), ClientError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |source| ClientError::StateIo {
            path: path.clone(),
            source,
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let json = serde_json::to_vec_pretty(&self.state)
            .map_err(|e| ClientError::Internal(format!("Failed to encode state: {e}")))?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        debug!("Saved state to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milestones() {
        assert_eq!(milestone_reached(5), Some(5));
        assert_eq!(milestone_reached(20), Some(20));
        assert_eq!(milestone_reached(6), None);
        assert_eq!(milestone_reached(25), None);
    }

    #[test]
    fn missing_file_is_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json")).unwrap();
        assert_eq!(store.state(), &ClientState::default());
    }

    #[test]
    fn counters_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut store = StateStore::open(&path).unwrap();
        store.record_completion().unwrap();
        store.record_completion().unwrap();
        store.set_access_token(Some("tok".into())).unwrap();

        let reopened = StateStore::open(&path).unwrap();
        assert_eq!(reopened.documents_processed(), 2);
        assert_eq!(reopened.current_streak(), 2);
        assert_eq!(reopened.access_token(), Some("tok"));
    }

    #[test]
    fn uses_web_client_key_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"documentsProcessed": 4, "currentStreak": 2}"#).unwrap();

        let mut store = StateStore::open(&path).unwrap();
        store.record_completion().unwrap();
        assert_eq!(store.documents_processed(), 5);
        assert_eq!(store.current_streak(), 3);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"documentsProcessed\": 5"), "got: {text}");
        assert!(!text.contains("access_token"));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            StateStore::open(&path),
            Err(ClientError::StateCorrupt { .. })
        ));
    }

    #[test]
    fn reset_streak_keeps_documents() {
        let mut store = StateStore::in_memory();
        store.record_completion().unwrap();
        store.reset_streak().unwrap();
        assert_eq!(store.documents_processed(), 1);
        assert_eq!(store.current_streak(), 0);
    }
}
