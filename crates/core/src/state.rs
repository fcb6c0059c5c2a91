//! Per-session resume cursors.
//!
//! The state file is a single JSON object keyed by session id:
//! ```json
//! {"3f2a...": {"last_line": 42, "turn_count": 7, "updated": "2026-01-01T00:00:00Z"}}
//! ```
//! It is read wholesale at startup and written wholesale after a session's
//! batch has been submitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// How far a session's transcript has been durably processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// 1-based number of the last transcript line folded into a submitted turn.
    pub last_line: usize,
    pub turn_count: usize,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StateError {
    #[error("IO error on state file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// File-backed map from session id to [`SessionState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    sessions: BTreeMap<String, SessionState>,
}

impl StateStore {
    /// An empty store that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sessions: BTreeMap::new(),
        }
    }

    /// Load the state file. A missing or unreadable file yields an empty store
    /// so processing restarts from the top of each transcript instead of failing.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sessions = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(sessions) => sessions,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt state file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!("Cannot read state file {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };
        Self { path, sessions }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionState> {
        self.sessions.get(session_id)
    }

    /// Last processed line for a session, 0 when nothing was processed yet.
    pub fn last_line(&self, session_id: &str) -> usize {
        self.get(session_id).map_or(0, |s| s.last_line)
    }

    pub fn turn_count(&self, session_id: &str) -> usize {
        self.get(session_id).map_or(0, |s| s.turn_count)
    }

    /// Advance a session's cursor and add `new_turns` to its running count.
    pub fn advance(
        &mut self,
        session_id: &str,
        last_line: usize,
        new_turns: usize,
        now: DateTime<Utc>,
    ) -> &SessionState {
        let turn_count = self.turn_count(session_id) + new_turns;
        self.sessions.insert(
            session_id.to_string(),
            SessionState {
                last_line,
                turn_count,
                updated: now,
            },
        );
        &self.sessions[session_id]
    }

    /// Write the whole map back to disk (temp file + rename).
    pub fn save(&self) -> Result<(), StateError> {
        let io_err = |source| StateError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.sessions)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::load(dir.path().join("state.json"));
        assert_eq!(store.last_line("s1"), 0);
        assert_eq!(store.turn_count("s1"), 0);
        assert!(store.get("s1").is_none());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = StateStore::load(&path);
        assert!(store.get("anything").is_none());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut store = StateStore::new(&path);
        store.advance("s1", 12, 3, ts());
        store.advance("s2", 4, 1, ts());
        store.save().unwrap();

        let loaded = StateStore::load(&path);
        assert_eq!(loaded.get("s1"), store.get("s1"));
        assert_eq!(loaded.get("s2"), store.get("s2"));
        assert_eq!(
            loaded.get("s1"),
            Some(&SessionState {
                last_line: 12,
                turn_count: 3,
                updated: ts(),
            })
        );
    }

    #[test]
    fn test_advance_accumulates_turns() {
        let mut store = StateStore::new("unused.json");
        store.advance("s1", 5, 2, ts());
        let state = store.advance("s1", 9, 3, ts()).clone();
        assert_eq!(state.last_line, 9);
        assert_eq!(state.turn_count, 5);
    }
}
