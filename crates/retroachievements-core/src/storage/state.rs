//! Per-session persisted snapshot.
//!
//! Each session gets one JSON file holding the last fetched snapshot, so a
//! restarted host can diff against what was already reported instead of
//! starting from an empty baseline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{CoreError, StorageError};
use crate::snapshot::Snapshot;

/// On-disk record for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub session_id: String,
    pub saved_at: DateTime<Utc>,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Store rooted at `dir`, created if missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::File {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Store under `<data dir>/state`.
    pub fn open_default() -> Result<Self, CoreError> {
        Ok(Self::open(data_dir()?.join("state"))?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<sanitised id>-<hash prefix>.json`. The hash keeps ids that sanitise
    /// to the same stem apart.
    fn path_for(&self, session_id: &str) -> PathBuf {
        let stem: String = session_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(session_id.as_bytes());
        let digest = hex::encode(hasher.finalize());

        self.dir.join(format!("{stem}-{}.json", &digest[..12]))
    }

    /// Last snapshot saved for `session_id`, if any.
    pub fn load(&self, session_id: &str) -> Result<Option<Snapshot>, StorageError> {
        let path = self.path_for(session_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::File { path, source }),
        };

        let state: PersistedState =
            serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
                path: path.clone(),
                source,
            })?;

        // Written for a different id whose file name collided.
        if state.session_id != session_id {
            return Ok(None);
        }
        Ok(Some(state.snapshot))
    }

    /// Replace the saved snapshot for `session_id`.
    pub fn save(&self, session_id: &str, snapshot: &Snapshot) -> Result<(), StorageError> {
        let path = self.path_for(session_id);
        let state = PersistedState {
            session_id: session_id.to_string(),
            saved_at: Utc::now(),
            snapshot: snapshot.clone(),
        };
        let data = serde_json::to_string_pretty(&state).map_err(|source| StorageError::Corrupt {
            path: path.clone(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(|source| StorageError::File {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StorageError::File {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Delete saved state. Returns whether a file was removed.
    pub fn remove(&self, session_id: &str) -> Result<bool, StorageError> {
        let path = self.path_for(session_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::File { path, source }),
        }
    }
}
