//! Persistence for lightweight client state.
//!
//! Holds the first-connection flag the connection manager consults, plus
//! operator settings and shortcut bindings. A version tag guards against
//! rehydrating a stale shape after the format changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Bump whenever the persisted shape changes; older files are discarded.
pub const STATE_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    /// Set after the first successful socket open, forever after.
    pub has_connected_before: bool,
    #[serde(default)]
    pub shortcuts: BTreeMap<String, String>,
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            has_connected_before: false,
            shortcuts: BTreeMap::new(),
            settings: BTreeMap::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub fn load(path: &Path) -> Result<Option<PersistedState>, PersistenceError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let state = serde_json::from_str::<PersistedState>(&contents)?;
    if state.version != STATE_VERSION {
        return Ok(None);
    }
    Ok(Some(state))
}

pub fn save(path: &Path, state: &PersistedState) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(state)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// What the connection manager needs to know across restarts: whether this
/// client has ever reached the server before.
pub trait ConnectionMemory: Send {
    fn has_connected_before(&self) -> bool;
    fn mark_connected(&mut self);
}

/// File-backed [`ConnectionMemory`]. Writes are best-effort; a failed save
/// only means the next start is treated as a first connection again.
#[derive(Debug)]
pub struct FileConnectionMemory {
    path: PathBuf,
    state: PersistedState,
}

impl FileConnectionMemory {
    pub fn open(path: PathBuf) -> Result<Self, PersistenceError> {
        let state = load(&path)?.unwrap_or_default();
        Ok(Self { path, state })
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }
}

impl ConnectionMemory for FileConnectionMemory {
    fn has_connected_before(&self) -> bool {
        self.state.has_connected_before
    }

    fn mark_connected(&mut self) {
        if self.state.has_connected_before {
            return;
        }
        self.state.has_connected_before = true;
        if let Err(err) = save(&self.path, &self.state) {
            tracing::warn!(%err, "failed to persist connection flag");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::ConnectionMemory;

    /// In-memory [`ConnectionMemory`] for connection tests.
    #[derive(Debug, Default)]
    pub struct FakeMemory {
        pub connected: bool,
    }

    impl ConnectionMemory for FakeMemory {
        fn has_connected_before(&self) -> bool {
            self.connected
        }

        fn mark_connected(&mut self) {
            self.connected = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = PersistedState::default();
        state.has_connected_before = true;
        state
            .shortcuts
            .insert("focus_next".to_string(), "Tab".to_string());

        save(&path, &state).unwrap();
        let loaded = load(&path).unwrap().unwrap();
        assert!(loaded.has_connected_before);
        assert_eq!(loaded.shortcuts["focus_next"], "Tab");
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn stale_version_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = PersistedState::default();
        state.version = STATE_VERSION - 1;
        state.has_connected_before = true;
        let contents = serde_json::to_string(&state).unwrap();
        std::fs::write(&path, contents).unwrap();

        assert!(load(&path).unwrap().is_none());
    }

    #[test]
    fn file_memory_marks_once_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut memory = FileConnectionMemory::open(path.clone()).unwrap();
        assert!(!memory.has_connected_before());
        memory.mark_connected();
        assert!(memory.has_connected_before());

        let reopened = FileConnectionMemory::open(path).unwrap();
        assert!(reopened.has_connected_before());
    }
}
