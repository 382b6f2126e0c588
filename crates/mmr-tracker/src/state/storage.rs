/*
[INPUT]:  TaskStateStore snapshots, a durable key-value slot
[OUTPUT]: JSON snapshot written atomically; tolerant loading
[POS]:    Persistence layer - survives process restarts
[UPDATE]: When the slot backend or snapshot format changes
*/

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::task_state::{TaskState, TaskStateStore};

pub const DEFAULT_SNAPSHOT_KEY: &str = "mmr_timer_states";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("local storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode timer snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    /// Stored snapshot could not be understood
    #[error("timer snapshot is corrupt: {0}")]
    Corrupt(String),
}

/// A durable string slot addressed by key.
pub trait KeyValueSlot: Send + Sync {
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    fn write(&self, key: &str, value: &str) -> io::Result<()>;

    fn remove(&self, key: &str) -> io::Result<()>;
}

/// One JSON file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueSlot for FileSlot {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(value.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(self.path_for(key)).map_err(|err| err.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// In-process slot for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySlot {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueSlot for MemorySlot {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.values().remove(key);
        Ok(())
    }
}

/// Saves and restores the whole timer store under a single key.
#[derive(Clone)]
pub struct TimerPersistence {
    slot: Arc<dyn KeyValueSlot>,
    key: String,
}

impl std::fmt::Debug for TimerPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerPersistence")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl TimerPersistence {
    pub fn new(slot: Arc<dyn KeyValueSlot>, key: impl Into<String>) -> Self {
        Self {
            slot,
            key: key.into(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySlot::new()), DEFAULT_SNAPSHOT_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn save(&self, store: &TaskStateStore) -> Result<(), PersistenceError> {
        let encoded = serde_json::to_string(&store.snapshot())?;
        self.slot.write(&self.key, &encoded)?;
        debug!(key = %self.key, orders = store.len(), "timer snapshot saved");
        Ok(())
    }

    /// Load the snapshot, reporting why it could not be used.
    pub fn try_load(&self) -> Result<TaskStateStore, PersistenceError> {
        let Some(raw) = self.slot.read(&self.key)? else {
            return Ok(TaskStateStore::new());
        };
        if raw.trim().is_empty() {
            return Ok(TaskStateStore::new());
        }
        let snapshot: BTreeMap<String, TaskState> = serde_json::from_str(&raw)
            .map_err(|err| PersistenceError::Corrupt(err.to_string()))?;
        TaskStateStore::from_snapshot(snapshot)
            .ok_or_else(|| PersistenceError::Corrupt("inconsistent timer state".to_string()))
    }

    /// Load the snapshot; anything unreadable yields an empty store.
    pub fn load(&self) -> TaskStateStore {
        match self.try_load() {
            Ok(store) => store,
            Err(err) => {
                warn!(key = %self.key, error = %err, "discarding unreadable timer snapshot");
                if let Err(err) = self.slot.remove(&self.key) {
                    warn!(key = %self.key, error = %err, "failed to remove timer snapshot");
                }
                TaskStateStore::new()
            }
        }
    }

    pub fn clear(&self) -> Result<(), PersistenceError> {
        self.slot.remove(&self.key)?;
        Ok(())
    }
}
