use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{HistoryError, StoreError};
use crate::snapshot::Snapshot;

/// Storage key for the emission history.
pub const EMISSION_HISTORY_KEY: &str = "calcHistory";
/// Storage key for the pathway history.
pub const PATHWAY_HISTORY_KEY: &str = "pathwayHistory";

/// Durable key/value text storage. `set` must replace the whole value atomically.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory.
/// Writes land in a temp file in the same directory and are renamed over the target.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key))?;
        Ok(())
    }
}

/// Ordered, append-only log of snapshots for one computation domain.
///
/// Insertion order is chronological order. Entries are never removed one at a
/// time, only toggled in or out of aggregate views; the whole log can be cleared.
/// Every mutation rewrites the full serialized collection.
pub struct History<T, S> {
    key: &'static str,
    storage: S,
    entries: Vec<T>,
}

impl<T: Snapshot, S: Storage> History<T, S> {
    /// Read the backing record. Absent, unreadable, or corrupt records start empty.
    pub fn load(storage: S, key: &'static str) -> Self {
        let entries = match storage.get(key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<T>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(key, error = %e, "corrupt history record, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key, error = %e, "history record unreadable, starting empty");
                Vec::new()
            }
        };
        debug!(key, len = entries.len(), "loaded history");
        History { key, storage, entries }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.last()
    }

    /// Append and persist. On a failed write the entry stays in memory.
    pub fn append(&mut self, snapshot: T) -> Result<(), HistoryError> {
        self.entries.push(snapshot);
        self.persist()
    }

    pub fn set_included(&mut self, index: usize, included: bool) -> Result<(), HistoryError> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(HistoryError::IndexOutOfRange { index, len })?;
        entry.set_included(included);
        self.persist()
    }

    /// The last `min(n, len)` entries, oldest first, included or not.
    pub fn query_recent(&self, n: usize) -> &[T] {
        &self.entries[self.window_start(n)..]
    }

    /// Absolute index of the first entry in `query_recent(n)`.
    pub fn window_start(&self, n: usize) -> usize {
        self.entries.len().saturating_sub(n)
    }

    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.entries.clear();
        self.persist()
    }

    fn persist(&self) -> Result<(), HistoryError> {
        let raw = serde_json::to_string(&self.entries).map_err(StoreError::from)?;
        self.storage.set(self.key, &raw)?;
        debug!(key = self.key, len = self.entries.len(), "persisted history");
        Ok(())
    }
}

/// Keep only entries marked as included.
pub fn included_only<T: Snapshot + Clone>(entries: &[T]) -> Vec<T> {
    entries.iter().filter(|e| e.included()).cloned().collect()
}
