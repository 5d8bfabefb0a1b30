//! Storage backends for [`Session`](super::Session).

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when persisting session data.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The stored data could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A string key/value store with browser-storage semantics.
///
/// Reads never fail: an unreadable backend behaves as empty.
pub trait LocalStorage: Send + Sync {
    /// Value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Storage persisted as a single JSON object on disk.
///
/// The whole file is rewritten on every change; the entry count is a
/// handful of keys so this stays cheap. The parent directory is created on
/// first write.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the storage file at `path`.
    ///
    /// A missing file starts empty. A file that is not a JSON string map is
    /// logged and treated as empty; it is overwritten on the next change.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable storage file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not read storage file");
                BTreeMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let raw = serde_json::to_string_pretty(entries)?;
        // Write to a sibling file then rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!(path = %self.path.display(), keys = entries.len(), "Storage persisted");
        Ok(())
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        if entries.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&entries)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("craftmart-storage-{}-{name}", uuid::Uuid::new_v4()))
            .join("storage.json")
    }

    #[test]
    fn test_memory_storage_set_get_remove() {
        let storage = MemoryStorage::default();
        assert!(storage.get("k").is_none());
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").as_deref(), Some("v"));
        storage.remove("k").unwrap();
        assert!(storage.get("k").is_none());
        storage.remove("k").unwrap();
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let path = temp_path("persist");
        {
            let storage = FileStorage::open(&path);
            storage.set("accessToken", "abc").unwrap();
            storage.set("customerId", "12").unwrap();
        }
        let reopened = FileStorage::open(&path);
        assert_eq!(reopened.get("accessToken").as_deref(), Some("abc"));
        assert_eq!(reopened.get("customerId").as_deref(), Some("12"));

        reopened.remove("accessToken").unwrap();
        let again = FileStorage::open(&path);
        assert!(again.get("accessToken").is_none());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_storage_ignores_corrupt_file() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[1, 2, 3]").unwrap();

        let storage = FileStorage::open(&path);
        assert!(storage.get("anything").is_none());
        storage.set("k", "v").unwrap();
        assert_eq!(FileStorage::open(&path).get("k").as_deref(), Some("v"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
