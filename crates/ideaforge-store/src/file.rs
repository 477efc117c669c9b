use ideaforge_utils::error::StoreError;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::KeyValueStore;

/// Store backed by a single JSON object file.
///
/// A missing file reads as empty. Every write rewrites the whole file via
/// temp file + fsync + rename in the same directory, so a crash never leaves
/// a half-written file behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(self.io_err(err)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|err| StoreError::Corrupt {
            path: self.path.display().to_string(),
            reason: err.to_string(),
        })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| self.io_err(e))?;

        let body = serde_json::to_string_pretty(entries).map_err(|err| StoreError::Corrupt {
            path: self.path.display().to_string(),
            reason: err.to_string(),
        })?;

        let mut temp = NamedTempFile::new_in(&parent).map_err(|e| self.io_err(e))?;
        temp.write_all(body.as_bytes()).map_err(|e| self.io_err(e))?;
        temp.write_all(b"\n").map_err(|e| self.io_err(e))?;
        temp.as_file().sync_all().map_err(|e| self.io_err(e))?;
        temp.persist(&self.path).map_err(|e| self.io_err(e.error))?;

        debug!(path = %self.path.display(), entries = entries.len(), "Settings store written");
        Ok(())
    }

    fn locked<T>(&self, f: impl FnOnce() -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _guard = self.guard.lock().map_err(|_| StoreError::Corrupt {
            path: self.path.display().to_string(),
            reason: "lock poisoned".to_string(),
        })?;
        f()
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.locked(|| Ok(self.load()?.remove(key)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.locked(|| {
            let mut entries = self.load()?;
            entries.insert(key.to_string(), value.to_string());
            self.save(&entries)
        })
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.locked(|| {
            let mut entries = self.load()?;
            let existed = entries.remove(key).is_some();
            if existed {
                self.save(&entries)?;
            }
            Ok(existed)
        })
    }

    fn list(&self) -> Result<Vec<(String, String)>, StoreError> {
        self.locked(|| Ok(self.load()?.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("settings.json"));
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.get("anything").unwrap(), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = JsonFileStore::new(&path);
        store.set("unit.SchemaAgent.enabled", "false").unwrap();
        store.set("prompt.planner", "custom").unwrap();
        drop(store);

        let reopened = JsonFileStore::new(&path);
        assert_eq!(
            reopened.get("unit.SchemaAgent.enabled").unwrap().as_deref(),
            Some("false")
        );
        assert!(reopened.delete("prompt.planner").unwrap());
        assert_eq!(reopened.list().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "[1, 2").unwrap();

        match JsonFileStore::new(&path).list() {
            Err(StoreError::Corrupt { .. }) => {}
            other => panic!("Expected Corrupt, got {:?}", other),
        }
    }
}
