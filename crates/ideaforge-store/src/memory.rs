use ideaforge_utils::error::StoreError;
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::KeyValueStore;

/// In-process store. Used by tests and embedders that manage persistence
/// themselves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: RwLock::new(map),
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::Corrupt {
        path: "<memory>".to_string(),
        reason: "lock poisoned".to_string(),
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        Ok(entries.remove(key).is_some())
    }

    fn list(&self) -> Result<Vec<(String, String)>, StoreError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}
