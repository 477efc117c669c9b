//! Key-value settings storage.
//!
//! The orchestration core never touches storage directly. It receives a
//! [`KeyValueStore`] and reads it through the typed [`Settings`] view:
//! per-unit prompt overrides, unit on/off toggles and custom reference
//! documentation.

mod file;
mod memory;
mod settings;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use settings::{Settings, SettingsKey};

use ideaforge_utils::error::StoreError;

/// Minimal string key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Backend I/O or decoding failure.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// # Errors
    ///
    /// Backend I/O failure.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`; returns whether it existed.
    ///
    /// # Errors
    ///
    /// Backend I/O failure.
    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Every entry, sorted by key.
    ///
    /// # Errors
    ///
    /// Backend I/O or decoding failure.
    fn list(&self) -> Result<Vec<(String, String)>, StoreError>;
}
