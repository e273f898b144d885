//! Key-value persistence used in place of browser local storage.
//!
//! Conversation logs and API keys are stored as JSON strings under flat
//! string keys (`chat_history_{subject}`, `apiKeys`). Any backend that can
//! get/set/remove a string by key will do.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use thiserror::Error;
use tutor_common::config::{StorageBackend, StorageConfig};

/// Error from a key-value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Capability interface for string persistence.
pub trait KeyValueStore: Send + Sync {
    /// Backend name (e.g., "sqlite", "memory")
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Insert or overwrite.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove a key; missing keys are not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Open the store selected by configuration.
pub fn open_store(config: &StorageConfig) -> StoreResult<Arc<dyn KeyValueStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Sqlite => {
            let store = SqliteStore::open(&config.resolved_path())?;
            Ok(Arc::new(store))
        }
    }
}
