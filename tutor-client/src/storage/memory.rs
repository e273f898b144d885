//! In-process key-value store.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{KeyValueStore, StoreError, StoreResult};

/// Volatile store for tests and `--memory-store` sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_overwrite_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("apiKeys").unwrap(), None);

        store.set("apiKeys", "{}").unwrap();
        store.set("apiKeys", r#"{"deepseek":"k1"}"#).unwrap();
        assert_eq!(
            store.get("apiKeys").unwrap().as_deref(),
            Some(r#"{"deepseek":"k1"}"#)
        );
        assert_eq!(store.len(), 1);

        store.remove("apiKeys").unwrap();
        store.remove("apiKeys").unwrap();
        assert!(store.is_empty());
    }
}
