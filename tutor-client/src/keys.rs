//! API keys stored under the `apiKeys` key as a JSON object of name → key.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::storage::{KeyValueStore, StoreResult};

/// Storage key holding the key ring.
pub const API_KEYS_KEY: &str = "apiKeys";

/// Reads and edits the key ring in a [`KeyValueStore`].
#[derive(Clone)]
pub struct ApiKeyring {
    store: Arc<dyn KeyValueStore>,
}

impl ApiKeyring {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// All entries, name-sorted. Missing or corrupt data reads as empty.
    pub fn entries(&self) -> BTreeMap<String, String> {
        let raw = match self.store.get(API_KEYS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeMap::new(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read API keys");
                return BTreeMap::new();
            }
        };
        match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(&raw) {
            Ok(map) => map
                .into_iter()
                .filter_map(|(name, value)| match value {
                    serde_json::Value::String(key) if !key.trim().is_empty() => Some((name, key)),
                    _ => None,
                })
                .collect(),
            Err(e) => {
                tracing::error!(error = %e, "Stored API keys are not a JSON object");
                BTreeMap::new()
            }
        }
    }

    /// Key values as sent in request payloads.
    pub fn values(&self) -> Vec<String> {
        self.entries().into_values().collect()
    }

    pub fn set(&self, name: &str, key: &str) -> StoreResult<()> {
        let mut entries = self.entries();
        entries.insert(name.to_string(), key.to_string());
        self.save(&entries)
    }

    /// Remove `name`; returns whether it existed.
    pub fn remove(&self, name: &str) -> StoreResult<bool> {
        let mut entries = self.entries();
        let existed = entries.remove(name).is_some();
        if existed {
            self.save(&entries)?;
        }
        Ok(existed)
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
        // A map of strings always serializes.
        let json = serde_json::to_string(entries).unwrap_or_else(|_| "{}".into());
        self.store.set(API_KEYS_KEY, &json)
    }
}

/// Mask a key for display, keeping the last four characters.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".into();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn keyring() -> (Arc<MemoryStore>, ApiKeyring) {
        let kv = Arc::new(MemoryStore::new());
        (kv.clone(), ApiKeyring::new(kv))
    }

    #[test]
    fn reads_browser_layout() {
        let (kv, ring) = keyring();
        kv.set(API_KEYS_KEY, r#"{"deepseek":"sk-1","qwen":"sk-2","empty":""}"#)
            .unwrap();
        assert_eq!(ring.values(), vec!["sk-1".to_string(), "sk-2".to_string()]);
    }

    #[test]
    fn corrupt_or_missing_reads_empty() {
        let (kv, ring) = keyring();
        assert!(ring.values().is_empty());
        kv.set(API_KEYS_KEY, "[1,2,3]").unwrap();
        assert!(ring.entries().is_empty());
    }

    #[test]
    fn set_and_remove_rewrite_object() {
        let (kv, ring) = keyring();
        ring.set("deepseek", "sk-abc").unwrap();
        ring.set("openai", "sk-def").unwrap();
        assert!(ring.remove("deepseek").unwrap());
        assert!(!ring.remove("deepseek").unwrap());
        assert_eq!(
            kv.get(API_KEYS_KEY).unwrap().as_deref(),
            Some(r#"{"openai":"sk-def"}"#)
        );
    }

    #[test]
    fn mask_keeps_tail() {
        assert_eq!(mask_key("sk-1234567890"), "****7890");
        assert_eq!(mask_key("abc"), "****");
    }
}
