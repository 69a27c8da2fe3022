//! In-process [`KeyValueStore`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{KeyValueStore, StoreError};

/// A [`KeyValueStore`] backed by a `HashMap`.
///
/// Cloning yields another handle to the same map, so a test can keep a
/// handle and inspect what the token store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with `entries`.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Arc::new(RwLock::new(map)),
        }
    }

    /// Number of keys set.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_clones_share_entries() {
        let a = MemoryStore::new();
        let b = a.clone();
        a.set("token", "abc").unwrap();
        assert_eq!(b.get("token").unwrap().as_deref(), Some("abc"));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_memory_store_with_entries_prefills() {
        let store = MemoryStore::with_entries([("token", "t1"), ("user", "{}")]);
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
        assert_eq!(store.get("user").unwrap().as_deref(), Some("{}"));
        assert_eq!(store.get("missing").unwrap(), None);
    }
}
