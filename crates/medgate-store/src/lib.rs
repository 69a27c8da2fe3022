//! Storage layer for Medgate.
//!
//! Provides the [`KeyValueStore`] trait that abstracts over where
//! strings are persisted, and the [`TokenStore`] that sits on top of it
//! and owns the bearer-token alias rules.
//!
//! # Feature Flags
//!
//! - `file` (default) — [`FileStore`], a JSON file on disk

mod error;
#[cfg(feature = "file")]
mod file;
mod memory;
mod slot;
mod token;

pub use error::StoreError;
#[cfg(feature = "file")]
pub use file::FileStore;
pub use memory::MemoryStore;
pub use slot::AuthorizationSlot;
pub use token::{TokenAliases, TokenStore};

/// Page-scoped persistent string storage.
///
/// This is the one seam between Medgate and wherever the session
/// actually lives. In a browser that is local storage; here it is a
/// JSON file or, in tests, plain memory. [`TokenStore`] never knows
/// which: it only sees this trait.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → one store is shared (behind an `Arc`) by the token
///   store, the verifier and every guarded navigation, and those may run
///   on any thread of the Tokio runtime.
/// - `'static` → the store owns its data and outlives every task that
///   holds a handle to it.
///
/// ## Why the methods aren't async
///
/// Every caller reads or writes between two `.await` points, never
/// across one, so a blocking call stays short. A backend that really
/// needs I/O (like [`FileStore`]) keeps an in-memory copy and only
/// writes on mutation.
///
/// ## Errors
///
/// Implementations report failures as [`StoreError`]. Callers higher
/// up decide how bad that is: clearing a token that can't be removed
/// is logged and tolerated, while a failed sign-in write is returned.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns the value under `key`, or `None` if it isn't set.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Sets `key` to `value`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Every key currently set, in no particular order.
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_key_value_store_is_object_safe() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a").unwrap();
        store.remove("a").unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
