//! The network client's default `Authorization` header.

use std::sync::Arc;

use parking_lot::RwLock;

/// Shared default `Authorization` header value.
///
/// Every network consumer holds a clone and reads the current value
/// when building a request. [`TokenStore`](crate::TokenStore) is the
/// only writer: `write` sets it, `clear` empties it.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationSlot {
    value: Arc<RwLock<Option<String>>>,
}

impl AuthorizationSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the header to `Bearer <token>`.
    pub fn set_bearer(&self, token: &str) {
        *self.value.write() = Some(format!("Bearer {token}"));
    }

    /// Removes the header.
    pub fn clear(&self) {
        *self.value.write() = None;
    }

    /// The full header value, e.g. `Bearer abc`.
    pub fn header(&self) -> Option<String> {
        self.value.read().clone()
    }

    /// The bare token inside the header.
    pub fn bearer_token(&self) -> Option<String> {
        self.value
            .read()
            .as_deref()
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_owned)
    }

    /// Returns `true` if a header is set.
    pub fn is_set(&self) -> bool {
        self.value.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_bearer_then_clear() {
        let slot = AuthorizationSlot::new();
        let reader = slot.clone();

        slot.set_bearer("abc");
        assert_eq!(reader.header().as_deref(), Some("Bearer abc"));
        assert_eq!(reader.bearer_token().as_deref(), Some("abc"));

        slot.clear();
        assert!(!reader.is_set());
        assert_eq!(reader.bearer_token(), None);
    }
}
