//! The token store: one bearer token mirrored across every alias key.
//!
//! Historically each consumer of the token picked its own storage key,
//! so the same token now lives under several aliases. The rules this
//! module enforces:
//!
//! - `write` sets **every** alias before returning.
//! - `clear` removes **every** alias, the cached user snapshot, and the
//!   provenance marker, then empties the [`AuthorizationSlot`].
//! - `read` returns the first non-empty alias in a fixed priority
//!   order, so stale aliases are never observable through it.

use std::sync::Arc;

use medgate_protocol::{Codec, JsonCodec, SourceKind, UserRecord};
use serde::{Deserialize, Serialize};

use crate::{AuthorizationSlot, KeyValueStore, StoreError};

// ---------------------------------------------------------------------------
// TokenAliases
// ---------------------------------------------------------------------------

/// The storage keys the token store manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenAliases {
    /// Token keys in read-priority order: primary, new-system,
    /// role-specific, persistent backup.
    pub token_keys: Vec<String>,
    /// Keys holding the serialized last-known user record.
    pub user_keys: Vec<String>,
    /// Key recording which identity source signed in last.
    pub provenance_key: String,
}

impl Default for TokenAliases {
    fn default() -> Self {
        Self {
            token_keys: vec![
                "token".into(),
                "authToken".into(),
                "adminToken".into(),
                "persistentToken".into(),
            ],
            user_keys: vec!["user".into(), "userData".into()],
            provenance_key: "authSource".into(),
        }
    }
}

impl TokenAliases {
    /// Checks that the layout is usable.
    ///
    /// # Errors
    /// [`StoreError::InvalidLayout`] if there are no token keys, any key
    /// is blank, or a key appears twice.
    pub fn validated(self) -> Result<Self, StoreError> {
        if self.token_keys.is_empty() {
            return Err(StoreError::InvalidLayout("no token keys".into()));
        }
        let mut seen = std::collections::HashSet::new();
        let all = self
            .token_keys
            .iter()
            .chain(self.user_keys.iter())
            .chain(std::iter::once(&self.provenance_key));
        for key in all {
            if key.trim().is_empty() {
                return Err(StoreError::InvalidLayout("blank key".into()));
            }
            if !seen.insert(key.as_str()) {
                return Err(StoreError::InvalidLayout(format!(
                    "key `{key}` used twice"
                )));
            }
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// TokenStore
// ---------------------------------------------------------------------------

/// Canonical access to the persisted bearer token and user snapshot.
///
/// Process-wide: both identity sources and every guarded route share
/// one `TokenStore` behind an `Arc`.
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
    aliases: TokenAliases,
    slot: AuthorizationSlot,
    codec: JsonCodec,
}

impl TokenStore {
    /// Creates a token store over `backend` with the default aliases.
    pub fn new(backend: Arc<dyn KeyValueStore>, slot: AuthorizationSlot) -> Self {
        Self::with_aliases(backend, slot, TokenAliases::default())
    }

    /// Creates a token store with a custom alias layout.
    pub fn with_aliases(
        backend: Arc<dyn KeyValueStore>,
        slot: AuthorizationSlot,
        aliases: TokenAliases,
    ) -> Self {
        let store = Self {
            backend,
            aliases,
            slot,
            codec: JsonCodec,
        };
        // Keep the header in step with whatever a previous run left behind.
        if let Some(token) = store.read() {
            store.slot.set_bearer(&token);
        }
        store
    }

    /// The alias layout in use.
    pub fn aliases(&self) -> &TokenAliases {
        &self.aliases
    }

    /// The header slot this store keeps in sync.
    pub fn slot(&self) -> &AuthorizationSlot {
        &self.slot
    }

    /// Returns the first non-empty token across the aliases, in priority
    /// order. Never mutates.
    ///
    /// A backend error on one alias is logged and that alias skipped.
    pub fn read(&self) -> Option<String> {
        for key in &self.aliases.token_keys {
            match self.backend.get(key) {
                Ok(Some(value)) if !value.trim().is_empty() => {
                    tracing::trace!(%key, "token read");
                    return Some(value);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(%key, error = %e, "token alias unreadable, skipping");
                }
            }
        }
        None
    }

    /// Sets every alias to `token` and points the default header at it.
    ///
    /// Every alias is attempted even if an earlier one fails; the first
    /// failure is returned after the last alias has been written.
    ///
    /// # Errors
    /// - [`StoreError::EmptyToken`] for a blank token (nothing written)
    /// - the first backend error encountered
    pub fn write(&self, token: &str) -> Result<(), StoreError> {
        if token.trim().is_empty() {
            return Err(StoreError::EmptyToken);
        }

        let mut first_error = None;
        for key in &self.aliases.token_keys {
            if let Err(e) = self.backend.set(key, token) {
                tracing::warn!(%key, error = %e, "token alias write failed");
                first_error.get_or_insert(e);
            }
        }
        self.slot.set_bearer(token);

        tracing::debug!(
            aliases = self.aliases.token_keys.len(),
            token_len = token.len(),
            "token written"
        );

        first_error.map_or(Ok(()), Err)
    }

    /// Removes every alias, the user snapshot, and the provenance
    /// marker, and clears the default header.
    ///
    /// Like [`write`](Self::write), keeps going past failures and
    /// returns the first one.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        let keys = self
            .aliases
            .token_keys
            .iter()
            .chain(self.aliases.user_keys.iter())
            .chain(std::iter::once(&self.aliases.provenance_key));
        for key in keys {
            if let Err(e) = self.backend.remove(key) {
                tracing::warn!(%key, error = %e, "storage key removal failed");
                first_error.get_or_insert(e);
            }
        }
        self.slot.clear();

        tracing::debug!("token store cleared");

        first_error.map_or(Ok(()), Err)
    }

    /// Persists `user` under every user key.
    pub fn write_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        let text = self.codec.encode(user)?;
        let mut first_error = None;
        for key in &self.aliases.user_keys {
            if let Err(e) = self.backend.set(key, &text) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// The cached user record: the first user key that decodes.
    ///
    /// Undecodable snapshots are skipped with a warning, never returned
    /// as errors; a bad snapshot just means "no cache".
    pub fn read_user(&self) -> Option<UserRecord> {
        for key in &self.aliases.user_keys {
            let text = match self.backend.get(key) {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(%key, error = %e, "user snapshot unreadable");
                    continue;
                }
            };
            match self.codec.decode::<UserRecord>(&text) {
                Ok(user) if user.validate().is_ok() => return Some(user),
                Ok(_) => tracing::warn!(%key, "user snapshot has no id, ignoring"),
                Err(e) => tracing::warn!(%key, error = %e, "user snapshot corrupt, ignoring"),
            }
        }
        None
    }

    /// Records which identity source signed in last.
    pub fn write_provenance(&self, source: SourceKind) -> Result<(), StoreError> {
        self.backend
            .set(&self.aliases.provenance_key, &source.to_string())
    }

    /// The source recorded by [`write_provenance`](Self::write_provenance).
    pub fn read_provenance(&self) -> Option<SourceKind> {
        self.backend
            .get(&self.aliases.provenance_key)
            .ok()
            .flatten()
            .and_then(|s| s.parse().ok())
    }

    /// Raw value of every token alias, in priority order. Diagnostic
    /// view; callers that need the token use [`read`](Self::read).
    pub fn alias_values(&self) -> Vec<(String, Option<String>)> {
        self.aliases
            .token_keys
            .iter()
            .map(|key| (key.clone(), self.backend.get(key).ok().flatten()))
            .collect()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("aliases", &self.aliases)
            .field("header_set", &self.slot.is_set())
            .finish_non_exhaustive()
    }
}

// =========================================================================
// Tests
// =========================================================================
