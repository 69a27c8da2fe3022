//! Identity sources: the two independently maintained stores of
//! `{ user, token, isAuthenticated }`.

use medgate_protocol::{Identity, SourceKind, UserRecord};
use parking_lot::RwLock;

/// One identity store ("legacy" or "new").
///
/// Each is populated by its own login flow and updated by the verifier
/// when it is the authoritative source. Reads return an owned
/// [`Identity`] snapshot; nothing hands out references into the lock.
#[derive(Debug)]
pub struct IdentitySource {
    kind: SourceKind,
    state: RwLock<Identity>,
}

impl IdentitySource {
    /// Creates an empty source.
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            state: RwLock::new(Identity::empty(kind)),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// The current `{ user, token, isAuthenticated }`.
    pub fn snapshot(&self) -> Identity {
        self.state.read().clone()
    }

    /// The current token, ignoring empty strings.
    pub fn token(&self) -> Option<String> {
        self.state.read().token().map(str::to_owned)
    }

    /// Returns `true` if the source holds `token`.
    pub fn holds_token(&self, token: &str) -> bool {
        self.state.read().token() == Some(token)
    }

    /// Records a validated user and token (login or live verification).
    pub fn set_verified(&self, user: UserRecord, token: &str) {
        *self.state.write() = Identity::authenticated(self.kind, user, token);
    }

    /// Loads what a previous run persisted.
    ///
    /// With a cached user the source is authenticated straight away;
    /// with only a token it holds the token unauthenticated until a
    /// check settles.
    pub fn hydrate(&self, token: &str, cached_user: Option<UserRecord>) {
        let is_authenticated = cached_user.is_some();
        *self.state.write() = Identity {
            user: cached_user,
            token: Some(token.to_owned()),
            is_authenticated,
            source: self.kind,
        };
    }

    /// Replaces the user record without touching the token. Returns the
    /// previous record.
    pub fn replace_user(&self, user: UserRecord) -> Option<UserRecord> {
        self.state.write().user.replace(user)
    }

    /// Marks the source unauthenticated but keeps its token, so a later
    /// check can still succeed once the backend is reachable again.
    pub fn mark_unauthenticated(&self) {
        let mut state = self.state.write();
        state.is_authenticated = false;
        state.user = None;
    }

    /// Forgets everything.
    pub fn clear(&self) {
        *self.state.write() = Identity::empty(self.kind);
    }
}
