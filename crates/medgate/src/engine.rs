//! `SessionEngine` builder and the operations a portal shell calls.
//!
//! This is the entry point for embedding Medgate. It ties together all
//! the layers: store → sources → verifier → guard, plus the event bus.

use std::sync::Arc;
use std::time::Instant;

use medgate_events::{IdentityBus, IdentityEvent, IdentitySubscription, SignOutReason};
use medgate_guard::{GuardDecision, GuardMount, RouteGuard};
use medgate_protocol::{
    Identity, LoginRequest, LoginResponse, ProfileField, Role, SourceKind, UserRecord,
};
use medgate_session::{
    HttpIdentityChecker, IdentityChecker, IdentitySource, SessionVerifier, VerificationState,
    VerifyOutcome,
};
use medgate_store::{AuthorizationSlot, KeyValueStore, MemoryStore, TokenStore};
use tracing::{debug, info};

use crate::{EngineConfig, MedgateError};

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring a [`SessionEngine`].
///
/// # Example
///
/// ```rust,no_run
/// use medgate::prelude::*;
///
/// # fn main() -> Result<(), MedgateError> {
/// let engine = SessionEngine::builder()
///     .config(EngineConfig::from_env()?)
///     .store(FileStore::open("session.json")?)
///     .build_http()?;
/// engine.bootstrap();
/// # Ok(())
/// # }
/// ```
pub struct SessionEngineBuilder {
    config: EngineConfig,
    backend: Option<Arc<dyn KeyValueStore>>,
    slot: AuthorizationSlot,
}

impl SessionEngineBuilder {
    /// Creates a builder with default settings and an in-memory store.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            backend: None,
            slot: AuthorizationSlot::new(),
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets where tokens and the user snapshot are persisted.
    pub fn store(mut self, backend: impl KeyValueStore) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Shares an existing default-header slot with the engine's store.
    pub fn slot(mut self, slot: AuthorizationSlot) -> Self {
        self.slot = slot;
        self
    }

    /// Builds the engine around `checker`.
    ///
    /// # Errors
    /// Any validation error of the configuration.
    pub fn build<C: IdentityChecker>(self, checker: C) -> Result<SessionEngine<C>, MedgateError> {
        let config = self.config.validated()?;
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let store = Arc::new(TokenStore::with_aliases(
            backend,
            self.slot,
            config.aliases.clone(),
        ));
        let legacy = Arc::new(IdentitySource::new(SourceKind::Legacy));
        let modern = Arc::new(IdentitySource::new(SourceKind::New));
        let events = IdentityBus::with_capacity(config.event_capacity);
        let verifier = Arc::new(SessionVerifier::new(
            checker,
            config.verifier.clone(),
            Arc::clone(&store),
            Arc::clone(&legacy),
            Arc::clone(&modern),
            events.clone(),
        ));

        Ok(SessionEngine {
            store,
            legacy,
            modern,
            verifier,
            guard: RouteGuard::new(config.routes),
            events,
        })
    }

    /// Builds the engine with an [`HttpIdentityChecker`] pointed at the
    /// configured endpoints.
    pub fn build_http(self) -> Result<SessionEngine<HttpIdentityChecker>, MedgateError> {
        let checker = HttpIdentityChecker::new(self.config.checker_config())?;
        self.build(checker)
    }
}

impl Default for SessionEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The result of one guarded navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// What the verifier did before the decision was taken.
    pub verification: VerifyOutcome,
    pub decision: GuardDecision,
}

/// A user field change requested by the profile page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileUpdate {
    /// New avatar URL, or `None` to remove it.
    Avatar(Option<String>),
    Name(String),
    Email(String),
}

impl ProfileUpdate {
    fn field(&self) -> ProfileField {
        match self {
            Self::Avatar(_) => ProfileField::Avatar,
            Self::Name(_) => ProfileField::Name,
            Self::Email(_) => ProfileField::Email,
        }
    }

    fn apply(self, user: &mut UserRecord) {
        match self {
            Self::Avatar(avatar) => user.avatar = avatar,
            Self::Name(name) => user.name = name,
            Self::Email(email) => user.email = email,
        }
    }
}

/// One page's session: identity sources, verifier, guard and events.
///
/// Every guarded route of the page shares one engine (wrap it in an
/// `Arc` to hand it to tasks).
pub struct SessionEngine<C: IdentityChecker> {
    store: Arc<TokenStore>,
    legacy: Arc<IdentitySource>,
    modern: Arc<IdentitySource>,
    verifier: Arc<SessionVerifier<C>>,
    guard: RouteGuard,
    events: IdentityBus,
}

impl SessionEngine<HttpIdentityChecker> {
    /// Creates a new builder. The builder picks the checker type, so
    /// this serves engines over any [`IdentityChecker`].
    pub fn builder() -> SessionEngineBuilder {
        SessionEngineBuilder::new()
    }
}

impl<C: IdentityChecker> SessionEngine<C> {
    /// Loads the persisted session into the identity source that
    /// created it (legacy unless recorded otherwise).
    ///
    /// With a cached user snapshot the source is authenticated straight
    /// away; with only a token it waits for the first check. Returns
    /// the hydrated source, or `None` if nothing was persisted.
    pub fn bootstrap(&self) -> Option<SourceKind> {
        let Some(token) = self.store.read() else {
            debug!("no persisted token, starting signed out");
            return None;
        };
        let kind = self.store.read_provenance().unwrap_or_default();
        let cached = self.store.read_user();
        let from_cache = cached.is_some();
        self.source(kind).hydrate(&token, cached);
        info!(source = %kind, from_cache, "session restored");
        Some(kind)
    }

    /// The resolved identity, re-computed from both sources.
    pub fn identity(&self) -> Identity {
        self.verifier.resolved()
    }

    /// A copy of the verifier's bookkeeping.
    pub fn verification(&self) -> VerificationState {
        self.verifier.state()
    }

    /// Mounts a guard for `path`. Drop it when the route unmounts.
    pub fn mount(&self, path: impl Into<String>) -> GuardMount {
        GuardMount::new(path)
    }

    /// Evaluates the guard without verifying first.
    pub fn decide(&self, required_roles: &[Role], path: &str) -> GuardDecision {
        let identity = self.identity();
        let has_token = identity.token().is_some() || self.store.read().is_some();
        let awaiting = self.verifier.state().initial_check_pending(has_token);
        self.guard.evaluate(&identity, awaiting, required_roles, path)
    }

    /// A guarded navigation: verify if due, then decide on the
    /// re-resolved identity.
    pub async fn navigate(&self, mount: &GuardMount, required_roles: &[Role]) -> Navigation {
        self.navigate_at(mount, required_roles, Instant::now()).await
    }

    /// [`navigate`](Self::navigate) with an explicit clock reading.
    pub async fn navigate_at(
        &self,
        mount: &GuardMount,
        required_roles: &[Role],
        now: Instant,
    ) -> Navigation {
        let identity = self.identity();
        let verification = self
            .verifier
            .maybe_verify(&identity, now, &mount.liveness())
            .await;
        let decision = self.decide(required_roles, mount.path());
        Navigation {
            verification,
            decision,
        }
    }

    /// The redirect target of `decision`, if it redirects.
    pub fn location(&self, decision: &GuardDecision) -> Option<String> {
        self.guard.location(decision)
    }

    /// Records a completed login on `kind`'s flow.
    ///
    /// Writes the token to every alias, persists the user snapshot and
    /// provenance, and counts as a live verification so the next
    /// navigation doesn't re-check. If the other source still holds a
    /// different token it is cleared, so the fresh login is the one the
    /// resolver picks.
    ///
    /// # Errors
    /// - [`MedgateError::Protocol`] if the user record has no id
    /// - [`MedgateError::Store`] if the token is empty or can't be saved
    pub fn sign_in(&self, kind: SourceKind, response: LoginResponse) -> Result<(), MedgateError> {
        let LoginResponse { user, token } = response;
        user.validate()?;
        self.store.write(&token)?;
        self.store.write_user(&user)?;
        self.store.write_provenance(kind)?;

        let other = self.source(other_kind(kind));
        if other.token().is_some_and(|t| t != token) {
            debug!(source = %other.kind(), "clearing superseded identity source");
            other.clear();
        }
        self.source(kind).set_verified(user.clone(), &token);
        self.verifier.record_sign_in(Instant::now());

        info!(source = %kind, role = %user.role, "signed in");
        self.events
            .publish(IdentityEvent::SignedIn { source: kind, user });
        Ok(())
    }

    /// Logs in through `kind`'s login endpoint and signs in.
    ///
    /// # Errors
    /// [`MedgateError::Session`] if the endpoint rejects the credentials
    /// or can't be reached, plus anything [`sign_in`](Self::sign_in)
    /// returns.
    pub async fn login(
        &self,
        kind: SourceKind,
        request: &LoginRequest,
    ) -> Result<UserRecord, MedgateError> {
        let response = self.verifier.checker().login(kind, request).await?;
        let user = response.user.clone();
        self.sign_in(kind, response)?;
        Ok(user)
    }

    /// Explicit logout: clears every alias, the snapshot and both
    /// sources.
    ///
    /// The in-memory identity is cleared even if the store fails; the
    /// store error is returned afterwards.
    pub fn sign_out(&self) -> Result<(), MedgateError> {
        self.legacy.clear();
        self.modern.clear();
        self.verifier.reset();
        let cleared = self.store.clear();

        info!("signed out");
        self.events.publish(IdentityEvent::SignedOut {
            reason: SignOutReason::UserRequested,
        });
        cleared.map_err(Into::into)
    }

    /// Changes one field of the signed-in user and broadcasts it.
    ///
    /// # Errors
    /// - [`MedgateError::NotSignedIn`] without an authenticated identity
    /// - [`MedgateError::Store`] if the snapshot can't be saved
    pub fn update_profile(&self, update: ProfileUpdate) -> Result<UserRecord, MedgateError> {
        let identity = self.identity();
        let Some(mut user) = identity.user.filter(|_| identity.is_authenticated) else {
            return Err(MedgateError::NotSignedIn);
        };
        let field = update.field();
        update.apply(&mut user);

        self.store.write_user(&user)?;
        self.source(identity.source).replace_user(user.clone());

        debug!(source = %identity.source, ?field, "profile updated");
        self.events.publish(IdentityEvent::ProfileUpdated {
            source: identity.source,
            field,
            user: user.clone(),
        });
        Ok(user)
    }

    /// Starts receiving identity events.
    pub fn subscribe(&self) -> IdentitySubscription {
        self.events.subscribe()
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn source(&self, kind: SourceKind) -> &IdentitySource {
        match kind {
            SourceKind::Legacy => &self.legacy,
            SourceKind::New => &self.modern,
        }
    }

    pub fn verifier(&self) -> &SessionVerifier<C> {
        &self.verifier
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }
}

impl<C: IdentityChecker> std::fmt::Debug for SessionEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("store", &self.store)
            .field("verifier", &self.verifier)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

fn other_kind(kind: SourceKind) -> SourceKind {
    match kind {
        SourceKind::Legacy => SourceKind::New,
        SourceKind::New => SourceKind::Legacy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient() -> UserRecord {
        UserRecord::new("p-1", "Ngozi", "ngozi@example.org", Role::Patient)
    }

    #[test]
    fn test_profile_update_apply() {
        let mut user = patient();
        ProfileUpdate::Avatar(Some("/a.png".into())).apply(&mut user);
        ProfileUpdate::Name("Ngozi A.".into()).apply(&mut user);
        assert_eq!(user.avatar.as_deref(), Some("/a.png"));
        assert_eq!(user.name, "Ngozi A.");
        assert_eq!(ProfileUpdate::Email("x@y".into()).field(), ProfileField::Email);
    }

    #[test]
    fn test_other_kind() {
        assert_eq!(other_kind(SourceKind::Legacy), SourceKind::New);
        assert_eq!(other_kind(SourceKind::New), SourceKind::Legacy);
    }
}
