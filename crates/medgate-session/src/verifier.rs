//! The session verifier: re-checks the resolved identity against the
//! backend, at most once per cooldown.
//!
//! # State machine
//!
//! ```text
//!            maybe_verify (due, token present)
//!   Idle ─────────────────────────────────────→ Verifying
//!    ↑                                             │
//!    │        ┌── 2xx with user ──→ VerifiedLive ──┤
//!    │        ├── 401/403 ────────→ Unauthenticated { cleared: true }
//!    └────────┤                                    │
//!             ├── transient, cache → VerifiedFromCache
//!             └── transient, none ─→ Unauthenticated { cleared: false }
//! ```
//!
//! After settling the verifier is `Idle` again and the settlement
//! decides when the next check is due:
//!
//! - `VerifiedLive` / `VerifiedFromCache` → after the cooldown
//! - `Unauthenticated { cleared: false }` → after a bounded backoff
//! - `Unauthenticated { cleared: true }` or nothing yet → immediately
//!
//! # Concurrency
//!
//! Everything between "network call settles" and "cooldown timestamp
//! updated" happens under the `in_flight` flag; a second caller that
//! arrives meanwhile is skipped, not queued. The flag is released on
//! every exit path, including the caller dropping the future and the
//! request timing out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use medgate_events::{IdentityBus, IdentityEvent, SignOutReason};
use medgate_protocol::{Identity, ProfileField, SourceKind, UserRecord};
use medgate_store::TokenStore;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{FailureKind, IdentityChecker, IdentitySource, SessionError, resolve};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Upper bound for `cooldown` and `cooldown_jitter`. Longer windows are
/// clamped by [`VerifierConfig::validated`].
pub const MAX_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// Timing knobs for the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Minimum time between two checks once one has produced a usable
    /// identity. Default: 30 seconds.
    pub cooldown: Duration,
    /// Up to this much random time is added to each cooldown window so
    /// several open tabs don't re-check in lockstep. Default: none.
    pub cooldown_jitter: Duration,
    /// Upper bound on one identity check. Default: 10 seconds.
    pub request_timeout: Duration,
    /// First retry delay after a transient failure with nothing cached;
    /// doubles per consecutive failure, capped at `cooldown`.
    /// Default: 2 seconds.
    pub retry_base: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(30),
            cooldown_jitter: Duration::ZERO,
            request_timeout: Duration::from_secs(10),
            retry_base: Duration::from_secs(2),
        }
    }
}

impl VerifierConfig {
    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// Called by [`SessionVerifier::new`]. Rules:
    /// - a zero `request_timeout` is replaced by the default
    /// - `cooldown` and `cooldown_jitter` are capped at [`MAX_COOLDOWN`]
    /// - `retry_base` is capped at `cooldown`
    pub fn validated(mut self) -> Self {
        if self.cooldown > MAX_COOLDOWN {
            warn!(
                cooldown_secs = self.cooldown.as_secs(),
                "cooldown too long, capping at 24 hours"
            );
            self.cooldown = MAX_COOLDOWN;
        }
        if self.cooldown_jitter > MAX_COOLDOWN {
            warn!(
                jitter_secs = self.cooldown_jitter.as_secs(),
                "cooldown_jitter too long, capping at 24 hours"
            );
            self.cooldown_jitter = MAX_COOLDOWN;
        }
        if self.request_timeout.is_zero() {
            warn!("request_timeout of zero would fail every check, using default");
            self.request_timeout = Self::default().request_timeout;
        }
        if self.retry_base > self.cooldown {
            self.retry_base = self.cooldown;
        }
        self
    }

    /// Delay before retrying after `failures` consecutive transient
    /// failures with no cached identity.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.retry_base
            .saturating_mul(1u32 << exponent)
            .min(self.cooldown)
    }

    fn jittered_cooldown(&self) -> Duration {
        if self.cooldown_jitter.is_zero() {
            return self.cooldown;
        }
        let max = self.cooldown_jitter.as_millis().min(u128::from(u64::MAX)) as u64;
        let extra = rand::rng().random_range(0..=max);
        self.cooldown.saturating_add(Duration::from_millis(extra))
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Whether a check is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifierPhase {
    #[default]
    Idle,
    Verifying,
}

/// How the last check settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The backend confirmed the identity.
    VerifiedLive,
    /// The backend was unreachable; a cached record is being trusted.
    VerifiedFromCache,
    /// No usable identity. `cleared` is `true` when the backend rejected
    /// the token and everything was wiped.
    Unauthenticated { cleared: bool },
}

/// `last + window`, clamped to the latest representable instant instead
/// of overflowing.
fn deadline(last: Instant, window: Duration) -> Instant {
    last.checked_add(window)
        .or_else(|| last.checked_add(MAX_COOLDOWN))
        .unwrap_or(last)
}

/// The verifier's bookkeeping. Lives for one page load; never persisted,
/// so every load starts with no `last_checked_at` and checks at least
/// once if a token exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationState {
    /// When the last settled check started.
    pub last_checked_at: Option<Instant>,
    /// The cooldown window in effect (configured cooldown plus jitter).
    pub cooldown: Duration,
    pub in_flight: bool,
    pub verified_from_cache: bool,
    /// `true` until the first check of this page load settles. While it
    /// holds, the guard may show a loading state instead of redirecting.
    pub initial_grace: bool,
    /// Consecutive transient failures; reset by a live success.
    pub consecutive_failures: u32,
    pub last_settlement: Option<Settlement>,
    pub phase: VerifierPhase,
    /// Bumped by every sign-in and sign-out. A check started under an
    /// older generation never commits.
    pub generation: u64,
}

impl VerificationState {
    /// State at page load.
    pub fn fresh(cooldown: Duration) -> Self {
        Self {
            last_checked_at: None,
            cooldown,
            in_flight: false,
            verified_from_cache: false,
            initial_grace: true,
            consecutive_failures: 0,
            last_settlement: None,
            phase: VerifierPhase::Idle,
            generation: 0,
        }
    }

    /// When the next check may run. `None` means "now".
    pub fn next_check_due(&self, config: &VerifierConfig) -> Option<Instant> {
        let last = self.last_checked_at?;
        match self.last_settlement? {
            Settlement::VerifiedLive | Settlement::VerifiedFromCache => {
                Some(deadline(last, self.cooldown))
            }
            Settlement::Unauthenticated { cleared: false } => {
                Some(deadline(last, config.backoff(self.consecutive_failures)))
            }
            Settlement::Unauthenticated { cleared: true } => None,
        }
    }

    /// `true` while the first check of the page load hasn't settled and
    /// there is a token it will run with.
    pub fn initial_check_pending(&self, has_token: bool) -> bool {
        self.initial_grace && has_token
    }

    fn settle(&mut self, settlement: Settlement, now: Instant) {
        self.last_checked_at = Some(now);
        self.last_settlement = Some(settlement);
        self.in_flight = false;
        self.phase = VerifierPhase::Idle;
        self.initial_grace = false;
        self.verified_from_cache = settlement == Settlement::VerifiedFromCache;
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why `maybe_verify` didn't call the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another check is running.
    InFlight,
    /// The last check is recent enough.
    Cooldown,
    /// There is no token to check.
    NoToken,
}

/// What one `maybe_verify` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Skipped(SkipReason),
    VerifiedLive {
        source: SourceKind,
        user: UserRecord,
    },
    VerifiedFromCache {
        source: SourceKind,
        user: UserRecord,
        failure: FailureKind,
    },
    Unauthenticated {
        /// `true` if the token was rejected and all identity state wiped.
        cleared: bool,
        failure: FailureKind,
    },
    /// The guard that asked went away before the check settled; nothing
    /// was committed.
    Abandoned,
}

impl VerifyOutcome {
    /// `true` if a request was sent to the backend.
    pub fn issued_request(&self) -> bool {
        !matches!(self, Self::Skipped(_))
    }
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

/// A flag owned by a mounted guard. Once it is killed, a verification
/// started on that guard's behalf discards its result.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn kill(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases `in_flight` when dropped, so a cancelled or panicking check
/// can't starve every later one.
struct InFlightRelease<'a> {
    state: &'a Mutex<VerificationState>,
}

impl Drop for InFlightRelease<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.in_flight = false;
        state.phase = VerifierPhase::Idle;
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Re-validates the resolved identity against the backend.
///
/// Shared (behind an `Arc`) by every guarded route of the page.
pub struct SessionVerifier<C: IdentityChecker> {
    checker: C,
    config: VerifierConfig,
    store: Arc<TokenStore>,
    legacy: Arc<IdentitySource>,
    modern: Arc<IdentitySource>,
    events: IdentityBus,
    state: Mutex<VerificationState>,
}

impl<C: IdentityChecker> SessionVerifier<C> {
    /// Creates a verifier in the fresh page-load state.
    pub fn new(
        checker: C,
        config: VerifierConfig,
        store: Arc<TokenStore>,
        legacy: Arc<IdentitySource>,
        modern: Arc<IdentitySource>,
        events: IdentityBus,
    ) -> Self {
        let config = config.validated();
        let state = VerificationState::fresh(config.cooldown);
        Self {
            checker,
            config,
            store,
            legacy,
            modern,
            events,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn checker(&self) -> &C {
        &self.checker
    }

    /// A copy of the current bookkeeping.
    pub fn state(&self) -> VerificationState {
        self.state.lock().clone()
    }

    /// The merged identity, re-resolved from both sources on every call.
    pub fn resolved(&self) -> Identity {
        resolve(&self.legacy.snapshot(), &self.modern.snapshot())
    }

    /// Records a fresh login as a live verification at `now`, so the
    /// next navigation doesn't immediately re-check.
    ///
    /// A check still running for the previous token keeps its
    /// `in_flight` flag and discards its result when it settles.
    pub fn record_sign_in(&self, now: Instant) {
        let mut state = self.state.lock();
        let (in_flight, phase) = (state.in_flight, state.phase);
        state.generation = state.generation.wrapping_add(1);
        state.consecutive_failures = 0;
        state.cooldown = self.config.jittered_cooldown();
        state.settle(Settlement::VerifiedLive, now);
        state.in_flight = in_flight;
        state.phase = phase;
    }

    /// Forgets all history after an explicit logout. The initial grace
    /// window is not reopened: there is nothing left to wait for.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let (in_flight, phase) = (state.in_flight, state.phase);
        let generation = state.generation.wrapping_add(1);
        *state = VerificationState::fresh(self.config.cooldown);
        state.generation = generation;
        state.initial_grace = false;
        state.in_flight = in_flight;
        state.phase = phase;
    }

    /// Checks `identity` against the backend if a check is due.
    ///
    /// 1. A check already running → `Skipped(InFlight)`.
    /// 2. Within the cooldown (or backoff) of the last settled check →
    ///    `Skipped(Cooldown)`.
    /// 3. No token in the store or the identity → `Skipped(NoToken)`.
    /// 4. Otherwise call the backend and commit the result, unless
    ///    `liveness` was killed, or a sign-in or sign-out happened
    ///    meanwhile (`Abandoned`).
    pub async fn maybe_verify(
        &self,
        identity: &Identity,
        now: Instant,
        liveness: &Liveness,
    ) -> VerifyOutcome {
        let (token, stored, generation) = {
            let mut state = self.state.lock();
            if state.in_flight {
                debug!("verification skipped: already in flight");
                return VerifyOutcome::Skipped(SkipReason::InFlight);
            }
            if let Some(due) = state.next_check_due(&self.config) {
                if now < due {
                    debug!(
                        remaining_ms = (due - now).as_millis() as u64,
                        "verification skipped: cooling down"
                    );
                    return VerifyOutcome::Skipped(SkipReason::Cooldown);
                }
            }
            let stored = self.store.read();
            let Some(token) = stored
                .clone()
                .or_else(|| identity.token().map(str::to_owned))
            else {
                debug!("verification skipped: no token");
                return VerifyOutcome::Skipped(SkipReason::NoToken);
            };
            state.in_flight = true;
            state.phase = VerifierPhase::Verifying;
            (token, stored, state.generation)
        };
        let _release = InFlightRelease { state: &self.state };

        let result = match tokio::time::timeout(
            self.config.request_timeout,
            self.checker.who_am_i(&token),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout(self.config.request_timeout)),
        };

        if !liveness.is_alive() {
            debug!("guard unmounted before verification settled, discarding result");
            return VerifyOutcome::Abandoned;
        }
        if self.state.lock().generation != generation || self.store.read() != stored {
            debug!("session changed while verifying, discarding result");
            return VerifyOutcome::Abandoned;
        }

        self.commit(&token, result, now)
    }

    /// The source whose token was used: `new` if it holds it, else
    /// `legacy`.
    fn authoritative(&self, token: &str) -> &IdentitySource {
        if self.modern.holds_token(token) {
            &self.modern
        } else {
            &self.legacy
        }
    }

    fn commit(
        &self,
        token: &str,
        result: Result<UserRecord, SessionError>,
        now: Instant,
    ) -> VerifyOutcome {
        let source = self.authoritative(token);
        let kind = source.kind();

        let error = match result {
            Ok(user) => return self.commit_live(source, token, user, now),
            Err(error) => error,
        };

        let failure = error.kind();
        if failure == FailureKind::AuthInvalid {
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "could not clear every token alias");
            }
            self.legacy.clear();
            self.modern.clear();
            {
                let mut state = self.state.lock();
                state.consecutive_failures = 0;
                state.settle(Settlement::Unauthenticated { cleared: true }, now);
            }
            info!(source = %kind, error = %error, "token rejected, session cleared");
            self.events.publish(IdentityEvent::SignedOut {
                reason: SignOutReason::TokenRejected,
            });
            return VerifyOutcome::Unauthenticated {
                cleared: true,
                failure,
            };
        }

        warn!(source = %kind, error = %error, "identity check failed, keeping stored token");

        let cached = source.snapshot().user.or_else(|| self.store.read_user());
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        match cached {
            Some(user) => {
                source.set_verified(user.clone(), token);
                state.cooldown = self.config.jittered_cooldown();
                state.settle(Settlement::VerifiedFromCache, now);
                drop(state);
                self.events.publish(IdentityEvent::Verified {
                    source: kind,
                    user: user.clone(),
                    from_cache: true,
                });
                VerifyOutcome::VerifiedFromCache {
                    source: kind,
                    user,
                    failure,
                }
            }
            None => {
                source.mark_unauthenticated();
                state.settle(Settlement::Unauthenticated { cleared: false }, now);
                debug!(
                    failures = state.consecutive_failures,
                    retry_in_ms = self.config.backoff(state.consecutive_failures).as_millis() as u64,
                    "no cached identity, will retry"
                );
                VerifyOutcome::Unauthenticated {
                    cleared: false,
                    failure,
                }
            }
        }
    }

    fn commit_live(
        &self,
        source: &IdentitySource,
        token: &str,
        user: UserRecord,
        now: Instant,
    ) -> VerifyOutcome {
        let kind = source.kind();
        let previous = source.snapshot().user;

        source.set_verified(user.clone(), token);
        if let Err(e) = self.store.write(token) {
            warn!(error = %e, "could not refresh every token alias");
        }
        if let Err(e) = self.store.write_user(&user) {
            warn!(error = %e, "could not persist user snapshot");
        }

        {
            let mut state = self.state.lock();
            state.consecutive_failures = 0;
            state.cooldown = self.config.jittered_cooldown();
            state.settle(Settlement::VerifiedLive, now);
        }

        info!(source = %kind, role = %user.role, "identity verified");

        self.events.publish(IdentityEvent::Verified {
            source: kind,
            user: user.clone(),
            from_cache: false,
        });
        if let Some(previous) = previous {
            if previous.id == user.id && previous.avatar != user.avatar {
                self.events.publish(IdentityEvent::ProfileUpdated {
                    source: kind,
                    field: ProfileField::Avatar,
                    user: user.clone(),
                });
            }
        }

        VerifyOutcome::VerifiedLive { source: kind, user }
    }
}

impl<C: IdentityChecker> std::fmt::Debug for SessionVerifier<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}
