//! Session state for Medgate.
//!
//! This crate decides who the visitor is:
//!
//! 1. **Identity sources** — the "legacy" and "new" stores of
//!    `{ user, token, isAuthenticated }` ([`IdentitySource`])
//! 2. **Resolution** — merging the two into one identity with a fixed
//!    precedence rule ([`resolve`])
//! 3. **Verification** — re-checking that identity against the backend
//!    at most once per cooldown, falling back to a cached record when
//!    the backend is unreachable ([`SessionVerifier`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Guard Layer (above)    ← asks for the resolved identity + verification state
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Store / Events (below) ← persisted token aliases, identity-change broadcast
//! ```

#![allow(async_fn_in_trait)]

mod checker;
mod error;
#[cfg(feature = "http")]
mod http;
mod resolver;
mod source;
mod verifier;

pub use checker::IdentityChecker;
pub use error::{FailureKind, SessionError};
#[cfg(feature = "http")]
pub use http::{HttpCheckerConfig, HttpIdentityChecker};
pub use resolver::resolve;
pub use source::IdentitySource;
pub use verifier::{
    Liveness, MAX_COOLDOWN, SessionVerifier, Settlement, SkipReason, VerificationState,
    VerifierConfig, VerifierPhase, VerifyOutcome,
};
