//! The backend hook for validating an identity.
//!
//! Medgate doesn't talk to any particular auth backend itself. It
//! defines the [`IdentityChecker`] trait: given a bearer token, return
//! the user it belongs to or a classified error. The verifier calls it
//! whenever a re-check is due.
//!
//! Implementations:
//! - [`HttpIdentityChecker`](crate::HttpIdentityChecker) for a real
//!   "who am I" endpoint (behind the `http` feature)
//! - scripted doubles in tests

use std::future::Future;

use medgate_protocol::{LoginRequest, LoginResponse, SourceKind, UserRecord};

use crate::SessionError;

/// Resolves a bearer token to the user it belongs to.
///
/// The verifier treats the checker as a black box and only cares about
/// which of three ways a call ends, because each one leads somewhere
/// different:
///
/// - `Ok(user)` → the session is live; the user record replaces the
///   cached one.
/// - an [`AuthInvalid`](SessionError::AuthInvalid) error → the token is
///   dead; every alias is wiped and the user is signed out.
/// - anything else → the backend is unreachable or confused; the token
///   is kept and a cached user (if any) is trusted for one cooldown.
///
/// Getting that classification right is the implementor's main job.
/// A 500 mapped to `AuthInvalid` would log every user out during an
/// outage.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → one checker is shared by every guarded route, and
///   checks may run on any thread of the Tokio runtime.
/// - `'static` → it lives as long as the session engine.
///
/// ## Why `impl Future + Send`
///
/// The methods are written as `fn ... -> impl Future<Output = ...> + Send`
/// rather than `async fn` so the returned future is guaranteed `Send`
/// and can be spawned. Implementors still just write `async fn`, as in
/// the example below. The verifier puts its own timeout around each call, so
/// an implementation doesn't need one.
///
/// # Example
///
/// ```rust
/// use medgate_protocol::{Role, UserRecord};
/// use medgate_session::{IdentityChecker, SessionError};
///
/// /// Accepts exactly one token.
/// struct FixedChecker;
///
/// impl IdentityChecker for FixedChecker {
///     async fn who_am_i(&self, token: &str) -> Result<UserRecord, SessionError> {
///         if token == "let-me-in" {
///             Ok(UserRecord::new("1", "Ada", "ada@example.org", Role::Doctor))
///         } else {
///             Err(SessionError::AuthInvalid { status: 401 })
///         }
///     }
/// }
/// ```
pub trait IdentityChecker: Send + Sync + 'static {
    /// Returns the user owning `token`.
    ///
    /// # Errors
    /// - [`SessionError::AuthInvalid`] — the token is invalid or expired
    /// - [`SessionError::Transient`] — the backend couldn't answer
    /// - [`SessionError::MalformedResponse`] — it answered without a user
    fn who_am_i(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<UserRecord, SessionError>> + Send;

    /// Exchanges credentials for `{ user, token }` on the login endpoint
    /// belonging to `source`.
    ///
    /// Checkers without a login endpoint keep the default, which fails
    /// with [`SessionError::LoginUnsupported`].
    fn login(
        &self,
        source: SourceKind,
        request: &LoginRequest,
    ) -> impl Future<Output = Result<LoginResponse, SessionError>> + Send {
        let _ = (source, request);
        async { Err(SessionError::LoginUnsupported) }
    }
}
