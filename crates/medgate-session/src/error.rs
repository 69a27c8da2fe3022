//! Error types for the session layer.

use std::time::Duration;

/// How a failed verification is handled.
///
/// Every [`SessionError`] falls into exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The backend explicitly rejected the token. Clears all identity
    /// state; the only automatic logout.
    AuthInvalid,
    /// Network trouble or a server error unrelated to the token. The
    /// stored token is kept and a cached identity is trusted if one
    /// exists.
    Transient,
    /// A success status with a body missing expected fields. Handled
    /// like [`Transient`](Self::Transient): a server bug must not
    /// destroy the local session.
    MalformedResponse,
}

/// Errors that can occur while checking or establishing an identity.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The endpoint answered 401 or 403.
    #[error("token rejected by identity endpoint (HTTP {status})")]
    AuthInvalid { status: u16 },

    /// No response, a non-auth error status, or a transport failure.
    #[error("identity endpoint unavailable: {0}")]
    Transient(String),

    /// The call didn't settle within the configured request timeout.
    #[error("identity check timed out after {0:?}")]
    Timeout(Duration),

    /// A success status whose body lacks the expected fields.
    #[error("malformed identity response: {0}")]
    MalformedResponse(String),

    /// The checker has no login endpoint for this source.
    #[error("login is not supported by this identity checker")]
    LoginUnsupported,

    /// Persisting the identity failed.
    #[error(transparent)]
    Store(#[from] medgate_store::StoreError),
}

impl SessionError {
    /// Classifies the error for the verifier.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AuthInvalid { .. } => FailureKind::AuthInvalid,
            Self::MalformedResponse(_) => FailureKind::MalformedResponse,
            Self::Transient(_)
            | Self::Timeout(_)
            | Self::LoginUnsupported
            | Self::Store(_) => FailureKind::Transient,
        }
    }

    /// Maps a non-success HTTP status: 401/403 reject the token,
    /// everything else is transient.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::AuthInvalid { status },
            _ => Self::Transient(format!("HTTP {status}: {}", truncate(body, 200))),
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
