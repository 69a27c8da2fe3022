//! Unified error type for Medgate.

use medgate_guard::GuardError;
use medgate_protocol::ProtocolError;
use medgate_session::SessionError;
use medgate_store::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `medgate` crate you deal with this single error type
/// instead of importing errors from each layer. The `#[from]`
/// attributes let `?` convert layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MedgateError {
    /// A malformed user record or payload.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Persisting or reading the token and user snapshot failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Talking to the identity or login endpoint failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The route table is invalid.
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// The operation needs a signed-in identity and there is none.
    #[error("no signed-in identity")]
    NotSignedIn,

    /// Invalid configuration (JSON or environment).
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_store_error() {
        let err: MedgateError = StoreError::EmptyToken.into();
        assert!(matches!(err, MedgateError::Store(_)));
    }

    #[test]
    fn test_from_session_error_is_transparent() {
        let err: MedgateError = SessionError::AuthInvalid { status: 401 }.into();
        assert!(matches!(err, MedgateError::Session(_)));
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_from_guard_error() {
        let err: MedgateError = GuardError::InvalidRoute("x".into()).into();
        assert!(matches!(err, MedgateError::Guard(_)));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: MedgateError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, MedgateError::Protocol(_)));
    }
}
