//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or validating
/// identity data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into text).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning text into a Rust type).
    ///
    /// Common causes: a snapshot written by an older build, truncated
    /// storage, or a backend body missing required fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The value decoded but violates an identity rule, e.g. a user
    /// record with an empty id.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
