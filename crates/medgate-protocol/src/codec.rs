//! Codec trait and implementations for persisted identity snapshots.
//!
//! Persistent key/value storage only holds strings, so the cached
//! [`UserRecord`](crate::UserRecord) is encoded to text before it is
//! written and decoded when the session bootstraps. The store layer
//! doesn't care HOW: it holds any [`Codec`].

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Converts values to and from the text stored under a storage key.
///
/// `Send + Sync + 'static` so a codec can live inside the shared
/// token store for the whole process.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a storage string.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be
    /// represented in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a storage string back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the text is malformed or
    /// doesn't match the expected type.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that stores values as JSON (via `serde_json`).
///
/// JSON keeps the snapshot readable by any other consumer of the same
/// storage, which is how the cached user record has always been kept.
///
/// ## Example
///
/// ```rust
/// use medgate_protocol::{Codec, JsonCodec, Role, UserRecord};
///
/// let codec = JsonCodec;
/// let user = UserRecord::new("u-1", "Ada", "ada@example.org", Role::Doctor);
///
/// let text = codec.encode(&user).unwrap();
/// let decoded: UserRecord = codec.decode(&text).unwrap();
/// assert_eq!(user, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Role, UserRecord};

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<UserRecord, _> = JsonCodec.decode("{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_user_produces_snake_case_role() {
        let user = UserRecord::new("7", "Grace", "grace@example.org", Role::HospitalAdmin);
        let text = JsonCodec.encode(&user).unwrap();
        assert!(text.contains("\"hospital_admin\""), "got {text}");
    }
}
