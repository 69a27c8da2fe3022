//! Core identity types.
//!
//! These are the structures that travel between the backend, the
//! persistent store, and the route guard. Everything here is plain data:
//! no I/O, no locking.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// The closed set of roles a user can hold.
///
/// Serialized in snake_case (`"super_admin"`, `"hospital_admin"`, ...).
/// Anything the backend sends that isn't in the set decodes as
/// [`Role::Unknown`] instead of failing; an unrecognized role is a
/// user with no privileges, not a broken response.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The elevated role: platform-wide administration.
    SuperAdmin,
    /// Administers a single hospital.
    HospitalAdmin,
    Doctor,
    Patient,
    /// Missing or unrecognized role.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Role {
    /// The role with the broadest administrative scope. Its home route
    /// lives under its own path prefix.
    pub const ELEVATED: Role = Role::SuperAdmin;

    /// Returns `true` for [`Role::ELEVATED`].
    pub fn is_elevated(self) -> bool {
        self == Self::ELEVATED
    }

    /// The wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::HospitalAdmin => "hospital_admin",
            Self::Doctor => "doctor",
            Self::Patient => "patient",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    /// Parses a wire name. Accepts the kebab-case spellings used in
    /// route segments as well (`super-admin`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "super_admin" => Ok(Self::SuperAdmin),
            "hospital_admin" => Ok(Self::HospitalAdmin),
            "doctor" => Ok(Self::Doctor),
            "patient" => Ok(Self::Patient),
            "unknown" => Ok(Self::Unknown),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown role: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// UserRecord
// ---------------------------------------------------------------------------

/// The user record returned by the identity-check and login endpoints.
///
/// Owned by whichever identity source last validated it; the guard and
/// presentation layers only read it.
///
/// The backend has historically sent the id both as `id` and as a
/// Mongo-style `_id`, sometimes as a number, so deserialization accepts
/// all of those and normalizes to a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(alias = "_id", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
    /// Profile picture URL. The one field other components watch for
    /// live changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UserRecord {
    /// Builds a record without an avatar.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            role,
            avatar: None,
        }
    }

    /// Sets the avatar URL (builder style).
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Checks the fields a user record can't do without.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] if the id is blank.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.id.trim().is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "user record has an empty id".into(),
            ));
        }
        Ok(())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Uint(n) => n.to_string(),
    })
}

// ---------------------------------------------------------------------------
// SourceKind / Identity
// ---------------------------------------------------------------------------

/// Which of the two identity stores produced an [`Identity`].
///
/// `Legacy` is the original auth flow, `New` the system being migrated
/// to. Serialized as `"legacy"` / `"new"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Legacy,
    New,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::New => f.write_str("new"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "legacy" => Ok(Self::Legacy),
            "new" => Ok(Self::New),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown identity source: {other}"
            ))),
        }
    }
}

/// A `{ user, token, isAuthenticated }` triple tagged with its source.
///
/// Each identity source exposes one of these; the resolver picks one of
/// the two as the identity every authorization decision uses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub user: Option<UserRecord>,
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub source: SourceKind,
}

impl Identity {
    /// An identity with nothing in it.
    pub fn empty(source: SourceKind) -> Self {
        Self {
            user: None,
            token: None,
            is_authenticated: false,
            source,
        }
    }

    /// A signed-in identity.
    pub fn authenticated(
        source: SourceKind,
        user: UserRecord,
        token: impl Into<String>,
    ) -> Self {
        Self {
            user: Some(user),
            token: Some(token.into()),
            is_authenticated: true,
            source,
        }
    }

    /// The user's role, if a user is present.
    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    /// The token, ignoring empty strings.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// `true` if the identity carries neither a user nor a token.
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.token().is_none()
    }
}

// ---------------------------------------------------------------------------
// Endpoint bodies
// ---------------------------------------------------------------------------

/// Success body of the "who am I" endpoint: `{ "user": { ... } }`.
///
/// `user` is optional here so a 200 without it can be reported as a
/// malformed response rather than a decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    #[serde(default)]
    pub user: Option<UserRecord>,
}

/// Body POSTed to a login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Success body of a login endpoint: `{ "user": { ... }, "token": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserRecord,
    pub token: String,
}

/// A user field whose change is broadcast to other components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Avatar,
    Name,
    Email,
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Avatar => f.write_str("avatar"),
            Self::Name => f.write_str("name"),
            Self::Email => f.write_str("email"),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn doctor() -> UserRecord {
        UserRecord::new("42", "Dr. Okafor", "okafor@example.org", Role::Doctor)
    }

    // =====================================================================
    // Role
    // =====================================================================

    #[test]
    fn test_role_unknown_string_decodes_as_unknown() {
        let role: Role = serde_json::from_str("\"janitor\"").unwrap();
        assert_eq!(role, Role::Unknown);
    }

    #[test]
    fn test_role_from_str_accepts_kebab_case() {
        assert_eq!("super-admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert_eq!("Hospital_Admin".parse::<Role>().unwrap(), Role::HospitalAdmin);
        assert!("nurse".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_only_super_admin_is_elevated() {
        assert!(Role::SuperAdmin.is_elevated());
        assert!(!Role::HospitalAdmin.is_elevated());
        assert!(!Role::Doctor.is_elevated());
        assert!(!Role::Patient.is_elevated());
        assert!(!Role::Unknown.is_elevated());
    }

    // =====================================================================
    // UserRecord
    // =====================================================================

    #[test]
    fn test_user_record_accepts_mongo_id_and_numeric_id() {
        let a: UserRecord = serde_json::from_str(
            r#"{ "_id": "abc", "name": "A", "email": "a@x", "role": "patient" }"#,
        )
        .unwrap();
        assert_eq!(a.id, "abc");

        let b: UserRecord =
            serde_json::from_str(r#"{ "id": 17, "role": "doctor" }"#).unwrap();
        assert_eq!(b.id, "17");
        assert_eq!(b.name, "");
        assert_eq!(b.role, Role::Doctor);
    }

    #[test]
    fn test_user_record_missing_role_defaults_to_unknown() {
        let user: UserRecord =
            serde_json::from_str(r#"{ "id": "1", "name": "N" }"#).unwrap();
        assert_eq!(user.role, Role::Unknown);
        assert_eq!(user.avatar, None);
    }

    #[test]
    fn test_user_record_validate_rejects_blank_id() {
        let user = UserRecord::new("  ", "x", "x@y", Role::Patient);
        assert!(matches!(user.validate(), Err(ProtocolError::InvalidMessage(_))));
        assert!(doctor().validate().is_ok());
    }

    #[test]
    fn test_user_record_without_avatar_omits_field() {
        let json = serde_json::to_value(doctor()).unwrap();
        assert!(json.get("avatar").is_none());

        let json = serde_json::to_value(doctor().with_avatar("/a.png")).unwrap();
        assert_eq!(json["avatar"], "/a.png");
    }

    // =====================================================================
    // Identity
    // =====================================================================

    #[test]
    fn test_identity_empty_token_counts_as_missing() {
        let identity = Identity {
            token: Some(String::new()),
            ..Identity::empty(SourceKind::New)
        };
        assert_eq!(identity.token(), None);
        assert!(identity.is_empty());
    }

    #[test]
    fn test_identity_authenticated_exposes_role() {
        let identity = Identity::authenticated(SourceKind::Legacy, doctor(), "t");
        assert_eq!(identity.role(), Some(Role::Doctor));
        assert_eq!(identity.token(), Some("t"));
        assert!(identity.is_authenticated);
    }

    #[test]
    fn test_source_kind_wire_names() {
        assert_eq!(serde_json::to_value(SourceKind::New).unwrap(), "new");
        assert_eq!("legacy".parse::<SourceKind>().unwrap(), SourceKind::Legacy);
        assert_eq!(SourceKind::default(), SourceKind::Legacy);
    }

    // =====================================================================
    // Endpoint bodies
    // =====================================================================

    #[test]
    fn test_who_am_i_without_user_decodes_to_none() {
        let body: WhoAmIResponse = serde_json::from_str(r#"{ "ok": true }"#).unwrap();
        assert_eq!(body.user, None);
    }

    #[test]
    fn test_login_response_decodes_user_and_token() {
        let body: LoginResponse = serde_json::from_str(
            r#"{ "token": "jwt", "user": { "id": "9", "role": "super_admin" } }"#,
        )
        .unwrap();
        assert_eq!(body.token, "jwt");
        assert!(body.user.role.is_elevated());
    }
}
