//! Shared vocabulary for Medgate.
//!
//! This crate defines the data every other layer talks about:
//!
//! - **Types** ([`UserRecord`], [`Role`], [`Identity`], [`SourceKind`]) —
//!   who the visitor is and which identity store vouched for them.
//! - **Endpoint bodies** ([`WhoAmIResponse`], [`LoginRequest`],
//!   [`LoginResponse`]) — what the backend sends and receives.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how user snapshots
//!   are turned into the strings kept in persistent storage.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Store (strings) → Protocol (UserRecord) → Session (resolved identity) → Guard
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Identity, LoginRequest, LoginResponse, ProfileField, Role, SourceKind,
    UserRecord, WhoAmIResponse,
};
