//! # Medgate
//!
//! Session authentication and route guarding for a hospital portal.
//!
//! Medgate keeps two identity sources (a legacy and a new auth flow)
//! in step with one persisted bearer token, re-checks the merged
//! identity against the backend at most once per cooldown, and decides
//! for every protected navigation whether to render, wait or redirect.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medgate::prelude::*;
//!
//! # async fn run() -> Result<(), MedgateError> {
//! let engine = SessionEngine::builder()
//!     .config(EngineConfig::from_env()?)
//!     .store(FileStore::open("session.json")?)
//!     .build_http()?;
//! engine.bootstrap();
//!
//! let mount = engine.mount("/dashboard");
//! let nav = engine.navigate(&mount, &[]).await;
//! if let Some(target) = engine.location(&nav.decision) {
//!     println!("redirect to {target}");
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod error;
pub mod logging;

pub use config::{ENV_API_URL, ENV_COOLDOWN_SECS, ENV_REQUEST_TIMEOUT_SECS, EngineConfig};
pub use engine::{Navigation, ProfileUpdate, SessionEngine, SessionEngineBuilder};
pub use error::MedgateError;

pub use medgate_events as events;
pub use medgate_guard as guard;
pub use medgate_protocol as protocol;
pub use medgate_session as session;
pub use medgate_store as store;

/// The types most embedders need.
pub mod prelude {
    pub use crate::logging::init_logging;
    pub use crate::{
        EngineConfig, MedgateError, Navigation, ProfileUpdate, SessionEngine,
        SessionEngineBuilder,
    };
    pub use medgate_events::{IdentityEvent, IdentitySubscription, SignOutReason};
    pub use medgate_guard::{GuardDecision, GuardMount, RedirectReason, RouteConfig, RouteGuard};
    pub use medgate_protocol::{
        Identity, LoginRequest, LoginResponse, ProfileField, Role, SourceKind, UserRecord,
    };
    pub use medgate_session::{
        FailureKind, HttpIdentityChecker, IdentityChecker, SessionError, SkipReason,
        VerifierConfig, VerifyOutcome,
    };
    #[cfg(feature = "file")]
    pub use medgate_store::FileStore;
    pub use medgate_store::{KeyValueStore, MemoryStore, StoreError, TokenStore};
}
