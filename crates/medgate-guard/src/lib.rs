//! Route guarding for Medgate.
//!
//! Given the resolved identity and where the visitor is going, the
//! [`RouteGuard`] decides whether to render, show a loading state, or
//! redirect. It never talks to the backend itself; the session layer
//! verifies first and the guard evaluates the result.
//!
//! # Key types
//!
//! - [`RouteGuard`] — the decision procedure
//! - [`GuardDecision`] — allow, loading, or where to redirect
//! - [`RouteConfig`] — login, home and elevated-area routes
//! - [`GuardMount`] — one mounted guard; cancels its pending check on drop

mod config;
mod error;
mod guard;
mod mount;

pub use config::RouteConfig;
pub use error::GuardError;
pub use guard::{GuardDecision, RedirectReason, RouteGuard};
pub use mount::GuardMount;
