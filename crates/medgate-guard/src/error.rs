//! Error types for the guard layer.

/// Errors that can occur while setting up route guarding.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// The route table is inconsistent, e.g. a relative path or an
    /// elevated home outside the elevated prefix.
    #[error("invalid route configuration: {0}")]
    InvalidRoute(String),
}
