//! Structured logging setup.
//!
//! Medgate logs through `tracing`. Binaries embedding it call
//! [`init_logging`] once at startup; libraries and tests don't need to.
//!
//! # Environment variables
//!
//! - `RUST_LOG` — filter directives, e.g. `medgate_session=debug`.
//!   Falls back to the `default_filter` argument when unset or invalid.
//! - `LOG_FORMAT` — `json` for one JSON object per line, anything else
//!   for human-readable text.
//!
//! Tokens never appear in log output; only their length is logged.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Reads `LOG_FORMAT`.
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("LOG_FORMAT").unwrap_or_default())
    }

    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Installs the global subscriber.
///
/// Returns `false` if a subscriber was already installed (e.g. by the
/// host application or an earlier call), in which case nothing changes.
pub fn init_logging(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let installed = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init(),
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse(""), LogFormat::Text);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        let _ = init_logging("info");
        assert!(!init_logging("debug"));
    }
}
