//! Engine configuration: code defaults, JSON, and environment overrides.

use std::time::Duration;

use medgate_guard::RouteConfig;
use medgate_session::{HttpCheckerConfig, VerifierConfig};
use medgate_store::TokenAliases;
use serde::{Deserialize, Serialize};

use crate::MedgateError;

/// Environment variable overriding [`EngineConfig::api_base_url`].
pub const ENV_API_URL: &str = "MEDGATE_API_URL";
/// Environment variable overriding the verification cooldown, in seconds.
pub const ENV_COOLDOWN_SECS: &str = "MEDGATE_COOLDOWN_SECS";
/// Environment variable overriding the identity-check timeout, in seconds.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "MEDGATE_REQUEST_TIMEOUT_SECS";

/// Everything a [`SessionEngine`](crate::SessionEngine) needs to know.
///
/// Every field has a default, so a JSON document only has to name what
/// it changes:
///
/// ```rust
/// use medgate::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{
///     "api_base_url": "https://portal.example.org/api",
///     "routes": { "login_path": "/signin" }
/// }"#).unwrap();
///
/// assert_eq!(config.routes.login_path, "/signin");
/// assert_eq!(config.routes.home_path, "/dashboard");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the backend API, without a trailing slash.
    pub api_base_url: String,
    /// Path of the "who am I" endpoint below `api_base_url`.
    pub who_am_i_path: String,
    /// Login endpoint of the legacy auth flow.
    pub legacy_login_path: String,
    /// Login endpoint of the new auth flow.
    pub new_login_path: String,
    /// Storage keys for the token aliases, user snapshot and provenance.
    pub aliases: TokenAliases,
    pub verifier: VerifierConfig,
    pub routes: RouteConfig,
    /// Undelivered identity events buffered per subscriber.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let http = HttpCheckerConfig::default();
        Self {
            api_base_url: http.base_url,
            who_am_i_path: http.who_am_i_path,
            legacy_login_path: http.legacy_login_path,
            new_login_path: http.new_login_path,
            aliases: TokenAliases::default(),
            verifier: VerifierConfig::default(),
            routes: RouteConfig::default(),
            event_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    /// [`MedgateError::Config`] if the document isn't valid JSON or a
    /// field has the wrong type.
    pub fn from_json_str(json: &str) -> Result<Self, MedgateError> {
        serde_json::from_str(json).map_err(|e| MedgateError::Config(e.to_string()))
    }

    /// Defaults overridden by the `MEDGATE_*` environment variables.
    ///
    /// # Errors
    /// [`MedgateError::Config`] if a duration variable isn't a whole
    /// number of seconds.
    pub fn from_env() -> Result<Self, MedgateError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by variable name. Unset or blank
    /// variables leave the current value alone.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, MedgateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url.trim().to_owned();
        }
        if let Some(raw) = lookup(ENV_COOLDOWN_SECS) {
            self.verifier.cooldown = parse_secs(ENV_COOLDOWN_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            self.verifier.request_timeout = parse_secs(ENV_REQUEST_TIMEOUT_SECS, &raw)?;
        }
        Ok(self)
    }

    /// Validates and normalizes every section.
    ///
    /// # Errors
    /// - [`MedgateError::Store`] for an unusable alias layout
    /// - [`MedgateError::Guard`] for an inconsistent route table
    /// - [`MedgateError::Config`] for an empty API base URL
    pub fn validated(mut self) -> Result<Self, MedgateError> {
        if self.api_base_url.trim().is_empty() {
            return Err(MedgateError::Config("api_base_url is empty".into()));
        }
        self.aliases = self.aliases.validated()?;
        self.routes = self.routes.validated()?;
        self.verifier = self.verifier.validated();
        self.event_capacity = self.event_capacity.max(1);
        Ok(self)
    }

    /// The endpoint settings for an [`HttpIdentityChecker`](medgate_session::HttpIdentityChecker).
    pub fn checker_config(&self) -> HttpCheckerConfig {
        HttpCheckerConfig {
            base_url: self.api_base_url.clone(),
            who_am_i_path: self.who_am_i_path.clone(),
            legacy_login_path: self.legacy_login_path.clone(),
            new_login_path: self.new_login_path.clone(),
            ..HttpCheckerConfig::default()
        }
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration, MedgateError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| MedgateError::Config(format!("{key} must be whole seconds, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.who_am_i_path, "/auth/me");
        assert_eq!(config.verifier.cooldown, Duration::from_secs(30));
        assert_eq!(config.aliases.token_keys.len(), 4);
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_from_json_str_rejects_wrong_types() {
        let err = EngineConfig::from_json_str(r#"{ "event_capacity": "lots" }"#).unwrap_err();
        assert!(matches!(err, MedgateError::Config(_)));
    }

    #[test]
    fn test_with_overrides_applies_env_values() {
        let config = EngineConfig::default()
            .with_overrides(env(&[
                (ENV_API_URL, " https://ward.example.org/api "),
                (ENV_COOLDOWN_SECS, "45"),
                (ENV_REQUEST_TIMEOUT_SECS, "3"),
            ]))
            .unwrap();

        assert_eq!(config.api_base_url, "https://ward.example.org/api");
        assert_eq!(config.verifier.cooldown, Duration::from_secs(45));
        assert_eq!(config.verifier.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_with_overrides_blank_values_are_ignored() {
        let config = EngineConfig::default()
            .with_overrides(env(&[(ENV_COOLDOWN_SECS, "  ")]))
            .unwrap();
        assert_eq!(config.verifier.cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_with_overrides_bad_seconds_is_config_error() {
        let err = EngineConfig::default()
            .with_overrides(env(&[(ENV_COOLDOWN_SECS, "half a minute")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_COOLDOWN_SECS));
    }

    #[test]
    fn test_validated_surfaces_route_errors() {
        let mut config = EngineConfig::default();
        config.routes.login_path = "login".into();
        assert!(matches!(config.validated(), Err(MedgateError::Guard(_))));
    }

    #[test]
    fn test_checker_config_mirrors_endpoints() {
        let config = EngineConfig {
            api_base_url: "http://127.0.0.1:9/api".into(),
            ..EngineConfig::default()
        };
        let http = config.checker_config();
        assert_eq!(http.base_url, "http://127.0.0.1:9/api");
        assert_eq!(http.who_am_i_path, "/auth/me");
    }
}
