//! [`IdentityChecker`] backed by the backend's HTTP endpoints.

use medgate_protocol::{
    LoginRequest, LoginResponse, SourceKind, UserRecord, WhoAmIResponse,
};
use serde::{Deserialize, Serialize};

use crate::{IdentityChecker, SessionError};

/// Where the identity endpoints live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpCheckerConfig {
    /// Scheme, host and optional path prefix, without a trailing slash.
    pub base_url: String,
    /// `GET` endpoint returning `{ user }` for the bearer token.
    pub who_am_i_path: String,
    /// Login endpoint of the legacy auth flow.
    pub legacy_login_path: String,
    /// Login endpoint of the new auth flow.
    pub new_login_path: String,
    pub user_agent: String,
}

impl Default for HttpCheckerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".into(),
            who_am_i_path: "/auth/me".into(),
            legacy_login_path: "/auth/login".into(),
            new_login_path: "/v2/auth/login".into(),
            user_agent: concat!("medgate/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// Calls the "who am I" and login endpoints over HTTP.
///
/// No request timeout is configured on the client; the verifier bounds
/// each check itself.
#[derive(Debug, Clone)]
pub struct HttpIdentityChecker {
    client: reqwest::Client,
    config: HttpCheckerConfig,
}

impl HttpIdentityChecker {
    /// Builds a checker with its own `reqwest::Client`.
    ///
    /// # Errors
    /// [`SessionError::Transient`] if the HTTP client can't be built
    /// (e.g. no TLS backend).
    pub fn new(config: HttpCheckerConfig) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| SessionError::Transient(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    /// Builds a checker around an existing client.
    pub fn with_client(client: reqwest::Client, config: HttpCheckerConfig) -> Self {
        let mut config = config;
        while config.base_url.ends_with('/') {
            config.base_url.pop();
        }
        Self { client, config }
    }

    pub fn config(&self) -> &HttpCheckerConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.config.base_url, path)
        } else {
            format!("{}/{}", self.config.base_url, path)
        }
    }
}

impl IdentityChecker for HttpIdentityChecker {
    async fn who_am_i(&self, token: &str) -> Result<UserRecord, SessionError> {
        let url = self.url(&self.config.who_am_i_path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, "identity endpoint returned error status");
            return Err(SessionError::from_status(status.as_u16(), &body));
        }

        let body = response.text().await.map_err(transport_error)?;
        let parsed: WhoAmIResponse = serde_json::from_str(&body)
            .map_err(|e| SessionError::MalformedResponse(e.to_string()))?;
        let user = parsed.user.ok_or_else(|| {
            SessionError::MalformedResponse("response has no `user`".into())
        })?;
        user.validate()
            .map_err(|e| SessionError::MalformedResponse(e.to_string()))?;
        Ok(user)
    }

    async fn login(
        &self,
        source: SourceKind,
        request: &LoginRequest,
    ) -> Result<LoginResponse, SessionError> {
        let path = match source {
            SourceKind::Legacy => &self.config.legacy_login_path,
            SourceKind::New => &self.config.new_login_path,
        };
        let response = self
            .client
            .post(self.url(path))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::from_status(status.as_u16(), &body));
        }

        let body = response.text().await.map_err(transport_error)?;
        let parsed: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| SessionError::MalformedResponse(e.to_string()))?;
        if parsed.token.trim().is_empty() {
            return Err(SessionError::MalformedResponse("login returned an empty token".into()));
        }
        parsed
            .user
            .validate()
            .map_err(|e| SessionError::MalformedResponse(e.to_string()))?;
        Ok(parsed)
    }
}

fn transport_error(e: reqwest::Error) -> SessionError {
    if e.is_decode() {
        SessionError::MalformedResponse(e.to_string())
    } else {
        SessionError::Transient(e.to_string())
    }
}
