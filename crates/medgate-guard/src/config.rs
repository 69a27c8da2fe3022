//! Route table configuration.

use std::collections::HashMap;

use medgate_protocol::Role;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::GuardError;

// ---------------------------------------------------------------------------
// RouteConfig
// ---------------------------------------------------------------------------

/// The routes the guard redirects between.
///
/// All paths are absolute (start with `/`) and compared without a
/// trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Where unauthenticated visitors are sent.
    pub login_path: String,

    /// The generic authenticated home.
    pub home_path: String,

    /// Everything at or below this prefix is reserved for the elevated
    /// role.
    pub elevated_prefix: String,

    /// The elevated role's home. Must live under `elevated_prefix`.
    pub elevated_home: String,

    /// Query parameter that carries the return path on the login route.
    pub return_param: String,

    /// Per-role home overrides. A role without an entry goes to
    /// `elevated_home` if elevated, else `home_path`.
    pub role_homes: HashMap<Role, String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".into(),
            home_path: "/dashboard".into(),
            elevated_prefix: "/super-admin".into(),
            elevated_home: "/super-admin/dashboard".into(),
            return_param: "redirect".into(),
            role_homes: HashMap::new(),
        }
    }
}

impl RouteConfig {
    /// Checks the route table and normalizes trailing slashes.
    ///
    /// # Errors
    /// [`GuardError::InvalidRoute`] if a path doesn't start with `/`,
    /// the elevated home lies outside the elevated prefix, or the login
    /// route is itself under the elevated prefix.
    pub fn validated(mut self) -> Result<Self, GuardError> {
        for path in [
            &mut self.login_path,
            &mut self.home_path,
            &mut self.elevated_prefix,
            &mut self.elevated_home,
        ] {
            check_absolute(path)?;
            *path = normalize(path).to_owned();
        }
        for (role, path) in self.role_homes.iter_mut() {
            check_absolute(path)?;
            *path = normalize(path).to_owned();
            if !role.is_elevated() && under_prefix(path, &self.elevated_prefix) {
                return Err(GuardError::InvalidRoute(format!(
                    "home of {role} ({path}) is reserved for the elevated role"
                )));
            }
        }

        if !under_prefix(&self.elevated_home, &self.elevated_prefix) {
            return Err(GuardError::InvalidRoute(format!(
                "elevated home {} is outside {}",
                self.elevated_home, self.elevated_prefix
            )));
        }
        if under_prefix(&self.login_path, &self.elevated_prefix) {
            return Err(GuardError::InvalidRoute(format!(
                "login route {} is under the elevated prefix",
                self.login_path
            )));
        }
        if self.return_param.trim().is_empty() {
            warn!("empty return_param, using default");
            self.return_param = Self::default().return_param;
        }
        Ok(self)
    }

    /// The canonical home route of `role`.
    pub fn home_for(&self, role: Role) -> &str {
        if let Some(path) = self.role_homes.get(&role) {
            return path;
        }
        if role.is_elevated() {
            &self.elevated_home
        } else {
            &self.home_path
        }
    }

    /// Returns `true` if `path` is the elevated prefix or below it.
    pub fn is_elevated_path(&self, path: &str) -> bool {
        under_prefix(normalize(path), &self.elevated_prefix)
    }
}

fn check_absolute(path: &str) -> Result<(), GuardError> {
    if !path.starts_with('/') {
        return Err(GuardError::InvalidRoute(format!(
            "route {path:?} must start with '/'"
        )));
    }
    Ok(())
}

/// Strips the query string, fragment and trailing slashes. The root
/// stays `/`.
pub(crate) fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// `prefix` itself or anything below it; `/super-administrator` is not
/// under `/super-admin`.
pub(crate) fn under_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix == "/",
        None => false,
    }
}
