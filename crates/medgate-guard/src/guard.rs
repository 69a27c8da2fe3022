//! The route guard decision procedure.

use std::fmt;

use medgate_protocol::{Identity, Role};
use tracing::debug;

use crate::RouteConfig;
use crate::config::normalize;

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Why an authenticated user was redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// The route requires roles the user doesn't have.
    RoleNotPermitted,
    /// The elevated role landed on the generic home.
    ElevatedHome,
    /// A non-elevated role tried to enter the elevated area.
    PrivilegeBoundary,
}

impl fmt::Display for RedirectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoleNotPermitted => write!(f, "role_not_permitted"),
            Self::ElevatedHome => write!(f, "elevated_home"),
            Self::PrivilegeBoundary => write!(f, "privilege_boundary"),
        }
    }
}

/// What a guarded route should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the protected content.
    Allow,
    /// Show a loading indicator: the first check of the page load is
    /// still running and nothing is cached.
    Loading,
    /// Send the visitor to the login route. `return_to` is the path to
    /// come back to after signing in, when it is safe to carry.
    RedirectToLogin { return_to: Option<String> },
    /// Send an authenticated user elsewhere.
    Redirect { to: String, reason: RedirectReason },
    /// The user's role isn't permitted here and their home is this very
    /// route, so redirecting would loop.
    Forbidden { role: Role },
}

impl GuardDecision {
    /// Returns `true` if the protected content may render.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns `true` for both redirect kinds.
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::RedirectToLogin { .. } | Self::Redirect { .. })
    }
}

// ---------------------------------------------------------------------------
// RouteGuard
// ---------------------------------------------------------------------------

/// Decides, for one navigation, between rendering, loading and
/// redirecting.
///
/// Pure: the decision is a function of the arguments and the route
/// table only. Run verification first, then evaluate with the
/// re-resolved identity.
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    routes: RouteConfig,
}

impl RouteGuard {
    /// Creates a guard over an already validated route table.
    pub fn new(routes: RouteConfig) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }

    /// Evaluates one navigation.
    ///
    /// `awaiting_first_check` is `true` while the first verification of
    /// the page load hasn't settled and a token exists (see
    /// `VerificationState::initial_check_pending`). An empty
    /// `required_roles` admits every authenticated role.
    ///
    /// Checked in order:
    ///
    /// 1. first check pending and no identity yet → `Loading`
    /// 2. not authenticated → `RedirectToLogin`
    /// 3. role not in `required_roles` → the role's home
    /// 4. elevated role on the generic home → the elevated home
    /// 5. non-elevated role under the elevated prefix → the generic home
    /// 6. otherwise `Allow`
    pub fn evaluate(
        &self,
        identity: &Identity,
        awaiting_first_check: bool,
        required_roles: &[Role],
        current_path: &str,
    ) -> GuardDecision {
        let decision = self.decide(identity, awaiting_first_check, required_roles, current_path);
        debug!(
            path = normalize(current_path),
            source = %identity.source,
            ?decision,
            "route guard decision"
        );
        decision
    }

    fn decide(
        &self,
        identity: &Identity,
        awaiting_first_check: bool,
        required_roles: &[Role],
        current_path: &str,
    ) -> GuardDecision {
        let role = match (&identity.user, identity.is_authenticated) {
            (Some(user), true) => user.role,
            _ if awaiting_first_check => return GuardDecision::Loading,
            _ => {
                return GuardDecision::RedirectToLogin {
                    return_to: self.return_path(current_path),
                };
            }
        };

        let path = normalize(current_path);

        if !required_roles.is_empty() && !required_roles.contains(&role) {
            let home = self.routes.home_for(role);
            if home == path {
                return GuardDecision::Forbidden { role };
            }
            return GuardDecision::Redirect {
                to: home.to_owned(),
                reason: RedirectReason::RoleNotPermitted,
            };
        }

        if role.is_elevated() && path == self.routes.home_path {
            return GuardDecision::Redirect {
                to: self.routes.home_for(role).to_owned(),
                reason: RedirectReason::ElevatedHome,
            };
        }

        if !role.is_elevated() && self.routes.is_elevated_path(path) {
            return GuardDecision::Redirect {
                to: self.routes.home_path.clone(),
                reason: RedirectReason::PrivilegeBoundary,
            };
        }

        GuardDecision::Allow
    }

    /// The return path to carry to the login route: same-origin
    /// absolute paths only, and never the login route itself.
    fn return_path(&self, current_path: &str) -> Option<String> {
        let safe = current_path.starts_with('/')
            && !current_path.starts_with("//")
            && !current_path.starts_with("/\\");
        if !safe || normalize(current_path) == self.routes.login_path {
            return None;
        }
        Some(current_path.to_owned())
    }

    /// The URL a redirect decision navigates to, or `None` if the
    /// decision doesn't redirect.
    ///
    /// ```rust
    /// use medgate_guard::{GuardDecision, RouteGuard};
    ///
    /// let guard = RouteGuard::default();
    /// let decision = GuardDecision::RedirectToLogin {
    ///     return_to: Some("/patients/7?tab=notes".into()),
    /// };
    /// assert_eq!(
    ///     guard.location(&decision).as_deref(),
    ///     Some("/login?redirect=%2Fpatients%2F7%3Ftab%3Dnotes"),
    /// );
    /// ```
    pub fn location(&self, decision: &GuardDecision) -> Option<String> {
        match decision {
            GuardDecision::RedirectToLogin { return_to: Some(path) } => Some(format!(
                "{}?{}={}",
                self.routes.login_path,
                self.routes.return_param,
                urlencoding::encode(path)
            )),
            GuardDecision::RedirectToLogin { return_to: None } => {
                Some(self.routes.login_path.clone())
            }
            GuardDecision::Redirect { to, .. } => Some(to.clone()),
            GuardDecision::Allow | GuardDecision::Loading | GuardDecision::Forbidden { .. } => {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use medgate_protocol::{SourceKind, UserRecord};

    use super::*;

    fn signed_in(role: Role) -> Identity {
        Identity::authenticated(
            SourceKind::Legacy,
            UserRecord::new("u1", "Chidi", "chidi@example.org", role),
            "tok",
        )
    }

    fn anonymous() -> Identity {
        Identity::empty(SourceKind::Legacy)
    }

    fn guard() -> RouteGuard {
        RouteGuard::default()
    }

    // ===== unauthenticated =====

    #[test]
    fn test_evaluate_unauthenticated_redirects_to_login_with_return_path() {
        let decision = guard().evaluate(&anonymous(), false, &[], "/dashboard");
        assert_eq!(
            decision,
            GuardDecision::RedirectToLogin {
                return_to: Some("/dashboard".into())
            }
        );
        assert_eq!(
            guard().location(&decision).as_deref(),
            Some("/login?redirect=%2Fdashboard")
        );
    }

    #[test]
    fn test_evaluate_token_without_user_is_unauthenticated() {
        let identity = Identity {
            token: Some("pending".into()),
            ..anonymous()
        };
        assert!(matches!(
            guard().evaluate(&identity, false, &[], "/dashboard"),
            GuardDecision::RedirectToLogin { .. }
        ));
    }

    #[test]
    fn test_evaluate_authenticated_flag_without_user_redirects_to_login() {
        let identity = Identity {
            is_authenticated: true,
            token: Some("t".into()),
            ..anonymous()
        };
        assert!(matches!(
            guard().evaluate(&identity, false, &[], "/dashboard"),
            GuardDecision::RedirectToLogin { .. }
        ));
    }

    #[test]
    fn test_return_path_rejects_protocol_relative_and_login() {
        for path in ["//evil.example/x", "/\\evil", "https://evil.example", "/login?redirect=x"] {
            assert_eq!(
                guard().evaluate(&anonymous(), false, &[], path),
                GuardDecision::RedirectToLogin { return_to: None },
                "path {path}"
            );
        }
        assert_eq!(
            guard().location(&GuardDecision::RedirectToLogin { return_to: None }).as_deref(),
            Some("/login")
        );
    }

    // ===== loading =====

    #[test]
    fn test_evaluate_initial_check_without_cache_is_loading() {
        let identity = Identity {
            token: Some("tok".into()),
            ..anonymous()
        };
        assert_eq!(
            guard().evaluate(&identity, true, &[], "/dashboard"),
            GuardDecision::Loading
        );
    }

    #[test]
    fn test_evaluate_initial_check_with_cached_identity_renders() {
        assert_eq!(
            guard().evaluate(&signed_in(Role::Doctor), true, &[], "/dashboard"),
            GuardDecision::Allow
        );
    }

    // ===== roles =====

    #[test]
    fn test_evaluate_missing_required_role_redirects_to_role_home() {
        let decision = guard().evaluate(
            &signed_in(Role::Patient),
            false,
            &[Role::Doctor, Role::HospitalAdmin],
            "/doctors/schedule",
        );
        assert_eq!(
            decision,
            GuardDecision::Redirect {
                to: "/dashboard".into(),
                reason: RedirectReason::RoleNotPermitted
            }
        );
    }

    #[test]
    fn test_evaluate_elevated_role_without_permission_goes_to_elevated_home() {
        let decision = guard().evaluate(
            &signed_in(Role::SuperAdmin),
            false,
            &[Role::Patient],
            "/appointments/book",
        );
        assert_eq!(
            guard().location(&decision).as_deref(),
            Some("/super-admin/dashboard")
        );
    }

    #[test]
    fn test_evaluate_role_home_equal_to_current_path_is_forbidden() {
        let decision = guard().evaluate(
            &signed_in(Role::Patient),
            false,
            &[Role::Doctor],
            "/dashboard/",
        );
        assert_eq!(decision, GuardDecision::Forbidden { role: Role::Patient });
        assert_eq!(guard().location(&decision), None);
    }

    #[test]
    fn test_evaluate_required_role_present_allows() {
        assert!(guard()
            .evaluate(&signed_in(Role::Doctor), false, &[Role::Doctor], "/doctors/schedule")
            .is_allowed());
    }

    // ===== elevated boundary =====

    #[test]
    fn test_evaluate_elevated_role_on_generic_home_is_canonicalized() {
        let decision = guard().evaluate(&signed_in(Role::SuperAdmin), false, &[], "/dashboard");
        assert_eq!(
            decision,
            GuardDecision::Redirect {
                to: "/super-admin/dashboard".into(),
                reason: RedirectReason::ElevatedHome
            }
        );
    }

    #[test]
    fn test_evaluate_elevated_role_elsewhere_allows() {
        for path in ["/super-admin/dashboard", "/super-admin/hospitals", "/profile"] {
            assert!(
                guard()
                    .evaluate(&signed_in(Role::SuperAdmin), false, &[], path)
                    .is_allowed(),
                "path {path}"
            );
        }
    }

    #[test]
    fn test_evaluate_non_elevated_under_elevated_prefix_goes_home() {
        for role in [Role::HospitalAdmin, Role::Doctor, Role::Patient, Role::Unknown] {
            let decision =
                guard().evaluate(&signed_in(role), false, &[], "/super-admin/hospitals");
            assert_eq!(
                decision,
                GuardDecision::Redirect {
                    to: "/dashboard".into(),
                    reason: RedirectReason::PrivilegeBoundary
                },
                "role {role}"
            );
        }
    }

    #[test]
    fn test_evaluate_similar_prefix_is_not_elevated() {
        assert!(guard()
            .evaluate(&signed_in(Role::Doctor), false, &[], "/super-administrator")
            .is_allowed());
    }

    #[test]
    fn test_evaluate_custom_routes() {
        let routes = RouteConfig {
            home_path: "/home".into(),
            elevated_prefix: "/root".into(),
            elevated_home: "/root".into(),
            ..RouteConfig::default()
        }
        .validated()
        .unwrap();
        let guard = RouteGuard::new(routes);

        assert_eq!(
            guard.location(&guard.evaluate(&signed_in(Role::SuperAdmin), false, &[], "/home")),
            Some("/root".into())
        );
        assert_eq!(
            guard.location(&guard.evaluate(&signed_in(Role::Doctor), false, &[], "/root/x")),
            Some("/home".into())
        );
    }

    #[test]
    fn test_redirect_reason_display() {
        assert_eq!(RedirectReason::PrivilegeBoundary.to_string(), "privilege_boundary");
    }
}
