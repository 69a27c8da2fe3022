//! Merging the two identity sources into one.

use medgate_protocol::Identity;

/// Picks the identity every authorization decision uses.
///
/// Precedence, applied fresh on every call:
///
/// 1. `modern` if it is authenticated and carries a user or a token.
/// 2. otherwise `legacy` if it is authenticated.
/// 3. otherwise neither is signed in; return whichever still carries a
///    token or user (preferring `modern`) so a pending token can be
///    verified, else an empty `legacy` identity.
///
/// Pure: no I/O, no caching. Call it on every render.
pub fn resolve(legacy: &Identity, modern: &Identity) -> Identity {
    if modern.is_authenticated && !modern.is_empty() {
        return modern.clone();
    }
    if legacy.is_authenticated {
        return legacy.clone();
    }
    if !modern.is_empty() {
        return modern.clone();
    }
    legacy.clone()
}

#[cfg(test)]
mod tests {
    use medgate_protocol::{Role, SourceKind, UserRecord};

    use super::*;

    fn user(id: &str) -> UserRecord {
        UserRecord::new(id, "n", "e@x", Role::Doctor)
    }

    /// Builds a source identity for one cell of the auth × user grid.
    fn identity(source: SourceKind, authenticated: bool, with_user: bool) -> Identity {
        let id = match source {
            SourceKind::Legacy => "legacy-user",
            SourceKind::New => "new-user",
        };
        Identity {
            user: with_user.then(|| user(id)),
            token: Some(format!("{source}-token")),
            is_authenticated: authenticated,
            source,
        }
    }

    #[test]
    fn test_resolve_both_authenticated_prefers_new() {
        for legacy_user in [true, false] {
            for new_user in [true, false] {
                let legacy = identity(SourceKind::Legacy, true, legacy_user);
                let modern = identity(SourceKind::New, true, new_user);

                let resolved = resolve(&legacy, &modern);

                assert_eq!(resolved.source, SourceKind::New);
                assert_eq!(resolved.token.as_deref(), Some("new-token"));
            }
        }
    }

    #[test]
    fn test_resolve_new_unauthenticated_falls_back_to_legacy() {
        for new_user in [true, false] {
            let legacy = identity(SourceKind::Legacy, true, true);
            let modern = identity(SourceKind::New, false, new_user);

            let resolved = resolve(&legacy, &modern);

            assert_eq!(resolved.source, SourceKind::Legacy);
            assert_eq!(resolved.user, Some(user("legacy-user")));
        }
    }

    #[test]
    fn test_resolve_only_new_authenticated_uses_new() {
        let legacy = identity(SourceKind::Legacy, false, false);
        let modern = identity(SourceKind::New, true, true);

        assert_eq!(resolve(&legacy, &modern).source, SourceKind::New);
    }

    #[test]
    fn test_resolve_neither_authenticated_is_unauthenticated() {
        for (legacy_user, new_user) in [(true, true), (true, false), (false, true), (false, false)] {
            let legacy = identity(SourceKind::Legacy, false, legacy_user);
            let modern = identity(SourceKind::New, false, new_user);

            let resolved = resolve(&legacy, &modern);

            assert!(!resolved.is_authenticated);
        }
    }

    #[test]
    fn test_resolve_authenticated_but_empty_new_is_ignored() {
        let legacy = identity(SourceKind::Legacy, true, true);
        let modern = Identity {
            is_authenticated: true,
            ..Identity::empty(SourceKind::New)
        };

        assert_eq!(resolve(&legacy, &modern).source, SourceKind::Legacy);
    }

    #[test]
    fn test_resolve_pending_legacy_token_is_kept_for_verification() {
        let legacy = identity(SourceKind::Legacy, false, false);
        let modern = Identity::empty(SourceKind::New);

        let resolved = resolve(&legacy, &modern);

        assert_eq!(resolved.source, SourceKind::Legacy);
        assert_eq!(resolved.token(), Some("legacy-token"));
    }

    #[test]
    fn test_resolve_reflects_updated_sources_on_each_call() {
        let legacy = identity(SourceKind::Legacy, true, true);
        let mut modern = Identity::empty(SourceKind::New);
        assert_eq!(resolve(&legacy, &modern).source, SourceKind::Legacy);

        modern = identity(SourceKind::New, true, true);
        assert_eq!(resolve(&legacy, &modern).source, SourceKind::New);
    }
}
