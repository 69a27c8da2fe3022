//! Guard mounts: the lifetime of one guarded route instance.

use medgate_session::Liveness;

/// One mounted guarded route.
///
/// Verifications started on the mount's behalf take its
/// [`Liveness`]. Dropping the mount (the route unmounting) kills the
/// flag, so a check that settles afterwards commits nothing.
///
/// ```rust
/// use medgate_guard::GuardMount;
///
/// let mount = GuardMount::new("/dashboard");
/// let liveness = mount.liveness();
/// drop(mount);
/// assert!(!liveness.is_alive());
/// ```
#[derive(Debug)]
pub struct GuardMount {
    path: String,
    liveness: Liveness,
}

impl GuardMount {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        tracing::trace!(%path, "guard mounted");
        Self {
            path,
            liveness: Liveness::new(),
        }
    }

    /// The path this guard was mounted for.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// A handle to this mount's liveness flag.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.liveness.is_alive()
    }
}

impl Drop for GuardMount {
    fn drop(&mut self) {
        self.liveness.kill();
        tracing::trace!(path = %self.path, "guard unmounted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_mount_is_alive_until_dropped() {
        let mount = GuardMount::new("/profile");
        let observer = mount.liveness();
        assert!(mount.is_mounted());
        assert!(observer.is_alive());

        drop(mount);

        assert!(!observer.is_alive());
    }

    #[test]
    fn test_guard_mounts_are_independent() {
        let first = GuardMount::new("/a");
        let second = GuardMount::new("/b");
        let second_flag = second.liveness();

        drop(first);

        assert!(second_flag.is_alive());
        assert_eq!(second.path(), "/b");
    }
}
