//! Typed identity-change notifications for Medgate.
//!
//! Components that display part of the identity (an avatar in a
//! header, a name in a sidebar) subscribe to an [`IdentityBus`] instead
//! of listening for an untyped application-wide event. The payload is
//! an [`IdentityEvent`], so its shape is checked at compile time.
//!
//! # Integration
//!
//! ```ignore
//! let mut events = engine.subscribe();
//! loop {
//!     tokio::select! {
//!         Some(event) = events.next() => { /* re-render */ }
//!         _ = shutdown.changed() => break,
//!     }
//! }
//! ```

use medgate_protocol::{ProfileField, SourceKind, UserRecord};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Why an identity was signed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// The user asked to log out.
    UserRequested,
    /// The backend rejected the token (401/403).
    TokenRejected,
}

/// Something about the resolved identity changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    /// A login flow populated `source`.
    SignedIn { source: SourceKind, user: UserRecord },
    /// Every identity source was cleared.
    SignedOut { reason: SignOutReason },
    /// A verification settled with a usable identity. `from_cache` is
    /// `true` when the backend was unreachable and a cached record is
    /// being trusted instead.
    Verified {
        source: SourceKind,
        user: UserRecord,
        from_cache: bool,
    },
    /// One user field changed (e.g. a new avatar was uploaded).
    ProfileUpdated {
        source: SourceKind,
        field: ProfileField,
        user: UserRecord,
    },
}

impl IdentityEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedIn { .. } => "signed_in",
            Self::SignedOut { .. } => "signed_out",
            Self::Verified { .. } => "verified",
            Self::ProfileUpdated { .. } => "profile_updated",
        }
    }

    /// The user the event carries, if any.
    pub fn user(&self) -> Option<&UserRecord> {
        match self {
            Self::SignedIn { user, .. }
            | Self::Verified { user, .. }
            | Self::ProfileUpdated { user, .. } => Some(user),
            Self::SignedOut { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// Multi-producer, multi-consumer channel of [`IdentityEvent`]s.
///
/// Cloning gives another publisher for the same channel. Every
/// [`IdentitySubscription`] sees every event published after it
/// subscribed.
#[derive(Debug, Clone)]
pub struct IdentityBus {
    sender: broadcast::Sender<IdentityEvent>,
}

impl IdentityBus {
    /// Default number of undelivered events kept per subscriber.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Creates a bus with [`DEFAULT_CAPACITY`](Self::DEFAULT_CAPACITY).
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a bus buffering up to `capacity` events per subscriber
    /// (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event and returns how many subscribers received it.
    ///
    /// Publishing with nobody listening is normal (no component mounted
    /// that cares) and returns 0.
    pub fn publish(&self, event: IdentityEvent) -> usize {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(event = name, receivers, "identity event published");
                receivers
            }
            Err(_) => {
                trace!(event = name, "identity event dropped, no subscribers");
                0
            }
        }
    }

    /// Starts receiving events published from now on.
    pub fn subscribe(&self) -> IdentitySubscription {
        IdentitySubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for IdentityBus {
    fn default() -> Self {
        Self::new()
    }
}

/// The receiving end of an [`IdentityBus`].
#[derive(Debug)]
pub struct IdentitySubscription {
    receiver: broadcast::Receiver<IdentityEvent>,
}

impl IdentitySubscription {
    /// Waits for the next event. Returns `None` once every publisher
    /// is gone.
    ///
    /// A subscriber that fell behind skips the events it missed and
    /// continues with the oldest one still buffered.
    pub async fn next(&mut self) -> Option<IdentityEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "identity subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next buffered event without waiting.
    pub fn try_next(&mut self) -> Option<IdentityEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "identity subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }
}
