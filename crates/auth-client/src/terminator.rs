//! Session termination
//!
//! Clears the credential store and tells whoever owns navigation/UI state
//! that the user is logged out. Idempotent: when the store is already empty
//! nothing is cleared and the listener is not notified again, so several
//! requests failing terminally in the same episode produce one notification.
//!
//! Termination is tied to the session generation the failure was observed
//! under. A failure from a session that has since been logged out or
//! replaced by a new login clears nothing.

use std::sync::Arc;

use session_auth::CredentialStore;
use tracing::{debug, warn};

use crate::error::AuthFailure;
use crate::metrics;

/// Notification sent when the session ends involuntarily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnded {
    pub reason: AuthFailure,
}

/// Receives session-ended notifications (e.g. to redirect to a login view).
pub trait SessionListener: Send + Sync {
    fn session_ended(&self, event: &SessionEnded);
}

impl<F> SessionListener for F
where
    F: Fn(&SessionEnded) + Send + Sync,
{
    fn session_ended(&self, event: &SessionEnded) {
        self(event)
    }
}

/// Listener that only logs. Used when nobody needs to react.
pub struct LogListener;

impl SessionListener for LogListener {
    fn session_ended(&self, event: &SessionEnded) {
        warn!(reason = %event.reason, "session ended, login required");
    }
}

pub struct SessionTerminator {
    store: Arc<CredentialStore>,
    listener: Arc<dyn SessionListener>,
}

impl SessionTerminator {
    pub fn new(store: Arc<CredentialStore>, listener: Arc<dyn SessionListener>) -> Self {
        Self { store, listener }
    }

    /// End the session observed at `generation`. Returns whether the
    /// listener was notified.
    ///
    /// A store that cannot be cleared is still reported as ended: the caller
    /// is failing the request either way and the UI should not keep treating
    /// the user as logged in.
    pub async fn terminate(&self, reason: AuthFailure, generation: u64) -> bool {
        let cleared = match self.store.clear_if_current(generation).await {
            Ok(cleared) => cleared,
            Err(e) => {
                warn!(error = %e, "failed to clear credentials while ending session");
                true
            }
        };

        if !cleared {
            debug!(reason = reason.label(), "session already ended or replaced");
            return false;
        }

        warn!(reason = %reason, "ending session");
        metrics::record_session_terminated(reason.label());
        self.listener.session_ended(&SessionEnded { reason });
        true
    }
}
