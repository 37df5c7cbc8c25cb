//! Auth pipeline metrics
//!
//! - `auth_refresh_total` (counter): label `outcome` (`success`, `failure`, `missing_token`, `superseded`)
//! - `auth_refresh_waiters` (histogram): waiters released per refresh episode
//! - `auth_replay_total` (counter): label `status`
//! - `auth_session_terminated_total` (counter): label `reason`
//!
//! Without an installed recorder every call is a no-op.

/// Refresh episode outcome label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Success,
    Failure,
    MissingToken,
    /// Logout or a new login landed while the exchange was in flight
    Superseded,
}

impl RefreshOutcome {
    pub fn label(self) -> &'static str {
        match self {
            RefreshOutcome::Success => "success",
            RefreshOutcome::Failure => "failure",
            RefreshOutcome::MissingToken => "missing_token",
            RefreshOutcome::Superseded => "superseded",
        }
    }
}

/// Record the end of a refresh episode and how many waiters it released.
pub fn record_refresh(outcome: RefreshOutcome, waiters: usize) {
    metrics::counter!("auth_refresh_total", "outcome" => outcome.label()).increment(1);
    metrics::histogram!("auth_refresh_waiters").record(waiters as f64);
}

/// Record a replayed request by its final status.
pub fn record_replay(status: u16) {
    metrics::counter!("auth_replay_total", "status" => status.to_string()).increment(1);
}

/// Record a session termination.
pub fn record_session_terminated(reason: &'static str) {
    metrics::counter!("auth_session_terminated_total", "reason" => reason).increment(1);
}
