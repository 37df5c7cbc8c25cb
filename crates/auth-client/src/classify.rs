//! Response classification for the request pipeline
//!
//! Decides, from the status code and whether the request has already been
//! replayed once, if a response goes straight back to the caller, starts a
//! token refresh, or ends the session.

use reqwest::StatusCode;

/// What the pipeline does with a completed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Success or a non-auth failure. Returned to the caller unchanged.
    PassThrough,
    /// First 401 for this request. Hand it to the refresh coordinator.
    Refresh,
    /// 401 on a request that was already replayed. Session is over.
    Terminal,
}

/// The expiry signal. Only this status ever reaches the coordinator.
pub const EXPIRY_STATUS: StatusCode = StatusCode::UNAUTHORIZED;

/// Classify a response status for a request with the given `retried` flag.
///
/// 403 passes through: the token was valid, the user just
/// isn't allowed to see the resource.
pub fn classify(status: StatusCode, retried: bool) -> Disposition {
    if status != EXPIRY_STATUS {
        return Disposition::PassThrough;
    }
    if retried {
        Disposition::Terminal
    } else {
        Disposition::Refresh
    }
}
