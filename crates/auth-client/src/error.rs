//! Error types for the authenticated request pipeline

/// Why a session ended.
///
/// `Clone` because a single refresh outcome is fanned out to every request
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("token refresh failed: {0}")]
    RefreshRejected(String),

    #[error("request still unauthorized after token refresh")]
    ExpiredAfterRetry,

    #[error("token refresh abandoned before completing")]
    Abandoned,

    #[error("session changed while refreshing (logout or new login)")]
    SessionChanged,
}

impl AuthFailure {
    /// Metric/log label.
    pub fn label(&self) -> &'static str {
        match self {
            AuthFailure::MissingRefreshToken => "missing_refresh_token",
            AuthFailure::RefreshRejected(_) => "refresh_rejected",
            AuthFailure::ExpiredAfterRetry => "expired_after_retry",
            AuthFailure::Abandoned => "abandoned",
            AuthFailure::SessionChanged => "session_changed",
        }
    }
}

/// Errors surfaced to callers of `ApiClient`.
///
/// `Transport` and `Status` are passed through untouched; the refresh
/// machinery never sees them. `PermanentAuthFailure` means the session has
/// been cleared and the user must log in again.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("session ended: {0}")]
    PermanentAuthFailure(AuthFailure),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("credential error: {0}")]
    Credential(String),
}

impl Error {
    /// Whether the caller must treat the user as logged out.
    pub fn is_session_ended(&self) -> bool {
        matches!(self, Error::PermanentAuthFailure(_))
    }
}

impl From<AuthFailure> for Error {
    fn from(failure: AuthFailure) -> Self {
        Error::PermanentAuthFailure(failure)
    }
}

impl From<session_auth::Error> for Error {
    fn from(err: session_auth::Error) -> Self {
        match err {
            session_auth::Error::InvalidCredentials(msg) => Error::InvalidCredentials(msg),
            session_auth::Error::Http(msg) => Error::Transport(msg),
            other => Error::Credential(other.to_string()),
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
