//! Error types for session credential operations

/// Errors from credential storage and the public auth endpoints.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("credential store error: {0}")]
    Store(String),
}

/// Result alias for session auth operations.
pub type Result<T> = std::result::Result<T, Error>;
