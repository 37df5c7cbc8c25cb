//! API endpoint paths and persisted key names
//!
//! Paths are relative to the configured API base URL. The key names match
//! what earlier clients wrote, so an existing session file keeps working.

/// Base URL used when no configuration overrides it
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api/v1";

/// Password login, returns `{token, refresh_token?}`
pub const LOGIN_PATH: &str = "/login";

/// Account creation
pub const SIGNUP_PATH: &str = "/signup";

/// Refresh token exchange, returns `{access_token, refresh_token}`
pub const REFRESH_PATH: &str = "/refresh";

/// Store key holding the access credential
pub const ACCESS_TOKEN_KEY: &str = "token";

/// Store key holding the refresh credential
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Join a base URL and an endpoint path without doubling the slash.
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_strips_trailing_slash() {
        assert_eq!(
            endpoint_url("http://localhost:5000/api/v1/", REFRESH_PATH),
            "http://localhost:5000/api/v1/refresh"
        );
        assert_eq!(
            endpoint_url(DEFAULT_BASE_URL, LOGIN_PATH),
            "http://localhost:5000/api/v1/login"
        );
    }

    #[test]
    fn store_keys_match_persisted_layout() {
        assert_eq!(ACCESS_TOKEN_KEY, "token");
        assert_eq!(REFRESH_TOKEN_KEY, "refreshToken");
    }
}
