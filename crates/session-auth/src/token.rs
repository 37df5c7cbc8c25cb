//! Public auth endpoint calls
//!
//! Login, signup and token refresh are sent on the raw HTTP client, never
//! through the authenticated request pipeline. A 401 from any of them means
//! "bad password" or "refresh token rejected", not "access token expired",
//! so it must not be able to trigger another refresh.

use serde::{Deserialize, Serialize};

use crate::constants::{LOGIN_PATH, REFRESH_PATH, SIGNUP_PATH, endpoint_url};
use crate::error::{Error, Result};

/// Response from `/login`.
///
/// Older servers return only `token`; current ones also hand out a refresh
/// token.
#[derive(Debug, Deserialize, Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Response from `/refresh`. The refresh token rotates on every call.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignupRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Exchange email and password for a token pair.
pub async fn login(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    password: &str,
) -> Result<LoginResponse> {
    let response = client
        .post(endpoint_url(base_url, LOGIN_PATH))
        .json(&LoginRequest { email, password })
        .send()
        .await
        .map_err(|e| Error::Http(format!("login request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::InvalidCredentials(format!(
                "login rejected ({status}): {body}"
            )));
        }
        return Err(Error::TokenExchange(format!(
            "login returned {status}: {body}"
        )));
    }

    response
        .json::<LoginResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid login response: {e}")))
}

/// Create an account. The response body is server-defined and returned as-is.
pub async fn signup(
    client: &reqwest::Client,
    base_url: &str,
    name: &str,
    email: &str,
    password: &str,
) -> Result<serde_json::Value> {
    let response = client
        .post(endpoint_url(base_url, SIGNUP_PATH))
        .json(&SignupRequest {
            name,
            email,
            password,
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("signup request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "signup returned {status}: {body}"
        )));
    }

    // Empty 201 bodies are legal
    let body = response
        .text()
        .await
        .map_err(|e| Error::Http(format!("reading signup response: {e}")))?;
    if body.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(&body)
        .map_err(|e| Error::TokenExchange(format!("invalid signup response: {e}")))
}

/// Exchange a refresh token for a new token pair.
///
/// Any non-success status is a failed refresh. 401/403 are reported as
/// `InvalidCredentials` so logs can tell a revoked token from an outage.
pub async fn refresh_token(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint_url(base_url, REFRESH_PATH))
        .json(&RefreshRequest {
            refresh_token: refresh,
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::StatusCode;
    use axum::routing::post;
    use tokio::net::TcpListener;

    /// Start a mock auth server. `/login` accepts one fixed password,
    /// `/refresh` accepts one fixed refresh token.
    async fn start_auth_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = axum::Router::new()
            .route(
                "/login",
                post(|Json(body): Json<serde_json::Value>| async move {
                    if body["password"] == "correct-horse" {
                        (
                            StatusCode::OK,
                            Json(serde_json::json!({"token": "T1", "refresh_token": "R1"})),
                        )
                    } else {
                        (
                            StatusCode::UNAUTHORIZED,
                            Json(serde_json::json!({"message": "Invalid credentials."})),
                        )
                    }
                }),
            )
            .route(
                "/signup",
                post(|Json(body): Json<serde_json::Value>| async move {
                    (
                        StatusCode::CREATED,
                        Json(serde_json::json!({"message": format!("created {}", body["name"].as_str().unwrap_or(""))})),
                    )
                }),
            )
            .route(
                "/refresh",
                post(|Json(body): Json<serde_json::Value>| async move {
                    match body["refresh_token"].as_str() {
                        Some("R1") => (
                            StatusCode::OK,
                            Json(serde_json::json!({"access_token": "T2", "refresh_token": "R2"})),
                        ),
                        Some(_) => (
                            StatusCode::UNAUTHORIZED,
                            Json(serde_json::json!({"message": "Invalid refresh token."})),
                        ),
                        None => (
                            StatusCode::BAD_REQUEST,
                            Json(serde_json::json!({"message": "Refresh token is required"})),
                        ),
                    }
                }),
            );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}")
    }

    #[test]
    fn login_response_refresh_token_is_optional() {
        let json = r#"{"token":"T1"}"#;
        let login: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(login.token, "T1");
        assert!(login.refresh_token.is_none());
    }

    #[test]
    fn token_response_deserializes() {
        let json = r#"{"access_token":"T2","refresh_token":"R2"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "T2");
        assert_eq!(token.refresh_token, "R2");
    }

    #[tokio::test]
    async fn login_returns_token_pair() {
        let base = start_auth_server().await;
        let client = reqwest::Client::new();

        let login = login(&client, &base, "dev@example.com", "correct-horse")
            .await
            .unwrap();
        assert_eq!(login.token, "T1");
        assert_eq!(login.refresh_token.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_invalid_credentials() {
        let base = start_auth_server().await;
        let client = reqwest::Client::new();

        let err = login(&client, &base, "dev@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)), "got: {err}");
    }

    #[tokio::test]
    async fn signup_returns_server_body() {
        let base = start_auth_server().await;
        let client = reqwest::Client::new();

        let body = signup(&client, &base, "Ada", "ada@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(body["message"], "created Ada");
    }

    #[tokio::test]
    async fn refresh_rotates_tokens() {
        let base = start_auth_server().await;
        let client = reqwest::Client::new();

        let token = refresh_token(&client, &base, "R1").await.unwrap();
        assert_eq!(token.access_token, "T2");
        assert_eq!(token.refresh_token, "R2");
    }

    #[tokio::test]
    async fn refresh_with_revoked_token_is_invalid_credentials() {
        let base = start_auth_server().await;
        let client = reqwest::Client::new();

        let err = refresh_token(&client, &base, "R-revoked").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)), "got: {err}");
    }

    #[tokio::test]
    async fn refresh_against_dead_server_is_http_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = reqwest::Client::new();
        let err = refresh_token(&client, &format!("http://{addr}"), "R1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got: {err}");
    }
}
