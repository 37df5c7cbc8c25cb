//! Mock codebase API for pipeline tests
//!
//! `/login` accepts password `pw` and issues `T1`/`R1`. `/refresh` rotates the
//! pair (`R1` → `T2`/`R2`, `R2` → `T3`/`R3`, ...) and counts every call. Any
//! other path is a protected endpoint: it answers 200 with an echo of the
//! request when the bearer matches the currently valid access token, and 401
//! otherwise. `/boom` always answers 500 and `/forbidden` always 403.
//!
//! No access token is valid until one has been issued by `/refresh` or set
//! with `accept_access`, so a stored `T1` behaves as already expired.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde_json::json;
use tokio::net::TcpListener;

#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Delay before `/refresh` answers, so concurrent expiries pile up.
    pub refresh_delay: Duration,
    /// `/refresh` answers 401 regardless of the token.
    pub refresh_fails: bool,
    /// Protected endpoints answer 401 even to freshly issued tokens.
    pub always_unauthorized: bool,
}

struct MockState {
    config: MockConfig,
    valid_access: Mutex<Option<String>>,
    valid_refresh: Mutex<String>,
    issued: AtomicUsize,
    refresh_calls: AtomicUsize,
    seen_tokens: Mutex<Vec<Option<String>>>,
}

pub struct MockApi {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockApi {
    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    /// Bearer tokens seen by protected endpoints, in arrival order.
    pub fn seen_tokens(&self) -> Vec<Option<String>> {
        self.state.seen_tokens.lock().unwrap().clone()
    }

    pub fn accept_access(&self, token: &str) {
        *self.state.valid_access.lock().unwrap() = Some(token.to_string());
    }

    /// Invalidate the current access token without touching the refresh token.
    pub fn expire_access(&self) {
        *self.state.valid_access.lock().unwrap() = None;
    }
}

pub async fn start_mock_api(config: MockConfig) -> MockApi {
    let state = Arc::new(MockState {
        config,
        valid_access: Mutex::new(None),
        valid_refresh: Mutex::new("R1".to_string()),
        issued: AtomicUsize::new(1),
        refresh_calls: AtomicUsize::new(0),
        seen_tokens: Mutex::new(Vec::new()),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = axum::Router::new()
        .route("/login", post(login))
        .route("/signup", post(signup))
        .route("/refresh", post(refresh))
        .fallback(protected)
        .with_state(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockApi {
        base_url: format!("http://{addr}"),
        state,
    }
}

async fn login(Json(body): Json<serde_json::Value>) -> Response {
    if body["password"] == "pw" {
        Json(json!({"token": "T1", "refresh_token": "R1"})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid credentials."})),
        )
            .into_response()
    }
}

async fn signup(Json(body): Json<serde_json::Value>) -> Response {
    (
        StatusCode::CREATED,
        Json(json!({"message": "User created successfully.", "email": body["email"]})),
    )
        .into_response()
}

async fn refresh(
    State(state): State<Arc<MockState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(state.config.refresh_delay).await;

    let presented = body["refresh_token"].as_str().unwrap_or_default().to_string();
    let accepted = *state.valid_refresh.lock().unwrap() == presented;
    if state.config.refresh_fails || !accepted {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid refresh token."})),
        )
            .into_response();
    }

    let n = state.issued.fetch_add(1, Ordering::SeqCst) + 1;
    let access = format!("T{n}");
    let refresh = format!("R{n}");
    *state.valid_access.lock().unwrap() = Some(access.clone());
    *state.valid_refresh.lock().unwrap() = refresh.clone();
    Json(json!({"access_token": access, "refresh_token": refresh})).into_response()
}

async fn protected(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match uri.path() {
        "/boom" => {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"})))
                .into_response();
        }
        "/forbidden" => {
            return (StatusCode::FORBIDDEN, Json(json!({"error": "forbidden"})))
                .into_response();
        }
        _ => {}
    }

    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    state.seen_tokens.lock().unwrap().push(bearer.clone());

    let valid = state.valid_access.lock().unwrap().clone();
    let authorized = !state.config.always_unauthorized && bearer.is_some() && bearer == valid;
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Token has expired."})),
        )
            .into_response();
    }

    let body: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "body": body,
        "token": bearer,
    }))
    .into_response()
}
