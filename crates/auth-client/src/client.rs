//! Authenticated API client
//!
//! Every protected call goes through `send`:
//! 1. Read the current credential and dispatch with `Authorization: Bearer`
//! 2. Anything but a 401 goes straight back to the caller
//! 3. A first 401 waits on the shared refresh coordinator
//! 4. With fresh credentials the request is replayed exactly once
//! 5. A 401 on the replay ends the session
//!
//! Login and signup use the raw HTTP client so their 401s never look like
//! token expiry. Login and logout start a new session generation, so a
//! refresh begun under the old session can neither restore nor clear it.

use std::sync::Arc;

use common::Secret;
use serde::de::DeserializeOwned;
use session_auth::{Credential, CredentialStore};
use tracing::{info, instrument};

use crate::classify::{Disposition, classify};
use crate::coordinator::RefreshCoordinator;
use crate::error::{AuthFailure, Error, Result};
use crate::interceptor;
use crate::replay;
use crate::request::{ApiRequest, ApiResponse, PendingRequest};
use crate::terminator::{SessionListener, SessionTerminator};

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<CredentialStore>,
    terminator: Arc<SessionTerminator>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        store: Arc<CredentialStore>,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        let base_url = base_url.into();
        let terminator = Arc::new(SessionTerminator::new(store.clone(), listener));
        let coordinator = Arc::new(RefreshCoordinator::new(
            http.clone(),
            base_url.clone(),
            store.clone(),
            terminator.clone(),
        ));
        Self {
            http,
            base_url,
            store,
            terminator,
            coordinator,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Send a protected request, refreshing and replaying once on expiry.
    ///
    /// Non-success statuses other than 401 come back as `Error::Status`.
    /// `Error::PermanentAuthFailure` means the store has been cleared and the
    /// session listener notified.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut pending = PendingRequest::new(request);
        let credential = self.store.get().await?;
        let response =
            interceptor::dispatch(&self.http, &self.base_url, &pending, credential.as_ref())
                .await?;

        match classify(response.status, pending.retried) {
            Disposition::PassThrough => return response.error_for_status(),
            Disposition::Terminal => {
                let generation = self.store.generation().await;
                return self.end_session(generation).await;
            }
            Disposition::Refresh => {}
        }

        let fresh = self.coordinator.refresh().await?;
        let response =
            replay::replay(&self.http, &self.base_url, &mut pending, &fresh.credential).await?;

        match classify(response.status, pending.retried) {
            Disposition::PassThrough => response.error_for_status(),
            Disposition::Refresh | Disposition::Terminal => {
                self.end_session(fresh.generation).await
            }
        }
    }

    /// `send` and decode the JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.json()
    }

    /// Terminate the session observed at `generation` after a second 401.
    async fn end_session<T>(&self, generation: u64) -> Result<T> {
        let failure = AuthFailure::ExpiredAfterRetry;
        self.terminator.terminate(failure.clone(), generation).await;
        Err(Error::PermanentAuthFailure(failure))
    }

    /// Log in with email and password and store the returned tokens.
    pub async fn login(&self, email: &str, password: &Secret<String>) -> Result<()> {
        let tokens =
            session_auth::login(&self.http, &self.base_url, email, password.expose()).await?;
        let has_refresh = tokens.refresh_token.is_some();
        self.store
            .set(&Credential::new(tokens.token, tokens.refresh_token))
            .await?;
        // Requests still waiting on a refresh belong to the previous session
        let abandoned = self.coordinator.reset().await;
        info!(has_refresh, abandoned, "logged in");
        Ok(())
    }

    /// Create an account. Does not log in.
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &Secret<String>,
    ) -> Result<serde_json::Value> {
        Ok(session_auth::signup(&self.http, &self.base_url, name, email, password.expose()).await?)
    }

    /// Clear stored credentials. Voluntary, so the session listener is not told.
    ///
    /// A refresh in flight is abandoned: its waiters fail with
    /// `SessionChanged` and its tokens are never stored.
    pub async fn logout(&self) -> Result<()> {
        let cleared = self.store.clear().await?;
        let abandoned = self.coordinator.reset().await;
        info!(cleared, abandoned, "logged out");
        Ok(())
    }

    /// Whether an access token is stored. Says nothing about its validity.
    pub async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.store.get().await?.is_some())
    }
}
