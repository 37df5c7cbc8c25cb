//! Session credential adapter
//!
//! Maps the access/refresh token pair onto two keys of a `KeyValueStore`
//! (`token` and `refreshToken`). Both keys are written in one backend batch,
//! and every operation runs under one async mutex, so a reader never observes
//! the new access token next to the old refresh token, or vice versa.
//!
//! There is no caching layer: every `get()` goes to the backend and reflects
//! the latest `set()`/`clear()`.

use std::sync::Arc;

use common::Secret;
use tokio::sync::Mutex;
use tracing::debug;

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::error::Result;
use crate::store::KeyValueStore;

/// The session's bearer credentials.
///
/// A login response may omit the refresh token, so it is optional. Without
/// one, an expired access token ends the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: Secret<String>,
    pub refresh_token: Option<Secret<String>>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            refresh_token: refresh_token.map(Secret::new),
        }
    }
}

/// Refresh token as read at a given session generation.
///
/// The generation lets a refresh that started before a logout or a new
/// login notice that the session it was refreshing is gone.
#[derive(Debug, Clone)]
pub struct RefreshLease {
    pub token: Option<Secret<String>>,
    pub generation: u64,
}

/// Credential store shared by the request pipeline and the login flow.
///
/// Every `set` and `clear` bumps the session generation. Writers that
/// acted on an older read use the `_if_current` variants, which do nothing
/// once the generation has moved on.
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
    generation: Mutex<u64>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            generation: Mutex::new(0),
        }
    }

    /// Current credential, or `None` when no access token is stored.
    pub async fn get(&self) -> Result<Option<Credential>> {
        let _guard = self.generation.lock().await;
        let access = match self.backend.get(ACCESS_TOKEN_KEY).await? {
            Some(token) => token,
            None => return Ok(None),
        };
        let refresh = self.backend.get(REFRESH_TOKEN_KEY).await?;
        Ok(Some(Credential::new(access, refresh)))
    }

    /// Current refresh token alone. Present even if the access token is not.
    pub async fn refresh_token(&self) -> Result<Option<Secret<String>>> {
        Ok(self.refresh_lease().await?.token)
    }

    /// Current refresh token together with the generation it was read at.
    pub async fn refresh_lease(&self) -> Result<RefreshLease> {
        let generation = self.generation.lock().await;
        let token = self.backend.get(REFRESH_TOKEN_KEY).await?.map(Secret::new);
        Ok(RefreshLease {
            token,
            generation: *generation,
        })
    }

    pub async fn generation(&self) -> u64 {
        *self.generation.lock().await
    }

    /// Replace both tokens in one backend write. A credential without a
    /// refresh token removes any stale refresh token left by an earlier
    /// session.
    pub async fn set(&self, credential: &Credential) -> Result<()> {
        let mut generation = self.generation.lock().await;
        self.write(credential).await?;
        *generation += 1;
        Ok(())
    }

    /// `set`, but only if no other `set`/`clear` happened since `expected`
    /// was read. Returns the new generation, or `None` if nothing was written.
    pub async fn set_if_current(
        &self,
        credential: &Credential,
        expected: u64,
    ) -> Result<Option<u64>> {
        let mut generation = self.generation.lock().await;
        if *generation != expected {
            debug!(expected, current = *generation, "session changed, not storing credential");
            return Ok(None);
        }
        self.write(credential).await?;
        *generation += 1;
        Ok(Some(*generation))
    }

    /// Remove both tokens. Returns whether anything was stored beforehand,
    /// which lets callers make termination idempotent.
    pub async fn clear(&self) -> Result<bool> {
        let mut generation = self.generation.lock().await;
        *generation += 1;
        self.remove_both().await
    }

    /// `clear`, but only if the session is still the one read at `expected`.
    pub async fn clear_if_current(&self, expected: u64) -> Result<bool> {
        let mut generation = self.generation.lock().await;
        if *generation != expected {
            debug!(expected, current = *generation, "session changed, not clearing");
            return Ok(false);
        }
        *generation += 1;
        self.remove_both().await
    }

    async fn write(&self, credential: &Credential) -> Result<()> {
        let refresh = credential
            .refresh_token
            .as_ref()
            .map(|refresh| refresh.expose().clone());
        self.backend
            .set_many(vec![
                (ACCESS_TOKEN_KEY, Some(credential.access_token.expose().clone())),
                (REFRESH_TOKEN_KEY, refresh),
            ])
            .await?;
        debug!(
            has_refresh = credential.refresh_token.is_some(),
            "stored credential"
        );
        Ok(())
    }

    async fn remove_both(&self) -> Result<bool> {
        let cleared = self
            .backend
            .remove_many(vec![ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])
            .await?;
        if cleared {
            debug!("cleared credential");
        }
        Ok(cleared)
    }
}
