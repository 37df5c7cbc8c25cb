//! Single-flight token refresh
//!
//! Any number of requests can hit a 401 at the same moment; exactly one
//! `/refresh` call goes out. The first request to observe expiry flips the
//! coordinator from `Idle` to `Refreshing` and starts the exchange. Every
//! request that expires while the exchange is in flight is queued behind it.
//! When the exchange resolves, the queue is drained in FIFO order, every
//! waiter receives the same outcome, and the state returns to `Idle`, all
//! under one lock acquisition. A 401 arriving after that starts a new episode;
//! it can never attach itself to the one that just finished.
//!
//! The triggering request is queued like any other waiter (always first), and
//! the exchange runs on its own task. A caller that drops its future therefore
//! cannot strand the coordinator in `Refreshing`.
//!
//! Logout and login call `reset`: queued waiters are rejected with
//! `SessionChanged` and the coordinator goes back to `Idle` at once. The
//! exchange still in flight belongs to a finished episode. Its tokens are
//! discarded by the store's generation check and its release is ignored.
//!
//! Transitions:
//! - Idle → Refreshing (first expiry observed)
//! - Refreshing → Refreshing (further expiry, waiter appended, no new call)
//! - Refreshing → Idle (exchange resolved, waiters released)
//! - Refreshing → Idle (reset, waiters rejected)

use std::collections::VecDeque;
use std::sync::Arc;

use session_auth::{Credential, CredentialStore, RefreshLease};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use crate::error::AuthFailure;
use crate::metrics::{self, RefreshOutcome};
use crate::terminator::SessionTerminator;

/// Fresh credentials plus the session generation they were stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refreshed {
    pub credential: Credential,
    pub generation: u64,
}

/// Result every waiter receives when an episode resolves.
pub type RefreshResult = std::result::Result<Refreshed, AuthFailure>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// A request parked on the in-flight refresh.
///
/// The waiting task keeps its own request; the waiter is only the
/// single-use completion handle the coordinator resolves.
struct Waiter {
    ticket: u64,
    tx: oneshot::Sender<RefreshResult>,
}

struct Inner {
    state: RefreshState,
    waiters: VecDeque<Waiter>,
    next_ticket: u64,
    episode: u64,
}

/// Position in the queue handed back by `join`.
pub(crate) struct Ticket {
    pub id: u64,
    pub episode: u64,
    pub leader: bool,
    pub rx: oneshot::Receiver<RefreshResult>,
}

/// One per client session. Owns the refresh state and the waiter queue.
pub struct RefreshCoordinator {
    inner: Mutex<Inner>,
    client: reqwest::Client,
    base_url: String,
    store: Arc<CredentialStore>,
    terminator: Arc<SessionTerminator>,
}

impl RefreshCoordinator {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        store: Arc<CredentialStore>,
        terminator: Arc<SessionTerminator>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: RefreshState::Idle,
                waiters: VecDeque::new(),
                next_ticket: 0,
                episode: 0,
            }),
            client,
            base_url,
            store,
            terminator,
        }
    }

    /// Wait for fresh credentials, starting a refresh if none is in flight.
    ///
    /// On failure the session has already been terminated (once, by the
    /// episode) by the time this returns.
    pub async fn refresh(self: &Arc<Self>) -> RefreshResult {
        let ticket = self.join().await;
        if ticket.leader {
            let coordinator = Arc::clone(self);
            let episode = ticket.episode;
            tokio::spawn(async move {
                coordinator.run_episode(episode).await;
            });
        } else {
            debug!(ticket = ticket.id, "refresh already in flight, queued");
        }
        ticket.rx.await.unwrap_or(Err(AuthFailure::Abandoned))
    }

    pub async fn state(&self) -> RefreshState {
        self.inner.lock().await.state
    }

    /// Number of requests currently waiting on the in-flight refresh.
    pub async fn queued(&self) -> usize {
        self.inner.lock().await.waiters.len()
    }

    /// Abandon the current episode. Every queued waiter is rejected with
    /// `SessionChanged` and the state returns to `Idle`. Returns how many
    /// waiters were rejected.
    pub async fn reset(&self) -> usize {
        let mut inner = self.inner.lock().await;
        if inner.state == RefreshState::Idle {
            return 0;
        }
        let waiters = std::mem::take(&mut inner.waiters);
        let rejected = waiters.len();
        for waiter in waiters {
            let _ = waiter.tx.send(Err(AuthFailure::SessionChanged));
        }
        inner.state = RefreshState::Idle;
        debug!(episode = inner.episode, rejected, "refresh episode reset");
        rejected
    }

    /// Enqueue a waiter. The compare-and-set from `Idle` to `Refreshing`
    /// happens under the same lock, so exactly one caller becomes leader.
    pub(crate) async fn join(&self) -> Ticket {
        let mut inner = self.inner.lock().await;
        let leader = match inner.state {
            RefreshState::Idle => {
                inner.state = RefreshState::Refreshing;
                inner.episode += 1;
                true
            }
            RefreshState::Refreshing => false,
        };
        let id = inner.next_ticket;
        inner.next_ticket += 1;
        let (tx, rx) = oneshot::channel();
        inner.waiters.push_back(Waiter { ticket: id, tx });
        Ticket {
            id,
            episode: inner.episode,
            leader,
            rx,
        }
    }

    /// Drain the queue, resolve every waiter with `outcome` in FIFO order,
    /// and return to `Idle`. Returns the released tickets in release order.
    ///
    /// A release for an episode that was reset in the meantime is ignored.
    pub(crate) async fn release(&self, episode: u64, outcome: &RefreshResult) -> Vec<u64> {
        let mut inner = self.inner.lock().await;
        if inner.state != RefreshState::Refreshing || inner.episode != episode {
            debug!(episode, current = inner.episode, "stale refresh episode, nothing to release");
            return Vec::new();
        }
        let waiters = std::mem::take(&mut inner.waiters);
        let mut released = Vec::with_capacity(waiters.len());
        for waiter in waiters {
            released.push(waiter.ticket);
            // A dropped receiver just means that caller stopped waiting
            let _ = waiter.tx.send(outcome.clone());
        }
        inner.state = RefreshState::Idle;
        released
    }

    /// One refresh episode: exchange, persist or terminate, release.
    async fn run_episode(&self, episode: u64) {
        // An unreadable store is treated the same as a missing refresh token
        let lease = match self.store.refresh_lease().await {
            Ok(lease) => lease,
            Err(e) => {
                warn!(error = %e, "failed to read refresh token");
                RefreshLease {
                    token: None,
                    generation: self.store.generation().await,
                }
            }
        };
        let generation = lease.generation;
        let outcome = self.exchange(lease).await;

        let metric = match &outcome {
            Ok(_) => RefreshOutcome::Success,
            Err(AuthFailure::MissingRefreshToken) => RefreshOutcome::MissingToken,
            Err(AuthFailure::SessionChanged) => RefreshOutcome::Superseded,
            Err(_) => RefreshOutcome::Failure,
        };
        if let Err(failure) = &outcome {
            if *failure != AuthFailure::SessionChanged {
                self.terminator.terminate(failure.clone(), generation).await;
            }
        }

        let released = self.release(episode, &outcome).await;
        metrics::record_refresh(metric, released.len());
        match &outcome {
            Ok(_) => info!(waiters = released.len(), "token refresh succeeded"),
            Err(failure) => {
                warn!(waiters = released.len(), error = %failure, "token refresh failed")
            }
        }
    }

    /// Exchange the leased refresh token for a new pair and persist it,
    /// unless the session changed while the exchange was in flight.
    async fn exchange(&self, lease: RefreshLease) -> RefreshResult {
        let Some(refresh) = lease.token else {
            return Err(AuthFailure::MissingRefreshToken);
        };

        debug!("exchanging refresh token");
        let tokens =
            session_auth::refresh_token(&self.client, &self.base_url, refresh.expose())
                .await
                .map_err(|e| AuthFailure::RefreshRejected(e.to_string()))?;

        let credential = Credential::new(tokens.access_token, Some(tokens.refresh_token));
        let generation = match self
            .store
            .set_if_current(&credential, lease.generation)
            .await
        {
            Ok(Some(generation)) => generation,
            Ok(None) => {
                info!("session changed during refresh, discarding new tokens");
                return Err(AuthFailure::SessionChanged);
            }
            Err(e) => {
                warn!(error = %e, "failed to persist refreshed credential");
                lease.generation
            }
        };
        Ok(Refreshed {
            credential,
            generation,
        })
    }
}
