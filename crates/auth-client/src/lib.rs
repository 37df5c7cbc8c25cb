//! Authenticated request pipeline for the codebase API
//!
//! Wraps a `reqwest::Client` so that every protected call carries the current
//! bearer token, and an expired token is refreshed exactly once no matter how
//! many requests notice the expiry at the same time.
//!
//! Pipeline:
//! 1. `interceptor` attaches `Authorization: Bearer <token>` from the store
//! 2. `classify` sorts the response into pass-through, refresh or terminal
//! 3. `coordinator` runs one `/refresh` per episode and queues everyone else
//! 4. `replay` re-sends each waiting request once with the new token
//! 5. `terminator` clears the store and notifies the session listener when
//!    the session cannot be recovered

pub mod classify;
pub mod client;
pub mod coordinator;
pub mod endpoints;
pub mod error;
pub mod interceptor;
pub mod metrics;
pub mod replay;
pub mod request;
pub mod terminator;

#[cfg(test)]
mod test_support;

pub use classify::{Disposition, classify};
pub use client::ApiClient;
pub use coordinator::{RefreshCoordinator, RefreshResult, RefreshState, Refreshed};
pub use endpoints::Page;
pub use error::{AuthFailure, Error, Result};
pub use request::{ApiRequest, ApiResponse, PendingRequest};
pub use terminator::{LogListener, SessionEnded, SessionListener, SessionTerminator};
