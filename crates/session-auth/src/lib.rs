//! Session credentials for the codebase API
//!
//! Owns everything about the token pair that is not the request pipeline
//! itself: where it is persisted, how it is read and replaced atomically, and
//! the unauthenticated calls that mint it (`/login`, `/signup`, `/refresh`).
//!
//! Credential flow:
//! 1. `token::login()` returns `{token, refresh_token?}`
//! 2. The pair is stored via `CredentialStore::set()`
//! 3. The request pipeline reads it back with `CredentialStore::get()` at send time
//! 4. On expiry the refresh coordinator calls `token::refresh_token()` and stores the rotated pair
//! 5. Logout or a failed refresh calls `CredentialStore::clear()`
//!
//! Each `set`/`clear` bumps a session generation. A refresh that started
//! before a logout or a new login stores its result with `set_if_current`
//! and so can never bring the old session back.

pub mod constants;
pub mod credentials;
pub mod error;
pub mod store;
pub mod token;

pub use constants::*;
pub use credentials::{Credential, CredentialStore, RefreshLease};
pub use error::{Error, Result};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreFuture};
pub use token::{LoginResponse, TokenResponse, login, refresh_token, signup};
