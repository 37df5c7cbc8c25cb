//! Common types shared by the codebase API client crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
