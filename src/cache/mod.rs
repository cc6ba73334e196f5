//! Caching layer — keyed, first-write-wins response storage.
//!
//! - [`key`] turns a raw request target into an opaque derived key.
//! - [`CacheStore`] holds `(derived key, body)` pairs for the process lifetime.

use thiserror::Error;

pub mod key;
pub mod store;

pub use store::CacheStore;

/// Errors raised while deriving a cache key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("SECRET environment variable is not set")]
    MissingSecret,

    #[error("Key cannot be empty")]
    EmptyKey,
}
