//! The shared, append-only response store.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{CacheError, key};

/// A single stored response, addressed by its derived key.
#[derive(Debug, Clone)]
struct CacheEntry {
    derived_key: String,
    value: String,
}

/// Process-wide store of cached response bodies.
///
/// Entries are kept in insertion order and looked up by linear scan. A key
/// is set at most once: later writes for the same key are discarded until the
/// store is cleared.
///
/// The store is `Send + Sync`; share it behind an [`Arc`](std::sync::Arc)
/// between the request handler and the operator console.
///
/// # Examples
///
/// ```
/// use cache_proxy::cache::CacheStore;
///
/// let store = CacheStore::new(Some("s3cret".to_owned()));
/// store.set_if_absent("/users/1", r#"{"id":1}"#).unwrap();
/// store.set_if_absent("/users/1", r#"{"id":2}"#).unwrap();
///
/// assert_eq!(store.get("/users/1").unwrap().as_deref(), Some(r#"{"id":1}"#));
/// ```
#[derive(Debug)]
pub struct CacheStore {
    secret: Option<String>,
    entries: Mutex<Vec<CacheEntry>>,
}

impl CacheStore {
    /// Creates an empty store.
    ///
    /// The secret is not validated here. A missing or empty secret is
    /// reported as [`CacheError::MissingSecret`] by the first operation that
    /// derives a key.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Stores `value` under `raw_key` unless an entry already exists.
    ///
    /// Returns `true` if the value was stored, `false` if it was discarded
    /// because the key was already present.
    ///
    /// # Errors
    ///
    /// Propagates the key derivation errors from [`key::derive`].
    pub fn set_if_absent(&self, raw_key: &str, value: impl Into<String>) -> Result<bool, CacheError> {
        let derived_key = self.derive(raw_key)?;

        let mut entries = self.lock();
        if entries.iter().any(|e| e.derived_key == derived_key) {
            debug!(key = %raw_key, "entry already cached, discarding write");
            return Ok(false);
        }

        entries.push(CacheEntry {
            derived_key,
            value: value.into(),
        });
        Ok(true)
    }

    /// Returns the stored value for `raw_key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Propagates the key derivation errors from [`key::derive`].
    pub fn get(&self, raw_key: &str) -> Result<Option<String>, CacheError> {
        let derived_key = self.derive(raw_key)?;

        Ok(self
            .lock()
            .iter()
            .find(|e| e.derived_key == derived_key)
            .map(|e| e.value.clone()))
    }

    /// Removes the entry stored under `raw_key`.
    ///
    /// Returns `true` if an entry was removed, `false` if none existed.
    ///
    /// # Errors
    ///
    /// Propagates the key derivation errors from [`key::derive`].
    pub fn remove(&self, raw_key: &str) -> Result<bool, CacheError> {
        let derived_key = self.derive(raw_key)?;

        let mut entries = self.lock();
        match entries.iter().position(|e| e.derived_key == derived_key) {
            Some(index) => {
                entries.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drops every entry. Always succeeds, including on an empty store.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn derive(&self, raw_key: &str) -> Result<String, CacheError> {
        key::derive(self.secret.as_deref(), raw_key)
    }

    // No critical section can leave the Vec half-updated, so a poisoned lock
    // still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Vec<CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
