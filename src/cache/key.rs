//! Cache key derivation.
//!
//! Raw keys (request targets) are never stored. Every key is run through
//! HMAC-SHA256 under the configured secret and hex encoded, giving a fixed
//! 64-character derived key.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::CacheError;

type HmacSha256 = Hmac<Sha256>;

/// Length in characters of every derived key (32 digest bytes, hex encoded).
pub const DERIVED_KEY_LEN: usize = 64;

/// Derives the opaque storage key for `raw_key` under `secret`.
///
/// The secret is checked before the key, so a missing secret is reported even
/// when the key is also empty.
///
/// # Errors
///
/// - [`CacheError::MissingSecret`] if `secret` is `None` or empty.
/// - [`CacheError::EmptyKey`] if `raw_key` is empty.
///
/// # Examples
///
/// ```
/// use cache_proxy::cache::key::{derive, DERIVED_KEY_LEN};
///
/// let a = derive(Some("s3cret"), "/users/1").unwrap();
/// let b = derive(Some("s3cret"), "/users/1").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.len(), DERIVED_KEY_LEN);
/// ```
pub fn derive(secret: Option<&str>, raw_key: &str) -> Result<String, CacheError> {
    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or(CacheError::MissingSecret)?;

    if raw_key.is_empty() {
        return Err(CacheError::EmptyKey);
    }

    // HMAC accepts keys of any length, so this never fails.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| CacheError::MissingSecret)?;
    mac.update(raw_key.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}
