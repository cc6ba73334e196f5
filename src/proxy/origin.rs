//! Upstream client for the configured origin.

use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::value::RawValue;
use tracing::debug;

use super::ProxyError;
use crate::Method;

/// Sends cache misses to the origin and decodes JSON replies.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct OriginClient {
    base: String,
    http: reqwest::Client,
}

impl OriginClient {
    /// Creates a client for the origin at `base` (scheme, host, optional port).
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Transport`] if the HTTP client cannot be built
    /// (e.g. the TLS backend fails to initialise).
    pub fn new(base: impl Into<String>) -> Result<Self, ProxyError> {
        // The origin is always contacted directly, never through a system proxy.
        let http = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            base: base.into(),
            http,
        })
    }

    /// Returns the origin base URL.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The upstream URL for a request target: plain concatenation of origin and target.
    pub fn url_for(&self, target: &str) -> String {
        format!("{}{}", self.base, target)
    }

    /// Forwards one request to the origin and returns its JSON body, validated
    /// but otherwise untouched.
    ///
    /// The inbound method is preserved, JSON `Accept`/`Content-Type` headers
    /// are always sent, and `body` is forwarded when the method carries one.
    /// There is a single attempt with no timeout.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::Upstream`] — the origin answered with a non-2xx status.
    /// - [`ProxyError::InvalidBody`] — the body is not JSON.
    /// - [`ProxyError::Transport`] — the origin could not be reached.
    /// - [`ProxyError::InvalidMethod`] — the method cannot be sent upstream.
    pub async fn fetch(
        &self,
        method: &Method,
        target: &str,
        body: Bytes,
    ) -> Result<Box<RawValue>, ProxyError> {
        let url = self.url_for(target);
        let upstream_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|_| ProxyError::InvalidMethod(method.as_str().to_owned()))?;

        debug!(%method, %url, "origin request");

        let mut request = self
            .http
            .request(upstream_method, &url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if method.allows_body() && !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice::<Box<RawValue>>(&bytes)?)
    }
}
