//! The caching proxy — hit/miss decision, origin fetch, and store population.
//!
//! Each request walks one path through this state machine:
//!
//! ```text
//! RECEIVED ─┬─ BLOCKED ──────────────────────────────────────┐
//!           └─ LOOKUP ─┬─ HIT ───────────────────────────────┤
//!                      └─ MISS ── FETCHING ─┬─ OK ── STORED ─┤── RESPONDED
//!                                           └─ FAIL ─────────┘
//! ```
//!
//! `BLOCKED` is handled by [`DenylistMiddleware`]; everything after it by
//! [`ProxyHandler`]. Per-request failures become a `400` error [`Envelope`]
//! and never escape the handler.

use std::sync::Arc;

use serde_json::value::RawValue;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheError, CacheStore};
use crate::middleware::{BoxResponse, LoggerMiddleware, Middleware, Next, Pipeline};
use crate::{Request, Response};

pub mod denylist;
pub mod envelope;
pub mod origin;

pub use denylist::DenylistMiddleware;
pub use envelope::{CacheStatus, Envelope};
pub use origin::OriginClient;

/// Everything that can go wrong while serving one proxied request.
///
/// The `Display` text is what the client sees in the error envelope's
/// `message`.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("HTTP Error status: {status}")]
    Upstream { status: u16 },

    #[error("invalid JSON body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("origin request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("method {0} cannot be forwarded")]
    InvalidMethod(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Terminal middleware serving requests from the [`CacheStore`] or the origin.
///
/// The store is injected so that the operator console (and tests) can share
/// it. Cloning the handler is cheap.
#[derive(Debug, Clone)]
pub struct ProxyHandler {
    store: Arc<CacheStore>,
    origin: OriginClient,
}

impl ProxyHandler {
    /// Creates a handler backed by `store` that forwards misses to `origin`.
    pub fn new(store: Arc<CacheStore>, origin: OriginClient) -> Self {
        Self { store, origin }
    }

    /// Returns the shared store.
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Serves one request. Never fails: errors come back as an error envelope.
    pub async fn serve(&self, req: Request) -> Response {
        let target = req.target();

        match self.lookup(target) {
            Ok(Some(data)) => {
                debug!(uri = %target, "cache hit");
                return Envelope::success(data).into_response(CacheStatus::Hit);
            }
            Ok(None) => debug!(uri = %target, "cache miss"),
            Err(e) => {
                warn!(uri = %target, error = %e, "cache lookup failed");
                return Envelope::error(e.to_string()).into_response(CacheStatus::Miss);
            }
        }

        match self.fetch_and_store(&req).await {
            Ok(data) => Envelope::success(data).into_response(CacheStatus::Miss),
            Err(e) => {
                warn!(uri = %target, error = %e, "origin fetch failed");
                Envelope::error(e.to_string()).into_response(CacheStatus::Miss)
            }
        }
    }

    fn lookup(&self, target: &str) -> Result<Option<Box<RawValue>>, ProxyError> {
        match self.store.get(target)? {
            Some(cached) => Ok(Some(RawValue::from_string(cached)?)),
            None => Ok(None),
        }
    }

    // The store lock is only taken by `set_if_absent`, after the fetch.
    async fn fetch_and_store(&self, req: &Request) -> Result<Box<RawValue>, ProxyError> {
        let data = self
            .origin
            .fetch(req.method(), req.target(), req.body().clone())
            .await?;

        if !self
            .store
            .set_if_absent(req.target(), data.get())?
        {
            debug!(uri = %req.target(), "already cached by a concurrent request");
        }

        Ok(data)
    }

    /// Builds the standard stack: request logging, the denylist, then this handler.
    pub fn into_pipeline(self, denylist: DenylistMiddleware) -> Pipeline {
        Pipeline::new()
            .with(LoggerMiddleware)
            .with(denylist)
            .with(self)
    }
}

impl Middleware for ProxyHandler {
    fn handle(&self, req: Request, _next: Next) -> BoxResponse {
        let handler = self.clone();
        Box::pin(async move { handler.serve(req).await })
    }
}
