//! # cache-proxy
//!
//! A caching reverse proxy for JSON APIs, built on a from-scratch async
//! HTTP/1.1 server.
//!
//! Requests are forwarded to a single origin on a miss; the JSON body is
//! stored under a keyed hash of the request target and every later request
//! for the same target is answered from memory. Entries are never replaced
//! and only go away when an operator clears the cache.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use cache_proxy::cache::CacheStore;
//! use cache_proxy::proxy::{DenylistMiddleware, OriginClient, ProxyHandler};
//! use cache_proxy::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(CacheStore::new(Some("s3cret".to_owned())));
//!     let origin = OriginClient::new("http://dummyjson.com")?;
//!     let pipeline = ProxyHandler::new(store, origin).into_pipeline(DenylistMiddleware::default());
//!
//!     let server = Server::bind("127.0.0.1:3000").await?;
//!     server.serve(pipeline, std::future::pending()).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod console;
pub mod http;
pub mod middleware;
pub mod proxy;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheError, CacheStore};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use proxy::{ProxyError, ProxyHandler};
pub use server::{Server, ServerError};
