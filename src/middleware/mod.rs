//! Middleware pipeline — composable before/after request handler logic.
//!
//! The proxy is assembled as an ordered stack: each middleware wraps the next
//! layer, so it can inspect the request, short-circuit with its own response,
//! or decorate the response coming back.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`Pipeline`] — an ordered stack ready to serve requests.
//! - [`LoggerMiddleware`] — built-in request/response logger.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::http::X_CACHE;
use crate::{Request, Response, StatusCode};

/// Boxed response future returned by every middleware.
pub type BoxResponse = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the middleware stack is stored as a `MiddlewareHandler`.
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
pub type MiddlewareHandler = Arc<dyn Fn(Request, Next) -> BoxResponse + Send + Sync + 'static>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |req: Request, next: Next| middleware.handle(req, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed on each call to [`run`](Self::run), so it cannot be called
/// more than once per middleware invocation.
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

impl Next {
    /// Creates a new `Next` positioned at the start of the given middleware stack.
    pub fn new(middlewares: Vec<MiddlewareHandler>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// If the chain is exhausted without any layer producing a response, a
    /// `500 Internal Server Error` is returned as a safe fallback.
    pub async fn run(mut self, req: Request) -> Response {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(req, self).await
        } else {
            Response::new(StatusCode::InternalServerError)
                .body("No response generated by middleware pipeline")
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Request`] and a [`Next`] cursor. They may:
///
/// - **Pass through** — call `next.run(req).await` without modification.
/// - **Short-circuit** — return a [`Response`] directly without calling `next`.
/// - **Decorate** — call `next.run(req).await`, inspect the response, and return
///   a modified copy.
///
/// The last layer of a [`Pipeline`] is expected to short-circuit.
///
/// Implementations **should not** hold locks on shared state across an
/// `.await` point.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(&self, req: Request, next: Next) -> BoxResponse;
}

/// An ordered middleware stack.
///
/// # Examples
///
/// ```rust,no_run
/// use cache_proxy::middleware::{LoggerMiddleware, Pipeline};
///
/// # async fn example(request: cache_proxy::Request) {
/// let pipeline = Pipeline::new().with(LoggerMiddleware);
/// let response = pipeline.handle(request).await;
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Pipeline {
    middlewares: Vec<MiddlewareHandler>,
}

impl Pipeline {
    /// Creates an empty pipeline. An empty pipeline answers every request with `500`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer. Layers run in the order they were added.
    #[must_use]
    pub fn with<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(from_middleware(Arc::new(middleware)));
        self
    }

    /// Runs `req` through every layer and returns the resulting response.
    pub async fn handle(&self, req: Request) -> Response {
        Next::new(self.middlewares.clone()).run(req).await
    }
}

/// Built-in middleware that logs each request's method, target, status,
/// cache decision, and duration.
///
/// Emits a single `tracing::info!` record after the downstream handler
/// completes. Never short-circuits.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, req: Request, next: Next) -> BoxResponse {
        Box::pin(async move {
            let start = Instant::now();
            let method = req.method().as_str().to_owned();
            let target = req.target().to_owned();

            let response = next.run(req).await;

            tracing::info!(
                method = %method,
                uri = %target,
                status = response.status().as_u16(),
                cache = response.headers().get(X_CACHE).unwrap_or("-"),
                elapsed = ?start.elapsed(),
                "request served"
            );

            response
        })
    }
}
