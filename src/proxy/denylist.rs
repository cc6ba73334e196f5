//! Static denylist for request targets that must never reach the origin.

use tracing::debug;

use crate::middleware::{BoxResponse, Middleware, Next};
use crate::{Request, Response, StatusCode};

/// Targets blocked when no denylist is configured.
pub const DEFAULT_DENYLIST: &[&str] = &["/favicon.ico"];

/// Body sent for every blocked request.
pub const BLOCKED_BODY: &str = "invalid json";

/// Middleware that answers denylisted targets with `400 invalid json`.
///
/// Matching is exact on the full request target. Blocked requests never
/// reach the cache or the origin, and carry no `X-Cache` header.
///
/// # Examples
///
/// ```rust
/// use cache_proxy::proxy::DenylistMiddleware;
///
/// let denylist = DenylistMiddleware::default();
/// assert!(denylist.is_blocked("/favicon.ico"));
/// assert!(!denylist.is_blocked("/users/1"));
/// ```
#[derive(Debug, Clone)]
pub struct DenylistMiddleware {
    targets: Vec<String>,
}

impl Default for DenylistMiddleware {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST.iter().copied())
    }
}

impl DenylistMiddleware {
    /// Creates a denylist from the given targets. An empty list blocks nothing.
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if `target` is on the list.
    pub fn is_blocked(&self, target: &str) -> bool {
        self.targets.iter().any(|t| t == target)
    }
}

impl Middleware for DenylistMiddleware {
    fn handle(&self, req: Request, next: Next) -> BoxResponse {
        if self.is_blocked(req.target()) {
            debug!(uri = %req.target(), "blocked target");
            return Box::pin(async {
                Response::new(StatusCode::BadRequest).body(BLOCKED_BODY)
            });
        }
        Box::pin(next.run(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Pipeline;

    struct Reached;

    impl Middleware for Reached {
        fn handle(&self, _req: Request, _next: Next) -> BoxResponse {
            Box::pin(async { Response::new(StatusCode::Ok).body("reached") })
        }
    }

    fn request(target: &str) -> Request {
        let raw = format!("GET {target} HTTP/1.1\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    #[tokio::test]
    async fn favicon_blocked_by_default() {
        let pipeline = Pipeline::new().with(DenylistMiddleware::default()).with(Reached);

        let response = pipeline.handle(request("/favicon.ico")).await;
        assert_eq!(response.status(), StatusCode::BadRequest);
        assert_eq!(response.content(), BLOCKED_BODY.as_bytes());
        assert!(!response.headers().contains("x-cache"));
    }

    #[tokio::test]
    async fn other_targets_pass() {
        let pipeline = Pipeline::new().with(DenylistMiddleware::default()).with(Reached);

        let response = pipeline.handle(request("/favicon.ico?v=2")).await;
        assert_eq!(response.content(), b"reached");
    }

    #[test]
    fn custom_list_replaces_default() {
        let denylist = DenylistMiddleware::new(["/robots.txt"]);
        assert!(denylist.is_blocked("/robots.txt"));
        assert!(!denylist.is_blocked("/favicon.ico"));
        assert!(!DenylistMiddleware::new(Vec::<String>::new()).is_blocked("/favicon.ico"));
    }
}
