//! End-to-end tests: a real listener in front of a scripted origin.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cache_proxy::cache::CacheStore;
use cache_proxy::console::{Command, Console};
use cache_proxy::proxy::{DenylistMiddleware, Envelope, OriginClient, ProxyHandler};
use cache_proxy::server::Server;
use cache_proxy::{Request, Response, StatusCode};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinSet;

const SECRET: &str = "integration-secret";

// Key order and number text that a round-trip through `serde_json::Value` would change.
const ORDERED_BODY: &str = r#"{"zeta":1,"alpha":2,"big":123456789012345678901234567890}"#;

struct Origin {
    base: String,
    hits: Arc<AtomicUsize>,
    _shutdown: oneshot::Sender<()>,
}

impl Origin {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

struct Proxy {
    base: String,
    store: Arc<CacheStore>,
    _shutdown: oneshot::Sender<()>,
}

fn json_response(status: StatusCode, body: Value) -> Response {
    Response::new(status)
        .header("Content-Type", "application/json")
        .body(body.to_string())
}

async fn origin_reply(req: Request) -> Response {
    match req.path() {
        "/users/1" => json_response(StatusCode::Ok, json!({"id": 1})),
        "/broken" => json_response(StatusCode::InternalServerError, json!({"error": "boom"})),
        "/html" => Response::new(StatusCode::Ok)
            .header("Content-Type", "text/html")
            .body("<html></html>"),
        "/search" => json_response(
            StatusCode::Ok,
            json!({"query": req.query_string().unwrap_or_default()}),
        ),
        "/echo" => json_response(
            StatusCode::Ok,
            json!({
                "method": req.method().as_str(),
                "accept": req.headers().get("accept"),
                "body": String::from_utf8_lossy(req.body()),
            }),
        ),
        "/ordered" => Response::new(StatusCode::Ok)
            .header("Content-Type", "application/json")
            .body(ORDERED_BODY),
        "/slow" => {
            tokio::time::sleep(Duration::from_millis(50)).await;
            json_response(StatusCode::Ok, json!({"slow": true}))
        }
        _ => json_response(StatusCode::NotFound, json!({"error": "not found"})),
    }
}

fn base_url(addr: SocketAddr) -> String {
    format!("http://{addr}")
}

async fn spawn_origin() -> Origin {
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let base = base_url(server.local_addr());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(server.run_until(
        move |req: Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            origin_reply(req)
        },
        async move {
            let _ = rx.await;
        },
    ));

    Origin {
        base,
        hits,
        _shutdown: tx,
    }
}

async fn spawn_proxy(origin: &str, secret: Option<&str>) -> Proxy {
    let store = Arc::new(CacheStore::new(secret.map(str::to_owned)));
    let pipeline = ProxyHandler::new(Arc::clone(&store), OriginClient::new(origin).unwrap())
        .into_pipeline(DenylistMiddleware::default());

    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let base = base_url(server.local_addr());
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(server.serve(pipeline, async move {
        let _ = rx.await;
    }));

    Proxy {
        base,
        store,
        _shutdown: tx,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

struct Reply {
    status: u16,
    cache: Option<String>,
    content_type: Option<String>,
    text: String,
}

impl Reply {
    fn envelope(&self) -> Envelope {
        serde_json::from_str(&self.text).unwrap()
    }

    fn data(&self) -> Value {
        let body: Value = serde_json::from_str(&self.text).unwrap();
        body["data"].clone()
    }
}

async fn send(request: reqwest::RequestBuilder) -> Reply {
    let response = request.send().await.unwrap();
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    let status = response.status().as_u16();
    let cache = header("x-cache");
    let content_type = header("content-type");
    let text = response.text().await.unwrap();
    Reply {
        status,
        cache,
        content_type,
        text,
    }
}

async fn get(proxy: &Proxy, target: &str) -> Reply {
    send(client().get(format!("{}{}", proxy.base, target))).await
}

#[tokio::test]
async fn miss_then_hit() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin.base, Some(SECRET)).await;

    let first = get(&proxy, "/users/1").await;
    assert_eq!(first.status, 200);
    assert_eq!(first.cache.as_deref(), Some("MISS"));
    assert_eq!(first.content_type.as_deref(), Some("application/json"));
    let envelope = first.envelope();
    assert!(envelope.success);
    assert_eq!(envelope.status_code, 200);
    assert_eq!(envelope.message, "success fetch from origin server");
    assert_eq!(first.data(), json!({"id": 1}));
    assert_eq!(origin.hits(), 1);

    let second = get(&proxy, "/users/1").await;
    assert_eq!(second.status, 200);
    assert_eq!(second.cache.as_deref(), Some("HIT"));
    assert_eq!(second.data(), json!({"id": 1}));
    assert_eq!(origin.hits(), 1, "a hit must not reach the origin");
    assert_eq!(proxy.store.len(), 1);
}

#[tokio::test]
async fn origin_body_is_passed_through_verbatim() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin.base, Some(SECRET)).await;
    let embedded = format!(r#""data":{ORDERED_BODY}}}"#);

    let miss = get(&proxy, "/ordered").await;
    assert_eq!(miss.cache.as_deref(), Some("MISS"));
    assert!(miss.text.ends_with(&embedded), "{}", miss.text);
    assert_eq!(proxy.store.get("/ordered").unwrap().as_deref(), Some(ORDERED_BODY));

    let hit = get(&proxy, "/ordered").await;
    assert_eq!(hit.cache.as_deref(), Some("HIT"));
    assert!(hit.text.ends_with(&embedded), "{}", hit.text);
    assert_eq!(origin.hits(), 1);
}

#[tokio::test]
async fn favicon_is_blocked() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin.base, Some(SECRET)).await;

    let reply = get(&proxy, "/favicon.ico").await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.text, "invalid json");
    assert_eq!(reply.cache, None);
    assert_eq!(origin.hits(), 0);
    assert!(proxy.store.is_empty());
}

#[tokio::test]
async fn origin_error_is_not_cached() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin.base, Some(SECRET)).await;

    let reply = get(&proxy, "/broken").await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.cache.as_deref(), Some("MISS"));
    let envelope = reply.envelope();
    assert!(!envelope.success);
    assert_eq!(envelope.status_code, 400);
    assert_eq!(envelope.message, "HTTP Error status: 500");
    assert_eq!(envelope.errors, Some(vec![]));
    assert_eq!(proxy.store.get("/broken").unwrap(), None);

    // Retried on the next request, since nothing was stored.
    get(&proxy, "/broken").await;
    assert_eq!(origin.hits(), 2);
}

#[tokio::test]
async fn non_json_body_is_error() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin.base, Some(SECRET)).await;

    let envelope = get(&proxy, "/html").await.envelope();
    assert!(!envelope.success);
    assert!(envelope.message.starts_with("invalid JSON body"));
    assert!(proxy.store.is_empty());
}

#[tokio::test]
async fn unreachable_origin_is_error() {
    let proxy = spawn_proxy("http://127.0.0.1:1", Some(SECRET)).await;

    let reply = get(&proxy, "/users/1").await;
    assert_eq!(reply.status, 400);
    assert!(!reply.envelope().message.is_empty());
    assert!(proxy.store.is_empty());
}

#[tokio::test]
async fn query_string_is_part_of_key() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin.base, Some(SECRET)).await;

    let a = get(&proxy, "/search?q=a").await;
    let b = get(&proxy, "/search?q=b").await;
    assert_eq!(a.cache.as_deref(), Some("MISS"));
    assert_eq!(b.cache.as_deref(), Some("MISS"));
    assert_eq!(a.data(), json!({"query": "q=a"}));
    assert_eq!(b.data(), json!({"query": "q=b"}));

    let again = get(&proxy, "/search?q=a").await;
    assert_eq!(again.cache.as_deref(), Some("HIT"));
    assert_eq!(origin.hits(), 2);
    assert_eq!(proxy.store.len(), 2);
}

#[tokio::test]
async fn method_and_body_are_forwarded() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin.base, Some(SECRET)).await;

    let reply = send(
        client()
            .post(format!("{}/echo", proxy.base))
            .body(r#"{"name":"x"}"#),
    )
    .await;
    assert_eq!(
        reply.data(),
        json!({
            "method": "POST",
            "accept": "application/json",
            "body": r#"{"name":"x"}"#,
        })
    );

    // Keying ignores the method: a GET now hits the POST's entry.
    let hit = get(&proxy, "/echo").await;
    assert_eq!(hit.cache.as_deref(), Some("HIT"));
    assert_eq!(hit.data()["method"], "POST");
}

#[tokio::test]
async fn missing_secret_fails_per_request() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin.base, None).await;

    let reply = get(&proxy, "/users/1").await;
    assert_eq!(reply.status, 400);
    assert_eq!(
        reply.envelope().message,
        "SECRET environment variable is not set"
    );
    assert_eq!(origin.hits(), 0);

    // The denylist still answers without touching the cache.
    assert_eq!(get(&proxy, "/favicon.ico").await.text, "invalid json");
}

#[tokio::test]
async fn console_clear_forces_refetch() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin.base, Some(SECRET)).await;
    let console = Console::new(Arc::clone(&proxy.store));

    get(&proxy, "/users/1").await;
    assert_eq!(get(&proxy, "/users/1").await.cache.as_deref(), Some("HIT"));

    console.execute(&Command::ClearCache);
    assert!(proxy.store.is_empty());

    let after = get(&proxy, "/users/1").await;
    assert_eq!(after.cache.as_deref(), Some("MISS"));
    assert_eq!(origin.hits(), 2);
}

#[tokio::test]
async fn concurrent_first_requests_store_one_entry() {
    const N: usize = 10;
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin.base, Some(SECRET)).await;
    let url = format!("{}/slow", proxy.base);

    let mut tasks = JoinSet::new();
    for _ in 0..N {
        let url = url.clone();
        tasks.spawn(async move { send(client().get(url)).await });
    }

    let mut replies = Vec::with_capacity(N);
    while let Some(reply) = tasks.join_next().await {
        replies.push(reply.unwrap());
    }

    assert_eq!(replies.len(), N);
    for reply in &replies {
        assert_eq!(reply.status, 200);
        assert_eq!(reply.data(), json!({"slow": true}));
    }
    assert_eq!(proxy.store.len(), 1);
    assert!((1..=N).contains(&origin.hits()));
}
