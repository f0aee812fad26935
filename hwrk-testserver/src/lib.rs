use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

mod proxy;

pub use proxy::TestProxy;

pub const PATH_HELLO: &str = "/hello";
pub const PATH_ECHO: &str = "/echo";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_QP: &str = "/qp";
pub const PATH_HOST: &str = "/host";
pub const PATH_STATUS: &str = "/status/{code}";
pub const PATH_MOVED: &str = "/moved";
pub const PATH_FOUND: &str = "/found";
pub const PATH_SEE_OTHER: &str = "/see-other";
pub const PATH_TEMPORARY: &str = "/temporary";
pub const PATH_LOOP: &str = "/loop";

pub const HELLO_BODY: &str = "Hello World!";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    saw_test_header: Arc<AtomicU64>,
    saw_body: Arc<AtomicU64>,
    saw_gzip: Arc<AtomicU64>,
}

impl TestServerStats {
    fn observe(&self, headers: &HeaderMap) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        if headers.get("x-test").and_then(|v| v.to_str().ok()) == Some("1") {
            self.saw_test_header.fetch_add(1, Ordering::Relaxed);
        }
        if headers
            .get(header::ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("gzip"))
        {
            self.saw_gzip.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn saw_test_header(&self) -> u64 {
        self.saw_test_header.load(Ordering::Relaxed)
    }

    /// Requests that arrived at `/echo` with a non-empty body.
    pub fn saw_body(&self) -> u64 {
        self.saw_body.load(Ordering::Relaxed)
    }

    pub fn saw_gzip(&self) -> u64 {
        self.saw_gzip.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct TestServerUrls {
    pub base_url: String,
    pub hello: String,
    pub echo: String,
    pub slow: String,
    pub qp: String,
    pub host: String,
    pub moved: String,
    pub found: String,
    pub see_other: String,
    pub temporary: String,
    pub redirect_loop: String,
}

impl TestServerUrls {
    pub fn new(base_url: String) -> Self {
        Self {
            hello: format!("{base_url}{PATH_HELLO}"),
            echo: format!("{base_url}{PATH_ECHO}"),
            slow: format!("{base_url}{PATH_SLOW}"),
            qp: format!("{base_url}{PATH_QP}"),
            host: format!("{base_url}{PATH_HOST}"),
            moved: format!("{base_url}{PATH_MOVED}"),
            found: format!("{base_url}{PATH_FOUND}"),
            see_other: format!("{base_url}{PATH_SEE_OTHER}"),
            temporary: format!("{base_url}{PATH_TEMPORARY}"),
            redirect_loop: format!("{base_url}{PATH_LOOP}"),
            base_url,
        }
    }

    pub fn status(&self, code: u16) -> String {
        format!("{}/status/{code}", self.base_url)
    }
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    urls: TestServerUrls,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

async fn handle_hello(State(stats): State<TestServerStats>, headers: HeaderMap) -> &'static str {
    stats.observe(&headers);
    HELLO_BODY
}

async fn handle_slow(State(stats): State<TestServerStats>, headers: HeaderMap) -> &'static str {
    stats.observe(&headers);
    sleep(Duration::from_millis(50)).await;
    "slow"
}

async fn handle_echo(
    State(stats): State<TestServerStats>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Bytes) {
    stats.observe(&headers);
    if !body.is_empty() {
        stats.saw_body.fetch_add(1, Ordering::Relaxed);
    }
    (StatusCode::OK, body)
}

async fn handle_qp(
    State(stats): State<TestServerStats>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> StatusCode {
    stats.observe(&headers);

    if query.get("q").map(String::as_str) == Some("hello world") {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    }
}

/// Echoes the `Host` header the server saw.
async fn handle_host(State(stats): State<TestServerStats>, headers: HeaderMap) -> String {
    stats.observe(&headers);
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn handle_status(
    State(stats): State<TestServerStats>,
    headers: HeaderMap,
    Path(code): Path<u16>,
) -> StatusCode {
    stats.observe(&headers);
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

fn redirect(
    stats: &TestServerStats,
    headers: &HeaderMap,
    status: StatusCode,
    to: &str,
) -> Response {
    stats.observe(headers);
    (status, [(header::LOCATION, to.to_string())]).into_response()
}

async fn handle_moved(State(stats): State<TestServerStats>, headers: HeaderMap) -> Response {
    redirect(&stats, &headers, StatusCode::MOVED_PERMANENTLY, PATH_HELLO)
}

async fn handle_found(State(stats): State<TestServerStats>, headers: HeaderMap) -> Response {
    redirect(&stats, &headers, StatusCode::FOUND, PATH_HELLO)
}

async fn handle_see_other(State(stats): State<TestServerStats>, headers: HeaderMap) -> Response {
    redirect(&stats, &headers, StatusCode::SEE_OTHER, PATH_HELLO)
}

async fn handle_temporary(State(stats): State<TestServerStats>, headers: HeaderMap) -> Response {
    redirect(&stats, &headers, StatusCode::TEMPORARY_REDIRECT, PATH_ECHO)
}

async fn handle_loop(State(stats): State<TestServerStats>, headers: HeaderMap) -> Response {
    redirect(&stats, &headers, StatusCode::MOVED_PERMANENTLY, PATH_LOOP)
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_HELLO, get(handle_hello))
        .route(PATH_SLOW, get(handle_slow))
        .route(PATH_ECHO, any(handle_echo))
        .route(PATH_QP, get(handle_qp))
        .route(PATH_HOST, get(handle_host))
        .route(PATH_STATUS, any(handle_status))
        .route(PATH_MOVED, any(handle_moved))
        .route(PATH_FOUND, any(handle_found))
        .route(PATH_SEE_OTHER, any(handle_see_other))
        .route(PATH_TEMPORARY, any(handle_temporary))
        .route(PATH_LOOP, any(handle_loop))
        .with_state(stats)
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();

        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        let base_url = format!("http://{addr}");
        let urls = TestServerUrls::new(base_url.clone());

        Ok(Self {
            addr,
            base_url,
            urls,
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn urls(&self) -> &TestServerUrls {
        &self.urls
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
