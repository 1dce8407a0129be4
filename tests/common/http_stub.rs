//! Local HTTP server for end-to-end `ReqwestProbe` tests.
//!
//! An axum `Router` on an ephemeral port serving fixed responses per path.
//! Keep-alive is left on, and the peer address of every request is
//! recorded so tests can see how many connections the client opened.

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Fixed response for one path.
#[derive(Debug, Clone)]
pub struct StubRoute {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Delay before the response is produced.
    pub delay: Duration,
}

impl StubRoute {
    pub fn ok(body: &[u8]) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct StubHit {
    pub method: Method,
    pub path: String,
    pub peer: SocketAddr,
}

struct StubState {
    routes: HashMap<String, StubRoute>,
    hits: Mutex<Vec<StubHit>>,
}

/// A running stub server. Stops accepting when dropped.
pub struct HttpStub {
    addr: SocketAddr,
    state: Arc<StubState>,
    handle: JoinHandle<()>,
}

impl HttpStub {
    /// Bind to an ephemeral local port and serve `routes` (keyed by the
    /// request path as sent, e.g. `/docs/a.txt`). Unknown paths answer 404.
    pub async fn start(routes: Vec<(&str, StubRoute)>) -> Self {
        let state = Arc::new(StubState {
            routes: routes
                .into_iter()
                .map(|(path, route)| (path.to_string(), route))
                .collect(),
            hits: Mutex::new(Vec::new()),
        });
        let router = Router::new().fallback(respond).with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let service = router.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                tracing::error!("Stub server error: {}", e);
            }
        });

        Self { addr, state, handle }
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> Vec<StubHit> {
        self.state.hits.lock().unwrap().clone()
    }

    /// Distinct client connections that sent at least one request.
    pub fn connections(&self) -> usize {
        let mut peers: Vec<SocketAddr> = self.hits().into_iter().map(|h| h.peer).collect();
        peers.sort_unstable();
        peers.dedup();
        peers.len()
    }
}

impl Drop for HttpStub {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn respond(
    State(state): State<Arc<StubState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
) -> Response {
    let path = uri.path().to_string();
    state.hits.lock().unwrap().push(StubHit {
        method,
        path: path.clone(),
        peer,
    });

    let route = state
        .routes
        .get(&path)
        .cloned()
        .unwrap_or_else(|| StubRoute::status(404));

    if !route.delay.is_zero() {
        tokio::time::sleep(route.delay).await;
    }

    let status = StatusCode::from_u16(route.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, route.body).into_response();
    for (name, value) in &route.headers {
        response.headers_mut().insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    response
}
