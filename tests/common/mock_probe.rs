//! Mock HttpProbe for testing.
//!
//! Records every probe() call. Replies are scripted per (method, uri);
//! anything unscripted answers 404.

use futures::future::BoxFuture;
use replication_verifier::error::{NetworkErrorKind, Result, VerifyError};
use replication_verifier::probe::{HttpProbe, ProbeMethod, ProbeResponse};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A scripted reply.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 2xx response.
    Ok(ProbeResponse),
    /// Non-2xx status.
    Status(u16),
    /// Transport failure.
    Network(NetworkErrorKind),
    /// Never completes.
    Hang,
    /// Panics inside the probe.
    Panic,
    /// Wait, then reply.
    Delayed(Duration, Box<Reply>),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Ok(ProbeResponse::with_status(200))
    }

    pub fn head(etag: Option<&str>, last_modified: Option<String>) -> Self {
        Reply::Ok(ProbeResponse {
            status: 200,
            etag: etag.map(str::to_string),
            last_modified,
            body: None,
        })
    }

    pub fn body(bytes: &[u8]) -> Self {
        Reply::Ok(ProbeResponse {
            status: 200,
            body: Some(bytes.to_vec()),
            ..Default::default()
        })
    }

    pub fn after(self, delay: Duration) -> Self {
        Reply::Delayed(delay, Box::new(self))
    }
}

/// A recorded probe() call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCall {
    pub uri: String,
    pub method: ProbeMethod,
    pub timeout: Duration,
}

/// Mock implementation of HttpProbe that records all calls.
///
/// # Example
/// ```rust,ignore
/// let mock = MockProbe::new();
/// mock.on_head("http://web1/a.txt", Reply::head(Some("\"abc\""), None));
///
/// // Use in tests...
///
/// assert_eq!(mock.count(ProbeMethod::Get), 0);
/// ```
pub struct MockProbe {
    replies: Mutex<HashMap<(ProbeMethod, String), Reply>>,
    calls: Mutex<Vec<ProbeCall>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MockProbe {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn on(&self, method: ProbeMethod, uri: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert((method, uri.to_string()), reply);
    }

    pub fn on_head(&self, uri: &str, reply: Reply) {
        self.on(ProbeMethod::Head, uri, reply);
    }

    pub fn on_get(&self, uri: &str, reply: Reply) {
        self.on(ProbeMethod::Get, uri, reply);
    }

    /// Serve `contents` faithfully: HEAD with matching ETag and
    /// Last-Modified, GET with the bytes.
    pub fn echo(&self, uri: &str, etag: Option<&str>, last_modified: Option<String>, contents: &[u8]) {
        self.on_head(uri, Reply::head(etag, last_modified));
        self.on_get(uri, Reply::body(contents));
    }

    pub fn calls(&self) -> Vec<ProbeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: ProbeMethod) -> usize {
        self.calls().iter().filter(|c| c.method == method).count()
    }

    pub fn calls_to(&self, uri: &str) -> Vec<ProbeCall> {
        self.calls().into_iter().filter(|c| c.uri == uri).collect()
    }

    /// Highest number of probes seen in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn reply_for(&self, method: ProbeMethod, uri: &str) -> Reply {
        self.replies
            .lock()
            .unwrap()
            .get(&(method, uri.to_string()))
            .cloned()
            .unwrap_or(Reply::Status(404))
    }
}

impl Default for MockProbe {
    fn default() -> Self {
        Self::new()
    }
}

async fn resolve(uri: &str, reply: Reply) -> Result<ProbeResponse> {
    let mut reply = reply;
    loop {
        match reply {
            Reply::Ok(response) => return Ok(response),
            Reply::Status(status) => return Err(VerifyError::http(uri, status)),
            Reply::Network(kind) => return Err(VerifyError::network(uri, kind, "simulated failure")),
            Reply::Hang => return std::future::pending().await,
            Reply::Panic => panic!("simulated probe panic for {}", uri),
            Reply::Delayed(delay, next) => {
                tokio::time::sleep(delay).await;
                reply = *next;
            }
        }
    }
}

impl HttpProbe for MockProbe {
    fn probe<'a>(
        &'a self,
        uri: &'a str,
        method: ProbeMethod,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<ProbeResponse>> {
        self.calls.lock().unwrap().push(ProbeCall {
            uri: uri.to_string(),
            method,
            timeout,
        });
        let reply = self.reply_for(method, uri);

        Box::pin(async move {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            let result = resolve(uri, reply).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }
}
