// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP probe: a single HEAD or GET against a remote URI.
//!
//! The [`HttpProbe`] trait is the seam between the checker and the
//! network. [`ReqwestProbe`] is the production implementation; tests
//! substitute scripted probes.
//!
//! # Contract
//!
//! - Every call carries an explicit timeout. On expiry the call fails with
//!   [`VerifyError::Network`] of kind [`NetworkErrorKind::Timeout`].
//! - 2xx responses are returned as [`ProbeResponse`]. Any other status is
//!   returned as [`VerifyError::Http`] so callers can branch on it (404
//!   drives verdicts).
//! - No retries happen inside the probe.
//!
//! # Connection Reuse
//!
//! `ReqwestProbe` wraps one `reqwest::Client`, which pools connections
//! per host and is safe to share across tasks. Create one probe per engine
//! and share it behind an `Arc`.

use crate::config::ProbeConfig;
use crate::error::{NetworkErrorKind, Result, VerifyError};
use crate::metrics;
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ETAG, LAST_MODIFIED};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

/// HTTP method used by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeMethod {
    Head,
    Get,
}

impl ProbeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMethod::Head => "HEAD",
            ProbeMethod::Get => "GET",
        }
    }
}

impl std::fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful (2xx) probe response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    /// Raw `ETag` header value, if present.
    pub etag: Option<String>,
    /// Raw `Last-Modified` header value, if present.
    pub last_modified: Option<String>,
    /// Response body; only populated for GET.
    pub body: Option<Vec<u8>>,
}

impl ProbeResponse {
    /// Bare response with a status and no headers.
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

/// Issues HEAD/GET requests for the checker.
pub trait HttpProbe: Send + Sync + 'static {
    /// Probe `uri` with `method`, failing after `timeout`.
    fn probe<'a>(
        &'a self,
        uri: &'a str,
        method: ProbeMethod,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<ProbeResponse>>;
}

/// Production probe backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: Client,
}

impl ReqwestProbe {
    /// Build a probe from configuration.
    ///
    /// Certificate validation is only relaxed when
    /// `accept_invalid_certs` is explicitly set.
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| VerifyError::Config(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| VerifyError::Config(format!("invalid value for header '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .connect_timeout(config.timeout_duration())
            .build()
            .map_err(|e| VerifyError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wrap an existing client (shares its connection pool).
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, uri: &str, method: ProbeMethod, timeout: Duration) -> Result<ProbeResponse> {
        let request = match method {
            ProbeMethod::Head => self.client.head(uri),
            ProbeMethod::Get => self.client.get(uri),
        };

        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_transport_error(uri, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError::http(uri, status.as_u16()));
        }

        let etag = header_string(response.headers(), &ETAG);
        let last_modified = header_string(response.headers(), &LAST_MODIFIED);

        let body = match method {
            ProbeMethod::Head => None,
            ProbeMethod::Get => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| classify_transport_error(uri, &e))?;
                Some(bytes.to_vec())
            }
        };

        Ok(ProbeResponse {
            status: status.as_u16(),
            etag,
            last_modified,
            body,
        })
    }
}

impl HttpProbe for ReqwestProbe {
    fn probe<'a>(
        &'a self,
        uri: &'a str,
        method: ProbeMethod,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<ProbeResponse>> {
        Box::pin(async move {
            let start = Instant::now();
            let result = self.send(uri, method, timeout).await;
            let elapsed = start.elapsed();

            let label = match &result {
                Ok(response) => status_class(response.status),
                Err(VerifyError::Http { status, .. }) => status_class(*status),
                Err(_) => "network_error",
            };
            metrics::record_probe(method.as_str(), label, elapsed);
            debug!(
                uri = %uri,
                method = %method,
                result = label,
                latency_ms = elapsed.as_millis() as u64,
                "Probe finished"
            );

            result
        })
    }
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn status_class(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        404 => "404",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Map a reqwest transport error onto the network error taxonomy.
fn classify_transport_error(uri: &str, err: &reqwest::Error) -> VerifyError {
    let message = error_chain(err);
    let kind = if err.is_timeout() {
        NetworkErrorKind::Timeout
    } else if looks_like_tls(&message) {
        NetworkErrorKind::Tls
    } else if err.is_connect() {
        NetworkErrorKind::Connect
    } else {
        NetworkErrorKind::Other
    };
    VerifyError::network(uri, kind, message)
}

/// Flatten an error and its sources into one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

fn looks_like_tls(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("certificate") || lower.contains("tls") || lower.contains("handshake")
}
