// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the replication verifier.
//!
//! Errors are categorized by their source (network, HTTP status, local
//! filesystem, configuration) and carry enough context to build a
//! human-readable verdict row.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Network` | Yes | Connect failure, timeout, TLS handshake failure |
//! | `Http` | 5xx/408/429 only | Non-2xx response whose status is informative |
//! | `LocalIo` | No | Source file unreadable when a verdict needs it |
//! | `Config` | No | Configuration invalid |
//! | `EmptyServerList` | No | A batch was requested with no targets |
//! | `InvalidState` | No | Engine state machine violation |
//! | `Shutdown` | No | Engine is shutting down |
//! | `Watcher` | No | Filesystem notification source failed |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Verdict Mapping
//!
//! None of these errors cross the checker boundary. The checker converts
//! them into `CheckOutcome::Error(FailureKind)` verdict rows using
//! [`VerifyError::failure_kind()`]. A content hash mismatch is not an
//! error at all: it is the `Stale` outcome.

use crate::verdict::FailureKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for verifier operations.
pub type Result<T> = std::result::Result<T, VerifyError>;

/// Classification of transport-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// The per-probe timeout elapsed.
    Timeout,
    /// TCP connect or DNS resolution failed.
    Connect,
    /// TLS handshake or certificate validation failed.
    Tls,
    /// Anything else the transport reported (body read, protocol error).
    Other,
}

impl std::fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connect => write!(f, "connect"),
            Self::Tls => write!(f, "tls"),
            Self::Other => write!(f, "transport"),
        }
    }
}

/// Errors that can occur while verifying replication.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Transport failure talking to a server.
    #[error("Network error ({kind}) for {uri}: {message}")]
    Network {
        uri: String,
        kind: NetworkErrorKind,
        message: String,
    },

    /// Server answered with a non-2xx status.
    ///
    /// Kept as a value rather than swallowed so 404 can drive verdicts.
    #[error("HTTP {status} from {uri}")]
    Http { uri: String, status: u16 },

    /// The local source file could not be read or stat'ed.
    #[error("Local I/O error on {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A batch was requested with no server targets.
    #[error("Cannot verify against an empty server list")]
    EmptyServerList,

    /// Engine state machine violation.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Shutdown in progress.
    #[error("Shutdown in progress")]
    Shutdown,

    /// Filesystem notification source failure.
    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VerifyError {
    /// Create a network error.
    pub fn network(uri: impl Into<String>, kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self::Network {
            uri: uri.into(),
            kind,
            message: message.into(),
        }
    }

    /// Create an HTTP status error.
    pub fn http(uri: impl Into<String>, status: u16) -> Self {
        Self::Http {
            uri: uri.into(),
            status,
        }
    }

    /// Create a local I/O error for `path`.
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this is a 404 Not Found.
    pub fn is_not_found(&self) -> bool {
        self.http_status() == Some(404)
    }

    /// Check if this error is transient.
    ///
    /// The engine never retries on its own; callers that schedule
    /// re-checks can use this to decide whether a re-check is worthwhile.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::LocalIo { .. } => false,
            Self::Config(_) => false,
            Self::EmptyServerList => false,
            Self::InvalidState { .. } => false,
            Self::Shutdown => false,
            Self::Watcher(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Map this error onto the failure kind recorded in an `Error` verdict.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Network { kind: NetworkErrorKind::Timeout, .. } => FailureKind::Timeout,
            Self::Network { kind: NetworkErrorKind::Tls, .. } => FailureKind::Tls,
            Self::Network { .. } => FailureKind::Network,
            Self::Http { .. } => FailureKind::Http,
            Self::LocalIo { .. } => FailureKind::LocalIo,
            Self::Shutdown => FailureKind::Cancelled,
            Self::Config(_)
            | Self::EmptyServerList
            | Self::InvalidState { .. }
            | Self::Watcher(_)
            | Self::Internal(_) => FailureKind::Internal,
        }
    }
}
