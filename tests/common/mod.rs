//! Shared test utilities for integration, property and chaos tests.
//!
//! This module provides:
//! - Scripted `HttpProbe` mock that records every call
//! - Minimal HTTP/1.1 stub server for end-to-end `ReqwestProbe` tests
//! - Source file helpers
//! - Opt-in log output when `TEST_LOG` is set

#![allow(dead_code)]

pub mod http_stub;
pub mod mock_probe;

pub use http_stub::*;
pub use mock_probe::*;

use replication_verifier::DigestAlgorithm;
use std::path::PathBuf;
use std::time::SystemTime;

/// Install a fmt subscriber writing to the test harness when `TEST_LOG` is set.
pub fn init_tracing() {
    if std::env::var_os("TEST_LOG").is_some() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }
}

/// A source file on disk with its digest and write time.
pub struct SourceFile {
    pub dir: tempfile::TempDir,
    pub path: PathBuf,
    pub contents: Vec<u8>,
    pub sha256: String,
    pub modified: chrono::DateTime<chrono::Utc>,
}

impl SourceFile {
    /// Write `contents` to `<tempdir>/<relative>`.
    pub fn create(relative: &str, contents: &[u8]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        let modified: SystemTime = std::fs::metadata(&path).unwrap().modified().unwrap();
        Self {
            sha256: DigestAlgorithm::Sha256.digest_bytes(contents),
            contents: contents.to_vec(),
            modified: modified.into(),
            path,
            dir,
        }
    }

    pub fn root(&self) -> &std::path::Path {
        self.dir.path()
    }
}

/// Format a timestamp as an HTTP date (IMF-fixdate).
pub fn http_date(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
