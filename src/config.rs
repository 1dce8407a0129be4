// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the replication verifier.
//!
//! Configuration is passed to [`VerificationEngine::new()`](crate::VerificationEngine::new)
//! and can be constructed programmatically or deserialized from JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use replication_verifier::config::VerifierConfig;
//!
//! let config = VerifierConfig {
//!     source_root: "/srv/site".into(),
//!     servers: vec![
//!         "https://web1.example.com".into(),
//!         "https://web2.example.com".into(),
//!     ],
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! VerifierConfig
//! ├── source_root: PathBuf          # Watched directory
//! ├── file_filter: String           # Glob on the file name ("*")
//! ├── servers: Vec<String>          # Base URLs
//! └── settings: VerifierSettings
//!     ├── probe: ProbeConfig        # Per-request timeout, TLS, headers
//!     ├── checker: CheckerConfig    # Digest, tier order, grace window
//!     └── batch: BatchConfig        # Batch timeout, concurrency cap, drain
//! ```
//!
//! # JSON Example
//!
//! ```json
//! {
//!   "source_root": "D:\\inetpub\\site",
//!   "file_filter": "*.xml",
//!   "servers": ["https://web1", "https://web2"],
//!   "settings": {
//!     "probe": { "timeout": "10s" },
//!     "checker": { "digest": "sha256", "tiers": ["etag", "timestamp"], "grace": "5s" },
//!     "batch": { "timeout": "30s" }
//!   }
//! }
//! ```

use crate::digest::DigestAlgorithm;
use crate::error::{Result, VerifyError};
use crate::target::ServerTarget;
use crate::verdict::VerificationTier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level config object passed to `VerificationEngine::new()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Directory whose changes are verified. Stripped from source paths to
    /// build the remote relative path.
    pub source_root: PathBuf,

    /// Glob matched against the file name of each change event.
    #[serde(default = "default_file_filter")]
    pub file_filter: String,

    /// Base URLs of the web servers that should receive the changes.
    #[serde(default)]
    pub servers: Vec<String>,

    /// Tunable parameters.
    #[serde(default)]
    pub settings: VerifierSettings,
}

fn default_file_filter() -> String {
    "*".to_string()
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("."),
            file_filter: default_file_filter(),
            servers: Vec::new(),
            settings: VerifierSettings::default(),
        }
    }
}

impl VerifierConfig {
    /// Create a minimal config for testing.
    pub fn for_testing(source_root: impl Into<PathBuf>, servers: &[&str]) -> Self {
        Self {
            source_root: source_root.into(),
            file_filter: default_file_filter(),
            servers: servers.iter().map(|s| s.to_string()).collect(),
            settings: VerifierSettings {
                probe: ProbeConfig::testing(),
                ..Default::default()
            },
        }
    }

    /// Load a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| VerifyError::local_io(path, e))?;
        serde_json::from_str(&raw)
            .map_err(|e| VerifyError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Normalized server targets, in configuration order.
    pub fn server_targets(&self) -> Result<Vec<ServerTarget>> {
        self.servers.iter().map(ServerTarget::parse).collect()
    }

    /// Compiled file-name filter.
    pub fn file_pattern(&self) -> Result<glob::Pattern> {
        glob::Pattern::new(&self.file_filter)
            .map_err(|e| VerifyError::Config(format!("invalid file filter '{}': {}", self.file_filter, e)))
    }

    /// Check the whole configuration, reporting the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(VerifyError::Config("at least one server is required".to_string()));
        }
        self.server_targets()?;
        self.file_pattern()?;
        self.settings.probe.validate()?;
        self.settings.checker.validate()?;
        self.settings.batch.validate()?;
        Ok(())
    }
}

/// Tunable parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifierSettings {
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub checker: CheckerConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

fn parse_duration_field(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| VerifyError::Config(format!("invalid duration for {} ('{}'): {}", field, value, e)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ProbeConfig: per-request HTTP settings
// ═══════════════════════════════════════════════════════════════════════════════

/// HTTP probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Per-request timeout as a duration string (e.g., "10s").
    #[serde(default = "default_probe_timeout")]
    pub timeout: String,

    /// Skip TLS certificate validation. Off unless explicitly enabled.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Extra headers sent with every probe (e.g., an Authorization header).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Idle pooled connections kept per server.
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
}

fn default_probe_timeout() -> String {
    "10s".to_string()
}

fn default_user_agent() -> String {
    concat!("replication-verifier/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_pool_max_idle_per_host() -> usize {
    8
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: default_probe_timeout(),
            accept_invalid_certs: false,
            user_agent: default_user_agent(),
            headers: BTreeMap::new(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
        }
    }
}

impl ProbeConfig {
    /// Short timeout for tests.
    pub fn testing() -> Self {
        Self {
            timeout: "2s".to_string(),
            ..Default::default()
        }
    }

    /// Parse the timeout string, falling back to 10 seconds.
    pub fn timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.timeout).unwrap_or(Duration::from_secs(10))
    }

    fn validate(&self) -> Result<()> {
        let timeout = parse_duration_field("probe.timeout", &self.timeout)?;
        if timeout.is_zero() {
            return Err(VerifyError::Config("probe.timeout must be greater than zero".to_string()));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CheckerConfig: verification protocol settings
// ═══════════════════════════════════════════════════════════════════════════════

/// Replication checker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Digest used for the ETag and content-hash tiers.
    #[serde(default)]
    pub digest: DigestAlgorithm,

    /// Content tiers in the order they are tried after a 2xx HEAD.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<VerificationTier>,

    /// Tolerated replication lag for the timestamp tier (e.g., "5s").
    #[serde(default = "default_grace")]
    pub grace: String,

    /// For renames, also require the previous name to be gone.
    #[serde(default)]
    pub confirm_rename_source_removed: bool,
}

fn default_tiers() -> Vec<VerificationTier> {
    vec![
        VerificationTier::ETag,
        VerificationTier::ContentHash,
        VerificationTier::Timestamp,
    ]
}

fn default_grace() -> String {
    "5s".to_string()
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            digest: DigestAlgorithm::default(),
            tiers: default_tiers(),
            grace: default_grace(),
            confirm_rename_source_removed: false,
        }
    }
}

impl CheckerConfig {
    /// Parse the grace window, falling back to 5 seconds.
    pub fn grace_duration(&self) -> Duration {
        humantime::parse_duration(&self.grace).unwrap_or(Duration::from_secs(5))
    }

    /// Tier plan without duplicates and without `Existence`, which always runs first.
    pub fn tier_plan(&self) -> Vec<VerificationTier> {
        let mut plan = Vec::with_capacity(self.tiers.len());
        for tier in &self.tiers {
            if *tier != VerificationTier::Existence && !plan.contains(tier) {
                plan.push(*tier);
            }
        }
        plan
    }

    fn validate(&self) -> Result<()> {
        parse_duration_field("checker.grace", &self.grace)?;
        if self.tier_plan().is_empty() {
            return Err(VerifyError::Config(
                "checker.tiers must name at least one of etag, content_hash, timestamp".to_string(),
            ));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BatchConfig: scheduler settings
// ═══════════════════════════════════════════════════════════════════════════════

/// Verification scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Overall batch timeout (e.g., "30s"). `None` waits for every checker.
    #[serde(default)]
    pub timeout: Option<String>,

    /// Cap on concurrent checks across all batches. `None` means one
    /// concurrent check per server per event.
    #[serde(default)]
    pub max_concurrent_checks: Option<usize>,

    /// How long shutdown waits for in-flight batches to seal.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: String,
}

fn default_drain_timeout() -> String {
    "10s".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            max_concurrent_checks: None,
            drain_timeout: default_drain_timeout(),
        }
    }
}

impl BatchConfig {
    /// Parsed batch timeout. An unparseable value disables the timeout.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
            .as_deref()
            .and_then(|t| humantime::parse_duration(t).ok())
    }

    /// Parse the drain timeout, falling back to 10 seconds.
    pub fn drain_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.drain_timeout).unwrap_or(Duration::from_secs(10))
    }

    fn validate(&self) -> Result<()> {
        if let Some(timeout) = &self.timeout {
            parse_duration_field("batch.timeout", timeout)?;
        }
        parse_duration_field("batch.drain_timeout", &self.drain_timeout)?;
        if self.max_concurrent_checks == Some(0) {
            return Err(VerifyError::Config(
                "batch.max_concurrent_checks must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
