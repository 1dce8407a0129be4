// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Replication Verifier
//!
//! Confirms that file changes in a source directory have propagated to a
//! set of web servers.
//!
//! ## Architecture
//!
//! Each change event becomes one batch: one concurrent check per server,
//! sealed into a single report once every server has a verdict.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                          replication-verifier                             │
//! │                                                                           │
//! │  ┌─────────────┐    ┌────────────────────┐    ┌────────────────────────┐  │
//! │  │ Watcher /   │───►│ VerificationEngine │───►│ VerificationScheduler  │  │
//! │  │ mpsc source │    │ (filter, snapshot) │    │ (JoinSet per batch)    │  │
//! │  └─────────────┘    └────────────────────┘    └────────────────────────┘  │
//! │                                                  │            │           │
//! │                                                  ▼            ▼           │
//! │                                    ┌────────────────────┐ ┌───────────┐   │
//! │                                    │ ReplicationChecker │ │ ReportSink│   │
//! │                                    │ HEAD → ETag → GET  │ │ (reports) │   │
//! │                                    │ → Last-Modified    │ └───────────┘   │
//! │                                    └────────────────────┘                 │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Verdicts
//!
//! Every (event, server) pair ends in exactly one [`CheckOutcome`]:
//! `Confirmed`, `NotReplicated`, `Stale`, or `Error(kind)`. A misbehaving
//! server only degrades its own verdict; it never fails the batch.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use replication_verifier::{VerificationEngine, VerifierConfig};
//!
//! #[tokio::main]
//! async fn main() -> replication_verifier::Result<()> {
//!     let config = VerifierConfig::from_json_file("verifier.json")?;
//!
//!     let mut engine = VerificationEngine::new(config)?;
//!     engine.start()?;
//!     engine.watch_source_root()?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod checker;
pub mod config;
pub mod coordinator;
pub mod digest;
pub mod error;
pub mod event;
pub mod metrics;
pub mod probe;
pub mod resilience;
pub mod scheduler;
pub mod sink;
pub mod target;
pub mod verdict;
pub mod watcher;

// Re-exports for convenience
pub use checker::ReplicationChecker;
pub use config::{BatchConfig, CheckerConfig, ProbeConfig, VerifierConfig, VerifierSettings};
pub use coordinator::{EngineState, VerificationEngine};
pub use digest::DigestAlgorithm;
pub use error::{NetworkErrorKind, Result, VerifyError};
pub use event::{ChangeEvent, ChangeKind};
pub use probe::{HttpProbe, ProbeMethod, ProbeResponse, ReqwestProbe};
pub use scheduler::{BatchHandle, VerificationScheduler};
pub use sink::{ChannelSink, ReportSink, TracingSink};
pub use target::ServerTarget;
pub use verdict::{
    BatchCompletion, CheckOutcome, CheckVerdict, FailureKind, ReportSummary, VerificationReport,
    VerificationTier,
};
