// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Verdicts and reports.
//!
//! A [`CheckVerdict`] is the outcome of one (event, server) check. A
//! [`VerificationReport`] aggregates one event with exactly one verdict
//! per server that was targeted when the batch was launched. Reports are
//! built by the scheduler and are immutable once sealed.
//!
//! # Outcomes
//!
//! | Outcome | Meaning |
//! |---------|---------|
//! | `Confirmed` | Server state matches the source (present and current, or absent after delete) |
//! | `NotReplicated` | Change has not reached the server yet |
//! | `Stale` | Server has the file but with diverging content or an old timestamp |
//! | `Error(kind)` | The check could not reach a verdict |

use crate::event::ChangeEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a check ended in an `Error` verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Per-probe timeout elapsed.
    Timeout,
    /// Connect/DNS/transport failure.
    Network,
    /// TLS handshake or certificate failure.
    Tls,
    /// Unexpected HTTP status.
    Http,
    /// Source file unreadable.
    LocalIo,
    /// Still outstanding when the batch timeout elapsed.
    BatchTimedOut,
    /// Abandoned because the engine was cancelled.
    Cancelled,
    /// The check task panicked.
    Panicked,
    /// Anything else.
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "Timeout"),
            Self::Network => write!(f, "Network"),
            Self::Tls => write!(f, "Tls"),
            Self::Http => write!(f, "Http"),
            Self::LocalIo => write!(f, "LocalIo"),
            Self::BatchTimedOut => write!(f, "TimedOut"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Panicked => write!(f, "Panicked"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

/// Outcome of one (event, server) check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckOutcome {
    Confirmed,
    NotReplicated,
    Stale,
    Error(FailureKind),
}

impl CheckOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, CheckOutcome::Confirmed)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CheckOutcome::Error(_))
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CheckOutcome::Confirmed => "confirmed",
            CheckOutcome::NotReplicated => "not_replicated",
            CheckOutcome::Stale => "stale",
            CheckOutcome::Error(_) => "error",
        }
    }
}

impl std::fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckOutcome::Confirmed => write!(f, "Confirmed"),
            CheckOutcome::NotReplicated => write!(f, "NotReplicated"),
            CheckOutcome::Stale => write!(f, "Stale"),
            CheckOutcome::Error(kind) => write!(f, "Error({})", kind),
        }
    }
}

/// Verification strategy, in escalating cost order.
///
/// `Existence` is the HEAD status check every protocol starts with; the
/// other three are the content tiers a [`crate::checker::ReplicationChecker`]
/// escalates through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationTier {
    Existence,
    #[serde(rename = "etag")]
    ETag,
    ContentHash,
    Timestamp,
}

impl std::fmt::Display for VerificationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Existence => write!(f, "existence"),
            Self::ETag => write!(f, "etag"),
            Self::ContentHash => write!(f, "content_hash"),
            Self::Timestamp => write!(f, "timestamp"),
        }
    }
}

/// Result of one (event, server) check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckVerdict {
    /// Server base URL.
    pub server: String,
    /// Full URI that was probed.
    pub target_uri: String,
    pub outcome: CheckOutcome,
    /// Status of the last HTTP response that informed the verdict.
    pub http_status: Option<u16>,
    /// Human-readable explanation.
    pub detail: String,
    /// Tier that decided the verdict; `None` when sealed without a check result.
    pub tier: Option<VerificationTier>,
    pub checked_at: DateTime<Utc>,
}

impl CheckVerdict {
    pub fn new(
        server: impl Into<String>,
        target_uri: impl Into<String>,
        outcome: CheckOutcome,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            target_uri: target_uri.into(),
            outcome,
            http_status: None,
            detail: detail.into(),
            tier: None,
            checked_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.http_status = status;
        self
    }

    #[must_use]
    pub fn with_tier(mut self, tier: VerificationTier) -> Self {
        self.tier = Some(tier);
        self
    }
}

/// How a batch came to be sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchCompletion {
    /// Every checker produced a verdict.
    Complete,
    /// The batch timeout elapsed with checkers outstanding.
    TimedOut,
    /// The engine was cancelled with checkers outstanding.
    Cancelled,
}

impl std::fmt::Display for BatchCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Count of verdicts per outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub confirmed: usize,
    pub not_replicated: usize,
    pub stale: usize,
    pub errors: usize,
}

impl ReportSummary {
    pub fn total(&self) -> usize {
        self.confirmed + self.not_replicated + self.stale + self.errors
    }
}

/// One change event together with the verdicts of every targeted server.
///
/// Verdicts are ordered like the server list the batch was launched with.
/// Reports of different batches may be sealed in any order, including two
/// batches for the same file; use [`batch_id()`](Self::batch_id) or
/// [`started_at()`](Self::started_at) to order them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    batch_id: u64,
    event: ChangeEvent,
    verdicts: Vec<CheckVerdict>,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    completion: BatchCompletion,
}

impl VerificationReport {
    /// Seal a report. Only the scheduler builds reports.
    pub(crate) fn seal(
        batch_id: u64,
        event: ChangeEvent,
        verdicts: Vec<CheckVerdict>,
        started_at: DateTime<Utc>,
        completion: BatchCompletion,
    ) -> Self {
        Self {
            batch_id,
            event,
            verdicts,
            started_at,
            completed_at: Utc::now(),
            completion,
        }
    }

    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    pub fn event(&self) -> &ChangeEvent {
        &self.event
    }

    pub fn verdicts(&self) -> &[CheckVerdict] {
        &self.verdicts
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    pub fn completion(&self) -> BatchCompletion {
        self.completion
    }

    /// Verdict for a server base URL.
    pub fn verdict_for(&self, server: &str) -> Option<&CheckVerdict> {
        let server = server.trim_end_matches('/');
        self.verdicts.iter().find(|v| v.server == server)
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for verdict in &self.verdicts {
            match verdict.outcome {
                CheckOutcome::Confirmed => summary.confirmed += 1,
                CheckOutcome::NotReplicated => summary.not_replicated += 1,
                CheckOutcome::Stale => summary.stale += 1,
                CheckOutcome::Error(_) => summary.errors += 1,
            }
        }
        summary
    }

    /// True when every server confirmed the change.
    pub fn is_fully_replicated(&self) -> bool {
        !self.verdicts.is_empty() && self.verdicts.iter().all(|v| v.outcome.is_confirmed())
    }

    /// Wall-clock duration of the batch.
    pub fn duration(&self) -> std::time::Duration {
        (self.completed_at - self.started_at).to_std().unwrap_or_default()
    }
}
