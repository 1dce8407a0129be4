// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication checker: the tiered verification protocol for one
//! (event, server) pair.
//!
//! # Protocol
//!
//! ```text
//! Deleted:   HEAD ──► 404 ─────────────────────────► Confirmed
//!                 ├─► 2xx ─────────────────────────► NotReplicated
//!                 └─► other / network ─────────────► Error
//!
//! Created/   HEAD ──► 404 ─────────────────────────► NotReplicated
//! Changed/        ├─► other / network ─────────────► Error
//! Renamed         └─► 2xx ─► tiers, in configured order:
//!                             ETag         match ──► Confirmed
//!                             ContentHash  match ──► Confirmed, differ ──► Stale
//!                             Timestamp    current ► Confirmed, behind ──► Stale
//!                           all inconclusive ──────► Confirmed (caveat)
//!                           last tier failed ──────► Error
//! ```
//!
//! A tier whose inputs are missing (no header, unreadable source, failed
//! GET) is skipped in favour of the next one. Every path yields exactly
//! one verdict, and nothing escapes [`ReplicationChecker::check()`]:
//! errors and panics alike become `Error` verdicts.

use crate::config::CheckerConfig;
use crate::digest::{etag_matches, DigestAlgorithm};
use crate::error::VerifyError;
use crate::event::{ChangeEvent, ChangeKind};
use crate::probe::{HttpProbe, ProbeMethod, ProbeResponse};
use crate::target::ServerTarget;
use crate::verdict::{CheckOutcome, CheckVerdict, FailureKind, VerificationTier};
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a single content tier.
#[derive(Debug)]
enum TierResult {
    /// Definitive verdict.
    Decided {
        outcome: CheckOutcome,
        detail: String,
        status: Option<u16>,
    },
    /// Inputs missing; try the next tier.
    Inconclusive(String),
    /// The tier itself failed; try the next tier, but report this if it was the last.
    Failed(VerifyError),
}

/// Runs the verification protocol against one server.
///
/// Cheap to share: the scheduler holds one checker behind an `Arc` and
/// invokes it from every per-server task.
pub struct ReplicationChecker<P: HttpProbe> {
    probe: Arc<P>,
    source_root: Option<PathBuf>,
    probe_timeout: Duration,
    digest: DigestAlgorithm,
    tiers: Vec<VerificationTier>,
    grace: Duration,
    confirm_rename_source_removed: bool,
}

impl<P: HttpProbe> ReplicationChecker<P> {
    pub fn new(probe: Arc<P>, config: &CheckerConfig, probe_timeout: Duration) -> Self {
        Self {
            probe,
            source_root: None,
            probe_timeout,
            digest: config.digest,
            tiers: config.tier_plan(),
            grace: config.grace_duration(),
            confirm_rename_source_removed: config.confirm_rename_source_removed,
        }
    }

    /// Strip `root` from source paths when building remote paths.
    #[must_use]
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = Some(root.into());
        self
    }

    pub fn probe(&self) -> &Arc<P> {
        &self.probe
    }

    pub fn tiers(&self) -> &[VerificationTier] {
        &self.tiers
    }

    /// Full URI of the event's file on `server`.
    pub fn target_uri(&self, event: &ChangeEvent, server: &ServerTarget) -> String {
        server.uri_for(&event.relative_path(self.source_root.as_deref()))
    }

    /// Check one server. Always returns a verdict.
    pub async fn check(&self, event: &ChangeEvent, server: &ServerTarget) -> CheckVerdict {
        let uri = self.target_uri(event, server);

        let verdict = match AssertUnwindSafe(self.run_protocol(event, server, &uri))
            .catch_unwind()
            .await
        {
            Ok(verdict) => verdict,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(server = %server, uri = %uri, panic = %message, "Check panicked");
                CheckVerdict::new(
                    server.base_url(),
                    &uri,
                    CheckOutcome::Error(FailureKind::Panicked),
                    format!("check panicked: {}", message),
                )
            }
        };

        debug!(
            server = %server,
            uri = %uri,
            kind = %event.kind(),
            outcome = %verdict.outcome,
            status = ?verdict.http_status,
            tier = ?verdict.tier,
            "Check complete"
        );
        verdict
    }

    async fn run_protocol(&self, event: &ChangeEvent, server: &ServerTarget, uri: &str) -> CheckVerdict {
        match event.kind() {
            ChangeKind::Deleted => self.check_absent(server, uri).await,
            ChangeKind::Created | ChangeKind::Changed | ChangeKind::Renamed => {
                let verdict = self.check_present(event, server, uri).await;
                if event.kind() == ChangeKind::Renamed
                    && self.confirm_rename_source_removed
                    && verdict.outcome.is_confirmed()
                {
                    self.check_rename_source(event, server, verdict).await
                } else {
                    verdict
                }
            }
        }
    }

    /// Deletion protocol: the terminal state is absence.
    async fn check_absent(&self, server: &ServerTarget, uri: &str) -> CheckVerdict {
        match self.probe.probe(uri, ProbeMethod::Head, self.probe_timeout).await {
            Ok(response) => CheckVerdict::new(
                server.base_url(),
                uri,
                CheckOutcome::NotReplicated,
                "file still present",
            )
            .with_status(Some(response.status))
            .with_tier(VerificationTier::Existence),
            Err(e) if e.is_not_found() => CheckVerdict::new(
                server.base_url(),
                uri,
                CheckOutcome::Confirmed,
                "deletion propagated",
            )
            .with_status(Some(404))
            .with_tier(VerificationTier::Existence),
            Err(e) => error_verdict(server, uri, &e, VerificationTier::Existence),
        }
    }

    /// Create/change/rename protocol: the terminal state is presence with current content.
    async fn check_present(&self, event: &ChangeEvent, server: &ServerTarget, uri: &str) -> CheckVerdict {
        let head = match self.probe.probe(uri, ProbeMethod::Head, self.probe_timeout).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                return CheckVerdict::new(
                    server.base_url(),
                    uri,
                    CheckOutcome::NotReplicated,
                    "not yet propagated",
                )
                .with_status(Some(404))
                .with_tier(VerificationTier::Existence);
            }
            Err(e) => return error_verdict(server, uri, &e, VerificationTier::Existence),
        };

        let mut source = SourceFile::new(event.source_path(), self.digest);
        let mut skipped: Vec<String> = Vec::new();
        let mut last_failure: Option<(VerificationTier, VerifyError)> = None;

        for tier in &self.tiers {
            let result = match tier {
                VerificationTier::ETag => self.etag_tier(&head, &mut source).await,
                VerificationTier::ContentHash => self.content_hash_tier(uri, &mut source).await,
                VerificationTier::Timestamp => self.timestamp_tier(&head, &mut source).await,
                VerificationTier::Existence => continue,
            };

            match result {
                TierResult::Decided { outcome, detail, status } => {
                    return CheckVerdict::new(server.base_url(), uri, outcome, detail)
                        .with_status(status.or(Some(head.status)))
                        .with_tier(*tier);
                }
                TierResult::Inconclusive(reason) => {
                    debug!(uri = %uri, tier = %tier, reason = %reason, "Tier inconclusive");
                    skipped.push(format!("{}: {}", tier, reason));
                    last_failure = None;
                }
                TierResult::Failed(e) => {
                    debug!(uri = %uri, tier = %tier, error = %e, "Tier failed");
                    skipped.push(format!("{}: {}", tier, e));
                    last_failure = Some((*tier, e));
                }
            }
        }

        match last_failure {
            Some((tier, e)) => {
                let mut verdict = error_verdict(server, uri, &e, tier);
                if verdict.http_status.is_none() {
                    verdict.http_status = Some(head.status);
                }
                verdict.detail = format!("no tier could verify content ({})", skipped.join("; "));
                verdict
            }
            None => CheckVerdict::new(
                server.base_url(),
                uri,
                CheckOutcome::Confirmed,
                format!("present, content not verified ({})", skipped.join("; ")),
            )
            .with_status(Some(head.status))
            .with_tier(VerificationTier::Existence),
        }
    }

    async fn etag_tier(&self, head: &ProbeResponse, source: &mut SourceFile<'_>) -> TierResult {
        let Some(etag) = head.etag.as_deref() else {
            return TierResult::Inconclusive("no ETag header".to_string());
        };
        let digest = match source.digest().await {
            Ok(digest) => digest,
            Err(e) => return TierResult::Failed(e),
        };
        if etag_matches(etag, &digest) {
            TierResult::Decided {
                outcome: CheckOutcome::Confirmed,
                detail: "ETag matches".to_string(),
                status: Some(head.status),
            }
        } else {
            TierResult::Inconclusive(format!("ETag {} differs from source {}", etag, self.digest))
        }
    }

    async fn content_hash_tier(&self, uri: &str, source: &mut SourceFile<'_>) -> TierResult {
        let local = match source.digest().await {
            Ok(digest) => digest,
            Err(e) => return TierResult::Failed(e),
        };
        let response = match self.probe.probe(uri, ProbeMethod::Get, self.probe_timeout).await {
            Ok(response) => response,
            Err(e) => return TierResult::Failed(e),
        };
        let Some(body) = response.body.as_deref() else {
            return TierResult::Inconclusive("GET returned no body".to_string());
        };

        let remote = self.digest.digest_bytes(body);
        if remote == local {
            TierResult::Decided {
                outcome: CheckOutcome::Confirmed,
                detail: "content hash matches".to_string(),
                status: Some(response.status),
            }
        } else {
            TierResult::Decided {
                outcome: CheckOutcome::Stale,
                detail: "content differs".to_string(),
                status: Some(response.status),
            }
        }
    }

    async fn timestamp_tier(&self, head: &ProbeResponse, source: &mut SourceFile<'_>) -> TierResult {
        let Some(raw) = head.last_modified.as_deref() else {
            return TierResult::Inconclusive("no Last-Modified header".to_string());
        };
        let Some(remote) = parse_http_date(raw) else {
            return TierResult::Inconclusive(format!("unparseable Last-Modified '{}'", raw));
        };
        let local = match source.modified().await {
            Ok(modified) => modified,
            Err(e) => return TierResult::Failed(e),
        };

        if timestamp_is_current(remote, local, self.grace) {
            TierResult::Decided {
                outcome: CheckOutcome::Confirmed,
                detail: "timestamp current".to_string(),
                status: Some(head.status),
            }
        } else {
            let behind = (local - remote).num_seconds();
            TierResult::Decided {
                outcome: CheckOutcome::Stale,
                detail: format!("timestamp behind source by {}s", behind),
                status: Some(head.status),
            }
        }
    }

    /// After a confirmed rename, require the previous name to be gone.
    async fn check_rename_source(
        &self,
        event: &ChangeEvent,
        server: &ServerTarget,
        mut confirmed: CheckVerdict,
    ) -> CheckVerdict {
        let Some(previous) = event.previous_relative_path(self.source_root.as_deref()) else {
            return confirmed;
        };
        let previous_uri = server.uri_for(&previous);

        match self
            .probe
            .probe(&previous_uri, ProbeMethod::Head, self.probe_timeout)
            .await
        {
            Ok(response) => CheckVerdict::new(
                server.base_url(),
                confirmed.target_uri,
                CheckOutcome::NotReplicated,
                format!("previous name still present at {}", previous_uri),
            )
            .with_status(Some(response.status))
            .with_tier(VerificationTier::Existence),
            Err(e) if e.is_not_found() => {
                confirmed.detail.push_str("; previous name removed");
                confirmed
            }
            Err(e) => {
                let mut verdict = error_verdict(server, &confirmed.target_uri, &e, VerificationTier::Existence);
                verdict.detail = format!("checking previous name: {}", e);
                verdict
            }
        }
    }
}

fn error_verdict(server: &ServerTarget, uri: &str, err: &VerifyError, tier: VerificationTier) -> CheckVerdict {
    CheckVerdict::new(
        server.base_url(),
        uri,
        CheckOutcome::Error(err.failure_kind()),
        err.to_string(),
    )
    .with_status(err.http_status())
    .with_tier(tier)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Local source file facts, read lazily and at most once per check.
struct SourceFile<'a> {
    path: &'a Path,
    algorithm: DigestAlgorithm,
    digest: Option<Result<String, (std::io::ErrorKind, String)>>,
}

impl<'a> SourceFile<'a> {
    fn new(path: &'a Path, algorithm: DigestAlgorithm) -> Self {
        Self {
            path,
            algorithm,
            digest: None,
        }
    }

    async fn digest(&mut self) -> Result<String, VerifyError> {
        if self.digest.is_none() {
            let computed = self
                .algorithm
                .digest_file(self.path)
                .await
                .map_err(|e| (e.kind(), e.to_string()));
            self.digest = Some(computed);
        }
        match &self.digest {
            Some(Ok(digest)) => Ok(digest.clone()),
            Some(Err((kind, message))) => Err(VerifyError::local_io(
                self.path,
                std::io::Error::new(*kind, message.clone()),
            )),
            None => Err(VerifyError::Internal("source digest not computed".to_string())),
        }
    }

    async fn modified(&self) -> Result<DateTime<Utc>, VerifyError> {
        let metadata = tokio::fs::metadata(self.path)
            .await
            .map_err(|e| VerifyError::local_io(self.path, e))?;
        let modified = metadata
            .modified()
            .map_err(|e| VerifyError::local_io(self.path, e))?;
        Ok(DateTime::<Utc>::from(modified))
    }
}

/// Parse an HTTP date (IMF-fixdate, RFC 850 or asctime), plus RFC 3339 for
/// servers that ignore the standard.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    // RFC 850: "Sunday, 06-Nov-94 08:49:37 GMT"
    if let Some(stripped) = value.strip_suffix(" GMT") {
        if let Ok(naive) = NaiveDateTime::parse_from_str(stripped, "%A, %d-%b-%y %H:%M:%S") {
            return Some(naive.and_utc());
        }
    }
    // asctime: "Sun Nov  6 08:49:37 1994"
    NaiveDateTime::parse_from_str(value, "%a %b %e %H:%M:%S %Y")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Whether a remote timestamp is recent enough, allowing `grace` of lag.
///
/// Both sides are compared at whole seconds, the resolution of
/// `Last-Modified`.
pub fn timestamp_is_current(remote: DateTime<Utc>, source: DateTime<Utc>, grace: Duration) -> bool {
    let grace = chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::zero());
    let remote = remote.trunc_subsecs(0);
    source
        .trunc_subsecs(0)
        .checked_sub_signed(grace)
        .map_or(true, |floor| remote >= floor)
}
