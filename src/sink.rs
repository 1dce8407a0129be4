// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Report sinks: where sealed [`VerificationReport`]s go.
//!
//! The scheduler hands every sealed report to exactly one sink, once.
//! Reports from different batches arrive in seal order, which is not
//! dispatch order: two quick changes to one file may deliver the second
//! report first. Sinks that care order by [`VerificationReport::batch_id()`].
//!
//! Any `Fn(VerificationReport) + Send + Sync + 'static` closure is a sink.

use crate::verdict::{CheckOutcome, VerificationReport};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Receives sealed reports.
///
/// Called from the batch task that sealed the report, so implementations
/// must not block for long.
pub trait ReportSink: Send + Sync + 'static {
    fn deliver(&self, report: VerificationReport);
}

impl<F> ReportSink for F
where
    F: Fn(VerificationReport) + Send + Sync + 'static,
{
    fn deliver(&self, report: VerificationReport) {
        self(report)
    }
}

/// Default sink: one log line per report, one per verdict row.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn deliver(&self, report: VerificationReport) {
        let summary = report.summary();
        let event = report.event();
        info!(
            batch_id = report.batch_id(),
            path = %event.source_path().display(),
            kind = %event.kind(),
            completion = %report.completion(),
            confirmed = summary.confirmed,
            not_replicated = summary.not_replicated,
            stale = summary.stale,
            errors = summary.errors,
            duration_ms = report.duration().as_millis() as u64,
            "Verification report"
        );

        for verdict in report.verdicts() {
            match verdict.outcome {
                CheckOutcome::Confirmed => info!(
                    batch_id = report.batch_id(),
                    server = %verdict.server,
                    uri = %verdict.target_uri,
                    outcome = %verdict.outcome,
                    status = ?verdict.http_status,
                    detail = %verdict.detail,
                    "Verdict"
                ),
                _ => warn!(
                    batch_id = report.batch_id(),
                    server = %verdict.server,
                    uri = %verdict.target_uri,
                    outcome = %verdict.outcome,
                    status = ?verdict.http_status,
                    detail = %verdict.detail,
                    "Verdict"
                ),
            }
        }
    }
}

/// Forwards reports into an unbounded channel.
///
/// Delivery never blocks. Once the receiver is dropped, reports are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<VerificationReport>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<VerificationReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReportSink for ChannelSink {
    fn deliver(&self, report: VerificationReport) {
        if self.tx.send(report).is_err() {
            warn!("Report receiver dropped, discarding report");
        }
    }
}
