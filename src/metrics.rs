// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Probe latency and status classes
//! - Verdicts per server and outcome
//! - Batch duration and completion kind
//! - Dispatcher throughput and engine state
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `replication_verify_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration, size)
//!
//! No recorder is installed by this crate; without one every call is a no-op.

use crate::coordinator::EngineState;
use crate::verdict::{BatchCompletion, CheckOutcome};
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record one HTTP probe.
pub fn record_probe(method: &str, result: &str, latency: Duration) {
    counter!(
        "replication_verify_probes_total",
        "method" => method.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
    histogram!("replication_verify_probe_duration_seconds", "method" => method.to_string())
        .record(latency.as_secs_f64());
}

/// Record a verdict for one server.
pub fn record_verdict(server: &str, outcome: &CheckOutcome) {
    counter!(
        "replication_verify_verdicts_total",
        "server" => server.to_string(),
        "outcome" => outcome.label()
    )
    .increment(1);
    if let CheckOutcome::Error(kind) = outcome {
        counter!(
            "replication_verify_check_errors_total",
            "server" => server.to_string(),
            "kind" => kind.to_string()
        )
        .increment(1);
    }
}

/// Record how long a single check took.
pub fn record_check_latency(server: &str, duration: Duration) {
    histogram!("replication_verify_check_duration_seconds", "server" => server.to_string())
        .record(duration.as_secs_f64());
}

/// Record a sealed batch.
pub fn record_batch(completion: BatchCompletion, servers: usize, duration: Duration) {
    counter!("replication_verify_batches_total", "completion" => completion.to_string()).increment(1);
    histogram!("replication_verify_batch_duration_seconds").record(duration.as_secs_f64());
    histogram!("replication_verify_batch_servers").record(servers as f64);
}

/// Gauge for batches currently in flight.
pub fn set_in_flight_batches(count: usize) {
    gauge!("replication_verify_in_flight_batches").set(count as f64);
}

/// Gauge for checks queued behind the concurrency cap.
pub fn set_checks_waiting(count: usize) {
    gauge!("replication_verify_checks_waiting").set(count as f64);
}

/// Record an event handed to the scheduler.
pub fn record_event_dispatched(kind: &str) {
    counter!("replication_verify_events_dispatched_total", "kind" => kind.to_string()).increment(1);
}

/// Record an event dropped by the file-name filter.
pub fn record_event_filtered() {
    counter!("replication_verify_events_filtered_total").increment(1);
}

/// Gauge for engine state (0=idle, 1=watching, 2=shutting down).
pub fn set_engine_state(state: EngineState) {
    let value = match state {
        EngineState::Idle => 0.0,
        EngineState::Watching => 1.0,
        EngineState::ShuttingDown => 2.0,
    };
    gauge!("replication_verify_engine_state").set(value);
}
