// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Verification scheduler: one batch per change event.
//!
//! # Design
//!
//! ```text
//! ChangeEvent ──► snapshot servers ──► JoinSet: one check task per server
//!                                          │
//!                        ┌─────────────────┼──────────────────┐
//!                        ▼                 ▼                  ▼
//!                  all verdicts in    batch deadline     cancellation
//!                        │                 │                  │
//!                        │        outstanding = Error(TimedOut / Cancelled)
//!                        │                 │     tasks aborted
//!                        └────────► seal VerificationReport ◄─┘
//!                                          │
//!                                          ▼
//!                                     ReportSink
//! ```
//!
//! A report over K servers always carries exactly K verdicts, ordered like
//! the server snapshot. Batches share nothing but the checker (and its
//! pooled HTTP client), so overlapping batches for the same file run
//! independently and may seal in any order.

use crate::checker::ReplicationChecker;
use crate::config::BatchConfig;
use crate::error::{Result, VerifyError};
use crate::event::ChangeEvent;
use crate::metrics;
use crate::probe::HttpProbe;
use crate::resilience::Bulkhead;
use crate::sink::ReportSink;
use crate::target::ServerTarget;
use crate::verdict::{BatchCompletion, CheckOutcome, CheckVerdict, FailureKind, VerificationReport};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, debug_span, info, info_span, warn, Instrument};

/// Handle to a batch started with [`VerificationScheduler::verify_async()`].
///
/// The report is delivered to the sink whether or not the handle is awaited.
#[derive(Debug)]
pub struct BatchHandle {
    batch_id: u64,
    handle: JoinHandle<VerificationReport>,
}

impl BatchHandle {
    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the sealed report.
    pub async fn wait(self) -> Result<VerificationReport> {
        self.handle
            .await
            .map_err(|e| VerifyError::Internal(format!("batch {} task failed: {}", self.batch_id, e)))
    }
}

/// Fans one event out to every server and seals the results.
pub struct VerificationScheduler<P: HttpProbe, K: ReportSink> {
    checker: Arc<ReplicationChecker<P>>,
    sink: Arc<K>,
    batch_timeout: Option<Duration>,
    bulkhead: Option<Arc<Bulkhead>>,
    next_batch_id: Arc<AtomicU64>,
    in_flight: Arc<AtomicUsize>,
    tracker: TaskTracker,
}

impl<P: HttpProbe, K: ReportSink> Clone for VerificationScheduler<P, K> {
    fn clone(&self) -> Self {
        Self {
            checker: Arc::clone(&self.checker),
            sink: Arc::clone(&self.sink),
            batch_timeout: self.batch_timeout,
            bulkhead: self.bulkhead.clone(),
            next_batch_id: Arc::clone(&self.next_batch_id),
            in_flight: Arc::clone(&self.in_flight),
            tracker: self.tracker.clone(),
        }
    }
}

impl<P: HttpProbe, K: ReportSink> VerificationScheduler<P, K> {
    /// Scheduler with no batch timeout and no concurrency cap.
    pub fn new(checker: Arc<ReplicationChecker<P>>, sink: Arc<K>) -> Self {
        Self {
            checker,
            sink,
            batch_timeout: None,
            bulkhead: None,
            next_batch_id: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            tracker: TaskTracker::new(),
        }
    }

    /// Scheduler configured from [`BatchConfig`].
    pub fn from_config(checker: Arc<ReplicationChecker<P>>, sink: Arc<K>, config: &BatchConfig) -> Self {
        let scheduler = Self::new(checker, sink).with_batch_timeout(config.timeout_duration());
        match config.max_concurrent_checks {
            Some(limit) => scheduler.with_bulkhead(Bulkhead::new(limit)),
            None => scheduler,
        }
    }

    #[must_use]
    pub fn with_batch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Cap concurrent checks across all batches of this scheduler.
    #[must_use]
    pub fn with_bulkhead(mut self, bulkhead: Bulkhead) -> Self {
        self.bulkhead = Some(Arc::new(bulkhead));
        self
    }

    pub fn checker(&self) -> &Arc<ReplicationChecker<P>> {
        &self.checker
    }

    pub fn sink(&self) -> &Arc<K> {
        &self.sink
    }

    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout
    }

    /// Batches currently running, blocking and non-blocking alike.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one batch and return its sealed report.
    ///
    /// Fails only for an empty server list or an already-cancelled token.
    /// Cancellation during the batch still yields a sealed report with
    /// [`BatchCompletion::Cancelled`].
    pub async fn verify(
        &self,
        event: ChangeEvent,
        servers: &[ServerTarget],
        cancel: &CancellationToken,
    ) -> Result<VerificationReport> {
        self.verify_with_timeout(event, servers, self.batch_timeout, cancel)
            .await
    }

    /// [`verify()`](Self::verify) with a per-call batch timeout.
    pub async fn verify_with_timeout(
        &self,
        event: ChangeEvent,
        servers: &[ServerTarget],
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<VerificationReport> {
        let batch_id = self.begin(servers, cancel)?;
        Ok(self
            .run_batch(batch_id, event, servers.to_vec(), timeout, cancel.clone())
            .await)
    }

    /// Start a batch in the background and return immediately.
    ///
    /// The sealed report goes to the sink exactly once; the handle can
    /// also be awaited for it. Fails with [`VerifyError::Shutdown`] between
    /// a [`drain()`](Self::drain) and the next [`reopen()`](Self::reopen).
    pub fn verify_async(
        &self,
        event: ChangeEvent,
        servers: &[ServerTarget],
        cancel: &CancellationToken,
    ) -> Result<BatchHandle> {
        if self.tracker.is_closed() {
            return Err(VerifyError::Shutdown);
        }
        let batch_id = self.begin(servers, cancel)?;
        let scheduler = self.clone();
        let servers = servers.to_vec();
        let cancel = cancel.clone();

        let handle = self.tracker.spawn(async move {
            let timeout = scheduler.batch_timeout;
            let report = scheduler
                .run_batch(batch_id, event, servers, timeout, cancel)
                .await;
            scheduler.sink.deliver(report.clone());
            report
        });

        Ok(BatchHandle { batch_id, handle })
    }

    /// Stop accepting background batches and wait for running ones to seal.
    ///
    /// Blocking [`verify()`](Self::verify) calls are not affected.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let in_flight = self.tracker.len();
        if in_flight > 0 {
            info!(in_flight, "Waiting for in-flight batches to seal");
        }
        tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok()
    }

    /// Accept background batches again after a [`drain()`](Self::drain).
    pub fn reopen(&self) {
        self.tracker.reopen();
    }

    fn begin(&self, servers: &[ServerTarget], cancel: &CancellationToken) -> Result<u64> {
        if servers.is_empty() {
            return Err(VerifyError::EmptyServerList);
        }
        if cancel.is_cancelled() {
            return Err(VerifyError::Shutdown);
        }
        Ok(self.next_batch_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    async fn run_batch(
        &self,
        batch_id: u64,
        event: ChangeEvent,
        servers: Vec<ServerTarget>,
        timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> VerificationReport {
        let span = info_span!(
            "batch",
            batch_id,
            path = %event.source_path().display(),
            kind = %event.kind(),
            servers = servers.len()
        );
        self.collect(batch_id, event, servers, timeout, cancel)
            .instrument(span)
            .await
    }

    async fn collect(
        &self,
        batch_id: u64,
        event: ChangeEvent,
        servers: Vec<ServerTarget>,
        timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> VerificationReport {
        let _in_flight = InFlight::enter(&self.in_flight);

        let started_at = Utc::now();
        let started = Instant::now();
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        let event = Arc::new(event);

        debug!(timeout = ?timeout, "Batch started");

        let mut slots: Vec<Option<CheckVerdict>> = vec![None; servers.len()];
        let mut index_of = HashMap::with_capacity(servers.len());
        let mut join_set: JoinSet<(usize, CheckVerdict)> = JoinSet::new();

        for (index, server) in servers.iter().cloned().enumerate() {
            let checker = Arc::clone(&self.checker);
            let event = Arc::clone(&event);
            let bulkhead = self.bulkhead.clone();
            let span = debug_span!("check", server = %server);

            let abort = join_set.spawn(
                async move {
                    let _slot = match &bulkhead {
                        Some(bulkhead) => match bulkhead.acquire(server.base_url()).await {
                            Ok(slot) => {
                                debug!(waited_ms = slot.waited().as_millis() as u64, "Check slot acquired");
                                Some(slot)
                            }
                            Err(e) => {
                                let verdict = CheckVerdict::new(
                                    server.base_url(),
                                    checker.target_uri(&event, &server),
                                    CheckOutcome::Error(FailureKind::Cancelled),
                                    e.to_string(),
                                );
                                return (index, verdict);
                            }
                        },
                        None => None,
                    };
                    let start = Instant::now();
                    let verdict = checker.check(&event, &server).await;
                    metrics::record_check_latency(server.base_url(), start.elapsed());
                    (index, verdict)
                }
                .instrument(span),
            );
            index_of.insert(abort.id(), index);
        }

        let completion = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break BatchCompletion::Cancelled,

                _ = deadline_elapsed(deadline) => break BatchCompletion::TimedOut,

                joined = join_set.join_next() => match joined {
                    Some(Ok((index, verdict))) => {
                        slots[index] = Some(verdict);
                    }
                    Some(Err(e)) => {
                        // The checker catches its own panics; this covers aborts and
                        // anything that slipped past it.
                        if let Some(&index) = index_of.get(&e.id()) {
                            let kind = if e.is_panic() { FailureKind::Panicked } else { FailureKind::Cancelled };
                            let server = &servers[index];
                            slots[index] = Some(CheckVerdict::new(
                                server.base_url(),
                                self.checker.target_uri(&event, server),
                                CheckOutcome::Error(kind),
                                format!("check task failed: {}", e),
                            ));
                        }
                    }
                    None => break BatchCompletion::Complete,
                },
            }
        };

        // Outstanding checks are abandoned; whatever they produce later is discarded.
        join_set.abort_all();

        let outstanding = slots.iter().filter(|s| s.is_none()).count();
        if outstanding > 0 {
            warn!(
                completion = %completion,
                outstanding,
                "Sealing batch with outstanding checks"
            );
        }

        let (fill_kind, fill_detail) = match completion {
            BatchCompletion::TimedOut => (FailureKind::BatchTimedOut, "batch timed out before the check finished"),
            BatchCompletion::Cancelled => (FailureKind::Cancelled, "cancelled before the check finished"),
            BatchCompletion::Complete => (FailureKind::Internal, "check produced no verdict"),
        };

        let verdicts: Vec<CheckVerdict> = slots
            .into_iter()
            .zip(servers.iter())
            .map(|(slot, server)| {
                slot.unwrap_or_else(|| {
                    CheckVerdict::new(
                        server.base_url(),
                        self.checker.target_uri(&event, server),
                        CheckOutcome::Error(fill_kind),
                        fill_detail,
                    )
                })
            })
            .collect();

        for verdict in &verdicts {
            metrics::record_verdict(&verdict.server, &verdict.outcome);
        }
        metrics::record_batch(completion, verdicts.len(), started.elapsed());

        let event = Arc::unwrap_or_clone(event);
        let report = VerificationReport::seal(batch_id, event, verdicts, started_at, completion);
        let summary = report.summary();
        debug!(
            completion = %completion,
            confirmed = summary.confirmed,
            failed = summary.total() - summary.confirmed,
            duration_ms = started.elapsed().as_millis() as u64,
            "Batch sealed"
        );
        report
    }
}

/// Counts one running batch, including one whose future is dropped mid-flight.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        let now = count.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::set_in_flight_batches(now);
        Self(count)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let now = self.0.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        metrics::set_in_flight_batches(now);
    }
}

async fn deadline_elapsed(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckerConfig;
    use crate::probe::{ProbeMethod, ProbeResponse};
    use crate::sink::ChannelSink;
    use futures::future::BoxFuture;

    #[derive(Debug, Clone, Copy)]
    enum Behaviour {
        Absent,
        Present,
        Hang,
        Panic,
        SlowAbsent(Duration),
    }

    /// Probe keyed by server base URL, tracking peak concurrency.
    #[derive(Default)]
    struct HostProbe {
        behaviours: Vec<(String, Behaviour)>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl HostProbe {
        fn new(behaviours: &[(&str, Behaviour)]) -> Self {
            Self {
                behaviours: behaviours.iter().map(|(b, x)| (b.to_string(), *x)).collect(),
                ..Default::default()
            }
        }

        fn behaviour_for(&self, uri: &str) -> Behaviour {
            self.behaviours
                .iter()
                .find(|(base, _)| uri.starts_with(&format!("{}/", base)))
                .map(|(_, b)| *b)
                .unwrap_or(Behaviour::Absent)
        }
    }

    impl HttpProbe for HostProbe {
        fn probe<'a>(
            &'a self,
            uri: &'a str,
            _method: ProbeMethod,
            _timeout: Duration,
        ) -> BoxFuture<'a, crate::error::Result<ProbeResponse>> {
            Box::pin(async move {
                let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(active, Ordering::SeqCst);
                let result = match self.behaviour_for(uri) {
                    Behaviour::Absent => Err(VerifyError::http(uri, 404)),
                    Behaviour::Present => Ok(ProbeResponse::with_status(200)),
                    Behaviour::Hang => std::future::pending().await,
                    Behaviour::Panic => panic!("probe exploded for {}", uri),
                    Behaviour::SlowAbsent(delay) => {
                        tokio::time::sleep(delay).await;
                        Err(VerifyError::http(uri, 404))
                    }
                };
                self.active.fetch_sub(1, Ordering::SeqCst);
                result
            })
        }
    }

    fn scheduler(probe: HostProbe) -> (VerificationScheduler<HostProbe, ChannelSink>, tokio::sync::mpsc::UnboundedReceiver<VerificationReport>) {
        let checker = ReplicationChecker::new(Arc::new(probe), &CheckerConfig::default(), Duration::from_secs(1));
        let (sink, rx) = ChannelSink::new();
        (VerificationScheduler::new(Arc::new(checker), Arc::new(sink)), rx)
    }

    fn targets(urls: &[&str]) -> Vec<ServerTarget> {
        urls.iter().map(|u| ServerTarget::new(*u)).collect()
    }

    fn deleted() -> ChangeEvent {
        ChangeEvent::deleted("/srv/site/old.txt", "old.txt")
    }

    #[tokio::test]
    async fn test_batch_seals_one_verdict_per_server_in_order() {
        let probe = HostProbe::new(&[
            ("http://alpha", Behaviour::Absent),
            ("http://bravo", Behaviour::Present),
            ("http://charlie", Behaviour::SlowAbsent(Duration::from_millis(30))),
        ]);
        let (scheduler, _rx) = scheduler(probe);
        let servers = targets(&["http://charlie", "http://alpha", "http://bravo"]);

        let report = scheduler
            .verify(deleted(), &servers, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.completion(), BatchCompletion::Complete);
        let order: Vec<&str> = report.verdicts().iter().map(|v| v.server.as_str()).collect();
        assert_eq!(order, vec!["http://charlie", "http://alpha", "http://bravo"]);
        assert_eq!(report.verdicts()[0].outcome, CheckOutcome::Confirmed);
        assert_eq!(report.verdicts()[1].outcome, CheckOutcome::Confirmed);
        assert_eq!(report.verdicts()[2].outcome, CheckOutcome::NotReplicated);
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_empty_server_list_is_rejected() {
        let (scheduler, _rx) = scheduler(HostProbe::default());
        let err = scheduler
            .verify(deleted(), &[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::EmptyServerList));
    }

    #[tokio::test]
    async fn test_cancelled_token_rejects_new_batches() {
        let (scheduler, _rx) = scheduler(HostProbe::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = scheduler
            .verify_async(deleted(), &targets(&["http://alpha"]), &cancel)
            .unwrap_err();
        assert!(matches!(err, VerifyError::Shutdown));
    }

    #[tokio::test]
    async fn test_batch_timeout_marks_outstanding_checks() {
        let probe = HostProbe::new(&[
            ("http://alpha", Behaviour::Absent),
            ("http://stuck", Behaviour::Hang),
        ]);
        let (scheduler, _rx) = scheduler(probe);
        let servers = targets(&["http://alpha", "http://stuck"]);

        let started = Instant::now();
        let report = scheduler
            .verify_with_timeout(
                deleted(),
                &servers,
                Some(Duration::from_millis(100)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.completion(), BatchCompletion::TimedOut);
        assert_eq!(report.verdicts().len(), 2);
        assert_eq!(report.verdicts()[0].outcome, CheckOutcome::Confirmed);
        assert_eq!(
            report.verdicts()[1].outcome,
            CheckOutcome::Error(FailureKind::BatchTimedOut)
        );
        assert_eq!(report.verdicts()[1].tier, None);
    }

    #[tokio::test]
    async fn test_cancellation_seals_promptly() {
        let probe = HostProbe::new(&[("http://stuck", Behaviour::Hang)]);
        let (scheduler, _rx) = scheduler(probe);
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let report = scheduler
            .verify(deleted(), &targets(&["http://stuck"]), &cancel)
            .await
            .unwrap();

        assert_eq!(report.completion(), BatchCompletion::Cancelled);
        assert_eq!(
            report.verdicts()[0].outcome,
            CheckOutcome::Error(FailureKind::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_panicking_server_does_not_abort_batch() {
        let probe = HostProbe::new(&[
            ("http://alpha", Behaviour::Absent),
            ("http://boom", Behaviour::Panic),
        ]);
        let (scheduler, _rx) = scheduler(probe);
        let report = scheduler
            .verify(deleted(), &targets(&["http://alpha", "http://boom"]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.completion(), BatchCompletion::Complete);
        assert_eq!(report.verdicts()[0].outcome, CheckOutcome::Confirmed);
        assert_eq!(
            report.verdicts()[1].outcome,
            CheckOutcome::Error(FailureKind::Panicked)
        );
    }

    #[tokio::test]
    async fn test_verify_async_delivers_to_sink() {
        let probe = HostProbe::new(&[("http://alpha", Behaviour::Absent)]);
        let (scheduler, mut rx) = scheduler(probe);
        let cancel = CancellationToken::new();
        let servers = targets(&["http://alpha"]);

        let first = scheduler.verify_async(deleted(), &servers, &cancel).unwrap();
        let second = scheduler.verify_async(deleted(), &servers, &cancel).unwrap();
        assert!(second.batch_id() > first.batch_id());

        let first_id = first.batch_id();
        let report = first.wait().await.unwrap();
        assert_eq!(report.batch_id(), first_id);
        second.wait().await.unwrap();

        let mut delivered = vec![rx.recv().await.unwrap().batch_id(), rx.recv().await.unwrap().batch_id()];
        delivered.sort_unstable();
        assert_eq!(delivered, vec![first_id, first_id + 1]);
    }

    #[tokio::test]
    async fn test_bulkhead_caps_concurrency() {
        let probe = HostProbe::new(&[
            ("http://alpha", Behaviour::SlowAbsent(Duration::from_millis(20))),
            ("http://bravo", Behaviour::SlowAbsent(Duration::from_millis(20))),
            ("http://charlie", Behaviour::SlowAbsent(Duration::from_millis(20))),
        ]);
        let probe = Arc::new(probe);
        let checker = ReplicationChecker::new(Arc::clone(&probe), &CheckerConfig::default(), Duration::from_secs(1));
        let (sink, _rx) = ChannelSink::new();
        let scheduler = VerificationScheduler::new(Arc::new(checker), Arc::new(sink)).with_bulkhead(Bulkhead::new(1));

        let report = scheduler
            .verify(
                deleted(),
                &targets(&["http://alpha", "http://bravo", "http://charlie"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.summary().confirmed, 3);
        assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drain_waits_for_background_batches() {
        let probe = HostProbe::new(&[("http://alpha", Behaviour::SlowAbsent(Duration::from_millis(50)))]);
        let (scheduler, mut rx) = scheduler(probe);
        let handle = scheduler
            .verify_async(deleted(), &targets(&["http://alpha"]), &CancellationToken::new())
            .unwrap();

        assert!(scheduler.drain(Duration::from_secs(2)).await);
        assert!(handle.is_finished());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_abandoned_verify_releases_in_flight() {
        let probe = HostProbe::new(&[("http://stuck", Behaviour::Hang)]);
        let (scheduler, _rx) = scheduler(probe);
        let cancel = CancellationToken::new();
        let servers = targets(&["http://stuck"]);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            scheduler.verify(deleted(), &servers, &cancel),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_drain_refuses_background_batches_until_reopen() {
        let probe = HostProbe::new(&[("http://alpha", Behaviour::Absent)]);
        let (scheduler, _rx) = scheduler(probe);
        let cancel = CancellationToken::new();
        let servers = targets(&["http://alpha"]);

        assert!(scheduler.drain(Duration::from_secs(1)).await);
        let err = scheduler.verify_async(deleted(), &servers, &cancel).unwrap_err();
        assert!(matches!(err, VerifyError::Shutdown));

        scheduler.reopen();
        let report = scheduler
            .verify_async(deleted(), &servers, &cancel)
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert!(report.is_fully_replicated());
    }

    #[test]
    fn test_from_config() {
        let checker = ReplicationChecker::new(
            Arc::new(HostProbe::default()),
            &CheckerConfig::default(),
            Duration::from_secs(1),
        );
        let config = BatchConfig {
            timeout: Some("30s".to_string()),
            max_concurrent_checks: Some(4),
            ..Default::default()
        };
        let (sink, _rx) = ChannelSink::new();
        let scheduler = VerificationScheduler::from_config(Arc::new(checker), Arc::new(sink), &config);
        assert_eq!(scheduler.batch_timeout(), Some(Duration::from_secs(30)));
        assert!(scheduler.bulkhead.is_some());
    }
}
