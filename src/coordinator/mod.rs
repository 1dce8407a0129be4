// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Verification engine coordinator.
//!
//! The orchestrator that ties together:
//! - Change intake, either an attached channel or the built-in
//!   [`crate::watcher`] adapter
//! - Batch fan-out via [`crate::scheduler::VerificationScheduler`]
//! - Report delivery to a [`crate::sink::ReportSink`]
//!
//! # Lifecycle
//!
//! The engine owns its cancellation scope and its set of in-flight
//! batches; nothing is process-global.
//! 1. `start()` opens a fresh cancellation scope
//! 2. `dispatch()` / attached receivers turn each accepted event into a batch
//! 3. `shutdown()` cancels, stops intake and drains in-flight batches

mod types;

pub use types::EngineState;

use crate::checker::ReplicationChecker;
use crate::config::VerifierConfig;
use crate::error::{Result, VerifyError};
use crate::event::ChangeEvent;
use crate::metrics;
use crate::probe::{HttpProbe, ReqwestProbe};
use crate::scheduler::{BatchHandle, VerificationScheduler};
use crate::sink::{ReportSink, TracingSink};
use crate::target::ServerTarget;
use crate::watcher::{self, WatcherHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long shutdown waits for a dispatcher loop to notice cancellation.
const DISPATCHER_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything a dispatcher loop needs, cloned out of the engine.
struct Dispatcher<P: HttpProbe, K: ReportSink> {
    filter: glob::Pattern,
    servers: watch::Receiver<Arc<Vec<ServerTarget>>>,
    scheduler: VerificationScheduler<P, K>,
    cancel: CancellationToken,
}

impl<P: HttpProbe, K: ReportSink> Dispatcher<P, K> {
    fn dispatch(&self, event: ChangeEvent) -> Result<Option<BatchHandle>> {
        if !self.filter.matches(event.logical_name()) {
            metrics::record_event_filtered();
            debug!(name = %event.logical_name(), "Event filtered out");
            return Ok(None);
        }

        // Snapshot: later server list updates do not touch this batch.
        let servers = Arc::clone(&self.servers.borrow());
        let kind = event.kind();
        let handle = self.scheduler.verify_async(event, &servers, &self.cancel)?;
        metrics::record_event_dispatched(&kind.to_string());
        debug!(batch_id = handle.batch_id(), kind = %kind, servers = servers.len(), "Batch dispatched");
        Ok(Some(handle))
    }

    async fn run(self, mut events: mpsc::Receiver<ChangeEvent>) {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Dispatcher stopping");
                    break;
                }

                next = events.recv() => match next {
                    Some(event) => {
                        if let Err(e) = self.dispatch(event) {
                            warn!(error = %e, "Failed to dispatch change event");
                        }
                    }
                    None => {
                        debug!("Event channel closed");
                        break;
                    }
                },
            }
        }
    }
}

/// The replication verification engine.
///
/// Accepts change events and verifies each against every configured web
/// server, handing one sealed [`crate::VerificationReport`] per event to
/// the sink.
///
/// # Example
///
/// ```rust,no_run
/// use replication_verifier::{ChangeEvent, VerificationEngine, VerifierConfig};
///
/// # async fn example() -> replication_verifier::Result<()> {
/// let config = VerifierConfig::for_testing("/srv/site", &["https://web1", "https://web2"]);
/// let mut engine = VerificationEngine::new(config)?;
/// engine.start()?;
///
/// let handle = engine.dispatch(ChangeEvent::changed("/srv/site/index.html", "index.html"))?;
/// if let Some(handle) = handle {
///     let report = handle.wait().await?;
///     println!("fully replicated: {}", report.is_fully_replicated());
/// }
///
/// engine.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct VerificationEngine<P: HttpProbe = ReqwestProbe, K: ReportSink = TracingSink> {
    /// Configuration the engine was built from
    config: VerifierConfig,

    /// Compiled file-name filter
    filter: glob::Pattern,

    /// Engine state (broadcast to watchers)
    state_tx: watch::Sender<EngineState>,

    /// Engine state receiver (for internal use)
    state_rx: watch::Receiver<EngineState>,

    /// Live server list; each batch snapshots it at dispatch
    servers_tx: watch::Sender<Arc<Vec<ServerTarget>>>,

    scheduler: VerificationScheduler<P, K>,

    /// Cancellation scope of the current run; replaced on every start
    cancel: CancellationToken,

    /// Filesystem watcher, when started with `watch_source_root()`
    watcher: Option<WatcherHandle>,

    /// Dispatcher loops spawned by `attach()`
    dispatchers: Vec<JoinHandle<()>>,
}

impl VerificationEngine<ReqwestProbe, TracingSink> {
    /// Create an engine with the reqwest probe and the tracing sink.
    ///
    /// The engine starts in `Idle` state. Call [`start()`](Self::start)
    /// to accept events.
    pub fn new(config: VerifierConfig) -> Result<Self> {
        let probe = ReqwestProbe::new(&config.settings.probe)?;
        Self::with_parts(config, Arc::new(probe), Arc::new(TracingSink))
    }
}

impl<P: HttpProbe, K: ReportSink> VerificationEngine<P, K> {
    /// Create an engine from explicit parts.
    ///
    /// # Arguments
    /// * `config` - Validated before anything is built
    /// * `probe` - HTTP seam shared by every check
    /// * `sink` - Receives every sealed report
    pub fn with_parts(config: VerifierConfig, probe: Arc<P>, sink: Arc<K>) -> Result<Self> {
        config.validate()?;
        let filter = config.file_pattern()?;
        let servers = config.server_targets()?;

        let checker = ReplicationChecker::new(
            probe,
            &config.settings.checker,
            config.settings.probe.timeout_duration(),
        )
        .with_source_root(config.source_root.clone());
        let scheduler = VerificationScheduler::from_config(Arc::new(checker), sink, &config.settings.batch);

        let (state_tx, state_rx) = watch::channel(EngineState::Idle);
        let (servers_tx, _) = watch::channel(Arc::new(servers));

        Ok(Self {
            config,
            filter,
            state_tx,
            state_rx,
            servers_tx,
            scheduler,
            cancel: CancellationToken::new(),
            watcher: None,
            dispatchers: Vec::new(),
        })
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &VerificationScheduler<P, K> {
        &self.scheduler
    }

    /// Get current engine state.
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    pub fn is_watching(&self) -> bool {
        self.state() == EngineState::Watching
    }

    /// Current server list.
    pub fn servers(&self) -> Arc<Vec<ServerTarget>> {
        Arc::clone(&self.servers_tx.borrow())
    }

    /// Get a receiver to watch server list changes.
    pub fn servers_receiver(&self) -> watch::Receiver<Arc<Vec<ServerTarget>>> {
        self.servers_tx.subscribe()
    }

    /// Replace the server list. In-flight batches keep their snapshot.
    pub fn update_servers<S: AsRef<str>>(&self, servers: &[S]) -> Result<()> {
        if servers.is_empty() {
            return Err(VerifyError::EmptyServerList);
        }
        let targets = servers
            .iter()
            .map(ServerTarget::parse)
            .collect::<Result<Vec<_>>>()?;
        info!(servers = targets.len(), "Server list updated");
        self.servers_tx.send_replace(Arc::new(targets));
        Ok(())
    }

    /// Token cancelled when this run shuts down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Batches still running.
    pub fn in_flight(&self) -> usize {
        self.scheduler.in_flight()
    }

    /// Start accepting events.
    pub fn start(&mut self) -> Result<()> {
        if self.state() != EngineState::Idle {
            return Err(VerifyError::InvalidState {
                expected: EngineState::Idle.to_string(),
                actual: self.state().to_string(),
            });
        }

        self.cancel = CancellationToken::new();
        self.scheduler.reopen();
        self.set_state(EngineState::Watching);
        info!(
            source_root = %self.config.source_root.display(),
            filter = %self.filter,
            servers = self.servers_tx.borrow().len(),
            "Verification engine watching"
        );
        Ok(())
    }

    /// Verify one change event in the background.
    ///
    /// Returns `Ok(None)` when the file name does not match the filter.
    /// Never waits for the batch.
    pub fn dispatch(&self, event: ChangeEvent) -> Result<Option<BatchHandle>> {
        self.require_watching()?;
        self.dispatcher().dispatch(event)
    }

    /// Dispatch every event received on `events` until the channel closes
    /// or the engine shuts down.
    pub fn attach(&mut self, events: mpsc::Receiver<ChangeEvent>) -> Result<()> {
        self.require_watching()?;
        let dispatcher = self.dispatcher();
        self.dispatchers.push(tokio::spawn(dispatcher.run(events)));
        debug!(dispatchers = self.dispatchers.len(), "Event receiver attached");
        Ok(())
    }

    /// Watch the configured source root with the built-in `notify` adapter.
    pub fn watch_source_root(&mut self) -> Result<()> {
        self.require_watching()?;
        if self.watcher.is_some() {
            return Err(VerifyError::InvalidState {
                expected: "no active watcher".to_string(),
                actual: "watcher running".to_string(),
            });
        }
        let (handle, events) = watcher::start_watcher(&self.config.source_root, self.filter.clone())?;
        self.watcher = Some(handle);
        self.attach(events)
    }

    /// Shutdown the engine gracefully.
    ///
    /// Shutdown sequence:
    /// 1. Cancel the run: outstanding checks are abandoned, batches seal as `Cancelled`
    /// 2. Stop the watcher and dispatcher loops
    /// 3. Wait up to `batch.drain_timeout` for sealed reports to reach the sink
    pub async fn shutdown(&mut self) {
        if self.state() == EngineState::Idle {
            return;
        }

        info!(in_flight = self.in_flight(), "Shutting down verification engine");
        self.set_state(EngineState::ShuttingDown);

        self.cancel.cancel();
        self.watcher = None;

        let dispatchers = std::mem::take(&mut self.dispatchers);
        for (i, handle) in dispatchers.into_iter().enumerate() {
            match tokio::time::timeout(DISPATCHER_STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => debug!(dispatcher = i + 1, "Dispatcher stopped"),
                Ok(Err(e)) => warn!(dispatcher = i + 1, error = %e, "Dispatcher panicked during shutdown"),
                Err(_) => warn!(dispatcher = i + 1, "Dispatcher did not stop in time"),
            }
        }

        let drain_timeout = self.config.settings.batch.drain_timeout_duration();
        if !self.scheduler.drain(drain_timeout).await {
            warn!(
                in_flight = self.in_flight(),
                drain_timeout_ms = drain_timeout.as_millis() as u64,
                "Drain timed out, abandoning in-flight batches"
            );
        }

        self.set_state(EngineState::Idle);
        info!("Verification engine stopped");
    }

    fn dispatcher(&self) -> Dispatcher<P, K> {
        Dispatcher {
            filter: self.filter.clone(),
            servers: self.servers_tx.subscribe(),
            scheduler: self.scheduler.clone(),
            cancel: self.cancel.clone(),
        }
    }

    fn require_watching(&self) -> Result<()> {
        match self.state() {
            EngineState::Watching => Ok(()),
            EngineState::ShuttingDown => Err(VerifyError::Shutdown),
            other => Err(VerifyError::InvalidState {
                expected: EngineState::Watching.to_string(),
                actual: other.to_string(),
            }),
        }
    }

    fn set_state(&self, state: EngineState) {
        let _ = self.state_tx.send(state);
        metrics::set_engine_state(state);
    }
}

impl<P: HttpProbe, K: ReportSink> Drop for VerificationEngine<P, K> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
