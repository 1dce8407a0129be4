// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Concurrency limiting for checks.
//!
//! The scheduler runs one check per server per event with no cap. A
//! deployment that needs to bound outbound requests (many events, many
//! servers) configures `batch.max_concurrent_checks`, and every check then
//! takes a slot from one shared [`Bulkhead`] before probing.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), replication_verifier::resilience::BulkheadClosed> {
//! use replication_verifier::resilience::Bulkhead;
//! let bulkhead = Bulkhead::new(10); // Max 10 concurrent checks
//!
//! let slot = bulkhead.acquire("https://web1.example.com").await?;
//! // checker.check(&event, &server).await;
//! drop(slot); // Release slot
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A check could not get a slot because the bulkhead was closed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("no check slot for {server}: bulkhead closed (max {max_concurrent})")]
pub struct BulkheadClosed {
    /// Server whose check was refused.
    pub server: String,
    /// Slot count of the closed bulkhead.
    pub max_concurrent: usize,
}

/// A held check slot. Released on drop.
#[derive(Debug)]
pub struct CheckSlot {
    _permit: OwnedSemaphorePermit,
    waited: Duration,
}

impl CheckSlot {
    /// How long the check queued before getting this slot.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

/// Caps how many checks probe servers at once, across all batches.
#[derive(Debug)]
pub struct Bulkhead {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    waiting: AtomicUsize,
}

impl Bulkhead {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            waiting: AtomicUsize::new(0),
        }
    }

    /// Wait for a free slot on behalf of a check against `server`.
    pub async fn acquire(&self, server: &str) -> Result<CheckSlot, BulkheadClosed> {
        let start = Instant::now();
        let queued = Queued::enter(&self.waiting);
        let acquired = Arc::clone(&self.semaphore).acquire_owned().await;
        drop(queued);

        let permit = acquired.map_err(|_| BulkheadClosed {
            server: server.to_string(),
            max_concurrent: self.max_concurrent,
        })?;
        Ok(CheckSlot {
            _permit: permit,
            waited: start.elapsed(),
        })
    }

    /// Refuse all pending and future checks.
    ///
    /// The engine never closes a bulkhead; this is for callers that share
    /// one scheduler's limit with their own work and tear it down themselves.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Checks currently queued for a slot.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

/// Counts one queued check; aborted batches drop it mid-wait.
struct Queued<'a>(&'a AtomicUsize);

impl<'a> Queued<'a> {
    fn enter(waiting: &'a AtomicUsize) -> Self {
        let now = waiting.fetch_add(1, Ordering::Relaxed) + 1;
        crate::metrics::set_checks_waiting(now);
        Self(waiting)
    }
}

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        let now = self.0.fetch_sub(1, Ordering::Relaxed) - 1;
        crate::metrics::set_checks_waiting(now);
    }
}
