// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pull-based reconciliation from the durable tier into memory.
//!
//! A sweep scans the durable store for keys matching a glob, fetches each
//! one, and writes it into the LRU. It is a coarse refresh, not a change
//! feed: it recovers entries lost to eviction, warms a cold process, and
//! picks up writes other processes made directly against the durable store.
//!
//! ```text
//!   spawn_periodic ──► [wait interval] ──► run_once ──► [wait interval] ──► ...
//!                            ▲                                │
//!                            └──── stop observed here only ◄──┘
//! ```
//!
//! Cancellation is cooperative: a stop request is seen between sweeps, never
//! in the middle of one. Each fetch inside a sweep is bounded by the retry
//! policy, so the wait for a stop is bounded by one sweep.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use crate::eviction::lru::LruStore;
use crate::events::{CacheEvent, EventSink};
use crate::storage::durable::DurableClient;
use crate::value::CacheValue;

/// Outcome of one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub pattern: String,
    /// Keys the scan returned
    pub scanned: usize,
    /// Keys written into memory
    pub refreshed: usize,
    /// Keys whose fetch failed
    pub skipped: usize,
    /// The scan itself failed; nothing was refreshed
    pub aborted: bool,
    pub elapsed: Duration,
}

pub struct Reconciler {
    memory: Arc<LruStore<CacheValue>>,
    durable: Arc<DurableClient>,
    events: Arc<dyn EventSink>,
}

impl Reconciler {
    pub fn new(
        memory: Arc<LruStore<CacheValue>>,
        durable: Arc<DurableClient>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self { memory, durable, events }
    }

    /// One synchronous sweep. Never fails: problems are reported through the
    /// event sink and reflected in the returned report.
    pub async fn run_once(&self, pattern: &str) -> SweepReport {
        let started = Instant::now();
        self.events.emit(&CacheEvent::SweepStarted { pattern });

        let keys = match self.durable.scan_keys(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                self.events.emit(&CacheEvent::SweepAborted { pattern, error: &e });
                return SweepReport {
                    pattern: pattern.to_string(),
                    scanned: 0,
                    refreshed: 0,
                    skipped: 0,
                    aborted: true,
                    elapsed: started.elapsed(),
                };
            }
        };

        let mut refreshed = 0;
        let mut skipped = 0;
        for key in &keys {
            match self.durable.get(key).await {
                Ok(data) => {
                    if let Some((evicted, _)) = self.memory.set(key.as_str(), CacheValue::Bytes(data)) {
                        self.events.emit(&CacheEvent::Evicted { key: &evicted });
                    }
                    refreshed += 1;
                }
                Err(e) => {
                    self.events.emit(&CacheEvent::SweepKeySkipped { key, error: &e });
                    skipped += 1;
                }
            }
        }

        let elapsed = started.elapsed();
        self.events.emit(&CacheEvent::SweepCompleted {
            pattern,
            scanned: keys.len(),
            refreshed,
            skipped,
            elapsed,
        });
        crate::metrics::set_memory_items(self.memory.len());

        SweepReport {
            pattern: pattern.to_string(),
            scanned: keys.len(),
            refreshed,
            skipped,
            aborted: false,
            elapsed,
        }
    }

    /// Sweep every `interval` on a background task until the returned handle
    /// is stopped (or dropped).
    pub fn spawn_periodic(self: &Arc<Self>, interval: Duration, pattern: impl Into<String>) -> ReconcileHandle {
        self.spawn_inner(interval, pattern.into(), None)
    }

    /// Like [`spawn_periodic`](Self::spawn_periodic), but also stops when
    /// `signal` turns `true`. A dropped signal sender is ignored.
    pub fn spawn_with_signal(
        self: &Arc<Self>,
        interval: Duration,
        pattern: impl Into<String>,
        signal: watch::Receiver<bool>,
    ) -> ReconcileHandle {
        self.spawn_inner(interval, pattern.into(), Some(signal))
    }

    fn spawn_inner(
        self: &Arc<Self>,
        interval: Duration,
        pattern: String,
        external: Option<watch::Receiver<bool>>,
    ) -> ReconcileHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let sweeps = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(Arc::clone(self).run_loop(
            interval,
            pattern,
            stop_rx,
            external,
            sweeps.clone(),
        ));
        ReconcileHandle { stop_tx, task, sweeps }
    }

    async fn run_loop(
        self: Arc<Self>,
        interval: Duration,
        pattern: String,
        mut stop_rx: watch::Receiver<bool>,
        mut external: Option<watch::Receiver<bool>>,
        sweeps: Arc<AtomicU64>,
    ) {
        self.events.emit(&CacheEvent::ReconcilerStarted { pattern: &pattern, interval });

        // First sweep one interval after start, like a plain ticker
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = stop_requested(&mut stop_rx) => break,
                _ = external_stop(&mut external) => break,
                _ = ticker.tick() => {
                    // Not cancellable: the select only races the waits above
                    self.run_once(&pattern).await;
                    sweeps.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        self.events.emit(&CacheEvent::ReconcilerStopped {
            pattern: &pattern,
            sweeps: sweeps.load(Ordering::SeqCst),
        });
    }
}

/// Resolves once `true` is sent or the sender is gone.
async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Resolves once the external signal turns `true`; pends forever otherwise.
async fn external_stop(rx: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = rx {
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
    std::future::pending::<()>().await
}

/// Lifecycle handle for a periodic reconciler task.
///
/// Dropping the handle also stops the task (at the next between-sweeps
/// point), so a forgotten handle never leaks a loop.
pub struct ReconcileHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    sweeps: Arc<AtomicU64>,
}

impl ReconcileHandle {
    /// Ask the loop to stop. Returns immediately; a sweep in flight finishes.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Wait for the loop to exit.
    pub async fn join(self) -> Result<(), JoinError> {
        let Self { stop_tx, task, .. } = self;
        let result = task.await;
        drop(stop_tx);
        result
    }

    /// [`stop`](Self::stop) then [`join`](Self::join).
    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.stop();
        self.join().await
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Completed sweeps so far.
    #[must_use]
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::SeqCst)
    }
}
