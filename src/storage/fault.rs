// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fault injection for test harnesses.
//!
//! [`FaultyTransport`] wraps any [`KvTransport`] and can be told to fail:
//! - for a bounded window of wall-clock time (an outage),
//! - for the next N calls,
//! - permanently until [`FaultyTransport::heal`] is called.
//!
//! It also counts calls per operation so tests can assert how many round
//! trips a cache operation actually made. Only compiled for tests or with the
//! `test-utils` feature.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{KvTransport, ScanPage, StorageError};

/// Operation labels used by the per-operation call counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Set,
    Get,
    Delete,
    IncrBy,
    Scan,
}

impl Op {
    fn index(self) -> usize {
        match self {
            Op::Set => 0,
            Op::Get => 1,
            Op::Delete => 2,
            Op::IncrBy => 3,
            Op::Scan => 4,
        }
    }
}

pub struct FaultyTransport<T: KvTransport> {
    inner: T,
    calls: [AtomicU64; 5],
    failures: AtomicU64,
    /// Fail every call until this instant
    outage_until: Mutex<Option<Instant>>,
    /// Fail this many upcoming calls
    fail_next: AtomicU64,
    /// Fail only scan pages with this 1-indexed number (per scan iteration)
    fail_scan_page: Mutex<Option<u64>>,
    scan_page_no: AtomicU64,
    down: AtomicBool,
    error_msg: String,
}

impl<T: KvTransport> FaultyTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            calls: Default::default(),
            failures: AtomicU64::new(0),
            outage_until: Mutex::new(None),
            fail_next: AtomicU64::new(0),
            fail_scan_page: Mutex::new(None),
            scan_page_no: AtomicU64::new(0),
            down: AtomicBool::new(false),
            error_msg: "injected outage".to_string(),
        }
    }

    /// Fail every call for `duration`, then recover on its own.
    pub fn inject_outage(&self, duration: Duration) {
        *self.outage_until.lock() = Some(Instant::now() + duration);
    }

    /// Fail the next `n` calls (of any operation).
    pub fn fail_next(&self, n: u64) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fail every call until [`heal`](Self::heal).
    pub fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    /// Clear every injected fault.
    pub fn heal(&self) {
        self.down.store(false, Ordering::SeqCst);
        self.fail_next.store(0, Ordering::SeqCst);
        *self.outage_until.lock() = None;
        *self.fail_scan_page.lock() = None;
    }

    /// Fail page number `page` (1-indexed) of every scan iteration.
    pub fn fail_scan_page(&self, page: u64) {
        *self.fail_scan_page.lock() = Some(page);
    }

    /// Total calls that reached this wrapper.
    pub fn calls(&self) -> u64 {
        self.calls.iter().map(|c| c.load(Ordering::SeqCst)).sum()
    }

    pub fn calls_for(&self, op: Op) -> u64 {
        self.calls[op.index()].load(Ordering::SeqCst)
    }

    /// Calls that were failed by injection.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        for c in &self.calls {
            c.store(0, Ordering::SeqCst);
        }
        self.failures.store(0, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn should_fail(&self) -> bool {
        if self.down.load(Ordering::SeqCst) {
            return true;
        }
        {
            let mut until = self.outage_until.lock();
            match *until {
                Some(deadline) if Instant::now() < deadline => return true,
                Some(_) => *until = None,
                None => {}
            }
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn enter(&self, op: Op) -> Result<(), StorageError> {
        self.calls[op.index()].fetch_add(1, Ordering::SeqCst);
        if self.should_fail() {
            self.failures.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Connection(self.error_msg.clone()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<T: KvTransport> KvTransport for FaultyTransport<T> {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.enter(Op::Set)?;
        self.inner.set(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.enter(Op::Get)?;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.enter(Op::Delete)?;
        self.inner.delete(key).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StorageError> {
        self.enter(Op::IncrBy)?;
        self.inner.incr_by(key, delta).await
    }

    async fn scan_page(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage, StorageError> {
        self.enter(Op::Scan)?;
        if cursor == 0 {
            self.scan_page_no.store(0, Ordering::SeqCst);
        }
        let page_no = self.scan_page_no.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_scan_page.lock() == Some(page_no) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Connection(format!("injected failure on scan page {}", page_no)));
        }
        self.inner.scan_page(cursor, pattern, count).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryTransport;

    #[tokio::test]
    async fn test_passes_through_when_healthy() {
        let t = FaultyTransport::new(InMemoryTransport::new());
        t.set("k", b"v").await.unwrap();
        assert_eq!(t.get("k").await.unwrap(), b"v".to_vec());
        assert_eq!(t.calls(), 2);
        assert_eq!(t.calls_for(Op::Get), 1);
        assert_eq!(t.failures(), 0);
    }

    #[tokio::test]
    async fn test_fail_next_n_calls() {
        let t = FaultyTransport::new(InMemoryTransport::new());
        t.fail_next(2);
        assert!(t.set("k", b"v").await.is_err());
        assert!(t.set("k", b"v").await.is_err());
        assert!(t.set("k", b"v").await.is_ok());
        assert_eq!(t.failures(), 2);
    }

    #[tokio::test]
    async fn test_outage_window_expires() {
        let t = FaultyTransport::new(InMemoryTransport::new());
        t.inject_outage(Duration::from_millis(50));
        assert!(matches!(t.get("k").await, Err(StorageError::Connection(_))));

        tokio::time::sleep(Duration::from_millis(80)).await;
        // Outage over: the inner store answers (and the key is genuinely missing)
        assert!(matches!(t.get("k").await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_go_down_and_heal() {
        let t = FaultyTransport::new(InMemoryTransport::new());
        t.go_down();
        assert!(t.delete("k").await.is_err());
        t.heal();
        assert!(t.delete("k").await.is_ok());
    }
}
