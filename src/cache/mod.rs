// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tiered cache facade.
//!
//! [`TieredCache`] composes the bounded LRU, the retrying durable client and
//! the reconciler:
//!
//! ```text
//!   set ──► LRU (always) ──► encode ──► durable SET (retried)
//!   get ──► LRU hit? ──yes──► return
//!                 └─no──► durable GET (retried) ──► fill LRU ──► return
//!   incr_by ──► durable INCRBY ──► mirror into LRU
//!   reconciler ──► SCAN + GET ──► LRU        (background, every interval)
//! ```
//!
//! # Representations
//!
//! The memory tier keeps the value exactly as the caller passed it, so a
//! same-process read returns e.g. `CacheValue::Int(42)`. The durable tier only
//! holds bytes, so a miss refilled from it (or a reconciliation refresh)
//! yields `CacheValue::Bytes(b"42")`. Use [`TieredCache::get_bytes`] when one
//! representation is needed regardless of where the value came from.
//!
//! # Example
//!
//! ```rust,no_run
//! use tiered_cache::{TieredCache, TieredCacheConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tiered_cache::CacheError> {
//! let config = TieredCacheConfig {
//!     memory_capacity: 1_000,
//!     sync_at_start: true,
//!     sync_interval_ms: 30_000,
//!     key_pattern: "session:*".into(),
//!     ..Default::default()
//! };
//! let cache = TieredCache::connect(config).await?;
//!
//! cache.set("session:42", "alice").await?;
//! let value = cache.get("session:42").await?;
//! assert_eq!(value.as_str(), Some("alice"));
//!
//! let hits = cache.incr_by("hits", 1).await?;
//! println!("hits = {}", hits);
//!
//! cache.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod api;
mod lifecycle;
mod types;

pub use lifecycle::TieredCacheBuilder;
pub use types::CacheError;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::codec::PayloadCodec;
use crate::config::TieredCacheConfig;
use crate::events::{CacheEvent, EventSink};
use crate::eviction::lru::LruStore;
use crate::reconcile::{ReconcileHandle, Reconciler};
use crate::storage::durable::DurableClient;
use crate::value::CacheValue;

/// Two-tier cache: bounded in-process LRU over a durable key-value store.
///
/// `Send + Sync`; share it behind an `Arc`. The LRU lock is never held
/// across a network call.
pub struct TieredCache {
    pub(super) config: TieredCacheConfig,

    /// Fast tier
    pub(super) memory: Arc<LruStore<CacheValue>>,

    /// Durable tier, retry-wrapped
    pub(super) durable: Arc<DurableClient>,

    /// Compression for structured payloads
    pub(super) codec: Arc<dyn PayloadCodec>,

    pub(super) events: Arc<dyn EventSink>,

    pub(super) reconciler: Arc<Reconciler>,

    /// Background sweep task, if a sync interval is configured
    pub(super) reconcile_handle: Mutex<Option<ReconcileHandle>>,
}

impl TieredCache {
    /// Configuration the cache was built with.
    #[must_use]
    pub fn config(&self) -> &TieredCacheConfig {
        &self.config
    }

    /// Entries currently resident in memory.
    #[must_use]
    #[inline]
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// Memory-tier residency check. Does not touch recency or the network.
    #[must_use]
    #[inline]
    pub fn contains_in_memory(&self, key: &str) -> bool {
        self.memory.contains(key)
    }

    /// Whether a periodic reconciler is attached and still running.
    #[must_use]
    pub fn is_reconciling(&self) -> bool {
        self.reconcile_handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Write into the memory tier and report what happened.
    pub(super) fn remember(&self, key: &str, value: CacheValue) {
        let evicted = self.memory.set(key, value);
        if let Some((evicted_key, _)) = evicted {
            self.events.emit(&CacheEvent::Evicted { key: &evicted_key });
        }
        self.events.emit(&CacheEvent::MemoryWrite { key });
        crate::metrics::set_memory_items(self.memory.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::is_compressed;
    use crate::events::RecordingSink;
    use crate::resilience::retry::RetryConfig;
    use crate::storage::fault::{FaultyTransport, Op};
    use crate::storage::memory::InMemoryTransport;
    use crate::storage::traits::{KvTransport, ScanPage, StorageError};
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::time::Duration;

    struct Harness {
        cache: TieredCache,
        transport: Arc<FaultyTransport<InMemoryTransport>>,
        sink: Arc<RecordingSink>,
    }

    async fn harness(config: TieredCacheConfig) -> Harness {
        harness_with(config, InMemoryTransport::new()).await
    }

    async fn harness_with(config: TieredCacheConfig, store: InMemoryTransport) -> Harness {
        let transport = Arc::new(FaultyTransport::new(store));
        let sink = Arc::new(RecordingSink::new());
        let cache = TieredCache::builder(config)
            .transport(transport.clone())
            .events(sink.clone())
            .retry(RetryConfig::test())
            .build()
            .await
            .expect("build cache");
        Harness { cache, transport, sink }
    }

    fn small(capacity: usize) -> TieredCacheConfig {
        TieredCacheConfig {
            memory_capacity: capacity,
            ..Default::default()
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        roles: Vec<String>,
    }

    #[tokio::test]
    async fn test_set_writes_both_tiers() {
        let h = harness(small(10)).await;

        h.cache.set("answer", 42).await.unwrap();

        assert_eq!(h.cache.get("answer").await.unwrap(), CacheValue::Int(42));
        assert_eq!(h.transport.inner().get_raw("answer"), Some(b"42".to_vec()));
        assert_eq!(h.sink.count_for("durable_write", "answer"), 1);
    }

    #[tokio::test]
    async fn test_set_accepts_lengths_and_bytes() {
        let h = harness(small(10)).await;
        let cart = vec!["apple", "pear"];

        h.cache.set("cart:len", cart.len()).await.unwrap();
        h.cache.set("flags", 5u8).await.unwrap();

        assert_eq!(h.cache.get("cart:len").await.unwrap(), CacheValue::UInt(2));
        assert_eq!(h.transport.inner().get_raw("cart:len"), Some(b"2".to_vec()));
        assert_eq!(h.transport.inner().get_raw("flags"), Some(b"5".to_vec()));
    }

    #[tokio::test]
    async fn test_hit_makes_no_network_call() {
        let h = harness(small(10)).await;
        h.cache.set("k", "v").await.unwrap();
        h.transport.reset_counts();

        for _ in 0..5 {
            h.cache.get("k").await.unwrap();
        }
        assert_eq!(h.transport.calls(), 0);
        assert_eq!(h.sink.count_for("memory_hit", "k"), 5);
    }

    #[tokio::test]
    async fn test_miss_fills_memory_once() {
        let store = InMemoryTransport::new();
        store.insert_raw("remote", "from-elsewhere");
        let h = harness_with(small(10), store).await;

        let first = h.cache.get("remote").await.unwrap();
        let second = h.cache.get("remote").await.unwrap();

        assert_eq!(first, CacheValue::Bytes(b"from-elsewhere".to_vec()));
        assert_eq!(first, second);
        assert_eq!(h.transport.calls_for(Op::Get), 1);
        assert_eq!(h.sink.count_for("filled_from_durable", "remote"), 1);
    }

    #[tokio::test]
    async fn test_absent_key_propagates_not_found() {
        let h = harness(small(10)).await;

        let err = h.cache.get("nope").await.unwrap_err();
        assert!(err.is_not_found());
        // NotFound is retried like any other failure
        assert_eq!(h.transport.calls_for(Op::Get), 3);
        assert!(!h.cache.contains_in_memory("nope"));
    }

    #[tokio::test]
    async fn test_durable_failure_keeps_memory_write() {
        let h = harness(small(10)).await;
        h.transport.go_down();

        let err = h.cache.set("k", "v").await.unwrap_err();
        assert!(matches!(err, CacheError::Storage(StorageError::Connection(_))));

        assert_eq!(h.cache.get("k").await.unwrap(), CacheValue::from("v"));
        assert_eq!(h.transport.inner().get_raw("k"), None);
        assert_eq!(h.sink.count_for("durable_write_failed", "k"), 1);
    }

    #[tokio::test]
    async fn test_eviction_is_reported() {
        let h = harness(small(2)).await;
        h.cache.set("a", 1).await.unwrap();
        h.cache.set("b", 2).await.unwrap();
        h.cache.get("a").await.unwrap();
        h.cache.set("c", 3).await.unwrap();

        assert!(h.cache.contains_in_memory("a"));
        assert!(!h.cache.contains_in_memory("b"));
        assert!(h.cache.contains_in_memory("c"));
        assert_eq!(h.sink.count_for("evicted", "b"), 1);
        assert_eq!(h.cache.memory_len(), 2);
    }

    #[tokio::test]
    async fn test_refill_after_eviction_yields_bytes() {
        let h = harness(small(1)).await;
        h.cache.set("n", 42).await.unwrap();
        assert_eq!(h.cache.get("n").await.unwrap(), CacheValue::Int(42));
        assert_eq!(h.cache.get_bytes("n").await.unwrap(), b"42");

        h.cache.set("other", true).await.unwrap();
        assert!(!h.cache.contains_in_memory("n"));

        assert_eq!(h.cache.get("n").await.unwrap(), CacheValue::Bytes(b"42".to_vec()));
        assert_eq!(h.cache.get_bytes("n").await.unwrap(), b"42");
    }

    #[tokio::test]
    async fn test_incr_by_goes_durable_first() {
        let h = harness(small(10)).await;

        assert_eq!(h.cache.incr_by("counter", 5).await.unwrap(), 5);
        assert_eq!(h.cache.incr_by("counter", -2).await.unwrap(), 3);

        assert_eq!(h.transport.calls_for(Op::IncrBy), 2);
        assert_eq!(h.transport.inner().get_raw("counter"), Some(b"3".to_vec()));
        assert_eq!(h.cache.get("counter").await.unwrap(), CacheValue::Int(3));
    }

    #[tokio::test]
    async fn test_incr_by_ignores_memory_copy() {
        let h = harness(small(10)).await;
        h.transport.inner().insert_raw("counter", "100");
        // Memory holds a stale copy; the durable value is authoritative
        h.cache.memory.set("counter", CacheValue::Int(1));

        assert_eq!(h.cache.incr_by("counter", 1).await.unwrap(), 101);
        assert_eq!(h.cache.get("counter").await.unwrap(), CacheValue::Int(101));
    }

    #[tokio::test]
    async fn test_incr_by_failure_leaves_memory_alone() {
        let h = harness(small(10)).await;
        h.cache.set("word", "hello").await.unwrap();

        assert!(h.cache.incr_by("word", 1).await.is_err());
        assert_eq!(h.cache.get("word").await.unwrap(), CacheValue::from("hello"));
    }

    #[tokio::test]
    async fn test_delete_clears_both_tiers() {
        let h = harness(small(10)).await;
        h.cache.set("k", "v").await.unwrap();

        h.cache.delete("k").await.unwrap();

        assert!(!h.cache.contains_in_memory("k"));
        assert_eq!(h.transport.inner().get_raw("k"), None);
        assert!(h.cache.get("k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_failure_still_drops_memory_copy() {
        let h = harness(small(10)).await;
        h.cache.set("k", "v").await.unwrap();
        h.transport.go_down();

        assert!(h.cache.delete("k").await.is_err());
        assert!(!h.cache.contains_in_memory("k"));
        assert_eq!(h.sink.count_for("delete_failed", "k"), 1);
    }

    #[tokio::test]
    async fn test_structured_round_trip_is_compressed() {
        let h = harness(small(10)).await;
        let profile = Profile {
            name: "alice".into(),
            roles: vec!["admin".into(); 50],
        };

        h.cache.set_structured("profile:1", &profile).await.unwrap();

        let stored = h.transport.inner().get_raw("profile:1").unwrap();
        assert!(is_compressed(&stored));
        let back: Profile = h.cache.get_structured("profile:1").await.unwrap();
        assert_eq!(back, profile);
    }

    #[tokio::test]
    async fn test_structured_read_after_refill() {
        let h = harness(small(1)).await;
        let profile = Profile { name: "bob".into(), roles: vec![] };
        h.cache.set_structured("p", &profile).await.unwrap();
        h.cache.set("evict-p", 0).await.unwrap();

        let back: Profile = h.cache.get_structured("p").await.unwrap();
        assert_eq!(back, profile);
        assert_eq!(h.transport.calls_for(Op::Get), 1);
    }

    #[tokio::test]
    async fn test_structured_read_over_typed_value_is_mismatch() {
        let h = harness(small(10)).await;
        h.cache.set("p", "not a payload").await.unwrap();

        let err = h.cache.get_structured::<Profile>("p").await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::TypeMismatch { expected: "bytes", found: "text", .. }
        ));
    }

    #[tokio::test]
    async fn test_structured_decode_failure() {
        let h = harness(small(10)).await;
        h.cache.set("p", b"{\"name\": 7}".to_vec()).await.unwrap();

        let err = h.cache.get_structured::<Profile>("p").await.unwrap_err();
        assert!(matches!(err, CacheError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_unserializable_value_writes_nothing() {
        let h = harness(small(10)).await;
        let mut map: BTreeMap<(u8, u8), u8> = BTreeMap::new();
        map.insert((1, 2), 3);

        let err = h.cache.set_structured("bad", &map).await.unwrap_err();
        assert!(matches!(err, CacheError::Encode { .. }));
        assert_eq!(h.transport.calls_for(Op::Set), 0);
        assert!(!h.cache.contains_in_memory("bad"));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_rejected() {
        let result = TieredCache::builder(small(0))
            .transport(Arc::new(InMemoryTransport::new()))
            .build()
            .await;
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[tokio::test]
    async fn test_sync_at_start_warms_memory() {
        let store = InMemoryTransport::new();
        store.insert_raw("user:1", "a");
        store.insert_raw("user:2", "b");
        store.insert_raw("job:1", "c");
        let config = TieredCacheConfig {
            sync_at_start: true,
            key_pattern: "user:*".into(),
            ..small(10)
        };

        let h = harness_with(config, store).await;
        assert_eq!(h.cache.memory_len(), 2);
        assert!(h.cache.contains_in_memory("user:1"));
        assert!(!h.cache.contains_in_memory("job:1"));
    }

    #[tokio::test]
    async fn test_startup_survives_unreachable_scan() {
        let transport = Arc::new(FaultyTransport::new(InMemoryTransport::new()));
        transport.go_down();
        let config = TieredCacheConfig { sync_at_start: true, ..small(10) };

        let cache = TieredCache::builder(config)
            .transport(transport)
            .retry(RetryConfig::test())
            .build()
            .await
            .unwrap();
        assert_eq!(cache.memory_len(), 0);
    }

    #[tokio::test]
    async fn test_sync_now_picks_up_external_writes() {
        let h = harness(small(10)).await;
        h.transport.inner().insert_raw("ext:1", "x");

        let report = h.cache.sync_now("ext:*").await;
        assert_eq!(report.refreshed, 1);
        assert_eq!(h.cache.get("ext:1").await.unwrap(), CacheValue::Bytes(b"x".to_vec()));
    }

    #[tokio::test]
    async fn test_periodic_reconciler_lifecycle() {
        let config = TieredCacheConfig { sync_interval_ms: 15, ..small(10) };
        let h = harness(config).await;
        assert!(h.cache.is_reconciling());

        h.transport.inner().insert_raw("late", "arrival");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(h.cache.contains_in_memory("late"));

        h.cache.shutdown().await;
        assert!(!h.cache.is_reconciling());
        assert_eq!(h.sink.count("reconciler_stopped"), 1);
        assert_eq!(h.sink.count("reconciler_crashed"), 0);
    }

    /// Serves reads and writes, panics on SCAN.
    struct PanicOnScan(InMemoryTransport);

    #[async_trait::async_trait]
    impl KvTransport for PanicOnScan {
        async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
            self.0.set(key, value).await
        }
        async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            self.0.get(key).await
        }
        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.0.delete(key).await
        }
        async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StorageError> {
            self.0.incr_by(key, delta).await
        }
        async fn scan_page(&self, _cursor: u64, _pattern: &str, _count: usize) -> Result<ScanPage, StorageError> {
            panic!("scan exploded");
        }
    }

    #[tokio::test]
    async fn test_shutdown_reports_crashed_reconciler() {
        let sink = Arc::new(RecordingSink::new());
        let cache = TieredCache::builder(TieredCacheConfig { sync_interval_ms: 10, ..small(10) })
            .transport(Arc::new(PanicOnScan(InMemoryTransport::new())))
            .events(sink.clone())
            .retry(RetryConfig::test())
            .build()
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!cache.is_reconciling());

        cache.shutdown().await;
        assert_eq!(sink.count("reconciler_crashed"), 1);
        assert_eq!(sink.count("reconciler_stopped"), 0);

        // Tiers still serve after the background task is gone
        cache.set("k", "v").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), CacheValue::from("v"));
    }

    #[tokio::test]
    async fn test_concurrent_callers() {
        let h = harness(small(64)).await;
        let cache = Arc::new(h.cache);

        let mut tasks = Vec::new();
        for t in 0..8 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..20 {
                    let key = format!("t{}:{}", t, i);
                    cache.set(&key, i).await.unwrap();
                    // Another task may have evicted it already; bytes are the same either way
                    assert_eq!(cache.get_bytes(&key).await.unwrap(), i.to_string().into_bytes());
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(cache.memory_len(), 64);
        assert_eq!(h.transport.inner().len(), 160);
    }
}
