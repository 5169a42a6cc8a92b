//! # Tiered Cache
//!
//! A two-tier cache: a bounded in-process LRU in front of a durable Redis
//! store, kept loosely consistent by write-through and periodic
//! reconciliation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TieredCache facade                      │
//! │  • set: memory first, then durable (write-through)         │
//! │  • get: memory, else durable + fill (read-through)         │
//! │  • incr_by: durable first, mirrored into memory            │
//! └─────────────────────────────────────────────────────────────┘
//!                │                               │
//!                ▼                               ▼
//! ┌───────────────────────────┐   ┌─────────────────────────────┐
//! │   Memory: LruStore        │   │   Durable: DurableClient    │
//! │  • fixed capacity         │   │  • 3 attempts, 100ms pause  │
//! │  • O(1) LRU eviction      │   │  • SCAN cursor pagination   │
//! │  • one lock, never held   │   │  • Redis or any KvTransport │
//! │    across network I/O     │   │                             │
//! └───────────────────────────┘   └─────────────────────────────┘
//!                ▲                               │
//!                └────────── Reconciler ◄────────┘
//!                  (SCAN + GET every interval)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tiered_cache::{TieredCache, TieredCacheConfig, CacheValue};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tiered_cache::CacheError> {
//!     let config = TieredCacheConfig {
//!         redis_addr: "localhost:6379".into(),
//!         memory_capacity: 10_000,
//!         sync_interval_ms: 60_000,
//!         ..Default::default()
//!     };
//!     let cache = TieredCache::connect(config).await?;
//!
//!     cache.set("greeting", "hello").await?;
//!     assert_eq!(cache.get("greeting").await?, CacheValue::from("hello"));
//!
//!     cache.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cache`]: The [`TieredCache`] facade and its builder
//! - [`eviction`]: Bounded LRU store
//! - [`storage`]: Durable transports (Redis, in-memory) and the retrying client
//! - [`reconcile`]: Background durable → memory refresh
//! - [`resilience`]: Fixed-backoff retry
//! - [`events`]: Injected event sink (`tracing` + `metrics` by default)

pub mod cache;
pub mod codec;
pub mod config;
pub mod events;
pub mod eviction;
pub mod metrics;
pub mod reconcile;
pub mod resilience;
pub mod storage;
pub mod value;

// Note: We don't expose a `tracing` module to avoid conflict with the tracing crate

pub use cache::{CacheError, TieredCache, TieredCacheBuilder};
pub use codec::{CodecError, PayloadCodec, ZstdCodec};
pub use config::TieredCacheConfig;
pub use events::{CacheEvent, EventSink, NoopSink, TracingSink};
pub use eviction::lru::LruStore;
pub use metrics::LatencyTimer;
pub use reconcile::{ReconcileHandle, Reconciler, SweepReport};
pub use resilience::retry::RetryConfig;
pub use storage::durable::DurableClient;
pub use storage::memory::InMemoryTransport;
pub use storage::redis::RedisTransport;
pub use storage::traits::{KvTransport, ScanPage, StorageError};
pub use value::CacheValue;
