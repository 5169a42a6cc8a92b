// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic tiered-cache usage example.
//!
//! Demonstrates:
//! 1. Connecting to Redis and warming memory with a startup sweep
//! 2. Write-through sets of a few value shapes
//! 3. Memory hits vs. read-through misses (with timing)
//! 4. A durable-first counter
//! 5. Structured (JSON + zstd) payloads
//! 6. Displaying metrics
//! 7. Clean shutdown
//!
//! # Prerequisites
//!
//! A Redis on localhost:
//! ```bash
//! docker run --rm -p 6379:6379 redis:7-alpine
//! ```
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::time::{Duration, Instant};

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde::{Deserialize, Serialize};
use tiered_cache::{KvTransport, NoopSink, RedisTransport, TieredCache, TieredCacheConfig};

#[derive(Debug, Serialize, Deserialize)]
struct Settings {
    theme: String,
    version: String,
    features: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder (captures everything the cache reports)
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiered_cache=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();

    println!("\n=== tiered-cache: basic usage ===\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Seed Redis as "another process", then start the cache
    // ─────────────────────────────────────────────────────────────────────────
    let redis_url = "redis://127.0.0.1:6379/0";
    let other_process = RedisTransport::connect(redis_url, &NoopSink).await?;
    other_process.set("demo:seeded:1", b"from another process").await?;
    other_process.set("demo:seeded:2", b"also seeded").await?;

    let config = TieredCacheConfig {
        memory_capacity: 4,
        sync_at_start: true,
        sync_interval_ms: 2_000,
        key_pattern: "demo:*".into(),
        ..Default::default()
    };
    println!("Connecting to {} db {} (capacity {})...", config.redis_addr, config.redis_db, config.memory_capacity);
    let cache = TieredCache::connect(config).await?;
    println!("  warmed {} entries at startup", cache.memory_len());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Write-through
    // ─────────────────────────────────────────────────────────────────────────
    println!("\nWriting...");
    cache.set("demo:name", "alice").await?;
    cache.set("demo:age", 42).await?;
    cache.set("demo:ratio", 0.75).await?;
    cache.set("demo:active", true).await?;
    for key in ["demo:name", "demo:age", "demo:ratio", "demo:active"] {
        println!("  {} → memory {:?}, redis {:?}", key, cache.get(key).await?, String::from_utf8(other_process.get(key).await?)?);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Hit vs. miss
    // ─────────────────────────────────────────────────────────────────────────
    println!("\nReading (capacity 4, so the seeded keys were evicted)...");
    for key in ["demo:active", "demo:seeded:1"] {
        let start = Instant::now();
        let in_memory = cache.contains_in_memory(key);
        let value = cache.get(key).await?;
        println!(
            "  {} ({}) → {:?} in {:?}",
            key,
            if in_memory { "memory hit" } else { "read-through" },
            value,
            start.elapsed()
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Counter
    // ─────────────────────────────────────────────────────────────────────────
    println!("\nCounting...");
    for _ in 0..3 {
        let n = cache.incr_by("demo:visits", 1).await?;
        println!("  demo:visits = {}", n);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Structured payload
    // ─────────────────────────────────────────────────────────────────────────
    let settings = Settings {
        theme: "dark".into(),
        version: "2.0".into(),
        features: vec!["sync".into(); 20],
    };
    cache.set_structured("demo:settings", &settings).await?;
    let stored = other_process.get("demo:settings").await?;
    let back: Settings = cache.get_structured("demo:settings").await?;
    println!("\nStructured: {} bytes in redis → {:?}", stored.len(), back.theme);

    // Let one periodic sweep run
    tokio::time::sleep(Duration::from_millis(2_200)).await;

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\nMetrics:");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 7. Shutdown
    // ─────────────────────────────────────────────────────────────────────────
    cache.shutdown().await;
    for key in ["demo:name", "demo:age", "demo:ratio", "demo:active", "demo:visits", "demo:settings", "demo:seeded:1", "demo:seeded:2"] {
        other_process.delete(key).await?;
    }
    println!("\nDone (demo keys removed from Redis).\n");

    Ok(())
}

/// Print captured counters, gauges and histogram summaries, sorted by name.
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let name = if labels.is_empty() {
            key.name().to_string()
        } else {
            format!("{}{{{}}}", key.name(), labels.join(","))
        };

        let rendered = match value {
            DebugValue::Counter(v) => format!("{} = {}", name, v),
            DebugValue::Gauge(v) => format!("{} = {:.2}", name, v.into_inner()),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                let avg = if count > 0 { sum / count as f64 } else { 0.0 };
                format!("{} count={} avg={:.6}", name, count, avg)
            }
        };
        lines.push(rendered);
    }

    lines.sort();
    for line in lines {
        println!("  {}", line);
    }
}
