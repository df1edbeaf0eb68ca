// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic tiered-cache usage example.
//!
//! Demonstrates:
//! 1. Initializing an engine with a small fast tier over a file-backed durable tier
//! 2. Writing entries with different priorities and TTLs
//! 3. Reads served from the fast tier, and promotion after the fast tier evicts
//! 4. `get_or_put` computing a value once
//! 5. A restart that recovers entries from disk
//! 6. Displaying stats and the captured metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::time::{Duration, Instant};

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde::{Deserialize, Serialize};
use tiered_cache::{CacheConfig, CacheEngine, CacheError, EngineState, Priority, PutOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Profile {
    name: String,
    role: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .map_err(|e| format!("failed to install metrics recorder: {}", e))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiered_cache=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    println!("\n=== tiered-cache: basic usage ===\n");

    // ---------------------------------------------------------------------
    // 1. Configure and initialize
    // ---------------------------------------------------------------------
    let data_dir = tempfile::tempdir()?;
    let config = CacheConfig {
        // Room for two profiles, so the third write evicts
        fast_max_bytes: 40,
        durable_max_bytes: 1024 * 1024,
        durable_root: data_dir.path().to_path_buf(),
        durable_namespace: "demo".into(),
        sweep_interval_ms: 1_000,
        ..Default::default()
    };

    let engine = CacheEngine::new();
    println!("State: {}", engine.state());
    engine.initialize(config.clone()).await?;
    assert_eq!(engine.state(), EngineState::Ready);
    println!("State: {} (records under {})", engine.state(), config.durable_dir().display());

    // ---------------------------------------------------------------------
    // 2. Write entries
    // ---------------------------------------------------------------------
    println!("\nWriting profiles...");
    let profiles = [
        ("user:alice", Profile { name: "Alice".into(), role: "admin".into() }, Priority::High),
        ("user:bob", Profile { name: "Bob".into(), role: "user".into() }, Priority::Low),
        ("user:carol", Profile { name: "Carol".into(), role: "user".into() }, Priority::Medium),
    ];
    for (key, profile, priority) in &profiles {
        engine.put(key, profile, PutOptions::default().with_priority(*priority)).await?;
        println!("  put {} ({})", key, priority);
    }

    engine
        .put("session:tmp", &"short-lived", PutOptions::default().with_ttl(Duration::from_millis(200)))
        .await?;
    println!("  put session:tmp (ttl 200ms)");

    // ---------------------------------------------------------------------
    // 3. Read back
    // ---------------------------------------------------------------------
    println!("\nReading profiles...");
    for (key, _, _) in &profiles {
        let start = Instant::now();
        let profile: Option<Profile> = engine.get(key).await?;
        println!("  get {} -> {:?} ({:?})", key, profile.map(|p| p.name), start.elapsed());
    }
    println!("  fast tier pressure: {:.0}%", engine.fast_pressure()? * 100.0);

    // ---------------------------------------------------------------------
    // 4. get_or_put
    // ---------------------------------------------------------------------
    println!("\nget_or_put...");
    for attempt in 1..=2 {
        let report: String = engine
            .get_or_put(
                "report:daily",
                || async move {
                    println!("  (computing report on attempt {})", attempt);
                    Ok::<_, CacheError>("42 requests".to_string())
                },
                PutOptions::default(),
            )
            .await?;
        println!("  attempt {} -> {}", attempt, report);
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("\nsession:tmp present after 300ms: {}", engine.contains_key("session:tmp").await?);

    // ---------------------------------------------------------------------
    // 5. Restart
    // ---------------------------------------------------------------------
    println!("\nRestarting...");
    engine.dispose().await;
    println!("State: {}", engine.state());
    engine.initialize(config).await?;
    let alice: Option<Profile> = engine.get("user:alice").await?;
    println!("  user:alice after restart -> {:?}", alice);

    // ---------------------------------------------------------------------
    // 6. Stats and metrics
    // ---------------------------------------------------------------------
    let stats = engine.stats().await?;
    println!("\nStats:");
    println!("{}", serde_json::to_string_pretty(&stats)?);
    println!("hit rate: {:.2}", stats.hit_rate());

    engine.update_gauge_metrics().await?;
    println!("\nMetrics:");
    dump_metrics(&snapshotter);

    engine.dispose().await;
    println!("\nDone. State: {}", engine.state());
    Ok(())
}

/// Print every captured metric, grouped by kind and sorted by name.
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<(u8, String)> = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<String> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let name = if labels.is_empty() {
            key.name().to_string()
        } else {
            format!("{}{{{}}}", key.name(), labels.join(","))
        };

        match value {
            DebugValue::Counter(v) => lines.push((0, format!("counter   {} = {}", name, v))),
            DebugValue::Gauge(v) => lines.push((1, format!("gauge     {} = {:.0}", name, v.into_inner()))),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                let mean = if count > 0 { sum / count as f64 } else { 0.0 };
                lines.push((2, format!("histogram {} count={} mean={:.6}s", name, count, mean)));
            }
        }
    }

    if lines.is_empty() {
        println!("  (no metrics recorded)");
        return;
    }
    lines.sort();
    for (_, line) in lines {
        println!("  {}", line);
    }
}
