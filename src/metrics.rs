// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for tiered-cache.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application chooses the exporter (Prometheus, OTEL, etc.);
//! with no recorder installed every call here is a no-op.
//!
//! # Metric Naming Convention
//! - `tiered_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `tier`: fast, durable, engine
//! - `operation`: get, put, remove, contains, clear, clear_expired, sweep
//! - `status`: hit, miss, success, error

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

pub const TIER_FAST: &str = "fast";
pub const TIER_DURABLE: &str = "durable";
pub const TIER_ENGINE: &str = "engine";

/// Record the outcome of one operation against a tier
pub fn record_operation(tier: &str, operation: &str, status: &str) {
    counter!(
        "tiered_cache_operations_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(tier: &str, operation: &str, duration: Duration) {
    histogram!(
        "tiered_cache_operation_seconds",
        "tier" => tier.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record entries removed to make room
pub fn record_evictions(tier: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        "tiered_cache_evictions_total",
        "tier" => tier.to_string()
    )
    .increment(count as u64);
}

/// Record expired entries removed by a sweep or `clear_expired`
pub fn record_expirations(tier: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        "tiered_cache_expirations_total",
        "tier" => tier.to_string()
    )
    .increment(count as u64);
}

/// Record a durable record that failed to decode and was discarded
pub fn record_corrupt_record() {
    counter!("tiered_cache_corrupt_records_total").increment(1);
}

/// Record a storage failure that was absorbed
pub fn record_error(tier: &str, operation: &str) {
    counter!(
        "tiered_cache_errors_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Set entry count for a tier
pub fn set_tier_entries(tier: &str, count: usize) {
    gauge!(
        "tiered_cache_entries",
        "tier" => tier.to_string()
    )
    .set(count as f64);
}

/// Set logical byte total for a tier
pub fn set_tier_bytes(tier: &str, bytes: u64) {
    gauge!(
        "tiered_cache_bytes",
        "tier" => tier.to_string()
    )
    .set(bytes as f64);
}

/// Record an engine lifecycle transition
pub fn set_engine_state(state: &str) {
    counter!(
        "tiered_cache_state_transitions_total",
        "state" => state.to_string()
    )
    .increment(1);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    tier: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    pub fn new(tier: &'static str, operation: &'static str) -> Self {
        Self {
            tier,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.tier, self.operation, self.start.elapsed());
    }
}
