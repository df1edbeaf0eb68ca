// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Payload size estimation.
//!
//! Sizes feed eviction pressure only; they are estimates, never used for
//! correctness. Scalars get a small fixed size, text its byte length, and
//! containers the recursive sum of their children (plus key lengths for
//! objects). Payloads nested deeper than [`MAX_DEPTH`] fall back to the length
//! of their JSON text, capped at [`MAX_FALLBACK_BYTES`].

use serde_json::Value;

/// Size charged for a boolean.
pub const BOOL_BYTES: usize = 4;

/// Size charged for any number.
pub const NUMBER_BYTES: usize = 8;

/// Nesting depth after which the textual fallback is used.
pub const MAX_DEPTH: usize = 32;

/// Size used when the textual fallback itself fails.
pub const FALLBACK_BYTES: usize = 1024;

/// Upper bound for any fallback estimate.
pub const MAX_FALLBACK_BYTES: usize = 64 * 1024;

/// Estimate the in-cache footprint of a payload.
#[must_use]
pub fn estimate(value: &Value) -> usize {
    estimate_at(value, 0)
}

fn estimate_at(value: &Value, depth: usize) -> usize {
    if depth > MAX_DEPTH {
        return textual_fallback(value);
    }
    match value {
        Value::Null => 0,
        Value::Bool(_) => BOOL_BYTES,
        Value::Number(_) => NUMBER_BYTES,
        Value::String(s) => s.len(),
        Value::Array(items) => items
            .iter()
            .fold(0usize, |acc, item| acc.saturating_add(estimate_at(item, depth + 1))),
        Value::Object(map) => map.iter().fold(0usize, |acc, (k, v)| {
            acc.saturating_add(k.len()).saturating_add(estimate_at(v, depth + 1))
        }),
    }
}

/// Best-effort estimate via the JSON text encoding, bounded.
#[must_use]
pub fn textual_fallback(value: &Value) -> usize {
    serde_json::to_string(value)
        .map(|text| text.len())
        .unwrap_or(FALLBACK_BYTES)
        .min(MAX_FALLBACK_BYTES)
}
