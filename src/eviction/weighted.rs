// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::cmp::Ordering;

use crate::entry::Entry;

/// A scored eviction candidate.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub key: String,
    pub score: f64,
    pub size: usize,
    /// Tie-breaker: lower means touched longer ago.
    pub touched: u64,
}

impl Candidate {
    /// Victim ordering: lowest score first, then least recently touched.
    pub fn victim_order(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.touched.cmp(&other.touched))
    }
}

/// Weighted eviction policy combining recency, access frequency and priority.
///
/// ```text
/// recency  = 1 / (ms_since_last_access + 1)
/// access   = access_count
/// priority = priority_weight * priority_scale
/// score    = w_recency*recency + w_access*access + w_priority*priority
/// ```
///
/// Priority is scaled so it dominates: with the default weights a high
/// priority entry outranks a low priority one until the low one has been
/// read about 20 more times. Frequency and recency break ties inside one
/// priority class. This is a heuristic ordering, not exact LRU.
#[derive(Debug, Clone)]
pub struct EvictionPolicy {
    /// Weights for each component (recency, access count, priority)
    pub weights: (f64, f64, f64),
    /// Multiplier applied to the priority weight (1..=3)
    pub priority_scale: f64,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            weights: (0.4, 0.3, 0.3),
            priority_scale: 10.0,
        }
    }
}

impl EvictionPolicy {
    /// Calculate eviction score (lower = evict first)
    pub fn score(&self, entry: &Entry, now_ms: u64) -> f64 {
        let idle_ms = now_ms.saturating_sub(entry.last_accessed_at());
        let recency = 1.0 / (idle_ms as f64 + 1.0);
        let access = entry.access_count() as f64;
        let priority = f64::from(entry.priority().weight()) * self.priority_scale;

        recency * self.weights.0 + access * self.weights.1 + priority * self.weights.2
    }

    /// Score an entry into a [`Candidate`].
    pub fn candidate(&self, entry: &Entry, touched: u64, now_ms: u64) -> Candidate {
        Candidate {
            key: entry.key().to_string(),
            score: self.score(entry, now_ms),
            size: entry.size(),
            touched,
        }
    }

    /// Sort candidates into victim order (first element = first to evict).
    pub fn rank(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.sort_by(Candidate::victim_order);
        candidates
    }
}
