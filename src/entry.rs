// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache entry data structure.
//!
//! An [`Entry`] is the unit both tiers store: the caller's payload plus the
//! metadata used for expiration and eviction scoring. Timestamps are wall-clock
//! epoch milliseconds so they survive a round trip through the durable tier.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tiered_cache::{Entry, Priority};
//! use serde_json::json;
//!
//! let mut entry = Entry::new("user:42", json!("Ada"), Some(Duration::from_secs(60)), Priority::High);
//! assert_eq!(entry.size(), 3);
//! assert_eq!(entry.access_count(), 0);
//! assert!(entry.is_valid());
//!
//! entry.mark_accessed();
//! assert_eq!(entry.access_count(), 1);
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::eviction::EvictionPolicy;
use crate::sizing;

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Eviction priority. Higher priorities are kept longer under pressure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
}

impl Priority {
    /// Numeric weight used by the eviction score (low=1, medium=2, high=3).
    #[must_use]
    pub fn weight(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// One cached value plus its access metadata.
///
/// Identity (`key`, `value`, `created_at`, `expires_at`, `priority`, `size`)
/// is fixed at construction. Only [`mark_accessed`](Self::mark_accessed)
/// mutates the entry afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    key: String,
    value: Value,
    /// Creation timestamp (epoch millis)
    created_at: u64,
    /// Expiry timestamp (epoch millis), `None` = never expires
    expires_at: Option<u64>,
    priority: Priority,
    /// Estimated payload size in bytes, computed once
    size: usize,
    /// Last access timestamp (epoch millis), never earlier than `created_at`
    last_accessed_at: u64,
    access_count: u64,
}

impl Entry {
    /// Build a fresh entry. The size estimate is taken from the payload here
    /// and never recomputed.
    pub fn new(key: impl Into<String>, value: Value, ttl: Option<Duration>, priority: Priority) -> Self {
        let now = now_millis();
        let size = sizing::estimate(&value);
        Self {
            key: key.into(),
            value,
            created_at: now,
            expires_at: ttl.map(|ttl| now.saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))),
            priority,
            size,
            last_accessed_at: now,
            access_count: 0,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the entry, returning its payload.
    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn last_accessed_at(&self) -> u64 {
        self.last_accessed_at
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Record a successful read.
    pub fn mark_accessed(&mut self) {
        self.mark_accessed_at(now_millis());
    }

    pub(crate) fn mark_accessed_at(&mut self, now_ms: u64) {
        // Clamp so a clock stepping backwards cannot break last_accessed_at >= created_at.
        self.last_accessed_at = now_ms.max(self.created_at);
        self.access_count = self.access_count.saturating_add(1);
    }

    /// True iff an expiry is set and the current time is strictly past it.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    pub(crate) fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expires_at.is_some_and(|expires_at| now_ms > expires_at)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired()
    }

    /// Eviction score under the default weighting (lower = evicted first).
    ///
    /// See [`EvictionPolicy`] for the formula. This is a heuristic, not strict LRU.
    #[must_use]
    pub fn eviction_score(&self) -> f64 {
        EvictionPolicy::default().score(self, now_millis())
    }

    /// Check the metadata invariants of a decoded entry.
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        if self.last_accessed_at < self.created_at {
            return Err("last_accessed_at precedes created_at".into());
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at < self.created_at {
                return Err("expires_at precedes created_at".into());
            }
        }
        Ok(())
    }

    /// Shift every timestamp back by `ms`, as if the entry had been created earlier.
    #[cfg(test)]
    pub(crate) fn backdate(&mut self, ms: u64) {
        self.created_at = self.created_at.saturating_sub(ms);
        self.last_accessed_at = self.last_accessed_at.saturating_sub(ms);
        self.expires_at = self.expires_at.map(|at| at.saturating_sub(ms));
    }
}
