//! Public types for the cache engine.

use serde::Serialize;

/// Engine lifecycle state.
///
/// Use [`super::CacheEngine::state()`] to check the current state or
/// [`super::CacheEngine::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, `initialize()` not yet called
    Created,
    /// Tiers being built, durable records being scanned
    Initializing,
    /// Accepting operations
    Ready,
    /// `dispose()` completed; `initialize()` may be called again
    Disposed,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Initializing => write!(f, "Initializing"),
            Self::Ready => write!(f, "Ready"),
            Self::Disposed => write!(f, "Disposed"),
        }
    }
}

/// Snapshot returned by [`super::CacheEngine::stats()`].
///
/// Counters cover the time since the last `initialize()` or `clear()`.
/// Tier figures are read live when the snapshot is taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries evicted from either tier to make room
    pub evictions: u64,
    /// Expired entries removed by sweeps and `clear_expired()`
    pub expirations: u64,
    pub fast_entries: usize,
    pub fast_bytes: u64,
    pub durable_entries: usize,
    pub durable_bytes: u64,
    /// Bytes the durable records occupy on the medium, encoding included
    pub durable_disk_bytes: u64,
}

impl CacheStats {
    /// hits / (hits + misses), or 0.0 before any lookup.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
