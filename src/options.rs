//! Per-call options for writes.
//!
//! The engine stores values as JSON payloads. By default a value goes
//! through `serde_json`; a caller who wants a different text form supplies
//! a serializer (and the matching deserializer for reads), and the engine
//! stores that text verbatim.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tiered_cache::{PutOptions, Priority};
//!
//! // Defaults from CacheConfig
//! let opts: PutOptions<'_, String> = PutOptions::default();
//! assert!(opts.ttl.is_none());
//!
//! // Short-lived, kept under pressure
//! let opts: PutOptions<'_, String> = PutOptions::default()
//!     .with_ttl(Duration::from_secs(30))
//!     .with_priority(Priority::High);
//! assert_eq!(opts.priority, Some(Priority::High));
//! ```

use std::time::Duration;

use crate::entry::Priority;
use crate::error::Result;

/// Converts a value to the text that is stored.
pub type Serializer<V> = dyn Fn(&V) -> String + Send + Sync;

/// Converts stored text back to a value.
pub type Deserializer<V> = dyn Fn(&str) -> Result<V> + Send + Sync;

/// Options for [`crate::CacheEngine::put`] and [`crate::CacheEngine::get_or_put`].
///
/// `None` fields fall back to the engine's [`crate::CacheConfig`].
pub struct PutOptions<'a, V> {
    /// Time to live. Default: `CacheConfig::default_ttl_ms`
    pub ttl: Option<Duration>,

    /// Eviction priority. Default: `CacheConfig::default_priority`
    pub priority: Option<Priority>,

    /// Custom encoder; without one the value is stored via `serde_json`
    pub serializer: Option<&'a Serializer<V>>,

    /// Custom decoder, used only when `get_or_put` finds an existing value
    pub deserializer: Option<&'a Deserializer<V>>,
}

impl<V> Default for PutOptions<'_, V> {
    fn default() -> Self {
        Self {
            ttl: None,
            priority: None,
            serializer: None,
            deserializer: None,
        }
    }
}

// Manual impls: a derive would demand `V: Clone`.
impl<V> Clone for PutOptions<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for PutOptions<'_, V> {}

impl<V> std::fmt::Debug for PutOptions<'_, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PutOptions")
            .field("ttl", &self.ttl)
            .field("priority", &self.priority)
            .field("serializer", &self.serializer.is_some())
            .field("deserializer", &self.deserializer.is_some())
            .finish()
    }
}

impl<'a, V> PutOptions<'a, V> {
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn with_serializer(mut self, serializer: &'a Serializer<V>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    #[must_use]
    pub fn with_deserializer(mut self, deserializer: &'a Deserializer<V>) -> Self {
        self.deserializer = Some(deserializer);
        self
    }
}
