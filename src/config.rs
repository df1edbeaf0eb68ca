// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the cache engine.
//!
//! # Example
//!
//! ```
//! use tiered_cache::{CacheConfig, Priority};
//!
//! // Minimal config (uses defaults)
//! let config = CacheConfig::default();
//! assert_eq!(config.fast_max_bytes, 16 * 1024 * 1024); // 16 MB
//! assert!(config.durable_enabled);
//!
//! // Memory-only cache with a 30 second default TTL
//! let config = CacheConfig {
//!     fast_max_bytes: 4 * 1024 * 1024,
//!     durable_enabled: false,
//!     default_ttl_ms: Some(30_000),
//!     default_priority: Priority::Low,
//!     ..Default::default()
//! };
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::entry::Priority;

/// Configuration for the cache engine.
///
/// Supplied once to [`crate::CacheEngine::initialize`] and read-only
/// afterwards. All fields have defaults, so a partial TOML/JSON document
/// deserializes into a usable config.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Fast (in-memory) tier budget in bytes (default: 16 MB)
    #[serde(default = "default_fast_max_bytes")]
    pub fast_max_bytes: usize,

    /// Durable tier budget in bytes (default: 64 MB)
    #[serde(default = "default_durable_max_bytes")]
    pub durable_max_bytes: u64,

    /// TTL applied when `put` does not specify one (default: none, entries never expire)
    #[serde(default)]
    pub default_ttl_ms: Option<u64>,

    /// Priority applied when `put` does not specify one (default: medium)
    #[serde(default)]
    pub default_priority: Priority,

    /// Write through to the durable tier (default: true)
    #[serde(default = "default_true")]
    pub durable_enabled: bool,

    /// Expiration sweep interval (default: 5 minutes). 0 disables the sweep.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Arms the periodic expiration sweep (default: true)
    #[serde(default = "default_true")]
    pub statistics_enabled: bool,

    /// Durable namespace; separates caches sharing one medium (default: "tiered_cache")
    #[serde(default = "default_durable_namespace")]
    pub durable_namespace: String,

    /// Base directory for the default file medium (default: "./tiered_cache_data")
    #[serde(default = "default_durable_root")]
    pub durable_root: PathBuf,
}

fn default_fast_max_bytes() -> usize { 16 * 1024 * 1024 } // 16 MB
fn default_durable_max_bytes() -> u64 { 64 * 1024 * 1024 } // 64 MB
fn default_true() -> bool { true }
fn default_sweep_interval_ms() -> u64 { 5 * 60 * 1000 }
fn default_durable_namespace() -> String { "tiered_cache".to_string() }
fn default_durable_root() -> PathBuf { PathBuf::from("./tiered_cache_data") }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fast_max_bytes: default_fast_max_bytes(),
            durable_max_bytes: default_durable_max_bytes(),
            default_ttl_ms: None,
            default_priority: Priority::default(),
            durable_enabled: true,
            sweep_interval_ms: default_sweep_interval_ms(),
            statistics_enabled: true,
            durable_namespace: default_durable_namespace(),
            durable_root: default_durable_root(),
        }
    }
}

impl CacheConfig {
    /// Default TTL as a [`Duration`].
    #[must_use]
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_ms.map(Duration::from_millis)
    }

    /// Sweep interval as a [`Duration`]; `None` when the sweep is disabled.
    #[must_use]
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }

    /// Directory used by the default file medium: `durable_root/durable_namespace`.
    #[must_use]
    pub fn durable_dir(&self) -> PathBuf {
        self.durable_root.join(&self.durable_namespace)
    }
}
