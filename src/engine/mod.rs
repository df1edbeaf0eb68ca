// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache engine.
//!
//! The [`CacheEngine`] ties the two tiers together:
//! - **Fast tier**: in-memory, byte-bounded, consulted first
//! - **Durable tier**: records on a [`StorageMedium`], written through on
//!   every `put` and promoted into the fast tier on a hit
//!
//! # Lifecycle
//!
//! ```text
//! Created → Initializing → Ready → Disposed
//!                ↑                    │
//!                └────────────────────┘  initialize() again
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use tiered_cache::{CacheConfig, CacheEngine, EngineState, PutOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tiered_cache::CacheError> {
//! let engine = CacheEngine::new();
//! assert_eq!(engine.state(), EngineState::Created);
//!
//! engine.initialize(CacheConfig::default()).await?;
//! engine.put("greeting", &"hello".to_string(), PutOptions::default()).await?;
//!
//! let value: Option<String> = engine.get("greeting").await?;
//! assert_eq!(value.as_deref(), Some("hello"));
//!
//! engine.dispose().await;
//! # Ok(())
//! # }
//! ```

mod types;
mod api;
mod lifecycle;

pub use types::{CacheStats, EngineState};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tracing::warn;

use crate::config::CacheConfig;
use crate::entry::Entry;
use crate::error::{CacheError, Result};
use crate::metrics::{TIER_DURABLE, TIER_ENGINE, TIER_FAST};
use crate::storage::{FileMedium, StorageMedium};
use crate::tier::{DurableTier, FastTier};

use lifecycle::Sweeper;

/// Builds the durable tier's medium from the config passed to `initialize()`.
pub type MediumFactory = Box<dyn Fn(&CacheConfig) -> Arc<dyn StorageMedium> + Send + Sync>;

/// Two-tier cache engine.
///
/// Explicitly constructed and explicitly initialized; there is no global
/// instance. Operations called before [`initialize`](Self::initialize) or
/// after [`dispose`](Self::dispose) fail with [`CacheError::NotInitialized`].
///
/// # Thread Safety
///
/// The engine is `Send + Sync`. Share it behind an `Arc`; every operation
/// takes `&self`.
pub struct CacheEngine {
    medium_factory: MediumFactory,

    /// Present between initialize() and dispose()
    inner: RwLock<Option<Arc<EngineInner>>>,

    /// Serializes initialize() and dispose()
    lifecycle: Mutex<()>,

    /// Background expiration sweep, if armed
    sweeper: parking_lot::Mutex<Option<Sweeper>>,

    state: watch::Sender<EngineState>,
    state_rx: watch::Receiver<EngineState>,
}

/// Everything built by one initialize() call.
struct EngineInner {
    config: CacheConfig,
    fast: FastTier,
    durable: Option<DurableTier>,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }
}

impl CacheEngine {
    /// Engine whose durable tier stores one JSON file per record under
    /// `durable_root/durable_namespace`.
    pub fn new() -> Self {
        Self::with_medium(|config: &CacheConfig| -> Arc<dyn StorageMedium> {
            Arc::new(FileMedium::new(config.durable_dir()))
        })
    }

    /// Engine whose durable medium is built by `factory` on every `initialize()`.
    pub fn with_medium<F>(factory: F) -> Self
    where
        F: Fn(&CacheConfig) -> Arc<dyn StorageMedium> + Send + Sync + 'static,
    {
        let (state_tx, state_rx) = watch::channel(EngineState::Created);
        Self {
            medium_factory: Box::new(factory),
            inner: RwLock::new(None),
            lifecycle: Mutex::new(()),
            sweeper: parking_lot::Mutex::new(None),
            state: state_tx,
            state_rx,
        }
    }

    /// Engine that reuses one medium instance across initialize/dispose cycles.
    pub fn with_shared_medium(medium: Arc<dyn StorageMedium>) -> Self {
        Self::with_medium(move |_: &CacheConfig| medium.clone())
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    fn set_state(&self, state: EngineState) {
        self.state.send_replace(state);
        crate::metrics::set_engine_state(&state.to_string());
    }

    fn inner(&self) -> Result<Arc<EngineInner>> {
        self.inner.read().clone().ok_or(CacheError::NotInitialized)
    }
}

impl Default for CacheEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CacheEngine {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            sweeper.abort();
        }
    }
}

impl EngineInner {
    fn record_evictions(&self, tier: &'static str, count: usize) {
        if count > 0 {
            self.counters.evictions.fetch_add(count as u64, Ordering::Relaxed);
            crate::metrics::record_evictions(tier, count);
        }
    }

    /// Write an entry into the fast tier and, if enabled, the durable tier.
    /// A durable failure is logged and absorbed.
    async fn store(&self, entry: Entry) {
        let evicted = self.fast.put(entry.clone());
        self.record_evictions(TIER_FAST, evicted);
        crate::metrics::record_operation(TIER_FAST, "put", "success");

        let Some(durable) = &self.durable else {
            return;
        };
        match durable.put(&entry).await {
            Ok(evicted) => {
                self.record_evictions(TIER_DURABLE, evicted);
                crate::metrics::record_operation(TIER_DURABLE, "put", "success");
            }
            Err(e) => {
                warn!(key = %entry.key(), error = %e, "Durable write failed, entry kept in fast tier only");
                crate::metrics::record_operation(TIER_DURABLE, "put", "error");
                crate::metrics::record_error(TIER_DURABLE, "put");
            }
        }
    }

    /// Sweep both tiers. Used by `clear_expired()` and the background sweeper.
    async fn clear_expired(&self) -> usize {
        let fast = self.fast.clear_expired();
        crate::metrics::record_expirations(TIER_FAST, fast);

        let durable = match &self.durable {
            Some(durable) => match durable.clear_expired().await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(error = %e, "Durable expiration sweep failed");
                    crate::metrics::record_error(TIER_DURABLE, "clear_expired");
                    0
                }
            },
            None => 0,
        };
        crate::metrics::record_expirations(TIER_DURABLE, durable);

        let total = fast + durable;
        self.counters.expirations.fetch_add(total as u64, Ordering::Relaxed);
        crate::metrics::record_operation(TIER_ENGINE, "clear_expired", "success");
        total
    }
}
