//! Engine lifecycle: initialize, dispose, and the background expiration sweep.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::metrics::TIER_DURABLE;
use crate::tier::{DurableTier, FastTier};

use super::{CacheEngine, Counters, EngineInner, EngineState};

/// Handle to the spawned sweep task.
pub(super) struct Sweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    fn spawn(inner: &Arc<EngineInner>, period: Duration) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_sweeper(Arc::downgrade(inner), period, shutdown_rx));
        Self { shutdown, handle }
    }

    /// Signal the task and wait for it to finish its current pass.
    async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                warn!(error = %e, "Expiration sweeper terminated abnormally");
            }
        }
    }

    pub(super) fn abort(self) {
        self.handle.abort();
    }
}

/// Sweep loop. Holds only a weak reference so a dropped engine ends the task.
async fn run_sweeper(inner: Weak<EngineInner>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately; the first sweep is one period out.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let start = Instant::now();
                let removed = inner.clear_expired().await;
                crate::metrics::record_latency(crate::metrics::TIER_ENGINE, "sweep", start.elapsed());
                if removed > 0 {
                    debug!(removed, "Expiration sweep removed entries");
                }
            }
        }
    }
    debug!("Expiration sweeper stopped");
}

impl CacheEngine {
    /// Build the tiers and bring the engine to `Ready`.
    ///
    /// Idempotent: a second call while initialized returns `Ok(())` and keeps
    /// the existing tiers and config. If the durable medium cannot be
    /// prepared or scanned, the error is returned and the engine stays
    /// uninitialized.
    #[tracing::instrument(skip(self, config), fields(durable = config.durable_enabled))]
    pub async fn initialize(&self, config: CacheConfig) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if self.inner.read().is_some() {
            debug!("Engine already initialized");
            return Ok(());
        }

        let start = Instant::now();
        let previous = self.state();
        self.set_state(EngineState::Initializing);

        let fast = FastTier::new(config.fast_max_bytes);
        let durable = if config.durable_enabled {
            let tier = DurableTier::new((self.medium_factory)(&config), config.durable_max_bytes);
            if let Err(e) = tier.initialize().await {
                error!(location = %tier.location(), error = %e, "Durable tier failed to initialize");
                crate::metrics::record_error(TIER_DURABLE, "initialize");
                self.set_state(previous);
                return Err(e.into());
            }
            Some(tier)
        } else {
            None
        };

        let inner = Arc::new(EngineInner {
            config,
            fast,
            durable,
            counters: Counters::default(),
        });

        if inner.config.statistics_enabled {
            if let Some(period) = inner.config.sweep_interval() {
                *self.sweeper.lock() = Some(Sweeper::spawn(&inner, period));
                debug!(period_ms = period.as_millis() as u64, "Expiration sweep armed");
            }
        }

        info!(
            fast_max_bytes = inner.config.fast_max_bytes,
            durable = inner.durable.is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Cache engine ready"
        );
        *self.inner.write() = Some(inner);
        self.set_state(EngineState::Ready);
        Ok(())
    }

    /// Stop the sweep and release the tiers.
    ///
    /// Durable records stay on the medium. A later `initialize()` starts
    /// with zeroed counters and rebuilds both tiers. No-op when not
    /// initialized.
    pub async fn dispose(&self) {
        let _guard = self.lifecycle.lock().await;

        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
        }

        let released = self.inner.write().take();
        if released.is_some() {
            self.set_state(EngineState::Disposed);
            info!("Cache engine disposed");
        }
    }
}
