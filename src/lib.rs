//! # Tiered Cache
//!
//! A two-tier key-value cache: a bounded in-memory tier in front of a
//! bounded durable tier whose records survive restarts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CacheEngine                          │
//! │  • put / get / get_or_put / remove / contains_key           │
//! │  • hit, miss, eviction and expiration counters              │
//! │  • periodic expiration sweep                                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Fast tier (memory)                      │
//! │  • Byte budget, weighted eviction score                     │
//! │  • Lazy expiration on read                                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                (write-through; promotion on durable hit)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Durable tier (StorageMedium)                 │
//! │  • One JSON record per key, id = SHA-256(key)               │
//! │  • Files, SQL table, or memory                              │
//! │  • Corrupted records dropped on read                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tiered_cache::{CacheConfig, CacheEngine, Priority, PutOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tiered_cache::CacheError> {
//!     let engine = CacheEngine::new();
//!     engine.initialize(CacheConfig::default()).await?;
//!
//!     let opts = PutOptions::default()
//!         .with_ttl(Duration::from_secs(60))
//!         .with_priority(Priority::High);
//!     engine.put("user:42", &"Ada".to_string(), opts).await?;
//!
//!     let name: Option<String> = engine.get("user:42").await?;
//!     println!("{:?}", name);
//!
//!     let stats = engine.stats().await?;
//!     println!("hit rate {:.2}", stats.hit_rate());
//!
//!     engine.dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: [`CacheEngine`], lifecycle and statistics
//! - [`tier`]: the fast and durable tiers
//! - [`storage`]: durable media (file, SQL, memory)
//! - [`eviction`]: eviction scoring
//! - [`entry`]: the cached unit and its metadata
//! - [`sizing`]: payload size estimation

pub mod config;
pub mod error;
pub mod entry;
pub mod sizing;
pub mod eviction;
pub mod options;
pub mod storage;
pub mod tier;
pub mod engine;
pub mod metrics;

pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use entry::{Entry, Priority};
pub use eviction::EvictionPolicy;
pub use options::{Deserializer, PutOptions, Serializer};
pub use storage::{record_id, FileMedium, MemoryMedium, StorageError, StorageMedium};
#[cfg(feature = "sql")]
pub use storage::SqlMedium;
pub use tier::{DurableTier, FastTier, TierStats};
pub use engine::{CacheEngine, CacheStats, EngineState, MediumFactory};
pub use metrics::LatencyTimer;
