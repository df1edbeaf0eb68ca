//! The two cache tiers.
//!
//! Both tiers share one contract (get / put / remove / contains_key / clear /
//! clear_expired) and one eviction policy, and each keeps its own byte
//! budget. [`FastTier`] is synchronous and process-local; [`DurableTier`]
//! is async because every operation goes through a storage medium.

pub mod fast;
pub mod durable;

pub use fast::FastTier;
pub use durable::DurableTier;

use serde::Serialize;

/// Point-in-time size of one tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierStats {
    pub entries: usize,
    pub bytes: u64,
}
