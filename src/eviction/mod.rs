//! Eviction scoring shared by both cache tiers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Eviction Module                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  weighted.rs   - Core scoring algorithm                      │
//! │  └─ EvictionPolicy: recency + frequency + priority → score   │
//! │  └─ Candidate: scored key awaiting a victim decision         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Fast tier
//!
//! `FastTier` rescans its resident entries and evicts the single lowest
//! scoring one per iteration until the incoming entry fits.
//!
//! # Durable tier
//!
//! `DurableTier` scans every record once per triggering insert, ranks the
//! whole set with [`EvictionPolicy::rank`] and deletes from the bottom until
//! the incoming entry fits.

pub mod weighted;

pub use weighted::{Candidate, EvictionPolicy};
