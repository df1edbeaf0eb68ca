// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types surfaced by the cache engine.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors returned by [`crate::CacheEngine`] operations.
///
/// Tier-local problems (a corrupted durable record, a durable write that
/// failed after startup) are absorbed and logged inside the engine. Only
/// the conditions below reach the caller.
#[derive(Error, Debug)]
pub enum CacheError {
    /// An operation was invoked before `initialize()` completed (or after `dispose()`).
    #[error("Cache engine is not initialized; call initialize() first")]
    NotInitialized,

    /// The storage medium could not be brought up during initialization.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A value could not be converted to or from its stored payload.
    #[error("Value codec error: {0}")]
    Codec(String),

    /// The producer passed to `get_or_put` failed. Nothing was cached.
    #[error("Value computation failed: {0}")]
    Compute(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CacheError {
    /// Build a [`CacheError::Codec`] from any displayable error.
    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Result alias used across the public API.
pub type Result<T> = std::result::Result<T, CacheError>;
