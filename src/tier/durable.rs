// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Durable tier backed by a [`StorageMedium`].
//!
//! Each key is stored as one record addressed by [`record_id`]. The record is
//! the entry's fields plus a tier-local `touched` clock, encoded as pretty
//! JSON so it can be diffed and inspected by hand:
//!
//! ```text
//! {
//!   "key": "user:42",
//!   "value": "Ada",
//!   "created_at": 1760870400000,
//!   "expires_at": null,
//!   "priority": "high",
//!   "size": 3,
//!   "last_accessed_at": 1760870400000,
//!   "access_count": 0,
//!   "touched": 17
//! }
//! ```
//!
//! There is no in-memory index: only the running byte total is kept, and it
//! is rebuilt from the records on [`DurableTier::initialize`]. Eviction
//! decodes every record each time it triggers.
//!
//! Records that fail to decode are deleted and treated as absent. After such
//! a deletion the byte total is recomputed from a full scan, since the lost
//! record's size is unknown.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entry::{now_millis, Entry};
use crate::eviction::{Candidate, EvictionPolicy};
use crate::storage::{record_id, StorageError, StorageMedium};

use super::TierStats;

/// Physical record layout.
#[derive(Serialize, Deserialize)]
struct DurableRecord {
    #[serde(flatten)]
    entry: Entry,
    /// Tier-local logical clock value of the last write/read
    touched: u64,
}

impl DurableRecord {
    fn encode(&self) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec_pretty(self).map_err(|e| StorageError::Corruption {
            id: record_id(self.entry.key()),
            reason: format!("encode failed: {}", e),
        })
    }

    fn decode(id: &str, bytes: &[u8]) -> Result<Self, StorageError> {
        let corruption = |reason: String| StorageError::Corruption { id: id.to_string(), reason };

        let record: Self = serde_json::from_slice(bytes).map_err(|e| corruption(e.to_string()))?;
        record.entry.check_invariants().map_err(corruption)?;
        if record_id(record.entry.key()) != id {
            return Err(corruption("record id does not match key digest".into()));
        }
        Ok(record)
    }
}

enum Loaded {
    Missing,
    Corrupt,
    Found(DurableRecord),
}

struct DurableState {
    current_size: u64,
    clock: u64,
}

impl DurableState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Byte-bounded entry store whose records survive restarts.
pub struct DurableTier {
    medium: Arc<dyn StorageMedium>,
    max_bytes: u64,
    policy: EvictionPolicy,
    /// Held across medium I/O; serializes every mutation of the record set.
    state: Mutex<DurableState>,
}

impl DurableTier {
    pub fn new(medium: Arc<dyn StorageMedium>, max_bytes: u64) -> Self {
        Self {
            medium,
            max_bytes,
            policy: EvictionPolicy::default(),
            state: Mutex::new(DurableState { current_size: 0, clock: 0 }),
        }
    }

    /// Prepare the medium and rebuild the byte total and clock from the
    /// records already stored. Corrupted records are dropped along the way.
    pub async fn initialize(&self) -> Result<(), StorageError> {
        self.medium.prepare().await?;

        let mut state = self.state.lock().await;
        let records = self.scan().await?;
        state.current_size = Self::total(&records);
        state.clock = records.iter().map(|(_, r)| r.touched).max().unwrap_or(0);

        info!(
            location = %self.medium.location(),
            records = records.len(),
            bytes = state.current_size,
            "Durable tier initialized"
        );
        Ok(())
    }

    /// Look up a valid entry, recording the access and rewriting the record.
    /// Expired records are deleted and reported as absent.
    pub async fn get(&self, key: &str) -> Result<Option<Entry>, StorageError> {
        let mut state = self.state.lock().await;
        let id = record_id(key);

        match self.load(&id).await? {
            Loaded::Missing => Ok(None),
            Loaded::Corrupt => {
                state.current_size = Self::total(&self.scan().await?);
                Ok(None)
            }
            Loaded::Found(mut record) => {
                let now = now_millis();
                if record.entry.is_expired_at(now) {
                    self.medium.delete(&id).await?;
                    state.current_size = state.current_size.saturating_sub(record.entry.size() as u64);
                    debug!(key, "Durable entry expired on read");
                    return Ok(None);
                }

                record.entry.mark_accessed_at(now);
                record.touched = state.tick();
                if let Err(e) = self.store(&id, &record).await {
                    // The value is still good; only its access metadata is stale on disk.
                    warn!(key, error = %e, "Failed to persist access metadata");
                }
                Ok(Some(record.entry))
            }
        }
    }

    /// Insert or replace an entry, evicting lowest-scoring records until it
    /// fits. An entry larger than the whole budget is admitted once every
    /// other record is gone. Returns the number of records evicted.
    ///
    /// If the medium fails partway, the byte total is recounted from the
    /// records that are actually stored before the error is returned.
    pub async fn put(&self, entry: &Entry) -> Result<usize, StorageError> {
        let mut state = self.state.lock().await;
        let result = self.put_locked(&mut state, entry).await;
        if result.is_err() {
            self.recount(&mut state).await;
        }
        result
    }

    async fn put_locked(&self, state: &mut DurableState, entry: &Entry) -> Result<usize, StorageError> {
        let id = record_id(entry.key());
        let incoming = entry.size() as u64;

        // Size of every other record; committed to `state` only once the write lands.
        let mut others = match self.load(&id).await? {
            Loaded::Found(old) => state.current_size.saturating_sub(old.entry.size() as u64),
            Loaded::Corrupt => {
                state.current_size = Self::total(&self.scan().await?);
                state.current_size
            }
            Loaded::Missing => state.current_size,
        };

        let mut evicted = 0;
        if others.saturating_add(incoming) > self.max_bytes {
            let now = now_millis();
            let candidates: Vec<Candidate> = self
                .scan()
                .await?
                .iter()
                .filter(|(rid, _)| *rid != id)
                .map(|(_, r)| self.policy.candidate(&r.entry, r.touched, now))
                .collect();
            others = candidates.iter().map(|c| c.size as u64).sum();

            for victim in self.policy.rank(candidates) {
                if others.saturating_add(incoming) <= self.max_bytes {
                    break;
                }
                self.medium.delete(&record_id(&victim.key)).await?;
                others = others.saturating_sub(victim.size as u64);
                evicted += 1;
                debug!(key = %victim.key, size = victim.size, "Evicted from durable tier");
            }
        }

        let record = DurableRecord { entry: entry.clone(), touched: state.tick() };
        self.store(&id, &record).await?;
        state.current_size = others.saturating_add(incoming);
        Ok(evicted)
    }

    /// Delete a record. Returns whether a decodable record existed.
    pub async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut state = self.state.lock().await;
        let id = record_id(key);

        match self.load(&id).await? {
            Loaded::Found(record) => {
                self.medium.delete(&id).await?;
                state.current_size = state.current_size.saturating_sub(record.entry.size() as u64);
                Ok(true)
            }
            Loaded::Corrupt => {
                state.current_size = Self::total(&self.scan().await?);
                Ok(false)
            }
            Loaded::Missing => Ok(false),
        }
    }

    /// True if a valid record exists; expired records are deleted.
    pub async fn contains_key(&self, key: &str) -> Result<bool, StorageError> {
        let mut state = self.state.lock().await;
        let id = record_id(key);

        match self.load(&id).await? {
            Loaded::Found(record) if record.entry.is_expired() => {
                self.medium.delete(&id).await?;
                state.current_size = state.current_size.saturating_sub(record.entry.size() as u64);
                Ok(false)
            }
            Loaded::Found(_) => Ok(true),
            Loaded::Corrupt => {
                state.current_size = Self::total(&self.scan().await?);
                Ok(false)
            }
            Loaded::Missing => Ok(false),
        }
    }

    /// Delete every record. A failed delete stops the sweep and leaves the
    /// byte total recounted from the survivors.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        let result = self.clear_locked().await;
        match &result {
            Ok(()) => state.current_size = 0,
            Err(_) => self.recount(&mut state).await,
        }
        result
    }

    async fn clear_locked(&self) -> Result<(), StorageError> {
        for id in self.medium.list().await? {
            self.medium.delete(&id).await?;
        }
        Ok(())
    }

    /// Delete every expired record. Returns how many were deleted.
    pub async fn clear_expired(&self) -> Result<usize, StorageError> {
        let mut state = self.state.lock().await;
        let now = now_millis();
        let mut removed = 0;
        let mut remaining = 0u64;

        for (id, record) in self.scan().await? {
            let size = record.entry.size() as u64;
            if !record.entry.is_expired_at(now) {
                remaining += size;
                continue;
            }
            match self.medium.delete(&id).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(key = %record.entry.key(), error = %e, "Failed to delete expired record");
                    remaining += size;
                }
            }
        }

        state.current_size = remaining;
        Ok(removed)
    }

    /// Copy of a stored entry without recording an access.
    pub async fn peek(&self, key: &str) -> Result<Option<Entry>, StorageError> {
        let _state = self.state.lock().await;
        match self.load(&record_id(key)).await? {
            Loaded::Found(record) => Ok(Some(record.entry)),
            Loaded::Missing | Loaded::Corrupt => Ok(None),
        }
    }

    /// Sum of stored entry sizes (the figure eviction works against).
    pub async fn size_bytes(&self) -> u64 {
        self.state.lock().await.current_size
    }

    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Count of decodable records and their byte total. Corrupted records
    /// found along the way are discarded, so both figures describe the same set.
    pub async fn stats(&self) -> Result<TierStats, StorageError> {
        let mut state = self.state.lock().await;
        let records = self.scan().await?;
        state.current_size = Self::total(&records);
        Ok(TierStats { entries: records.len(), bytes: state.current_size })
    }

    /// Bytes occupied on the medium, record encoding overhead included.
    pub async fn disk_bytes(&self) -> Result<u64, StorageError> {
        let _state = self.state.lock().await;
        let mut total = 0;
        for id in self.medium.list().await? {
            total += self.medium.record_len(&id).await?.unwrap_or(0);
        }
        Ok(total)
    }

    pub fn location(&self) -> String {
        self.medium.location()
    }

    // --- Internal helpers (callers hold the state lock) ---

    async fn load(&self, id: &str) -> Result<Loaded, StorageError> {
        let Some(bytes) = self.medium.read(id).await? else {
            return Ok(Loaded::Missing);
        };
        match DurableRecord::decode(id, &bytes) {
            Ok(record) => Ok(Loaded::Found(record)),
            Err(e) => {
                self.discard_corrupt(id, &e).await;
                Ok(Loaded::Corrupt)
            }
        }
    }

    async fn discard_corrupt(&self, id: &str, err: &StorageError) {
        warn!(id, error = %err, "Discarding corrupted durable record");
        crate::metrics::record_corrupt_record();
        if let Err(e) = self.medium.delete(id).await {
            warn!(id, error = %e, "Failed to delete corrupted durable record");
        }
    }

    /// Decode every record, discarding corrupted ones.
    async fn scan(&self) -> Result<Vec<(String, DurableRecord)>, StorageError> {
        let ids = self.medium.list().await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Loaded::Found(record) = self.load(&id).await? {
                records.push((id, record));
            }
        }
        Ok(records)
    }

    /// Rebuild the byte total from a full scan after a failed mutation.
    /// If the scan fails too, the previous total is kept.
    async fn recount(&self, state: &mut DurableState) {
        match self.scan().await {
            Ok(records) => state.current_size = Self::total(&records),
            Err(e) => warn!(error = %e, "Failed to recount durable tier size"),
        }
    }

    async fn store(&self, id: &str, record: &DurableRecord) -> Result<(), StorageError> {
        let bytes = record.encode()?;
        self.medium.write(id, &bytes).await
    }

    fn total(records: &[(String, DurableRecord)]) -> u64 {
        records.iter().map(|(_, r)| r.entry.size() as u64).sum()
    }
}
