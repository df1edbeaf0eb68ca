// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fast (in-memory) tier.
//!
//! A byte-bounded map guarded by a single mutex. The mutex covers the map,
//! the running byte total and the eviction scan, so `current_size` always
//! equals the sum of resident entry sizes.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::entry::{now_millis, Entry};
use crate::eviction::{Candidate, EvictionPolicy};

use super::TierStats;

struct Slot {
    entry: Entry,
    /// Logical clock value of the last insert/read, breaks score ties
    touched: u64,
}

#[derive(Default)]
struct FastState {
    entries: HashMap<String, Slot>,
    current_size: usize,
    clock: u64,
}

impl FastState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn take(&mut self, key: &str) -> Option<Entry> {
        let slot = self.entries.remove(key)?;
        self.current_size = self.current_size.saturating_sub(slot.entry.size());
        Some(slot.entry)
    }
}

/// Volatile, process-local, byte-bounded entry store.
pub struct FastTier {
    max_bytes: usize,
    policy: EvictionPolicy,
    state: Mutex<FastState>,
}

impl FastTier {
    pub fn new(max_bytes: usize) -> Self {
        Self::with_policy(max_bytes, EvictionPolicy::default())
    }

    pub fn with_policy(max_bytes: usize, policy: EvictionPolicy) -> Self {
        Self {
            max_bytes,
            policy,
            state: Mutex::new(FastState::default()),
        }
    }

    /// Look up a valid entry, recording the access. Expired entries are
    /// removed and reported as absent.
    pub fn get(&self, key: &str) -> Option<Entry> {
        let mut state = self.state.lock();
        let now = now_millis();

        if state.entries.get(key)?.entry.is_expired_at(now) {
            state.take(key);
            debug!(key, "Fast tier entry expired on read");
            return None;
        }

        let tick = state.tick();
        let slot = state.entries.get_mut(key)?;
        slot.entry.mark_accessed_at(now);
        slot.touched = tick;
        Some(slot.entry.clone())
    }

    /// Copy of the resident entry without recording an access (expired or not).
    pub fn peek(&self, key: &str) -> Option<Entry> {
        self.state.lock().entries.get(key).map(|slot| slot.entry.clone())
    }

    /// Insert or replace an entry, evicting lowest-scoring entries until it
    /// fits. An entry larger than the whole budget is still admitted once the
    /// tier is empty. Returns the number of entries evicted.
    pub fn put(&self, entry: Entry) -> usize {
        let mut state = self.state.lock();
        state.take(entry.key());

        let mut evicted = 0;
        while state.current_size.saturating_add(entry.size()) > self.max_bytes {
            let Some(victim) = self.lowest_scoring(&state) else {
                break;
            };
            if let Some(gone) = state.take(&victim) {
                evicted += 1;
                debug!(key = %victim, size = gone.size(), "Evicted from fast tier");
            }
        }

        let tick = state.tick();
        state.current_size = state.current_size.saturating_add(entry.size());
        state.entries.insert(entry.key().to_string(), Slot { entry, touched: tick });
        evicted
    }

    fn lowest_scoring(&self, state: &FastState) -> Option<String> {
        let now = now_millis();
        state
            .entries
            .values()
            .map(|slot| self.policy.candidate(&slot.entry, slot.touched, now))
            .min_by(Candidate::victim_order)
            .map(|candidate| candidate.key)
    }

    /// Remove an entry. Returns whether anything was resident.
    pub fn remove(&self, key: &str) -> bool {
        self.state.lock().take(key).is_some()
    }

    /// True if a valid entry is resident; expired entries are removed.
    pub fn contains_key(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        let expired = match state.entries.get(key) {
            None => return false,
            Some(slot) => slot.entry.is_expired(),
        };
        if expired {
            state.take(key);
        }
        !expired
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.current_size = 0;
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        let mut state = self.state.lock();
        let now = now_millis();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.take(key);
        }
        expired.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Sum of resident entry sizes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.state.lock().current_size
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    #[must_use]
    pub fn stats(&self) -> TierStats {
        let state = self.state.lock();
        TierStats {
            entries: state.entries.len(),
            bytes: state.current_size as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Priority;
    use serde_json::json;
    use std::time::Duration;

    fn entry(key: &str, bytes: usize, priority: Priority) -> Entry {
        Entry::new(key, json!("x".repeat(bytes)), None, priority)
    }

    fn expired(key: &str, bytes: usize) -> Entry {
        let mut e = Entry::new(key, json!("x".repeat(bytes)), Some(Duration::from_millis(1)), Priority::Medium);
        e.backdate(1_000);
        e
    }

    #[test]
    fn test_put_and_get() {
        let tier = FastTier::new(1_000);
        tier.put(entry("a", 10, Priority::Low));

        let got = tier.get("a").unwrap();
        assert_eq!(got.key(), "a");
        assert_eq!(got.access_count(), 1);
        assert_eq!(tier.size_bytes(), 10);
        assert!(tier.get("missing").is_none());
    }

    #[test]
    fn test_replace_subtracts_old_size() {
        let tier = FastTier::new(1_000);
        tier.put(entry("a", 10, Priority::Low));
        tier.put(entry("a", 25, Priority::Low));

        assert_eq!(tier.len(), 1);
        assert_eq!(tier.size_bytes(), 25);
    }

    #[test]
    fn test_third_insert_evicts_oldest() {
        let tier = FastTier::new(100);
        tier.put(entry("A", 40, Priority::Low));
        tier.put(entry("B", 40, Priority::Low));
        let evicted = tier.put(entry("C", 40, Priority::Low));

        assert_eq!(evicted, 1);
        assert!(!tier.contains_key("A"));
        assert!(tier.contains_key("B"));
        assert!(tier.contains_key("C"));
        assert_eq!(tier.size_bytes(), 80);
    }

    #[test]
    fn test_recent_read_protects_entry() {
        let tier = FastTier::new(100);
        tier.put(entry("A", 40, Priority::Low));
        tier.put(entry("B", 40, Priority::Low));
        tier.get("A");
        tier.put(entry("C", 40, Priority::Low));

        assert!(tier.contains_key("A"));
        assert!(!tier.contains_key("B"));
    }

    #[test]
    fn test_lowest_priority_evicted_first() {
        let tier = FastTier::new(100);
        tier.put(entry("high", 40, Priority::High));
        tier.put(entry("low", 40, Priority::Low));
        tier.put(entry("medium", 40, Priority::Medium));

        assert!(!tier.contains_key("low"));
        assert!(tier.contains_key("high"));
        assert!(tier.contains_key("medium"));
    }

    #[test]
    fn test_one_insert_can_evict_several() {
        let tier = FastTier::new(100);
        for key in ["a", "b", "c", "d", "e"] {
            tier.put(entry(key, 20, Priority::Low));
        }
        let evicted = tier.put(entry("big", 70, Priority::Low));

        assert_eq!(evicted, 4);
        assert_eq!(tier.len(), 2);
        assert!(tier.contains_key("e"));
        assert!(tier.size_bytes() <= 100);
    }

    #[test]
    fn test_oversized_entry_is_admitted_alone() {
        let tier = FastTier::new(100);
        tier.put(entry("a", 30, Priority::High));
        tier.put(entry("b", 30, Priority::High));
        let evicted = tier.put(entry("huge", 500, Priority::Low));

        assert_eq!(evicted, 2);
        assert_eq!(tier.len(), 1);
        assert!(tier.contains_key("huge"));
        assert_eq!(tier.size_bytes(), 500);
    }

    #[test]
    fn test_expired_get_removes_entry() {
        let tier = FastTier::new(1_000);
        tier.put(expired("old", 10));

        assert!(tier.get("old").is_none());
        assert!(tier.peek("old").is_none());
        assert_eq!(tier.size_bytes(), 0);
    }

    #[test]
    fn test_contains_key_false_for_expired() {
        let tier = FastTier::new(1_000);
        tier.put(expired("old", 10));
        assert!(!tier.contains_key("old"));
        assert!(tier.is_empty());
    }

    #[test]
    fn test_clear_expired_counts_removed() {
        let tier = FastTier::new(1_000);
        tier.put(expired("x", 10));
        tier.put(expired("y", 10));
        tier.put(entry("z", 10, Priority::Medium));

        assert_eq!(tier.clear_expired(), 2);
        assert_eq!(tier.len(), 1);
        assert_eq!(tier.size_bytes(), 10);
        assert_eq!(tier.clear_expired(), 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let tier = FastTier::new(1_000);
        tier.put(entry("a", 10, Priority::Medium));
        tier.put(entry("b", 10, Priority::Medium));

        assert!(tier.remove("a"));
        assert!(!tier.remove("a"));
        assert_eq!(tier.size_bytes(), 10);

        tier.clear();
        assert!(tier.is_empty());
        assert_eq!(tier.stats(), TierStats { entries: 0, bytes: 0 });
    }

    #[test]
    fn test_peek_does_not_record_access() {
        let tier = FastTier::new(1_000);
        tier.put(entry("a", 10, Priority::Medium));

        assert_eq!(tier.peek("a").unwrap().access_count(), 0);
        assert_eq!(tier.peek("a").unwrap().access_count(), 0);
    }

    #[test]
    fn test_concurrent_puts_keep_size_consistent() {
        use std::sync::Arc;

        let tier = Arc::new(FastTier::new(2_000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let tier = tier.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        tier.put(entry(&format!("{}-{}", t, i % 50), 10 + i % 7, Priority::Low));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let resident: usize = (0..8)
            .flat_map(|t| (0..50).map(move |i| format!("{}-{}", t, i)))
            .filter_map(|key| tier.peek(&key))
            .map(|e| e.size())
            .sum();
        assert_eq!(resident, tier.size_bytes());
        assert!(tier.size_bytes() <= 2_000);
    }
}
