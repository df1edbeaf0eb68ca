//! Data operations: put, get, get_or_put, remove, contains_key, clear, stats.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::entry::Entry;
use crate::error::{CacheError, Result};
use crate::metrics::{LatencyTimer, TIER_DURABLE, TIER_ENGINE, TIER_FAST};
use crate::options::{Deserializer, PutOptions, Serializer};
use crate::tier::TierStats;

use super::{CacheEngine, CacheStats, EngineInner};

fn encode<V: Serialize>(value: &V, serializer: Option<&Serializer<V>>) -> Result<Value> {
    match serializer {
        Some(serialize) => Ok(Value::String(serialize(value))),
        None => serde_json::to_value(value).map_err(CacheError::codec),
    }
}

fn decode<V: DeserializeOwned>(payload: Value) -> Result<V> {
    serde_json::from_value(payload).map_err(CacheError::codec)
}

/// A custom deserializer sees the stored text; non-text payloads are handed
/// over as their JSON encoding.
fn decode_with<V>(payload: Value, deserialize: &Deserializer<V>) -> Result<V> {
    match payload {
        Value::String(text) => deserialize(&text),
        other => deserialize(&other.to_string()),
    }
}

impl CacheEngine {
    /// Store a value in the fast tier and write it through to the durable tier.
    ///
    /// `opts.ttl` and `opts.priority` fall back to the configured defaults.
    /// A failed durable write is logged and absorbed; the value is still
    /// served from the fast tier.
    #[tracing::instrument(skip(self, value, opts))]
    pub async fn put<V: Serialize>(&self, key: &str, value: &V, opts: PutOptions<'_, V>) -> Result<()> {
        let inner = self.inner()?;
        let _timer = LatencyTimer::new(TIER_ENGINE, "put");

        let payload = encode(value, opts.serializer)?;
        let ttl = opts.ttl.or_else(|| inner.config.default_ttl());
        let priority = opts.priority.unwrap_or(inner.config.default_priority);
        let entry = Entry::new(key, payload, ttl, priority);
        debug!(size = entry.size(), %priority, "Storing entry");

        inner.store(entry).await;
        Ok(())
    }

    /// Look up a value, decoding it with `serde_json`.
    ///
    /// Checks the fast tier, then the durable tier. A durable hit is copied
    /// into the fast tier before returning.
    #[tracing::instrument(skip(self), fields(tier))]
    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>> {
        let inner = self.inner()?;
        lookup(&inner, key).await.map(decode).transpose()
    }

    /// Look up a value, decoding it with a caller-supplied deserializer.
    #[tracing::instrument(skip(self, deserializer), fields(tier))]
    pub async fn get_with<V>(&self, key: &str, deserializer: &Deserializer<V>) -> Result<Option<V>> {
        let inner = self.inner()?;
        lookup(&inner, key)
            .await
            .map(|payload| decode_with(payload, deserializer))
            .transpose()
    }

    /// Return the cached value, or compute, store and return it.
    ///
    /// Not single-flight: concurrent callers that miss on the same key each
    /// run `compute`, and the last `put` wins. A failing `compute` is
    /// returned as [`CacheError::Compute`] and nothing is cached.
    #[tracing::instrument(skip(self, compute, opts), fields(tier))]
    pub async fn get_or_put<V, F, Fut, E>(&self, key: &str, compute: F, opts: PutOptions<'_, V>) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let inner = self.inner()?;

        if let Some(payload) = lookup(&inner, key).await {
            return match opts.deserializer {
                Some(deserializer) => decode_with(payload, deserializer),
                None => decode(payload),
            };
        }

        let value = compute().await.map_err(|e| CacheError::Compute(e.into()))?;
        let payload = encode(&value, opts.serializer)?;
        let ttl = opts.ttl.or_else(|| inner.config.default_ttl());
        let priority = opts.priority.unwrap_or(inner.config.default_priority);
        inner.store(Entry::new(key, payload, ttl, priority)).await;
        debug!("Computed and stored");
        Ok(value)
    }

    /// Remove a key from both tiers. Returns whether either tier held it.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let inner = self.inner()?;
        let mut removed = inner.fast.remove(key);

        if let Some(durable) = &inner.durable {
            match durable.remove(key).await {
                Ok(found) => removed |= found,
                Err(e) => {
                    warn!(error = %e, "Durable remove failed");
                    crate::metrics::record_error(TIER_DURABLE, "remove");
                }
            }
        }

        crate::metrics::record_operation(TIER_ENGINE, "remove", "success");
        Ok(removed)
    }

    /// True if either tier holds a valid (unexpired) entry. Does not count
    /// as an access.
    #[tracing::instrument(skip(self))]
    pub async fn contains_key(&self, key: &str) -> Result<bool> {
        let inner = self.inner()?;
        if inner.fast.contains_key(key) {
            return Ok(true);
        }

        let Some(durable) = &inner.durable else {
            return Ok(false);
        };
        match durable.contains_key(key).await {
            Ok(found) => Ok(found),
            Err(e) => {
                warn!(error = %e, "Durable lookup failed");
                crate::metrics::record_error(TIER_DURABLE, "contains");
                Ok(false)
            }
        }
    }

    /// Empty both tiers and reset the counters.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        let inner = self.inner()?;
        inner.fast.clear();

        if let Some(durable) = &inner.durable {
            if let Err(e) = durable.clear().await {
                warn!(error = %e, "Durable clear failed");
                crate::metrics::record_error(TIER_DURABLE, "clear");
            }
        }

        inner.counters.reset();
        crate::metrics::record_operation(TIER_ENGINE, "clear", "success");
        debug!("Cache cleared");
        Ok(())
    }

    /// Remove expired entries from both tiers now. Returns how many were
    /// removed; the count is added to `expirations`.
    #[tracing::instrument(skip(self))]
    pub async fn clear_expired(&self) -> Result<usize> {
        let inner = self.inner()?;
        Ok(inner.clear_expired().await)
    }

    /// Counters plus a live read of both tiers.
    pub async fn stats(&self) -> Result<CacheStats> {
        let inner = self.inner()?;
        let fast = inner.fast.stats();
        let (durable, disk_bytes) = match &inner.durable {
            Some(durable) => (durable_stats(durable).await, durable_disk_bytes(durable).await),
            None => (TierStats::default(), 0),
        };

        let counters = &inner.counters;
        Ok(CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            expirations: counters.expirations.load(Ordering::Relaxed),
            fast_entries: fast.entries,
            fast_bytes: fast.bytes,
            durable_entries: durable.entries,
            durable_bytes: durable.bytes,
            durable_disk_bytes: disk_bytes,
        })
    }

    /// Fast tier fill level (0.0 - 1.0, above 1.0 only for an oversized entry).
    pub fn fast_pressure(&self) -> Result<f64> {
        let inner = self.inner()?;
        let max = inner.fast.max_bytes();
        if max == 0 {
            return Ok(0.0);
        }
        Ok(inner.fast.size_bytes() as f64 / max as f64)
    }

    /// Push current tier sizes to the entry/byte gauges.
    pub async fn update_gauge_metrics(&self) -> Result<()> {
        let stats = self.stats().await?;
        crate::metrics::set_tier_entries(TIER_FAST, stats.fast_entries);
        crate::metrics::set_tier_bytes(TIER_FAST, stats.fast_bytes);
        crate::metrics::set_tier_entries(TIER_DURABLE, stats.durable_entries);
        crate::metrics::set_tier_bytes(TIER_DURABLE, stats.durable_bytes);
        Ok(())
    }

    /// The config passed to the `initialize()` call currently in effect.
    pub fn config(&self) -> Result<crate::config::CacheConfig> {
        Ok(self.inner()?.config.clone())
    }
}

/// Fast tier, then durable tier with promotion. Records hit/miss.
async fn lookup(inner: &EngineInner, key: &str) -> Option<Value> {
    let start = Instant::now();
    let span = tracing::Span::current();

    if let Some(entry) = inner.fast.get(key) {
        span.record("tier", TIER_FAST);
        inner.counters.hits.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_operation(TIER_FAST, "get", "hit");
        crate::metrics::record_latency(TIER_FAST, "get", start.elapsed());
        return Some(entry.into_value());
    }

    if let Some(durable) = &inner.durable {
        match durable.get(key).await {
            Ok(Some(entry)) => {
                let evicted = inner.fast.put(entry.clone());
                inner.record_evictions(TIER_FAST, evicted);
                span.record("tier", TIER_DURABLE);
                inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Durable hit, promoted to fast tier");
                crate::metrics::record_operation(TIER_DURABLE, "get", "hit");
                crate::metrics::record_latency(TIER_DURABLE, "get", start.elapsed());
                return Some(entry.into_value());
            }
            Ok(None) => {
                crate::metrics::record_operation(TIER_DURABLE, "get", "miss");
            }
            Err(e) => {
                warn!(error = %e, "Durable lookup failed");
                crate::metrics::record_operation(TIER_DURABLE, "get", "error");
                crate::metrics::record_error(TIER_DURABLE, "get");
            }
        }
    }

    span.record("tier", "miss");
    inner.counters.misses.fetch_add(1, Ordering::Relaxed);
    crate::metrics::record_operation(TIER_ENGINE, "get", "miss");
    None
}

async fn durable_stats(durable: &crate::tier::DurableTier) -> TierStats {
    match durable.stats().await {
        Ok(stats) => stats,
        Err(e) => {
            warn!(error = %e, "Failed to read durable tier stats");
            crate::metrics::record_error(TIER_DURABLE, "stats");
            TierStats {
                entries: 0,
                bytes: durable.size_bytes().await,
            }
        }
    }
}

async fn durable_disk_bytes(durable: &crate::tier::DurableTier) -> u64 {
    match durable.disk_bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to measure durable tier on disk");
            crate::metrics::record_error(TIER_DURABLE, "stats");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::entry::Priority;
    use crate::storage::MemoryMedium;
    use serde::Deserialize;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u32,
        name: String,
    }

    async fn ready(medium: &Arc<MemoryMedium>, config: CacheConfig) -> CacheEngine {
        let engine = CacheEngine::with_shared_medium(medium.clone());
        engine.initialize(config).await.unwrap();
        engine
    }

    fn quiet() -> CacheConfig {
        CacheConfig { sweep_interval_ms: 0, ..Default::default() }
    }

    #[tokio::test]
    async fn test_operations_before_initialize_fail() {
        let engine = CacheEngine::with_shared_medium(Arc::new(MemoryMedium::new()));

        assert!(matches!(engine.put("k", &1u8, PutOptions::default()).await, Err(CacheError::NotInitialized)));
        assert!(matches!(engine.get::<u8>("k").await, Err(CacheError::NotInitialized)));
        assert!(matches!(engine.remove("k").await, Err(CacheError::NotInitialized)));
        assert!(matches!(engine.contains_key("k").await, Err(CacheError::NotInitialized)));
        assert!(matches!(engine.clear().await, Err(CacheError::NotInitialized)));
        assert!(matches!(engine.stats().await, Err(CacheError::NotInitialized)));
        assert!(matches!(engine.fast_pressure(), Err(CacheError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_put_get_struct() {
        let medium = Arc::new(MemoryMedium::new());
        let engine = ready(&medium, quiet()).await;
        let ada = User { id: 1, name: "Ada".into() };

        engine.put("user:1", &ada, PutOptions::default()).await.unwrap();

        assert_eq!(engine.get::<User>("user:1").await.unwrap(), Some(ada));
        assert_eq!(medium.len(), 1);
    }

    #[tokio::test]
    async fn test_get_wrong_type_is_codec_error() {
        let medium = Arc::new(MemoryMedium::new());
        let engine = ready(&medium, quiet()).await;
        engine.put("k", &"text", PutOptions::default()).await.unwrap();

        assert!(matches!(engine.get::<u64>("k").await, Err(CacheError::Codec(_))));
    }

    #[tokio::test]
    async fn test_custom_serializer_round_trip() {
        let medium = Arc::new(MemoryMedium::new());
        let engine = ready(&medium, quiet()).await;

        let ser = |u: &User| format!("{}|{}", u.id, u.name);
        let de = |text: &str| -> Result<User> {
            let (id, name) = text.split_once('|').ok_or_else(|| CacheError::codec("missing separator"))?;
            Ok(User { id: id.parse().map_err(CacheError::codec)?, name: name.to_string() })
        };
        let ada = User { id: 7, name: "Ada".into() };

        engine.put("u", &ada, PutOptions::default().with_serializer(&ser)).await.unwrap();

        assert_eq!(engine.get::<String>("u").await.unwrap().as_deref(), Some("7|Ada"));
        assert_eq!(engine.get_with("u", &de).await.unwrap(), Some(ada));
    }

    #[tokio::test]
    async fn test_deserializer_sees_json_text_for_plain_values() {
        let medium = Arc::new(MemoryMedium::new());
        let engine = ready(&medium, quiet()).await;
        engine.put("n", &42u32, PutOptions::default()).await.unwrap();

        let de = |text: &str| -> Result<String> { Ok(format!("<{}>", text)) };
        assert_eq!(engine.get_with("n", &de).await.unwrap().as_deref(), Some("<42>"));
    }

    #[tokio::test]
    async fn test_durable_hit_promotes() {
        let medium = Arc::new(MemoryMedium::new());
        let engine = ready(&medium, quiet()).await;
        engine.put("k", &"v", PutOptions::default()).await.unwrap();

        let inner = engine.inner().unwrap();
        inner.fast.remove("k");
        assert!(inner.fast.peek("k").is_none());

        assert_eq!(engine.get::<String>("k").await.unwrap().as_deref(), Some("v"));
        assert!(inner.fast.peek("k").is_some());
        assert_eq!(engine.stats().await.unwrap().hits, 1);
    }

    #[tokio::test]
    async fn test_default_ttl_and_priority_applied() {
        let medium = Arc::new(MemoryMedium::new());
        let config = CacheConfig { default_ttl_ms: Some(60_000), default_priority: Priority::High, ..quiet() };
        let engine = ready(&medium, config).await;

        engine.put("k", &1u8, PutOptions::default()).await.unwrap();
        engine.put("low", &1u8, PutOptions::default().with_priority(Priority::Low)).await.unwrap();

        let inner = engine.inner().unwrap();
        let entry = inner.fast.peek("k").unwrap();
        assert_eq!(entry.priority(), Priority::High);
        assert_eq!(entry.expires_at(), Some(entry.created_at() + 60_000));
        assert_eq!(inner.fast.peek("low").unwrap().priority(), Priority::Low);
    }

    #[tokio::test]
    async fn test_get_or_put_compute_error_caches_nothing() {
        let medium = Arc::new(MemoryMedium::new());
        let engine = ready(&medium, quiet()).await;

        let result = engine
            .get_or_put("x", || async { Err::<String, _>("backend down") }, PutOptions::default())
            .await;

        assert!(matches!(result, Err(CacheError::Compute(_))));
        assert!(!engine.contains_key("x").await.unwrap());
        assert!(medium.is_empty());
    }

    #[tokio::test]
    async fn test_remove_reports_presence() {
        let medium = Arc::new(MemoryMedium::new());
        let engine = ready(&medium, quiet()).await;
        engine.put("k", &1u8, PutOptions::default()).await.unwrap();

        assert!(engine.remove("k").await.unwrap());
        assert!(!engine.remove("k").await.unwrap());
        assert!(!engine.contains_key("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_only_engine() {
        let medium = Arc::new(MemoryMedium::new());
        let engine = ready(&medium, CacheConfig { durable_enabled: false, ..quiet() }).await;

        engine.put("k", &1u8, PutOptions::default()).await.unwrap();

        assert_eq!(engine.get::<u8>("k").await.unwrap(), Some(1));
        assert!(medium.is_empty());
        assert_eq!(engine.stats().await.unwrap().durable_entries, 0);
    }

    #[tokio::test]
    async fn test_fast_pressure() {
        let medium = Arc::new(MemoryMedium::new());
        let engine = ready(&medium, CacheConfig { fast_max_bytes: 100, ..quiet() }).await;

        engine.put("k", &"x".repeat(25), PutOptions::default()).await.unwrap();

        assert!((engine.fast_pressure().unwrap() - 0.25).abs() < f64::EPSILON);
        engine.update_gauge_metrics().await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let medium = Arc::new(MemoryMedium::new());
        let engine = ready(&medium, quiet()).await;
        engine
            .put("k", &"v", PutOptions::default().with_ttl(Duration::from_millis(20)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(engine.get::<String>("k").await.unwrap(), None);
        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.durable_entries, 0);
    }
}
