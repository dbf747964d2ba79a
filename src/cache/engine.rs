//! Cache-aside engines.
//!
//! One engine serves both shapes the policies need:
//!
//! - **single value**: get-or-load one entity record by key
//! - **page**: get-or-load one exact (filter, limit, offset) page of a list
//!
//! Pages are cached whole under their own key. There is no shared list entry
//! to append to, so page requests in any order stay correct by construction.
//!
//! The store is advisory: every store call has its own short deadline, and on
//! error or timeout the engine falls through to the loader. Cache
//! availability never gates correctness.
//!
//! Concurrent misses for one key are coalesced behind a per-key flight lock
//! so a thundering herd produces a single system-of-record load.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use metrics::{counter, histogram};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::application::repos::RepoError;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::store::{CacheStore, StoreError};

const METRIC_CACHE_HIT: &str = "pinboard_cache_hit_total";
const METRIC_CACHE_MISS: &str = "pinboard_cache_miss_total";
const METRIC_CACHE_BYPASS: &str = "pinboard_cache_bypass_total";
const METRIC_CACHE_STORE_ERROR: &str = "pinboard_cache_store_error_total";
const METRIC_CACHE_STORE_OP_MS: &str = "pinboard_cache_store_op_ms";

/// Generic cache-aside engine shared by every per-entity policy.
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    flights: DashMap<CacheKey, Arc<Mutex<()>>>,
    op_timeout: Duration,
    enabled: bool,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            flights: DashMap::new(),
            op_timeout: config.op_timeout(),
            enabled: config.enabled,
        }
    }

    /// Whether the cache layer is active. Policies skip key registration and
    /// invalidation when it is not.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get-or-load a single value.
    ///
    /// Hit: return the cached value without invoking the loader. Miss: invoke
    /// the loader; a `Some` result is written back with `ttl`, `None` and
    /// errors are propagated untouched and never cached.
    pub async fn get_or_load<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        loader: F,
    ) -> Result<Option<T>, RepoError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Option<T>, RepoError>> + Send,
    {
        if !self.enabled {
            counter!(METRIC_CACHE_BYPASS).increment(1);
            return loader().await;
        }

        if let Some(value) = self.read::<T>(key).await {
            counter!(METRIC_CACHE_HIT, "kind" => "value").increment(1);
            return Ok(Some(value));
        }

        let flight = self.flight(key);
        let result = {
            let _guard = flight.lock().await;
            // Another task may have materialized the entry while we queued.
            if let Some(value) = self.read::<T>(key).await {
                counter!(METRIC_CACHE_HIT, "kind" => "value").increment(1);
                Ok(Some(value))
            } else {
                counter!(METRIC_CACHE_MISS, "kind" => "value").increment(1);
                let loaded = loader().await;
                if let Ok(Some(value)) = &loaded {
                    self.write(key, value, ttl).await;
                }
                loaded
            }
        };
        self.land(key, flight);
        result
    }

    /// Get-or-load one exact page of a list.
    ///
    /// The key already encodes (filter, limit, offset). Empty pages are a
    /// valid result but are never cached: an entity created a moment later
    /// must not be masked by a poisoned empty entry for the whole TTL.
    pub async fn get_or_load_page<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        loader: F,
    ) -> Result<Vec<T>, RepoError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Vec<T>, RepoError>> + Send,
    {
        if !self.enabled {
            counter!(METRIC_CACHE_BYPASS).increment(1);
            return loader().await;
        }

        if let Some(page) = self.read::<Vec<T>>(key).await {
            counter!(METRIC_CACHE_HIT, "kind" => "page").increment(1);
            return Ok(page);
        }

        let flight = self.flight(key);
        let result = {
            let _guard = flight.lock().await;
            if let Some(page) = self.read::<Vec<T>>(key).await {
                counter!(METRIC_CACHE_HIT, "kind" => "page").increment(1);
                Ok(page)
            } else {
                counter!(METRIC_CACHE_MISS, "kind" => "page").increment(1);
                let loaded = loader().await;
                if let Ok(page) = &loaded
                    && !page.is_empty()
                {
                    self.write(key, page, ttl).await;
                }
                loaded
            }
        };
        self.land(key, flight);
        result
    }

    /// Best-effort read of a cached value without loading on miss.
    ///
    /// Used by write policies to learn the previously cached state of an
    /// entity (e.g. which board a pin sat on) before invalidating.
    pub async fn peek<T>(&self, key: &CacheKey) -> Option<T>
    where
        T: DeserializeOwned,
    {
        if !self.enabled {
            return None;
        }
        self.read(key).await
    }

    /// Best-effort overwrite of a single-value entry with a fresh record.
    ///
    /// Policies call this after create/update so the common read-right-after-
    /// write pattern hits instead of missing.
    pub async fn refresh<T>(&self, key: &CacheKey, value: &T, ttl: Duration)
    where
        T: Serialize + Sync,
    {
        if !self.enabled {
            return;
        }
        self.write(key, value, ttl).await;
    }

    // ========================================================================
    // Store access with deadline and degrade-gracefully semantics
    // ========================================================================

    async fn read<T>(&self, key: &CacheKey) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(self.op_timeout, self.store.get(key)).await;
        histogram!(METRIC_CACHE_STORE_OP_MS, "op" => "get")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        let bytes = match outcome {
            Ok(Ok(found)) => found?,
            Ok(Err(err)) => {
                self.store_degraded(key, "get", &err);
                return None;
            }
            Err(_) => {
                self.store_degraded(key, "get", &StoreError::Timeout);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = %key, error = %err, "Evicting undecodable cache entry");
                self.evict_corrupt(key).await;
                None
            }
        }
    }

    async fn write<T>(&self, key: &CacheKey, value: &T, ttl: Duration)
    where
        T: Serialize + ?Sized,
    {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key = %key, error = %err, "Skipping cache write: value not serializable");
                return;
            }
        };

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(self.op_timeout, self.store.set(key, bytes, ttl)).await;
        histogram!(METRIC_CACHE_STORE_OP_MS, "op" => "set")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.store_degraded(key, "set", &err),
            Err(_) => self.store_degraded(key, "set", &StoreError::Timeout),
        }
    }

    async fn evict_corrupt(&self, key: &CacheKey) {
        let keys = [key.clone()];
        let outcome = tokio::time::timeout(self.op_timeout, self.store.delete(&keys)).await;
        if !matches!(outcome, Ok(Ok(()))) {
            debug!(key = %key, "Could not evict corrupt entry; TTL will reclaim it");
        }
    }

    fn store_degraded(&self, key: &CacheKey, op: &'static str, err: &StoreError) {
        counter!(METRIC_CACHE_STORE_ERROR, "op" => op).increment(1);
        warn!(
            key = %key,
            op,
            error = %err,
            "Cache store degraded; falling through to system-of-record"
        );
    }

    // ========================================================================
    // Per-key flight coalescing
    // ========================================================================

    fn flight(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        self.flights
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop our handle on the flight lock and prune the map entry once no
    /// other task holds it.
    fn land(&self, key: &CacheKey, flight: Arc<Mutex<()>>) {
        drop(flight);
        self.flights
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    fn inflight_keys(&self) -> usize {
        self.flights.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use uuid::Uuid;

    use super::*;
    use crate::cache::keys::{EntityTag, Projection, entity_key};
    use crate::infra::memory::MemoryStore;

    const TTL: Duration = Duration::from_secs(60);

    struct FailingStore;

    #[async_trait::async_trait]
    impl CacheStore for FailingStore {
        async fn get(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }

        async fn set(
            &self,
            _key: &CacheKey,
            _value: Vec<u8>,
            _ttl: Duration,
        ) -> Result<(), StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }

        async fn delete(&self, _keys: &[CacheKey]) -> Result<(), StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }
    }

    fn memory_engine() -> CacheAside {
        let config = CacheConfig::default();
        CacheAside::new(Arc::new(MemoryStore::with_capacity(64)), &config)
    }

    fn key() -> CacheKey {
        entity_key(EntityTag::Board, Uuid::new_v4(), Projection::Basic)
    }

    #[tokio::test]
    async fn second_read_is_a_hit_without_loader_call() {
        let engine = memory_engine();
        let key = key();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = engine
                .get_or_load(&key, TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some("hello".to_string()))
                })
                .await
                .expect("load succeeds");
            assert_eq!(value.as_deref(), Some("hello"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_result_is_not_cached() {
        let engine = memory_engine();
        let key = key();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Option<String> = engine
                .get_or_load(&key, TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
                .await
                .expect("load succeeds");
            assert!(value.is_none());
        }

        // Not-found must re-consult the system-of-record every time.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn loader_error_propagates_and_is_not_cached() {
        let engine = memory_engine();
        let key = key();

        let result: Result<Option<String>, RepoError> = engine
            .get_or_load(&key, TTL, || async {
                Err(RepoError::from_persistence("db down"))
            })
            .await;
        assert!(matches!(result, Err(RepoError::Persistence(_))));

        // The failure left nothing behind; a later good load works.
        let value = engine
            .get_or_load(&key, TTL, || async { Ok(Some(1u32)) })
            .await
            .expect("load succeeds");
        assert_eq!(value, Some(1));
    }

    #[tokio::test]
    async fn failing_store_falls_through_to_loader() {
        let config = CacheConfig::default();
        let engine = CacheAside::new(Arc::new(FailingStore), &config);
        let key = key();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = engine
                .get_or_load(&key, TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(7u64))
                })
                .await
                .expect("loader result surfaces");
            assert_eq!(value, Some(7));
        }

        // No cache available, so the loader runs on every call.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_engine_bypasses_store_entirely() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let engine = CacheAside::new(Arc::new(FailingStore), &config);
        let key = key();

        let value = engine
            .get_or_load(&key, TTL, || async { Ok(Some("direct".to_string())) })
            .await
            .expect("bypass succeeds");
        assert_eq!(value.as_deref(), Some("direct"));
    }

    #[tokio::test]
    async fn empty_page_is_returned_but_not_cached() {
        let engine = memory_engine();
        let key = key();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let page: Vec<String> = engine
                .get_or_load_page(&key, TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Vec::new())
                })
                .await
                .expect("load succeeds");
            assert!(page.is_empty());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_empty_page_is_cached_whole() {
        let engine = memory_engine();
        let key = key();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let page = engine
                .get_or_load_page(&key, TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1u32, 2, 3])
                })
                .await
                .expect("load succeeds");
            assert_eq!(page, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce_into_one_load() {
        let engine = Arc::new(memory_engine());
        let key = key();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            let key = key.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .get_or_load(&key, TTL, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(Some("shared".to_string()))
                    })
                    .await
            }));
        }

        for handle in handles {
            let value = handle.await.expect("task").expect("load");
            assert_eq!(value.as_deref(), Some("shared"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.inflight_keys(), 0);
    }

    #[tokio::test]
    async fn corrupt_entry_is_evicted_and_reloaded() {
        let store = Arc::new(MemoryStore::with_capacity(64));
        let config = CacheConfig::default();
        let engine = CacheAside::new(store.clone(), &config);
        let key = key();

        store
            .set(&key, b"not json".to_vec(), TTL)
            .await
            .expect("raw set");

        let value = engine
            .get_or_load(&key, TTL, || async { Ok(Some(42u8)) })
            .await
            .expect("load succeeds");
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn refresh_overwrites_and_peek_reads_back() {
        let engine = memory_engine();
        let key = key();

        engine.refresh(&key, &"fresh".to_string(), TTL).await;
        let peeked: Option<String> = engine.peek(&key).await;
        assert_eq!(peeked.as_deref(), Some("fresh"));
    }
}
