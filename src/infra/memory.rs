//! In-process cache backend.
//!
//! An LRU map with per-entry expiry, sized in entries rather than bytes.
//! This is the default store for single-node deployments and for tests;
//! a networked store can replace it behind [`CacheStore`] without touching
//! the policy layer.

use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;

use crate::cache::lock::{rw_read, rw_write};
use crate::cache::{CacheKey, CacheStore, StoreError};
use crate::config::StoreSettings;

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Bounded in-memory [`CacheStore`] backed by an LRU map.
///
/// Expired entries are dropped lazily on read, so the map can momentarily
/// hold stale entries up to its capacity; they never leave the store.
pub struct MemoryStore {
    entries: RwLock<LruCache<CacheKey, Entry>>,
}

impl MemoryStore {
    /// Builds a store holding at most `capacity` entries (clamped to 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn from_settings(settings: &StoreSettings) -> Self {
        Self::with_capacity(settings.capacity)
    }

    /// Number of live (possibly expired-but-unswept) entries.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, "memory_store", "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, "memory_store", "get");
        match entries.get(key) {
            Some(entry) if entry.expired(now) => {
                entries.pop(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        rw_write(&self.entries, "memory_store", "set").put(key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, keys: &[CacheKey]) -> Result<(), StoreError> {
        let mut entries = rw_write(&self.entries, "memory_store", "delete");
        for key in keys {
            entries.pop(key);
        }
        Ok(())
    }
}
