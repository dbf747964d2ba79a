//! Scope registry: the secondary index behind list invalidation.
//!
//! List cache keys are high-cardinality (one per filter, limit, offset), so a
//! mutation cannot enumerate them by construction. Instead, every materialized
//! page key is registered under the [`EntityScope`]s its filter covers, and a
//! mutation resolves its scopes to the exact set of keys to evict. This is
//! the deliberate replacement for prefix/glob deletes, which most stores
//! cannot do in a single call.
//!
//! Key cardinality is client-controlled, so the index is capped the same way
//! the store is: keys are tracked in an LRU and the least recently registered
//! one is detached from all of its scopes when the cap is hit. Every list
//! read re-registers its key, so live pages stay resident and keys whose
//! store entries expired or were evicted age out instead of pinning the
//! index forever.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::RwLock;

use lru::LruCache;
use uuid::Uuid;

use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

/// Default cap on registered page keys, sized to comfortably exceed the
/// default store capacity so the index never evicts a key the store still
/// holds.
const DEFAULT_KEY_CAPACITY: usize = 8192;

/// A family of list queries that one entity mutation can affect.
///
/// A pin mutation touches the newest feed, its board's list, its author's
/// list, and one list per hashtag it carries. A filter combining several
/// fields registers its page keys under each of them, so whichever side
/// changes, the page is found and evicted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityScope {
    BoardsByOwner(Uuid),
    BoardsNewest,
    PinsByBoard(Uuid),
    PinsByAuthor(Uuid),
    PinsByHashtag(String),
    PinsNewest,
    CommentsByPin(Uuid),
    SubCommentsByComment(Uuid),
    MediaByPin(Uuid),
}

struct Index {
    scope_to_keys: HashMap<EntityScope, HashSet<CacheKey>>,
    key_to_scopes: LruCache<CacheKey, HashSet<EntityScope>>,
}

impl Index {
    /// Remove a key from each of the given scope sets, dropping scope
    /// entries that become empty.
    fn detach(&mut self, key: &CacheKey, scopes: &HashSet<EntityScope>) {
        for scope in scopes {
            if let Some(keys) = self.scope_to_keys.get_mut(scope) {
                keys.remove(key);
                if keys.is_empty() {
                    self.scope_to_keys.remove(scope);
                }
            }
        }
    }
}

/// Bidirectional scope ↔ key index, capped at a fixed number of keys.
pub struct InvalidationRegistry {
    index: RwLock<Index>,
}

impl InvalidationRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_KEY_CAPACITY)
    }

    /// An index holding at most `capacity` keys (clamped to at least one).
    /// Overflow detaches the least recently registered key from all of its
    /// scopes; the orphaned store entry simply expires by TTL.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            index: RwLock::new(Index {
                scope_to_keys: HashMap::new(),
                key_to_scopes: LruCache::new(capacity),
            }),
        }
    }

    /// Register a materialized page key under every scope its filter covers.
    ///
    /// Registration is idempotent and refreshes the key's recency;
    /// re-materializing a page after eviction re-registers the same mappings.
    pub fn register(&self, key: CacheKey, scopes: Vec<EntityScope>) {
        if scopes.is_empty() {
            return;
        }
        let mut index = rw_write(&self.index, SOURCE, "register");

        for scope in &scopes {
            index
                .scope_to_keys
                .entry(scope.clone())
                .or_default()
                .insert(key.clone());
        }
        if index.key_to_scopes.contains(&key) {
            if let Some(existing) = index.key_to_scopes.get_mut(&key) {
                existing.extend(scopes);
            }
        } else if let Some((evicted_key, evicted_scopes)) = index
            .key_to_scopes
            .push(key, scopes.into_iter().collect())
        {
            index.detach(&evicted_key, &evicted_scopes);
        }
    }

    /// All keys currently registered under a scope.
    pub fn keys_for_scope(&self, scope: &EntityScope) -> HashSet<CacheKey> {
        rw_read(&self.index, SOURCE, "keys_for_scope")
            .scope_to_keys
            .get(scope)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove one key from the index, cleaning up scope mappings that become
    /// empty. Called after the key has been evicted from the store.
    pub fn unregister(&self, key: &CacheKey) {
        let mut index = rw_write(&self.index, SOURCE, "unregister");
        if let Some(scopes) = index.key_to_scopes.pop(key) {
            index.detach(key, &scopes);
        }
    }

    /// Drop an entire scope, returning the keys that were registered under it.
    ///
    /// Used on entity deletion: the scope itself ceases to exist (e.g. the
    /// comments of a deleted pin), so its mappings go with it.
    pub fn drop_scope(&self, scope: &EntityScope) -> HashSet<CacheKey> {
        let mut index = rw_write(&self.index, SOURCE, "drop_scope");

        let keys = index.scope_to_keys.remove(scope).unwrap_or_default();
        for key in &keys {
            let now_empty = match index.key_to_scopes.peek_mut(key) {
                Some(scopes) => {
                    scopes.remove(scope);
                    scopes.is_empty()
                }
                None => false,
            };
            if now_empty {
                index.key_to_scopes.pop(key);
            }
        }
        keys
    }

    pub fn clear(&self) {
        let mut index = rw_write(&self.index, SOURCE, "clear");
        index.scope_to_keys.clear();
        index.key_to_scopes.clear();
    }

    pub fn scope_count(&self) -> usize {
        rw_read(&self.index, SOURCE, "scope_count")
            .scope_to_keys
            .len()
    }

    pub fn key_count(&self) -> usize {
        rw_read(&self.index, SOURCE, "key_count").key_to_scopes.len()
    }
}

impl Default for InvalidationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
