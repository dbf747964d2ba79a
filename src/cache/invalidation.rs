//! Invalidation coordinator.
//!
//! Every mutation produces a [`MutationEvent`]; the coordinator turns it into
//! the exact set of keys to evict: the entity's single-value keys in every
//! projection, plus every registered page key in every scope the entity can
//! appear under. Deletions additionally drop the scopes the entity itself
//! anchors (a deleted pin's comment lists, a deleted board's pin lists), so a
//! delete always evicts strictly more than an update.
//!
//! Eviction is best-effort cleanup: if the store is unreachable, the mutation
//! is still reported successful and the failure is surfaced to logs and
//! metrics so the stale-serving window can be diagnosed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{info, warn};
use uuid::Uuid;

use super::config::CacheConfig;
use super::keys::{CacheKey, EntityTag, Projection, entity_key};
use super::registry::{EntityScope, InvalidationRegistry};
use super::store::CacheStore;

const METRIC_CACHE_INVALIDATED_KEYS: &str = "pinboard_cache_invalidated_keys_total";
const METRIC_CACHE_INVALIDATION_FAILURE: &str = "pinboard_cache_invalidation_failure_total";

/// A successful mutation, described with enough context to resolve every
/// affected cache key.
///
/// Upsert events for pins carry the hashtags of both the old and the new
/// record (the policy unions them), and the previous board when the pin
/// moved, so lists on both sides of the move are evicted.
///
/// Delete events carry their parent identities as options: when the deleted
/// record could not be recovered, the parent scopes are simply skipped
/// rather than resolved against a fabricated identity.
#[derive(Debug, Clone)]
pub enum MutationEvent {
    BoardUpserted {
        id: Uuid,
        owner_id: Uuid,
    },
    BoardDeleted {
        id: Uuid,
        owner_id: Option<Uuid>,
    },
    PinUpserted {
        id: Uuid,
        board_id: Uuid,
        author_id: Uuid,
        hashtags: Vec<String>,
        previous_board_id: Option<Uuid>,
    },
    PinDeleted {
        id: Uuid,
        board_id: Option<Uuid>,
        author_id: Option<Uuid>,
        hashtags: Vec<String>,
    },
    CommentUpserted {
        id: Uuid,
        pin_id: Uuid,
    },
    CommentDeleted {
        id: Uuid,
        pin_id: Option<Uuid>,
    },
    SubCommentUpserted {
        id: Uuid,
        comment_id: Uuid,
    },
    SubCommentDeleted {
        id: Uuid,
        comment_id: Option<Uuid>,
    },
    MediaUpserted {
        id: Uuid,
        pin_id: Uuid,
    },
    MediaDeleted {
        id: Uuid,
        pin_id: Option<Uuid>,
    },
}

impl MutationEvent {
    fn is_delete(&self) -> bool {
        matches!(
            self,
            MutationEvent::BoardDeleted { .. }
                | MutationEvent::PinDeleted { .. }
                | MutationEvent::CommentDeleted { .. }
                | MutationEvent::SubCommentDeleted { .. }
                | MutationEvent::MediaDeleted { .. }
        )
    }

    /// The entity's own single-value keys. Board and Pin carry a second
    /// `details` projection; both shapes must go together.
    fn single_keys(&self) -> Vec<CacheKey> {
        match self {
            MutationEvent::BoardUpserted { id, .. } | MutationEvent::BoardDeleted { id, .. } => {
                vec![
                    entity_key(EntityTag::Board, *id, Projection::Basic),
                    entity_key(EntityTag::Board, *id, Projection::Details),
                ]
            }
            MutationEvent::PinUpserted { id, .. } | MutationEvent::PinDeleted { id, .. } => vec![
                entity_key(EntityTag::Pin, *id, Projection::Basic),
                entity_key(EntityTag::Pin, *id, Projection::Details),
            ],
            MutationEvent::CommentUpserted { id, .. }
            | MutationEvent::CommentDeleted { id, .. } => {
                vec![entity_key(EntityTag::Comment, *id, Projection::Basic)]
            }
            MutationEvent::SubCommentUpserted { id, .. }
            | MutationEvent::SubCommentDeleted { id, .. } => {
                vec![entity_key(EntityTag::SubComment, *id, Projection::Basic)]
            }
            MutationEvent::MediaUpserted { id, .. } | MutationEvent::MediaDeleted { id, .. } => {
                vec![entity_key(EntityTag::Media, *id, Projection::Basic)]
            }
        }
    }

    /// Scopes whose lists could include this entity. Unknown parents on
    /// delete events contribute no scope.
    fn touched_scopes(&self) -> Vec<EntityScope> {
        match self {
            MutationEvent::BoardUpserted { owner_id, .. } => vec![
                EntityScope::BoardsByOwner(*owner_id),
                EntityScope::BoardsNewest,
            ],
            MutationEvent::BoardDeleted { owner_id, .. } => {
                let mut scopes = vec![EntityScope::BoardsNewest];
                if let Some(owner) = owner_id {
                    scopes.push(EntityScope::BoardsByOwner(*owner));
                }
                scopes
            }
            MutationEvent::PinUpserted {
                board_id,
                author_id,
                hashtags,
                previous_board_id,
                ..
            } => {
                let mut scopes = vec![
                    EntityScope::PinsByBoard(*board_id),
                    EntityScope::PinsByAuthor(*author_id),
                    EntityScope::PinsNewest,
                ];
                if let Some(previous) = previous_board_id {
                    scopes.push(EntityScope::PinsByBoard(*previous));
                }
                scopes.extend(
                    hashtags
                        .iter()
                        .map(|tag| EntityScope::PinsByHashtag(tag.clone())),
                );
                scopes
            }
            MutationEvent::PinDeleted {
                board_id,
                author_id,
                hashtags,
                ..
            } => {
                let mut scopes = vec![EntityScope::PinsNewest];
                if let Some(board) = board_id {
                    scopes.push(EntityScope::PinsByBoard(*board));
                }
                if let Some(author) = author_id {
                    scopes.push(EntityScope::PinsByAuthor(*author));
                }
                scopes.extend(
                    hashtags
                        .iter()
                        .map(|tag| EntityScope::PinsByHashtag(tag.clone())),
                );
                scopes
            }
            MutationEvent::CommentUpserted { pin_id, .. } => {
                vec![EntityScope::CommentsByPin(*pin_id)]
            }
            MutationEvent::CommentDeleted { pin_id, .. } => pin_id
                .map(EntityScope::CommentsByPin)
                .into_iter()
                .collect(),
            MutationEvent::SubCommentUpserted { comment_id, .. } => {
                vec![EntityScope::SubCommentsByComment(*comment_id)]
            }
            MutationEvent::SubCommentDeleted { comment_id, .. } => comment_id
                .map(EntityScope::SubCommentsByComment)
                .into_iter()
                .collect(),
            MutationEvent::MediaUpserted { pin_id, .. } => {
                vec![EntityScope::MediaByPin(*pin_id)]
            }
            MutationEvent::MediaDeleted { pin_id, .. } => {
                pin_id.map(EntityScope::MediaByPin).into_iter().collect()
            }
        }
    }

    /// Scopes anchored by the entity itself, dropped entirely on deletion.
    fn anchored_scopes(&self) -> Vec<EntityScope> {
        match self {
            MutationEvent::BoardDeleted { id, .. } => vec![EntityScope::PinsByBoard(*id)],
            MutationEvent::PinDeleted { id, .. } => vec![
                EntityScope::CommentsByPin(*id),
                EntityScope::MediaByPin(*id),
            ],
            MutationEvent::CommentDeleted { id, .. } => {
                vec![EntityScope::SubCommentsByComment(*id)]
            }
            _ => Vec::new(),
        }
    }
}

/// Resolves mutation events to affected keys and evicts them.
pub struct InvalidationCoordinator {
    store: Arc<dyn CacheStore>,
    registry: Arc<InvalidationRegistry>,
    op_timeout: Duration,
    enabled: bool,
}

impl InvalidationCoordinator {
    pub fn new(
        store: Arc<dyn CacheStore>,
        registry: Arc<InvalidationRegistry>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            store,
            registry,
            op_timeout: config.op_timeout(),
            enabled: config.enabled,
        }
    }

    /// The full key set a mutation must evict, resolved through the registry.
    pub fn affected_keys(&self, event: &MutationEvent) -> HashSet<CacheKey> {
        let mut keys: HashSet<CacheKey> = event.single_keys().into_iter().collect();
        for scope in event.touched_scopes() {
            keys.extend(self.registry.keys_for_scope(&scope));
        }
        for scope in event.anchored_scopes() {
            keys.extend(self.registry.keys_for_scope(&scope));
        }
        keys
    }

    /// Apply a mutation event: resolve affected keys, evict them, and prune
    /// the registry. On deletion, anchored scopes are dropped wholesale.
    pub async fn apply(&self, event: &MutationEvent) {
        if !self.enabled {
            return;
        }

        let keys = self.affected_keys(event);

        info!(
            event = ?event,
            key_count = keys.len(),
            "Applying cache invalidation"
        );

        self.invalidate(keys).await;

        if event.is_delete() {
            for scope in event.anchored_scopes() {
                self.registry.drop_scope(&scope);
            }
        }
    }

    /// Evict a set of keys from the store, best-effort and idempotent.
    ///
    /// Registry entries for the keys are pruned regardless of store outcome:
    /// a page that later re-materializes re-registers itself.
    pub async fn invalidate(&self, keys: HashSet<CacheKey>) {
        if !self.enabled || keys.is_empty() {
            return;
        }

        let ordered: Vec<CacheKey> = keys.into_iter().collect();

        match tokio::time::timeout(self.op_timeout, self.store.delete(&ordered)).await {
            Ok(Ok(())) => {
                counter!(METRIC_CACHE_INVALIDATED_KEYS).increment(ordered.len() as u64);
            }
            Ok(Err(err)) => {
                counter!(METRIC_CACHE_INVALIDATION_FAILURE).increment(1);
                warn!(
                    key_count = ordered.len(),
                    error = %err,
                    "Cache invalidation failed; entries will stale-serve until TTL expiry"
                );
            }
            Err(_) => {
                counter!(METRIC_CACHE_INVALIDATION_FAILURE).increment(1);
                warn!(
                    key_count = ordered.len(),
                    "Cache invalidation timed out; entries will stale-serve until TTL expiry"
                );
            }
        }

        for key in &ordered {
            self.registry.unregister(key);
        }
    }

    pub fn registry(&self) -> &Arc<InvalidationRegistry> {
        &self.registry
    }
}
