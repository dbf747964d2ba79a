//! Cache policy for pins.
//!
//! Pins are the most invalidation-heavy entity: a single mutation can touch
//! the newest feed, a board's list, an author's list, and one list per
//! hashtag, and an update may move the pin between boards. The prior record
//! (the cached copy when present, the system-of-record otherwise) is
//! consulted so the vacated board's lists are evicted too.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CreatePinParams, PinQueryFilter, PinsService, RepoError, UpdatePinParams,
};
use crate::domain::entities::{PinDetails, PinRecord};

use super::super::config::CacheConfig;
use super::super::engine::CacheAside;
use super::super::invalidation::{InvalidationCoordinator, MutationEvent};
use super::super::keys::{EntityTag, Projection, entity_key, list_key};
use super::pin_filter_scopes;

/// Transparent caching wrapper around a [`PinsService`].
pub struct CachedPinsService {
    inner: Arc<dyn PinsService>,
    engine: Arc<CacheAside>,
    coordinator: Arc<InvalidationCoordinator>,
    ttl: Duration,
}

impl CachedPinsService {
    pub fn new(
        inner: Arc<dyn PinsService>,
        engine: Arc<CacheAside>,
        coordinator: Arc<InvalidationCoordinator>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            inner,
            engine,
            coordinator,
            ttl: config.ttl_for(EntityTag::Pin),
        }
    }

    async fn prior_record(&self, id: Uuid) -> Option<PinRecord> {
        let key = entity_key(EntityTag::Pin, id, Projection::Basic);
        match self.engine.peek(&key).await {
            Some(record) => Some(record),
            None => self.inner.find_by_id(id).await.ok(),
        }
    }
}

#[async_trait]
impl PinsService for CachedPinsService {
    async fn find_by_id(&self, id: Uuid) -> Result<PinRecord, RepoError> {
        let key = entity_key(EntityTag::Pin, id, Projection::Basic);
        let inner = self.inner.clone();
        let found = self
            .engine
            .get_or_load(&key, self.ttl, move || async move {
                match inner.find_by_id(id).await {
                    Ok(record) => Ok(Some(record)),
                    Err(RepoError::NotFound) => Ok(None),
                    Err(err) => Err(err),
                }
            })
            .await?;
        found.ok_or(RepoError::NotFound)
    }

    async fn find_details(&self, id: Uuid) -> Result<PinDetails, RepoError> {
        let key = entity_key(EntityTag::Pin, id, Projection::Details);
        let inner = self.inner.clone();
        let found = self
            .engine
            .get_or_load(&key, self.ttl, move || async move {
                match inner.find_details(id).await {
                    Ok(details) => Ok(Some(details)),
                    Err(RepoError::NotFound) => Ok(None),
                    Err(err) => Err(err),
                }
            })
            .await?;
        found.ok_or(RepoError::NotFound)
    }

    async fn list_pins(
        &self,
        filter: &PinQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<PinRecord>, RepoError> {
        let key = list_key(EntityTag::Pin, filter, page.limit(), page.offset());
        if self.engine.is_enabled() {
            self.coordinator
                .registry()
                .register(key.clone(), pin_filter_scopes(filter));
        }
        let inner = self.inner.clone();
        let filter = filter.clone();
        self.engine
            .get_or_load_page(&key, self.ttl, move || async move {
                inner.list_pins(&filter, page).await
            })
            .await
    }

    async fn create_pin(&self, params: CreatePinParams) -> Result<PinRecord, RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.create_pin(params).await;
        }
        let created = self.inner.create_pin(params).await?;
        self.coordinator
            .apply(&MutationEvent::PinUpserted {
                id: created.id,
                board_id: created.board_id,
                author_id: created.author_id,
                hashtags: created.hashtags.clone(),
                previous_board_id: None,
            })
            .await;
        let key = entity_key(EntityTag::Pin, created.id, Projection::Basic);
        self.engine.refresh(&key, &created, self.ttl).await;
        Ok(created)
    }

    async fn update_pin(&self, params: UpdatePinParams) -> Result<PinRecord, RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.update_pin(params).await;
        }
        // Resolve the pre-update record before delegating: a board move must
        // evict the vacated board's lists even when the pin was never cached.
        let prior = self.prior_record(params.id).await;

        let updated = self.inner.update_pin(params).await?;

        // Union the old and new hashtags and note a board move, so lists on
        // both sides of the change are evicted.
        let mut hashtags = updated.hashtags.clone();
        let mut previous_board_id = None;
        if let Some(prior) = prior {
            if prior.board_id != updated.board_id {
                previous_board_id = Some(prior.board_id);
            }
            for tag in prior.hashtags {
                if !hashtags.contains(&tag) {
                    hashtags.push(tag);
                }
            }
        }

        self.coordinator
            .apply(&MutationEvent::PinUpserted {
                id: updated.id,
                board_id: updated.board_id,
                author_id: updated.author_id,
                hashtags,
                previous_board_id,
            })
            .await;
        let key = entity_key(EntityTag::Pin, updated.id, Projection::Basic);
        self.engine.refresh(&key, &updated, self.ttl).await;
        Ok(updated)
    }

    async fn delete_pin(&self, id: Uuid) -> Result<(), RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.delete_pin(id).await;
        }
        let prior = self.prior_record(id).await;
        self.inner.delete_pin(id).await?;
        let (board_id, author_id, hashtags) = match prior {
            Some(record) => (
                Some(record.board_id),
                Some(record.author_id),
                record.hashtags,
            ),
            None => (None, None, Vec::new()),
        };
        self.coordinator
            .apply(&MutationEvent::PinDeleted {
                id,
                board_id,
                author_id,
                hashtags,
            })
            .await;
        Ok(())
    }
}
