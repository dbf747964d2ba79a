//! Cache policy for media metadata.
//!
//! Media records are immutable once attached; the write surface is
//! create/delete only, so invalidation here is the simplest of the policies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::repos::{CreateMediaParams, MediaQueryFilter, MediaService, RepoError};
use crate::domain::entities::MediaRecord;

use super::super::config::CacheConfig;
use super::super::engine::CacheAside;
use super::super::invalidation::{InvalidationCoordinator, MutationEvent};
use super::super::keys::{EntityTag, Projection, entity_key, list_key};
use super::media_filter_scopes;

/// Transparent caching wrapper around a [`MediaService`].
pub struct CachedMediaService {
    inner: Arc<dyn MediaService>,
    engine: Arc<CacheAside>,
    coordinator: Arc<InvalidationCoordinator>,
    ttl: Duration,
}

impl CachedMediaService {
    pub fn new(
        inner: Arc<dyn MediaService>,
        engine: Arc<CacheAside>,
        coordinator: Arc<InvalidationCoordinator>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            inner,
            engine,
            coordinator,
            ttl: config.ttl_for(EntityTag::Media),
        }
    }

    async fn prior_record(&self, id: Uuid) -> Option<MediaRecord> {
        let key = entity_key(EntityTag::Media, id, Projection::Basic);
        match self.engine.peek(&key).await {
            Some(record) => Some(record),
            None => self.inner.find_by_id(id).await.ok(),
        }
    }
}

#[async_trait]
impl MediaService for CachedMediaService {
    async fn find_by_id(&self, id: Uuid) -> Result<MediaRecord, RepoError> {
        let key = entity_key(EntityTag::Media, id, Projection::Basic);
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

    async fn list_media(
        &self,
        filter: &MediaQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<MediaRecord>, RepoError> {
        let key = list_key(EntityTag::Media, filter, page.limit(), page.offset());
        if self.engine.is_enabled() {
            self.coordinator
                .registry()
                .register(key.clone(), media_filter_scopes(filter));
        }
        let inner = self.inner.clone();
        let filter = filter.clone();
        self.engine
            .get_or_load_page(&key, self.ttl, move || async move {
                inner.list_media(&filter, page).await
            })
            .await
    }

    async fn create_media(&self, params: CreateMediaParams) -> Result<MediaRecord, RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.create_media(params).await;
        }
        let created = self.inner.create_media(params).await?;
        self.coordinator
            .apply(&MutationEvent::MediaUpserted {
                id: created.id,
                pin_id: created.pin_id,
            })
            .await;
        let key = entity_key(EntityTag::Media, created.id, Projection::Basic);
        self.engine.refresh(&key, &created, self.ttl).await;
        Ok(created)
    }

    async fn delete_media(&self, id: Uuid) -> Result<(), RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.delete_media(id).await;
        }
        let prior = self.prior_record(id).await;
        self.inner.delete_media(id).await?;
        let pin_id = prior.map(|record| record.pin_id);
        self.coordinator
            .apply(&MutationEvent::MediaDeleted { id, pin_id })
            .await;
        Ok(())
    }
}
