//! Cache policy for boards.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    BoardQueryFilter, BoardsService, CreateBoardParams, RepoError, UpdateBoardParams,
};
use crate::domain::entities::{BoardDetails, BoardRecord};

use super::super::config::CacheConfig;
use super::super::engine::CacheAside;
use super::super::invalidation::{InvalidationCoordinator, MutationEvent};
use super::super::keys::{EntityTag, Projection, entity_key, list_key};
use super::board_filter_scopes;

/// Transparent caching wrapper around a [`BoardsService`].
pub struct CachedBoardsService {
    inner: Arc<dyn BoardsService>,
    engine: Arc<CacheAside>,
    coordinator: Arc<InvalidationCoordinator>,
    ttl: Duration,
}

impl CachedBoardsService {
    pub fn new(
        inner: Arc<dyn BoardsService>,
        engine: Arc<CacheAside>,
        coordinator: Arc<InvalidationCoordinator>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            inner,
            engine,
            coordinator,
            ttl: config.ttl_for(EntityTag::Board),
        }
    }

    /// Previously known record, from cache if possible, otherwise from the
    /// system-of-record. Needed before a delete to resolve owner scopes.
    async fn prior_record(&self, id: Uuid) -> Option<BoardRecord> {
        let key = entity_key(EntityTag::Board, id, Projection::Basic);
        match self.engine.peek(&key).await {
            Some(record) => Some(record),
            None => self.inner.find_by_id(id).await.ok(),
        }
    }
}

#[async_trait]
impl BoardsService for CachedBoardsService {
    async fn find_by_id(&self, id: Uuid) -> Result<BoardRecord, RepoError> {
        let key = entity_key(EntityTag::Board, id, Projection::Basic);
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

    async fn find_details(&self, id: Uuid) -> Result<BoardDetails, RepoError> {
        let key = entity_key(EntityTag::Board, id, Projection::Details);
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

    async fn list_boards(
        &self,
        filter: &BoardQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<BoardRecord>, RepoError> {
        let key = list_key(EntityTag::Board, filter, page.limit(), page.offset());
        if self.engine.is_enabled() {
            self.coordinator
                .registry()
                .register(key.clone(), board_filter_scopes(filter));
        }
        let inner = self.inner.clone();
        let filter = filter.clone();
        self.engine
            .get_or_load_page(&key, self.ttl, move || async move {
                inner.list_boards(&filter, page).await
            })
            .await
    }

    async fn create_board(&self, params: CreateBoardParams) -> Result<BoardRecord, RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.create_board(params).await;
        }
        let created = self.inner.create_board(params).await?;
        self.coordinator
            .apply(&MutationEvent::BoardUpserted {
                id: created.id,
                owner_id: created.owner_id,
            })
            .await;
        let key = entity_key(EntityTag::Board, created.id, Projection::Basic);
        self.engine.refresh(&key, &created, self.ttl).await;
        Ok(created)
    }

    async fn update_board(&self, params: UpdateBoardParams) -> Result<BoardRecord, RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.update_board(params).await;
        }
        let updated = self.inner.update_board(params).await?;
        self.coordinator
            .apply(&MutationEvent::BoardUpserted {
                id: updated.id,
                owner_id: updated.owner_id,
            })
            .await;
        let key = entity_key(EntityTag::Board, updated.id, Projection::Basic);
        self.engine.refresh(&key, &updated, self.ttl).await;
        Ok(updated)
    }

    async fn delete_board(&self, id: Uuid) -> Result<(), RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.delete_board(id).await;
        }
        let prior = self.prior_record(id).await;
        self.inner.delete_board(id).await?;
        let owner_id = prior.map(|record| record.owner_id);
        self.coordinator
            .apply(&MutationEvent::BoardDeleted { id, owner_id })
            .await;
        Ok(())
    }
}
