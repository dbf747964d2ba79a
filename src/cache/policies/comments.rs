//! Cache policies for comments and their replies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CommentQueryFilter, CommentsService, CreateCommentParams, CreateSubCommentParams, RepoError,
    SubCommentQueryFilter, SubCommentsService, UpdateCommentParams, UpdateSubCommentParams,
};
use crate::domain::entities::{CommentRecord, SubCommentRecord};

use super::super::config::CacheConfig;
use super::super::engine::CacheAside;
use super::super::invalidation::{InvalidationCoordinator, MutationEvent};
use super::super::keys::{EntityTag, Projection, entity_key, list_key};
use super::{comment_filter_scopes, subcomment_filter_scopes};

/// Transparent caching wrapper around a [`CommentsService`].
pub struct CachedCommentsService {
    inner: Arc<dyn CommentsService>,
    engine: Arc<CacheAside>,
    coordinator: Arc<InvalidationCoordinator>,
    ttl: Duration,
}

impl CachedCommentsService {
    pub fn new(
        inner: Arc<dyn CommentsService>,
        engine: Arc<CacheAside>,
        coordinator: Arc<InvalidationCoordinator>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            inner,
            engine,
            coordinator,
            ttl: config.ttl_for(EntityTag::Comment),
        }
    }

    async fn prior_record(&self, id: Uuid) -> Option<CommentRecord> {
        let key = entity_key(EntityTag::Comment, id, Projection::Basic);
        match self.engine.peek(&key).await {
            Some(record) => Some(record),
            None => self.inner.find_by_id(id).await.ok(),
        }
    }
}

#[async_trait]
impl CommentsService for CachedCommentsService {
    async fn find_by_id(&self, id: Uuid) -> Result<CommentRecord, RepoError> {
        let key = entity_key(EntityTag::Comment, id, Projection::Basic);
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

    async fn list_comments(
        &self,
        filter: &CommentQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let key = list_key(EntityTag::Comment, filter, page.limit(), page.offset());
        if self.engine.is_enabled() {
            self.coordinator
                .registry()
                .register(key.clone(), comment_filter_scopes(filter));
        }
        let inner = self.inner.clone();
        let filter = filter.clone();
        self.engine
            .get_or_load_page(&key, self.ttl, move || async move {
                inner.list_comments(&filter, page).await
            })
            .await
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.create_comment(params).await;
        }
        let created = self.inner.create_comment(params).await?;
        self.coordinator
            .apply(&MutationEvent::CommentUpserted {
                id: created.id,
                pin_id: created.pin_id,
            })
            .await;
        let key = entity_key(EntityTag::Comment, created.id, Projection::Basic);
        self.engine.refresh(&key, &created, self.ttl).await;
        Ok(created)
    }

    async fn update_comment(
        &self,
        params: UpdateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.update_comment(params).await;
        }
        let updated = self.inner.update_comment(params).await?;
        self.coordinator
            .apply(&MutationEvent::CommentUpserted {
                id: updated.id,
                pin_id: updated.pin_id,
            })
            .await;
        let key = entity_key(EntityTag::Comment, updated.id, Projection::Basic);
        self.engine.refresh(&key, &updated, self.ttl).await;
        Ok(updated)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.delete_comment(id).await;
        }
        let prior = self.prior_record(id).await;
        self.inner.delete_comment(id).await?;
        let pin_id = prior.map(|record| record.pin_id);
        self.coordinator
            .apply(&MutationEvent::CommentDeleted { id, pin_id })
            .await;
        Ok(())
    }
}

/// Transparent caching wrapper around a [`SubCommentsService`].
pub struct CachedSubCommentsService {
    inner: Arc<dyn SubCommentsService>,
    engine: Arc<CacheAside>,
    coordinator: Arc<InvalidationCoordinator>,
    ttl: Duration,
}

impl CachedSubCommentsService {
    pub fn new(
        inner: Arc<dyn SubCommentsService>,
        engine: Arc<CacheAside>,
        coordinator: Arc<InvalidationCoordinator>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            inner,
            engine,
            coordinator,
            ttl: config.ttl_for(EntityTag::SubComment),
        }
    }

    async fn prior_record(&self, id: Uuid) -> Option<SubCommentRecord> {
        let key = entity_key(EntityTag::SubComment, id, Projection::Basic);
        match self.engine.peek(&key).await {
            Some(record) => Some(record),
            None => self.inner.find_by_id(id).await.ok(),
        }
    }
}

#[async_trait]
impl SubCommentsService for CachedSubCommentsService {
    async fn find_by_id(&self, id: Uuid) -> Result<SubCommentRecord, RepoError> {
        let key = entity_key(EntityTag::SubComment, id, Projection::Basic);
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

    async fn list_subcomments(
        &self,
        filter: &SubCommentQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<SubCommentRecord>, RepoError> {
        let key = list_key(EntityTag::SubComment, filter, page.limit(), page.offset());
        if self.engine.is_enabled() {
            self.coordinator
                .registry()
                .register(key.clone(), subcomment_filter_scopes(filter));
        }
        let inner = self.inner.clone();
        let filter = filter.clone();
        self.engine
            .get_or_load_page(&key, self.ttl, move || async move {
                inner.list_subcomments(&filter, page).await
            })
            .await
    }

    async fn create_subcomment(
        &self,
        params: CreateSubCommentParams,
    ) -> Result<SubCommentRecord, RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.create_subcomment(params).await;
        }
        let created = self.inner.create_subcomment(params).await?;
        self.coordinator
            .apply(&MutationEvent::SubCommentUpserted {
                id: created.id,
                comment_id: created.comment_id,
            })
            .await;
        let key = entity_key(EntityTag::SubComment, created.id, Projection::Basic);
        self.engine.refresh(&key, &created, self.ttl).await;
        Ok(created)
    }

    async fn update_subcomment(
        &self,
        params: UpdateSubCommentParams,
    ) -> Result<SubCommentRecord, RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.update_subcomment(params).await;
        }
        let updated = self.inner.update_subcomment(params).await?;
        self.coordinator
            .apply(&MutationEvent::SubCommentUpserted {
                id: updated.id,
                comment_id: updated.comment_id,
            })
            .await;
        let key = entity_key(EntityTag::SubComment, updated.id, Projection::Basic);
        self.engine.refresh(&key, &updated, self.ttl).await;
        Ok(updated)
    }

    async fn delete_subcomment(&self, id: Uuid) -> Result<(), RepoError> {
        if !self.engine.is_enabled() {
            return self.inner.delete_subcomment(id).await;
        }
        let prior = self.prior_record(id).await;
        self.inner.delete_subcomment(id).await?;
        let comment_id = prior.map(|record| record.comment_id);
        self.coordinator
            .apply(&MutationEvent::SubCommentDeleted { id, comment_id })
            .await;
        Ok(())
    }
}
