//! Entity service contracts.
//!
//! Each trait describes one entity family's read and write surface exactly as
//! the system-of-record adapter exposes it. The cached policies in
//! `crate::cache::policies` implement the same traits, wrapping an uncached
//! implementation, so callers cannot tell the two apart.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, PaginationError};
use crate::domain::entities::{
    BoardDetails, BoardRecord, CommentRecord, MediaRecord, PinDetails, PinRecord, SubCommentRecord,
};
use crate::domain::types::{MediaKind, SortOrder};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// True when the error is the domain-level "absent" outcome rather than a
    /// persistence failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

// ============================================================================
// Query filters
// ============================================================================
//
// Filters are part of list cache key derivation; every field below appears in
// the key, in declaration order, via `crate::cache::keys::ListFilterKey`.

#[derive(Debug, Clone, Default)]
pub struct BoardQueryFilter {
    pub owner_id: Option<Uuid>,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Default)]
pub struct PinQueryFilter {
    pub board_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
    pub hashtag: Option<String>,
    pub sort: SortOrder,
}

#[derive(Debug, Clone)]
pub struct CommentQueryFilter {
    pub pin_id: Uuid,
    pub sort: SortOrder,
}

#[derive(Debug, Clone)]
pub struct SubCommentQueryFilter {
    pub comment_id: Uuid,
    pub sort: SortOrder,
}

#[derive(Debug, Clone)]
pub struct MediaQueryFilter {
    pub pin_id: Uuid,
}

// ============================================================================
// Mutation parameters
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateBoardParams {
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct UpdateBoardParams {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct CreatePinParams {
    pub board_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub hashtags: Vec<String>,
    pub media_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdatePinParams {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub description: String,
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub pin_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct UpdateCommentParams {
    pub id: Uuid,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct CreateSubCommentParams {
    pub comment_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct UpdateSubCommentParams {
    pub id: Uuid,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct CreateMediaParams {
    pub pin_id: Uuid,
    pub kind: MediaKind,
    pub content_type: String,
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

// ============================================================================
// Service traits
// ============================================================================

#[async_trait]
pub trait BoardsService: Send + Sync {
    /// Load one board. `RepoError::NotFound` when absent.
    async fn find_by_id(&self, id: Uuid) -> Result<BoardRecord, RepoError>;

    /// Load a board with derived counts. `RepoError::NotFound` when absent.
    async fn find_details(&self, id: Uuid) -> Result<BoardDetails, RepoError>;

    /// List boards in the filter's natural order. Empty pages are valid.
    async fn list_boards(
        &self,
        filter: &BoardQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<BoardRecord>, RepoError>;

    async fn create_board(&self, params: CreateBoardParams) -> Result<BoardRecord, RepoError>;

    async fn update_board(&self, params: UpdateBoardParams) -> Result<BoardRecord, RepoError>;

    async fn delete_board(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait PinsService: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<PinRecord, RepoError>;

    async fn find_details(&self, id: Uuid) -> Result<PinDetails, RepoError>;

    async fn list_pins(
        &self,
        filter: &PinQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<PinRecord>, RepoError>;

    async fn create_pin(&self, params: CreatePinParams) -> Result<PinRecord, RepoError>;

    async fn update_pin(&self, params: UpdatePinParams) -> Result<PinRecord, RepoError>;

    async fn delete_pin(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CommentsService: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<CommentRecord, RepoError>;

    async fn list_comments(
        &self,
        filter: &CommentQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<CommentRecord>, RepoError>;

    async fn create_comment(&self, params: CreateCommentParams) -> Result<CommentRecord, RepoError>;

    async fn update_comment(&self, params: UpdateCommentParams) -> Result<CommentRecord, RepoError>;

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait SubCommentsService: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<SubCommentRecord, RepoError>;

    async fn list_subcomments(
        &self,
        filter: &SubCommentQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<SubCommentRecord>, RepoError>;

    async fn create_subcomment(
        &self,
        params: CreateSubCommentParams,
    ) -> Result<SubCommentRecord, RepoError>;

    async fn update_subcomment(
        &self,
        params: UpdateSubCommentParams,
    ) -> Result<SubCommentRecord, RepoError>;

    async fn delete_subcomment(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait MediaService: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<MediaRecord, RepoError>;

    async fn list_media(
        &self,
        filter: &MediaQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<MediaRecord>, RepoError>;

    async fn create_media(&self, params: CreateMediaParams) -> Result<MediaRecord, RepoError>;

    async fn delete_media(&self, id: Uuid) -> Result<(), RepoError>;
}
