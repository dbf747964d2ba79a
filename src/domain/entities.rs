//! Entity records as loaded from the system-of-record.
//!
//! These are the cacheable shapes: plain data, serde-serializable, cheap to
//! clone. Board and Pin additionally have a `*Details` projection carrying
//! derived counts; both projections are cached under separate keys and must
//! be evicted together on mutation.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::types::MediaKind;

/// A board owned by a user, grouping pins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Board with derived counts. Never eagerly refreshed after a write because
/// the counts come from separate aggregate queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardDetails {
    pub board: BoardRecord,
    pub pin_count: u64,
    pub follower_count: u64,
}

/// A pin posted to a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinRecord {
    pub id: Uuid,
    pub board_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub hashtags: Vec<String>,
    pub media_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Pin with derived counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinDetails {
    pub pin: PinRecord,
    pub comment_count: u64,
    pub like_count: u64,
}

/// A top-level comment on a pin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub pin_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A reply to a top-level comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCommentRecord {
    pub id: Uuid,
    pub comment_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Metadata for a media attachment. The bytes themselves live in external
/// file storage and are out of scope here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: Uuid,
    pub pin_id: Uuid,
    pub kind: MediaKind,
    pub content_type: String,
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub created_at: OffsetDateTime,
}
