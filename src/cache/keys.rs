//! Typed cache key derivation.
//!
//! Every key is built through this module so the write side and the read side
//! can never disagree on a key string. Keys are deterministic: filter fields
//! are written in the fixed order each filter type declares, enum values use
//! stable textual forms, and free-text components are digested so arbitrary
//! user input cannot collide with the structural separators.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::application::repos::{
    BoardQueryFilter, CommentQueryFilter, MediaQueryFilter, PinQueryFilter, SubCommentQueryFilter,
};
use crate::domain::types::SortOrder;

/// Entity family tag, the leading segment of every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityTag {
    Board,
    Pin,
    Comment,
    SubComment,
    Media,
}

impl EntityTag {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityTag::Board => "board",
            EntityTag::Pin => "pin",
            EntityTag::Comment => "comment",
            EntityTag::SubComment => "subcomment",
            EntityTag::Media => "media",
        }
    }
}

/// Single-value projection shape.
///
/// Board and Pin are cached both as their basic record and as a details view
/// with derived counts; a mutation must evict both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
    Basic,
    Details,
}

/// Opaque, deterministically derived cache key.
///
/// Construction only happens through [`entity_key`] and [`list_key`]; the
/// inner string never leaves this crate except for transport to the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key for a single entity under one projection.
pub fn entity_key(tag: EntityTag, id: Uuid, projection: Projection) -> CacheKey {
    match projection {
        Projection::Basic => CacheKey(format!("{}:{}", tag.as_str(), id)),
        Projection::Details => CacheKey(format!("{}:{}:details", tag.as_str(), id)),
    }
}

/// Key for one exact page of a filtered list.
///
/// The (limit, offset) window is part of the key: each page is materialized
/// independently, so out-of-order page access can never corrupt a shared
/// list entry.
pub fn list_key(tag: EntityTag, filter: &impl ListFilterKey, limit: u32, offset: u32) -> CacheKey {
    let mut writer = KeyWriter::new(tag);
    filter.write_fields(&mut writer);
    CacheKey(writer.finish(limit, offset))
}

/// Incremental writer for list key segments.
///
/// Fields are appended in the order the filter type calls them, which is a
/// compile-time property of the filter, never a map iteration order.
pub struct KeyWriter {
    buf: String,
}

impl KeyWriter {
    fn new(tag: EntityTag) -> Self {
        let mut buf = String::with_capacity(96);
        buf.push_str(tag.as_str());
        buf.push_str(":list");
        Self { buf }
    }

    /// An optional identity field. Absence renders as `-` so that
    /// `{board: none}` and `{board: some}` keys always differ in shape-stable
    /// positions.
    pub fn field_id(&mut self, name: &'static str, value: Option<Uuid>) {
        self.push_raw(name, &value.map_or_else(|| "-".to_string(), |v| v.to_string()));
    }

    /// A required identity field.
    pub fn field_required_id(&mut self, name: &'static str, value: Uuid) {
        self.push_raw(name, &value.to_string());
    }

    /// A free-text field (hashtag, search term). Digested so input containing
    /// the separator characters cannot forge another key.
    pub fn field_text(&mut self, name: &'static str, value: Option<&str>) {
        match value {
            Some(text) => {
                let digest = Sha256::digest(text.as_bytes());
                self.push_raw(name, &hex::encode(digest));
            }
            None => self.push_raw(name, "-"),
        }
    }

    /// The sort order field.
    pub fn field_sort(&mut self, value: SortOrder) {
        self.push_raw("sort", value.as_str());
    }

    fn push_raw(&mut self, name: &'static str, value: &str) {
        self.buf.push(':');
        self.buf.push_str(name);
        self.buf.push('=');
        self.buf.push_str(value);
    }

    fn finish(mut self, limit: u32, offset: u32) -> String {
        self.push_raw("limit", &limit.to_string());
        self.push_raw("offset", &offset.to_string());
        self.buf
    }
}

/// Implemented by every query filter that backs a cached list.
pub trait ListFilterKey {
    fn write_fields(&self, key: &mut KeyWriter);
}

impl ListFilterKey for BoardQueryFilter {
    fn write_fields(&self, key: &mut KeyWriter) {
        key.field_id("owner", self.owner_id);
        key.field_sort(self.sort);
    }
}

impl ListFilterKey for PinQueryFilter {
    fn write_fields(&self, key: &mut KeyWriter) {
        key.field_id("board", self.board_id);
        key.field_id("author", self.author_id);
        key.field_text("tag", self.hashtag.as_deref());
        key.field_sort(self.sort);
    }
}

impl ListFilterKey for CommentQueryFilter {
    fn write_fields(&self, key: &mut KeyWriter) {
        key.field_required_id("pin", self.pin_id);
        key.field_sort(self.sort);
    }
}

impl ListFilterKey for SubCommentQueryFilter {
    fn write_fields(&self, key: &mut KeyWriter) {
        key.field_required_id("comment", self.comment_id);
        key.field_sort(self.sort);
    }
}

impl ListFilterKey for MediaQueryFilter {
    fn write_fields(&self, key: &mut KeyWriter) {
        key.field_required_id("pin", self.pin_id);
    }
}
