//! Per-entity cache policies.
//!
//! Each policy implements the same service trait as the uncached
//! system-of-record adapter it wraps, adding get-or-load on reads and
//! invalidate-then-refresh on writes. All caching decisions live in the
//! shared engines; these bindings only know which keys and scopes belong to
//! their entity.

mod boards;
mod comments;
mod media;
mod pins;

pub use boards::CachedBoardsService;
pub use comments::{CachedCommentsService, CachedSubCommentsService};
pub use media::CachedMediaService;
pub use pins::CachedPinsService;

use crate::application::repos::{
    BoardQueryFilter, CommentQueryFilter, MediaQueryFilter, PinQueryFilter, SubCommentQueryFilter,
};

use super::registry::EntityScope;

/// Scopes a board list page must be registered under so that every board
/// mutation that could change it resolves the page key.
pub(crate) fn board_filter_scopes(filter: &BoardQueryFilter) -> Vec<EntityScope> {
    match filter.owner_id {
        Some(owner) => vec![EntityScope::BoardsByOwner(owner)],
        None => vec![EntityScope::BoardsNewest],
    }
}

/// Scopes for a pin list page. A page filtered by several fields is
/// registered under each of them; the unfiltered feed registers under the
/// newest scope, which every pin mutation touches.
pub(crate) fn pin_filter_scopes(filter: &PinQueryFilter) -> Vec<EntityScope> {
    let mut scopes = Vec::new();
    if let Some(board) = filter.board_id {
        scopes.push(EntityScope::PinsByBoard(board));
    }
    if let Some(author) = filter.author_id {
        scopes.push(EntityScope::PinsByAuthor(author));
    }
    if let Some(tag) = &filter.hashtag {
        scopes.push(EntityScope::PinsByHashtag(tag.clone()));
    }
    if scopes.is_empty() {
        scopes.push(EntityScope::PinsNewest);
    }
    scopes
}

pub(crate) fn comment_filter_scopes(filter: &CommentQueryFilter) -> Vec<EntityScope> {
    vec![EntityScope::CommentsByPin(filter.pin_id)]
}

pub(crate) fn subcomment_filter_scopes(filter: &SubCommentQueryFilter) -> Vec<EntityScope> {
    vec![EntityScope::SubCommentsByComment(filter.comment_id)]
}

pub(crate) fn media_filter_scopes(filter: &MediaQueryFilter) -> Vec<EntityScope> {
    vec![EntityScope::MediaByPin(filter.pin_id)]
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn unfiltered_feeds_register_under_newest() {
        assert_eq!(
            board_filter_scopes(&BoardQueryFilter::default()),
            vec![EntityScope::BoardsNewest]
        );
        assert_eq!(
            pin_filter_scopes(&PinQueryFilter::default()),
            vec![EntityScope::PinsNewest]
        );
    }

    #[test]
    fn multi_field_pin_filter_registers_under_each_field() {
        let board = Uuid::new_v4();
        let filter = PinQueryFilter {
            board_id: Some(board),
            hashtag: Some("ocean".to_string()),
            ..Default::default()
        };
        let scopes = pin_filter_scopes(&filter);
        assert!(scopes.contains(&EntityScope::PinsByBoard(board)));
        assert!(scopes.contains(&EntityScope::PinsByHashtag("ocean".to_string())));
        assert!(!scopes.contains(&EntityScope::PinsNewest));
    }
}
