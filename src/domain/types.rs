//! Shared value types used across entity records and query filters.

use serde::{Deserialize, Serialize};

/// Natural ordering for list queries.
///
/// The cached copy of a list must preserve the system-of-record's order for
/// the same filter, so the sort order is part of every list cache key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Newest first (descending creation time). The default everywhere.
    #[default]
    Newest,
    /// Oldest first (ascending creation time).
    Oldest,
}

impl SortOrder {
    /// Stable textual form used in cache key derivation.
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
        }
    }
}

/// Media attachment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}
