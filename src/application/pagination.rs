//! Offset pagination helpers.
//!
//! Validation lives here, at the service boundary: the cache engines assume a
//! `PageRequest` is already well-formed and never re-check it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard ceiling on page size, shared by every entity family.
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page limit must be greater than zero")]
    ZeroLimit,
    #[error("page limit {limit} exceeds maximum of {max}")]
    LimitTooLarge { limit: u32, max: u32 },
}

/// A validated (limit, offset) window into a filtered list.
///
/// Offsets past the end of the underlying result are legal and yield an empty
/// page, never an error. Unsigned fields make negative inputs unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    limit: u32,
    offset: u32,
}

impl PageRequest {
    /// Build a page request, rejecting invalid limits.
    pub fn new(limit: u32, offset: u32) -> Result<Self, PaginationError> {
        if limit == 0 {
            return Err(PaginationError::ZeroLimit);
        }
        if limit > MAX_PAGE_LIMIT {
            return Err(PaginationError::LimitTooLarge {
                limit,
                max: MAX_PAGE_LIMIT,
            });
        }
        Ok(Self { limit, offset })
    }

    /// First page with the given limit.
    pub fn first(limit: u32) -> Result<Self, PaginationError> {
        Self::new(limit, 0)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }
}
