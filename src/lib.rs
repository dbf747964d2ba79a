//! Cache-aside read layer for a pin-board backend.
//!
//! The crate wraps the system-of-record services for boards, pins, comments,
//! sub-comments and media with read-through caching decorators. Reads consult
//! the cache first and fall back to the wrapped service on a miss; successful
//! non-empty results are written back with a per-entity TTL. Writes go to the
//! wrapped service, then invalidate every cached entry the mutation could have
//! made stale through an explicit key registry, so no wildcard deletes are
//! needed at the store.
//!
//! The store is pluggable behind [`cache::CacheStore`]; a bounded in-process
//! backend ships in [`infra::memory`]. A slow or unavailable store degrades
//! the layer to pass-through rather than failing reads.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
