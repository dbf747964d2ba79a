//! Pinboard cache-aside layer.
//!
//! Serves entity reads from a fast shared store backed by the slower
//! system-of-record, and keeps the two consistent under concurrent
//! reads and writes:
//!
//! - **keys**: typed, deterministic cache key derivation
//! - **engine**: get-or-load for single values and exact list pages
//! - **registry** + **invalidation**: scope-indexed eviction on mutation
//! - **policies**: transparent per-entity service wrappers
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `pinboard.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! board_ttl_secs = 7200
//! op_timeout_ms = 250
//! # ... see config.rs for all options
//! ```

mod config;
mod engine;
mod invalidation;
mod keys;
pub(crate) mod lock;
mod policies;
mod registry;
mod store;

pub use config::CacheConfig;
pub use engine::CacheAside;
pub use invalidation::{InvalidationCoordinator, MutationEvent};
pub use keys::{CacheKey, EntityTag, KeyWriter, ListFilterKey, Projection, entity_key, list_key};
pub use policies::{
    CachedBoardsService, CachedCommentsService, CachedMediaService, CachedPinsService,
    CachedSubCommentsService,
};
pub use registry::{EntityScope, InvalidationRegistry};
pub use store::{CacheStore, StoreError};
