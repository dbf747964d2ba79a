//! Cache configuration.
//!
//! Controls the cache-aside layer via `pinboard.toml`.

use std::time::Duration;

use serde::Deserialize;

use super::keys::EntityTag;

// Default values for cache configuration
const DEFAULT_BOARD_TTL_SECS: u64 = 7200;
const DEFAULT_PIN_TTL_SECS: u64 = 7200;
const DEFAULT_COMMENT_TTL_SECS: u64 = 1800;
const DEFAULT_SUBCOMMENT_TTL_SECS: u64 = 1800;
const DEFAULT_MEDIA_TTL_SECS: u64 = 7200;
const DEFAULT_OP_TIMEOUT_MS: u64 = 250;

/// Cache configuration from `pinboard.toml`.
///
/// `enabled = false` bypasses the cache entirely: every read goes straight to
/// the system-of-record and writes skip invalidation. Useful for tests and
/// for operating through a store outage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Per-entity default TTLs, in seconds.
    pub board_ttl_secs: u64,
    pub pin_ttl_secs: u64,
    pub comment_ttl_secs: u64,
    pub subcomment_ttl_secs: u64,
    pub media_ttl_secs: u64,
    /// Upper bound on any single store call, in milliseconds. Kept far below
    /// the system-of-record's own timeout so a slow store never makes the
    /// system slower than having no cache at all.
    pub op_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            board_ttl_secs: DEFAULT_BOARD_TTL_SECS,
            pin_ttl_secs: DEFAULT_PIN_TTL_SECS,
            comment_ttl_secs: DEFAULT_COMMENT_TTL_SECS,
            subcomment_ttl_secs: DEFAULT_SUBCOMMENT_TTL_SECS,
            media_ttl_secs: DEFAULT_MEDIA_TTL_SECS,
            op_timeout_ms: DEFAULT_OP_TIMEOUT_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            board_ttl_secs: settings.board_ttl_secs,
            pin_ttl_secs: settings.pin_ttl_secs,
            comment_ttl_secs: settings.comment_ttl_secs,
            subcomment_ttl_secs: settings.subcomment_ttl_secs,
            media_ttl_secs: settings.media_ttl_secs,
            op_timeout_ms: settings.op_timeout_ms,
        }
    }
}

impl CacheConfig {
    /// Default TTL for one entity family.
    pub fn ttl_for(&self, tag: EntityTag) -> Duration {
        let secs = match tag {
            EntityTag::Board => self.board_ttl_secs,
            EntityTag::Pin => self.pin_ttl_secs,
            EntityTag::Comment => self.comment_ttl_secs,
            EntityTag::SubComment => self.subcomment_ttl_secs,
            EntityTag::Media => self.media_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    /// Store call deadline.
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms.max(1))
    }
}
