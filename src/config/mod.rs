//! Configuration layer: typed settings with layered precedence (file → env).
//!
//! Settings are read from `config/default.*`, then a local `pinboard.*` file,
//! then an explicit file when the host application supplies one, and finally
//! `PINBOARD__`-prefixed environment variables. Later sources win.

use std::{path::Path, str::FromStr};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheConfig;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pinboard";
const DEFAULT_STORE_CAPACITY: usize = 4096;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache: CacheSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

/// Cache-aside behaviour knobs. Mirrored into [`CacheConfig`] for the cache
/// subsystem.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub board_ttl_secs: u64,
    pub pin_ttl_secs: u64,
    pub comment_ttl_secs: u64,
    pub subcomment_ttl_secs: u64,
    pub media_ttl_secs: u64,
    pub op_timeout_ms: u64,
}

/// Sizing for the in-process store backend.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Maximum number of cached entries.
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (files → environment).
pub fn load(config_file: Option<&Path>) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("PINBOARD").separator("__"));

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    cache: RawCacheSettings,
    store: RawStoreSettings,
    logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    board_ttl_secs: Option<u64>,
    pin_ttl_secs: Option<u64>,
    comment_ttl_secs: Option<u64>,
    subcomment_ttl_secs: Option<u64>,
    media_ttl_secs: Option<u64>,
    op_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            cache,
            store,
            logging,
        } = raw;

        Ok(Self {
            cache: build_cache_settings(cache)?,
            store: build_store_settings(store)?,
            logging: build_logging_settings(logging)?,
        })
    }
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let defaults = CacheConfig::default();

    let board_ttl_secs = ttl(cache.board_ttl_secs, defaults.board_ttl_secs, "cache.board_ttl_secs")?;
    let pin_ttl_secs = ttl(cache.pin_ttl_secs, defaults.pin_ttl_secs, "cache.pin_ttl_secs")?;
    let comment_ttl_secs = ttl(
        cache.comment_ttl_secs,
        defaults.comment_ttl_secs,
        "cache.comment_ttl_secs",
    )?;
    let subcomment_ttl_secs = ttl(
        cache.subcomment_ttl_secs,
        defaults.subcomment_ttl_secs,
        "cache.subcomment_ttl_secs",
    )?;
    let media_ttl_secs = ttl(cache.media_ttl_secs, defaults.media_ttl_secs, "cache.media_ttl_secs")?;

    let op_timeout_ms = cache.op_timeout_ms.unwrap_or(defaults.op_timeout_ms);
    if op_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "cache.op_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(defaults.enabled),
        board_ttl_secs,
        pin_ttl_secs,
        comment_ttl_secs,
        subcomment_ttl_secs,
        media_ttl_secs,
        op_timeout_ms,
    })
}

fn ttl(value: Option<u64>, default: u64, key: &'static str) -> Result<u64, LoadError> {
    let value = value.unwrap_or(default);
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(value)
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let capacity = store.capacity.unwrap_or(DEFAULT_STORE_CAPACITY);
    if capacity == 0 {
        return Err(LoadError::invalid(
            "store.capacity",
            "must be greater than zero",
        ));
    }
    Ok(StoreSettings { capacity })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}
