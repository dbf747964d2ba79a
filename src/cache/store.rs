//! Cache store contract.
//!
//! The store is the shared key/value system (network-accessible in
//! production, in-process for tests) that owns entry lifetime: once written,
//! TTL expiry is the store's job, not the application's. Engines decide
//! *when* to write or delete; the store just does it.
//!
//! Store failures are recoverable by design. Engines catch [`StoreError`] and
//! fall through to the system-of-record, so an unavailable cache degrades to
//! added latency, never to a business failure.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::keys::CacheKey;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache store operation timed out")]
    Timeout,
    #[error("cache entry could not be decoded: {0}")]
    Encoding(String),
}

impl StoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// TTL-aware byte-valued key/value store.
///
/// Values are opaque serialized records; the engines own serialization.
/// Deleting an absent key is a no-op, never an error.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    async fn delete(&self, keys: &[CacheKey]) -> Result<(), StoreError>;
}
