//! Two cache tiers: fingerprint to ranked ids, and item id to metadata.
//!
//! Both back onto the same key space layout so the Redis and in-memory
//! implementations are interchangeable.

pub mod codec;
mod memory;
mod redis;

pub use memory::InMemoryCache;
pub use redis::{RedisEntityCache, RedisResponseCache};

use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheError;
use crate::models::{ImageFingerprint, ItemId, ItemMetadata, RankedIdList};

/// Fingerprint to previously computed ranked id list. Entries never expire.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// A stored entry that cannot be decoded is reported as [`CacheError::Codec`]
    async fn get(&self, fingerprint: &ImageFingerprint) -> Result<Option<RankedIdList>, CacheError>;

    async fn set(&self, fingerprint: &ImageFingerprint, ids: &RankedIdList) -> Result<(), CacheError>;
}

/// Item id to metadata, shared across requests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityCache: Send + Sync {
    async fn get(&self, id: ItemId) -> Result<Option<ItemMetadata>, CacheError>;

    /// Write only when no unexpired entry exists. Returns whether it wrote.
    async fn set_if_absent(&self, item: &ItemMetadata, ttl: Duration) -> Result<bool, CacheError>;
}
