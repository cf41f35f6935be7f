use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionLike;
use std::time::Duration;
use tracing::instrument;

use super::{EntityCache, ResponseCache, codec};
use crate::error::CacheError;
use crate::models::{ImageFingerprint, ItemId, ItemMetadata, RankedIdList};

/// Response tier on Redis. Works with a `ConnectionManager` or any cloneable
/// async connection.
#[derive(Clone)]
pub struct RedisResponseCache<C> {
    conn: C,
}

impl<C> RedisResponseCache<C>
where
    C: ConnectionLike + Clone + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<C> ResponseCache for RedisResponseCache<C>
where
    C: ConnectionLike + Clone + Send + Sync,
{
    #[instrument(skip(self), fields(fingerprint = %fingerprint))]
    async fn get(&self, fingerprint: &ImageFingerprint) -> Result<Option<RankedIdList>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(codec::response_key(fingerprint)).await?;
        raw.as_deref().map(codec::decode_ids).transpose()
    }

    #[instrument(skip(self, ids), fields(fingerprint = %fingerprint, ids = ids.len()))]
    async fn set(&self, fingerprint: &ImageFingerprint, ids: &RankedIdList) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(codec::response_key(fingerprint), codec::encode_ids(ids))
            .await?;
        Ok(())
    }
}

/// Entity tier on Redis, `SET NX EX` writes
#[derive(Clone)]
pub struct RedisEntityCache<C> {
    conn: C,
}

impl<C> RedisEntityCache<C>
where
    C: ConnectionLike + Clone + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<C> EntityCache for RedisEntityCache<C>
where
    C: ConnectionLike + Clone + Send + Sync,
{
    #[instrument(skip(self))]
    async fn get(&self, id: ItemId) -> Result<Option<ItemMetadata>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(codec::entity_key(id)).await?;
        raw.as_deref().map(codec::decode_entity).transpose()
    }

    #[instrument(skip(self, item), fields(item_id = item.item_id))]
    async fn set_if_absent(&self, item: &ItemMetadata, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let written: Option<String> = redis::cmd("SET")
            .arg(codec::entity_key(item.item_id))
            .arg(codec::encode_entity(item)?)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(written.is_some())
    }
}
