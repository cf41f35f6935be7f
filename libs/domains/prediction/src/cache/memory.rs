use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{EntityCache, ResponseCache, codec};
use crate::error::CacheError;
use crate::models::{ImageFingerprint, ItemId, ItemMetadata, RankedIdList};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local stand-in for Redis used when no cache server is configured.
///
/// Clones share storage. Values are stored encoded, exactly as Redis would
/// hold them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw value under `key`, bypassing encoding
    pub async fn put_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.lock().await.insert(
            key.into(),
            Entry {
                value: value.into(),
                expires_at: None,
            },
        );
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().await.values().filter(|e| e.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn read(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl ResponseCache for InMemoryCache {
    async fn get(&self, fingerprint: &ImageFingerprint) -> Result<Option<RankedIdList>, CacheError> {
        self.read(&codec::response_key(fingerprint))
            .await
            .as_deref()
            .map(codec::decode_ids)
            .transpose()
    }

    async fn set(&self, fingerprint: &ImageFingerprint, ids: &RankedIdList) -> Result<(), CacheError> {
        self.put_raw(codec::response_key(fingerprint), codec::encode_ids(ids))
            .await;
        Ok(())
    }
}

#[async_trait]
impl EntityCache for InMemoryCache {
    async fn get(&self, id: ItemId) -> Result<Option<ItemMetadata>, CacheError> {
        self.read(&codec::entity_key(id))
            .await
            .as_deref()
            .map(codec::decode_entity)
            .transpose()
    }

    async fn set_if_absent(&self, item: &ItemMetadata, ttl: Duration) -> Result<bool, CacheError> {
        let key = codec::entity_key(item.item_id);
        let value = codec::encode_entity(item)?;
        let now = Instant::now();

        let mut entries = self.entries.lock().await;
        // Expired entries that are never read again would otherwise stay forever
        entries.retain(|_, e| e.is_live(now));
        if entries.contains_key(&key) {
            return Ok(false);
        }
        entries.insert(
            key,
            Entry {
                value,
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }
}
