use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::EntityStore;
use crate::error::StoreError;
use crate::models::{ItemId, ItemMetadata};

/// Map-backed store for local runs and tests
#[derive(Default)]
pub struct InMemoryEntityStore {
    items: RwLock<HashMap<ItemId, ItemMetadata>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = ItemMetadata>) -> Self {
        Self {
            items: RwLock::new(items.into_iter().map(|m| (m.item_id, m)).collect()),
        }
    }

    pub async fn insert(&self, item: ItemMetadata) {
        self.items.write().await.insert(item.item_id, item);
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn find_by_id(&self, id: ItemId) -> Result<Option<ItemMetadata>, StoreError> {
        Ok(self.items.read().await.get(&id).cloned())
    }
}
