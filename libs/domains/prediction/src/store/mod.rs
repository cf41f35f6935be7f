//! Authoritative item metadata, the lookup of last resort

pub mod entity;
mod memory;
mod postgres;

pub use memory::InMemoryEntityStore;
pub use postgres::PgEntityStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{ItemId, ItemMetadata};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// `Ok(None)` when no record exists for `id`
    async fn find_by_id(&self, id: ItemId) -> Result<Option<ItemMetadata>, StoreError>;
}
