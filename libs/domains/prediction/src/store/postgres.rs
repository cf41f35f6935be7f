use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use tracing::instrument;

use super::{EntityStore, entity};
use crate::error::StoreError;
use crate::models::{ItemId, ItemMetadata};

/// `catalog_items` lookups through SeaORM
#[derive(Clone)]
pub struct PgEntityStore {
    db: DatabaseConnection,
}

impl PgEntityStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: ItemId) -> Result<Option<ItemMetadata>, StoreError> {
        let model = entity::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(ItemMetadata::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};

    fn row(item_id: i64) -> entity::Model {
        entity::Model {
            item_id,
            title: Some("Desk lamp".to_string()),
            thumbnail_url: None,
            owner_name: Some("mila".to_string()),
            owner_avatar_url: "https://cdn.example/mila.png".to_string(),
        }
    }

    #[tokio::test]
    async fn test_find_by_id_maps_nulls_to_empty() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row(20)]])
            .into_connection();
        let store = PgEntityStore::new(db);

        let meta = store.find_by_id(20).await.unwrap().unwrap();

        assert_eq!(meta.item_id, 20);
        assert_eq!(meta.title, "Desk lamp");
        assert_eq!(meta.thumbnail_url, "");
        assert_eq!(meta.owner_avatar_url, "https://cdn.example/mila.png");
    }

    #[tokio::test]
    async fn test_find_by_id_missing_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<entity::Model>::new()])
            .into_connection();
        let store = PgEntityStore::new(db);

        assert_eq!(store.find_by_id(99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_by_id_database_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("connection reset".to_string())])
            .into_connection();
        let store = PgEntityStore::new(db);

        let err = store.find_by_id(1).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(msg) if msg.contains("connection reset")));
    }
}
