use sea_orm::entity::prelude::*;

use crate::models::ItemMetadata;

/// Catalog row, one per indexed image
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "catalog_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub item_id: i64,
    #[sea_orm(column_type = "Text", nullable)]
    pub title: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub thumbnail_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub owner_name: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub owner_avatar_url: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

// NULL columns become empty strings
impl From<Model> for ItemMetadata {
    fn from(model: Model) -> Self {
        Self {
            title: model.title.unwrap_or_default(),
            item_id: model.item_id,
            thumbnail_url: model.thumbnail_url.unwrap_or_default(),
            owner_name: model.owner_name.unwrap_or_default(),
            owner_avatar_url: model.owner_avatar_url,
        }
    }
}
