use healthwatch_domain::model::{ConfigCategory, ConfigEntry, NewConfigEntry};
use healthwatch_domain::storage::{ConfigStore, ConfigWriter, StorageError, StorageResult};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::entity::info;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl ConfigStore for SeaOrmStorage {
    async fn get(&self, key: &str) -> StorageResult<String> {
        let maybe = info::Entity::find()
            .filter(info::Column::Key.eq(key))
            .order_by_desc(info::Column::IsActive)
            .order_by_asc(info::Column::Id)
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        maybe
            .map(|model| model.value.trim().to_string())
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn list(
        &self,
        category: ConfigCategory,
        active_only: bool,
    ) -> StorageResult<Vec<ConfigEntry>> {
        let mut query = info::Entity::find().filter(info::Column::RowType.eq(category.row_type()));
        if active_only {
            query = query.filter(info::Column::IsActive.eq(true));
        }
        let rows = query
            .order_by_asc(info::Column::Id)
            .all(self.connection())
            .await
            .map_err(StorageError::from_source)?;

        Ok(rows
            .into_iter()
            .filter(|row| category.matches(&row.row_type, &row.key))
            .map(|row| entry_from_model(row, category))
            .collect())
    }
}

#[async_trait::async_trait]
impl ConfigWriter for SeaOrmStorage {
    async fn insert_entry(&self, entry: NewConfigEntry) -> StorageResult<ConfigEntry> {
        let category = entry.category;
        let model = info::ActiveModel {
            key: Set(entry.key),
            value: Set(entry.value),
            row_type: Set(category.row_type().to_string()),
            is_active: Set(entry.active),
            note: Set(entry.note),
            ..Default::default()
        };
        let created = model
            .insert(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(entry_from_model(created, category))
    }
}

fn entry_from_model(model: info::Model, category: ConfigCategory) -> ConfigEntry {
    ConfigEntry {
        id: model.id,
        key: model.key,
        value: model.value.trim().to_string(),
        category,
        active: model.is_active,
        note: model.note,
    }
}
