use chrono::{DateTime, Utc};
use sea_orm::{sea_query::OnConflict, EntityTrait, Set};
use telex_domain::model::ProgressRecord;
use telex_domain::storage::{ProgressStore, StorageError, StorageResult};

use crate::entity::file_mod_times;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl ProgressStore for SeaOrmStorage {
    async fn load_progress(&self, file_path: &str) -> StorageResult<Option<ProgressRecord>> {
        let maybe = file_mod_times::Entity::find_by_id(file_path.to_string())
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        maybe.map(model_to_record).transpose()
    }

    async fn save_progress(
        &self,
        file_path: &str,
        last_mod_time: DateTime<Utc>,
        last_offset: u64,
    ) -> StorageResult<()> {
        let last_offset = i64::try_from(last_offset)
            .map_err(|_| StorageError::Database(format!("offset {last_offset} out of range")))?;
        let active = file_mod_times::ActiveModel {
            file_path: Set(file_path.to_string()),
            last_mod_time: Set(last_mod_time),
            last_offset: Set(last_offset),
        };
        file_mod_times::Entity::insert(active)
            .on_conflict(
                OnConflict::column(file_mod_times::Column::FilePath)
                    .update_columns([
                        file_mod_times::Column::LastModTime,
                        file_mod_times::Column::LastOffset,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(())
    }
}

fn model_to_record(model: file_mod_times::Model) -> StorageResult<ProgressRecord> {
    let last_offset = u64::try_from(model.last_offset).map_err(|_| {
        StorageError::Database(format!(
            "negative offset {} stored for `{}`",
            model.last_offset, model.file_path
        ))
    })?;

    Ok(ProgressRecord {
        file_path: model.file_path,
        last_mod_time: model.last_mod_time,
        last_offset,
    })
}
