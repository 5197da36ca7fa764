use std::path::PathBuf;

use sea_orm::Database;
use telex_domain::storage::{StorageError, StorageResult};

use crate::{ensure_state_dir, run_migrations, SeaOrmStorage};

#[derive(Default)]
pub struct StorageBuilder {
    database_url: Option<String>,
    state_dir: Option<PathBuf>,
}

impl StorageBuilder {
    pub fn new() -> Self {
        Self {
            database_url: None,
            state_dir: None,
        }
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Directory created before connecting, e.g. the parent of a SQLite file.
    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    pub async fn build(self) -> StorageResult<SeaOrmStorage> {
        let url = self
            .database_url
            .ok_or_else(|| StorageError::Database("missing database url".into()))?;
        if let Some(dir) = &self.state_dir {
            ensure_state_dir(dir)?;
        }
        let db = Database::connect(url)
            .await
            .map_err(StorageError::from_source)?;
        run_migrations(&db).await?;
        Ok(SeaOrmStorage::from_connection(db))
    }
}
