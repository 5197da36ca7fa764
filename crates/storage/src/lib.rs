//! SeaORM-backed implementation of the progress store. SQLite is the default
//! backend; PostgreSQL is available behind a feature flag.

mod builder;
mod entity;
mod migration;
mod progress_store;

use std::{fs, path::Path, sync::Arc};

use sea_orm::{Database, DatabaseConnection};
use telex_domain::storage::{StorageError, StorageResult};
use tracing::debug;

pub use builder::StorageBuilder;
pub use migration::run_migrations;

/// Shared storage handle; clones share one connection pool.
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStorage {
    /// Connects to the provided database URL and ensures the schema is present.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let db = Database::connect(database_url)
            .await
            .map_err(StorageError::from_source)?;
        run_migrations(&db).await?;
        Ok(Self::from_connection(db))
    }

    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    pub(crate) fn from_connection(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }
}

/// Creates the directory that holds the database file. Idempotent.
pub(crate) fn ensure_state_dir(dir: &Path) -> StorageResult<()> {
    fs::create_dir_all(dir).map_err(|err| {
        StorageError::Database(format!(
            "failed to create state directory `{}`: {err}",
            dir.display()
        ))
    })?;
    debug!(dir = %dir.display(), "state directory ready");
    Ok(())
}
