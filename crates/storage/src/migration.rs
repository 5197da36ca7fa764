use sea_orm::sea_query::{Alias, ColumnDef, Table, TableCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection};

use crate::entity::file_mod_times;
use telex_domain::storage::{StorageError, StorageResult};

/// Creates the progress table if it does not exist yet. Safe to run on every
/// startup.
pub async fn run_migrations(db: &DatabaseConnection) -> StorageResult<()> {
    let backend = db.get_database_backend();

    let mut mod_time = ColumnDef::new(file_mod_times::Column::LastModTime);
    match backend {
        DatabaseBackend::Sqlite => mod_time.custom(Alias::new("DATETIME")),
        _ => mod_time.timestamp_with_time_zone(),
    };

    let progress_table = Table::create()
        .if_not_exists()
        .table(file_mod_times::Entity)
        .col(
            ColumnDef::new(file_mod_times::Column::FilePath)
                .text()
                .not_null()
                .primary_key(),
        )
        .col(&mut mod_time)
        .col(ColumnDef::new(file_mod_times::Column::LastOffset).big_integer())
        .to_owned();
    create_table(db, backend, progress_table).await?;

    Ok(())
}

async fn create_table(
    db: &DatabaseConnection,
    backend: DatabaseBackend,
    mut statement: TableCreateStatement,
) -> StorageResult<()> {
    statement.if_not_exists();
    db.execute(backend.build(&statement))
        .await
        .map_err(StorageError::from_source)?;
    Ok(())
}
