use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ProgressRecord;

/// Common result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
}

impl StorageError {
    pub fn from_source(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }
}

/// Durable per-file read progress keyed by path.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Returns `Ok(None)` when the file has never been recorded.
    async fn load_progress(&self, file_path: &str) -> StorageResult<Option<ProgressRecord>>;

    /// Inserts or replaces the row for `file_path`.
    async fn save_progress(
        &self,
        file_path: &str,
        last_mod_time: DateTime<Utc>,
        last_offset: u64,
    ) -> StorageResult<()>;
}
