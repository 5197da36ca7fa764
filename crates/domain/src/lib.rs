//! Domain-level building blocks shared by the storage and monitor crates:
//! the file/event model, the progress store contract, startup configuration
//! and telemetry.

pub mod config;
pub mod model;
pub mod services;
pub mod storage;

pub use model::{LineFilter, LogEvent, MonitorTarget, ProgressRecord, WebhookPayload};
pub use storage::{ProgressStore, StorageError, StorageResult};
