//! File monitoring core: reads new lines from watched log files, filters
//! them and forwards matches to webhook endpoints while persisting per-file
//! progress. The `telex_monitor` binary wires these pieces to the SQLite
//! store and the HTTP dispatcher.

pub mod client;
pub mod pipeline;
pub mod reader;
pub mod worker;

pub use client::{DeliveryError, EventSink, WebhookDispatcher};
pub use pipeline::{process_line, LineOutcome};
pub use reader::{LogReader, NewLines, ReadBatch, ReadError};
pub use worker::{spawn_monitors, CycleOutcome, MonitorError, MonitorWorker};
