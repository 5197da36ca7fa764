use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use thiserror::Error;
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

use telex_domain::{
    config::ConfigError,
    model::{MonitorTarget, ProgressRecord},
    services::telemetry::TelemetryError,
    storage::{ProgressStore, StorageError},
};

use crate::{
    client::EventSink,
    pipeline::{process_line, LineOutcome},
    reader::{LogReader, ReadBatch, ReadError},
};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("failed to resolve acting user: {0}")]
    Identity(#[source] std::io::Error),
}

/// Result of a single poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Modification time did not move past the last recorded one.
    Unchanged,
    StatFailed,
    SeekFailed,
    ReadFailed,
    Processed {
        matched: usize,
        delivered: usize,
        failed: usize,
        new_offset: u64,
    },
}

/// Poll loop for one file. Owns its progress in memory after the initial
/// load and is the only writer of that file's progress row.
pub struct MonitorWorker<S, D> {
    target: MonitorTarget,
    reader: LogReader,
    store: S,
    sink: D,
    acting_user: String,
    interval: Duration,
}

impl<S, D> MonitorWorker<S, D>
where
    S: ProgressStore,
    D: EventSink,
{
    pub fn new(
        target: MonitorTarget,
        store: S,
        sink: D,
        acting_user: impl Into<String>,
        interval: Duration,
    ) -> Self {
        let reader = LogReader::new(target.file_path());
        Self {
            target,
            reader,
            store,
            sink,
            acting_user: acting_user.into(),
            interval,
        }
    }

    pub fn with_reader(mut self, reader: LogReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn target(&self) -> &MonitorTarget {
        &self.target
    }

    /// Persisted progress, or a fresh record that treats the whole file as new.
    pub async fn initial_progress(&self) -> Result<ProgressRecord, StorageError> {
        let key = self.target.key();
        let stored = self.store.load_progress(&key).await?;
        Ok(stored.unwrap_or_else(|| ProgressRecord::initial(key)))
    }

    /// Loads progress, then polls forever. Returns only if the initial load
    /// fails.
    pub async fn run(self) {
        let mut progress = match self.initial_progress().await {
            Ok(progress) => progress,
            Err(err) => {
                warn!(
                    path = %self.target.file_path().display(),
                    error = %err,
                    "failed to load progress; monitor not started"
                );
                return;
            }
        };
        info!(
            path = %self.target.file_path().display(),
            offset = progress.last_offset,
            "monitor started"
        );

        loop {
            let outcome = self.poll_once(&mut progress).await;
            debug!(path = %self.target.file_path().display(), ?outcome, "poll cycle finished");
            sleep(self.interval).await;
        }
    }

    /// One pass of stat -> read -> filter/deliver -> persist.
    pub async fn poll_once(&self, progress: &mut ProgressRecord) -> CycleOutcome {
        let path = self.target.file_path();

        let observed = match modification_time(path).await {
            Ok(observed) => observed,
            Err(err) => {
                counter!("monitor_poll_cycles_total", "result" => "stat_error").increment(1);
                warn!(path = %path.display(), error = %err, "failed to stat log file");
                return CycleOutcome::StatFailed;
            }
        };

        if observed <= progress.last_mod_time {
            counter!("monitor_poll_cycles_total", "result" => "unchanged").increment(1);
            return CycleOutcome::Unchanged;
        }

        let mut offset = progress.last_offset;
        let mut matched = 0;
        let mut delivered = 0;
        let mut failed = 0;
        let mut scanned_to_end = false;

        loop {
            let batch = match self.read_batch(offset).await {
                Ok(batch) => batch,
                Err(err) if offset == progress.last_offset => {
                    return self.read_failure(&err);
                }
                Err(err) => {
                    // Part of the new content was already delivered: keep that
                    // offset but not the mod time, so the rest is retried.
                    warn!(path = %path.display(), offset, error = %err, "read interrupted");
                    break;
                }
            };

            for line in &batch.lines {
                if let LineOutcome::Matched {
                    delivered: ok,
                    failed: err,
                } = process_line(&self.sink, &self.target, &self.acting_user, line).await
                {
                    matched += 1;
                    delivered += ok;
                    failed += err;
                }
            }
            offset = batch.end_offset;

            if batch.exhausted {
                scanned_to_end = true;
                break;
            }
        }

        counter!("monitor_poll_cycles_total", "result" => "read").increment(1);
        progress.last_offset = offset;
        if scanned_to_end {
            progress.last_mod_time = observed;
        }
        self.persist(progress).await;

        CycleOutcome::Processed {
            matched,
            delivered,
            failed,
            new_offset: offset,
        }
    }

    async fn read_batch(&self, offset: u64) -> Result<ReadBatch, ReadError> {
        let reader = self.reader.clone();
        tokio::task::spawn_blocking(move || reader.read_from(offset))
            .await
            .map_err(|err| ReadError::Io(std::io::Error::other(err)))?
    }

    fn read_failure(&self, err: &ReadError) -> CycleOutcome {
        let path = self.target.file_path();
        match err {
            ReadError::Seek { offset, len } => {
                counter!("monitor_poll_cycles_total", "result" => "seek_error").increment(1);
                warn!(
                    path = %path.display(),
                    offset,
                    len,
                    "stored offset is past end of file; skipping cycle"
                );
                CycleOutcome::SeekFailed
            }
            other => {
                counter!("monitor_poll_cycles_total", "result" => "read_error").increment(1);
                warn!(path = %path.display(), error = %other, "failed to read log file");
                CycleOutcome::ReadFailed
            }
        }
    }

    async fn persist(&self, progress: &ProgressRecord) {
        match self
            .store
            .save_progress(
                &progress.file_path,
                progress.last_mod_time,
                progress.last_offset,
            )
            .await
        {
            Ok(()) => {
                counter!("monitor_progress_writes_total", "result" => "ok").increment(1);
            }
            Err(err) => {
                counter!("monitor_progress_writes_total", "result" => "error").increment(1);
                warn!(
                    path = %progress.file_path,
                    offset = progress.last_offset,
                    error = %err,
                    "failed to persist progress"
                );
            }
        }
    }
}

async fn modification_time(path: &std::path::Path) -> std::io::Result<DateTime<Utc>> {
    let metadata = tokio::fs::metadata(path).await?;
    Ok(DateTime::<Utc>::from(metadata.modified()?))
}

/// Launches one independent task per target. The tasks are never joined by
/// the binary; handles are returned for callers that want to.
pub fn spawn_monitors<S, D>(
    targets: Vec<MonitorTarget>,
    store: S,
    sink: D,
    acting_user: &str,
    interval: Duration,
) -> Vec<JoinHandle<()>>
where
    S: ProgressStore + Clone + 'static,
    D: EventSink + Clone + 'static,
{
    gauge!("monitor_active_files").set(targets.len() as f64);
    info!(files = targets.len(), ?interval, "launching monitors");

    targets
        .into_iter()
        .map(|target| {
            let worker = MonitorWorker::new(
                target,
                store.clone(),
                sink.clone(),
                acting_user,
                interval,
            );
            tokio::spawn(worker.run())
        })
        .collect()
}
