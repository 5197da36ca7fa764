use metrics::counter;
use telex_domain::model::{LogEvent, MonitorTarget, DEFAULT_SEVERITY};
use tracing::warn;

use crate::client::EventSink;

/// What happened to a single scanned line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Filtered,
    Matched { delivered: usize, failed: usize },
}

/// Filters one line and, on a match, delivers it to every endpoint of the
/// target in listed order. A failing endpoint never stops the remaining ones.
pub async fn process_line<D>(
    sink: &D,
    target: &MonitorTarget,
    acting_user: &str,
    line: &str,
) -> LineOutcome
where
    D: EventSink + ?Sized,
{
    if !target.filter().matches(line) {
        counter!("monitor_lines_total", "result" => "filtered").increment(1);
        return LineOutcome::Filtered;
    }
    counter!("monitor_lines_total", "result" => "matched").increment(1);

    let event = LogEvent::build(line, target.application(), acting_user, DEFAULT_SEVERITY);

    let mut delivered = 0;
    let mut failed = 0;
    for url in target.webhook_urls() {
        match sink.deliver(url, &event).await {
            Ok(()) => {
                delivered += 1;
                counter!("monitor_deliveries_total", "result" => "ok").increment(1);
            }
            Err(err) => {
                failed += 1;
                counter!("monitor_deliveries_total", "result" => "error").increment(1);
                warn!(
                    path = %target.file_path().display(),
                    url,
                    error = %err,
                    "failed to deliver log line"
                );
            }
        }
    }

    LineOutcome::Matched { delivered, failed }
}
