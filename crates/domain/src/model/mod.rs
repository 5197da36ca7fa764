//! Data structures shared by the storage layer and the monitor workers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

/// Severity attached to every forwarded line. Lines are never classified.
pub const DEFAULT_SEVERITY: &str = "error";

/// Compiled line predicate for a single target.
#[derive(Debug, Clone)]
pub struct LineFilter {
    pattern: Regex,
}

impl LineFilter {
    /// Compiles `pattern`. An empty pattern matches every line.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn matches(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

/// One watched file together with the metadata attached to its events.
#[derive(Debug, Clone)]
pub struct MonitorTarget {
    file_path: PathBuf,
    filter: LineFilter,
    application: String,
    webhook_urls: Vec<String>,
}

impl MonitorTarget {
    pub fn new(
        file_path: impl Into<PathBuf>,
        filter: LineFilter,
        application: impl Into<String>,
        webhook_urls: Vec<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            filter,
            application: application.into(),
            webhook_urls,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Store key for this target's progress row.
    pub fn key(&self) -> String {
        self.file_path.to_string_lossy().into_owned()
    }

    pub fn filter(&self) -> &LineFilter {
        &self.filter
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn webhook_urls(&self) -> &[String] {
        &self.webhook_urls
    }
}

/// Persisted read progress for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub file_path: String,
    pub last_mod_time: DateTime<Utc>,
    pub last_offset: u64,
}

impl ProgressRecord {
    /// Progress for a file that has never been read: everything is new.
    pub fn initial(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            last_mod_time: DateTime::<Utc>::MIN_UTC,
            last_offset: 0,
        }
    }
}

/// A matched line ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub application: String,
    pub acting_user: String,
    pub raw_line: String,
    pub severity: String,
}

impl LogEvent {
    pub fn build(line: &str, application: &str, acting_user: &str, severity: &str) -> Self {
        Self {
            application: application.to_string(),
            acting_user: acting_user.to_string(),
            raw_line: line.to_string(),
            severity: severity.to_string(),
        }
    }

    pub fn to_payload(&self) -> WebhookPayload<'_> {
        WebhookPayload {
            event_name: &self.application,
            username: &self.acting_user,
            action_type: &self.raw_line,
            status: &self.severity,
        }
    }
}

/// Wire body POSTed to every webhook endpoint.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct WebhookPayload<'a> {
    pub event_name: &'a str,
    pub username: &'a str,
    pub action_type: &'a str,
    pub status: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes_with_wire_field_names() {
        let event = LogEvent::build("boom", "svc", "alice", DEFAULT_SEVERITY);
        let body = serde_json::to_string(&event.to_payload()).unwrap();
        assert_eq!(
            body,
            r#"{"event_name":"svc","username":"alice","action_type":"boom","status":"error"}"#
        );
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = LineFilter::new("").unwrap();
        assert!(filter.matches(""));
        assert!(filter.matches("anything at all"));
    }

    #[test]
    fn filter_is_unanchored() {
        let filter = LineFilter::new("ERROR.*").unwrap();
        assert!(filter.matches("2024-01-01 ERROR disk full"));
        assert!(!filter.matches("2024-01-01 INFO all good"));
    }

    #[test]
    fn initial_progress_predates_any_mod_time() {
        let record = ProgressRecord::initial("/var/log/a.log");
        assert_eq!(record.last_offset, 0);
        let epoch = DateTime::from_timestamp(0, 0).unwrap();
        assert!(epoch > record.last_mod_time);
    }
}
