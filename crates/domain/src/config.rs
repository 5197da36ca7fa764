//! Startup configuration: process environment for paths and the YAML monitor
//! document describing targets, webhook clients and the poll interval.

use std::{
    collections::HashSet,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::model::{LineFilter, MonitorTarget};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/telex/config.yaml";
pub const DEFAULT_STATE_DIR: &str = "/var/lib/telex";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:///var/lib/telex/file_monitor.db?mode=rwc";

/// Locations the binary needs before it can read the monitor document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    config_path: PathBuf,
    database_url: String,
    state_dir: PathBuf,
}

impl BootstrapConfig {
    /// Hydrates `.env` (if present) and reads the optional `TELEX_*`
    /// variables, falling back to the well-known system locations.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            config_path: get_optional_var("TELEX_CONFIG_PATH")
                .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
                .into(),
            database_url: get_optional_var("TELEX_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            state_dir: get_optional_var("TELEX_STATE_DIR")
                .unwrap_or_else(|| DEFAULT_STATE_DIR.to_string())
                .into(),
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub webhook_urls: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub filter: String,
    pub application: String,
    #[serde(default)]
    pub paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MonitorDocument {
    #[serde(default)]
    clients: Vec<ClientConfig>,
    #[serde(default)]
    targets: Vec<TargetConfig>,
    interval: String,
}

/// Parsed monitor document.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    clients: Vec<ClientConfig>,
    targets: Vec<TargetConfig>,
    interval: Duration,
}

impl MonitorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let document: MonitorDocument = serde_yaml::from_str(content)?;

        let interval = humantime::parse_duration(document.interval.trim()).map_err(|source| {
            ConfigError::InvalidInterval {
                value: document.interval.clone(),
                source,
            }
        })?;
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if document.clients.is_empty() {
            return Err(ConfigError::NoClients);
        }

        Ok(Self {
            clients: document.clients,
            targets: document.targets,
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn clients(&self) -> &[ClientConfig] {
        &self.clients
    }

    pub fn targets(&self) -> &[TargetConfig] {
        &self.targets
    }

    /// Endpoints every target delivers to. Only the first client entry is
    /// honored; later entries are ignored with a warning at resolve time.
    pub fn webhook_urls(&self) -> &[String] {
        self.clients
            .first()
            .map(|client| client.webhook_urls.as_slice())
            .unwrap_or_default()
    }

    /// Compiles every filter and expands every glob into one
    /// `MonitorTarget` per concrete file. Globs are expanded once; files
    /// created afterwards are never picked up.
    pub fn resolve_targets(&self) -> Result<Vec<MonitorTarget>, ConfigError> {
        if self.clients.len() > 1 {
            warn!(
                clients = self.clients.len(),
                "only the first client's webhook_urls are used"
            );
        }

        let webhook_urls = self.webhook_urls().to_vec();
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        for target in &self.targets {
            let filter =
                LineFilter::new(&target.filter).map_err(|source| ConfigError::InvalidFilter {
                    application: target.application.clone(),
                    source,
                })?;

            for pattern in &target.paths {
                let matches = glob::glob(pattern).map_err(|source| ConfigError::InvalidGlob {
                    pattern: pattern.clone(),
                    source,
                })?;

                let mut matched_any = false;
                for entry in matches {
                    let path = match entry {
                        Ok(path) => path,
                        Err(err) => {
                            warn!(pattern, error = %err, "skipping unreadable glob entry");
                            continue;
                        }
                    };
                    if path.is_dir() {
                        continue;
                    }
                    matched_any = true;
                    if !seen.insert(path.clone()) {
                        warn!(
                            path = %path.display(),
                            application = target.application,
                            "file already monitored by an earlier target"
                        );
                        continue;
                    }
                    resolved.push(MonitorTarget::new(
                        path,
                        filter.clone(),
                        target.application.clone(),
                        webhook_urls.clone(),
                    ));
                }

                if !matched_any {
                    warn!(pattern, "glob pattern matched no files");
                }
            }
        }

        Ok(resolved)
    }
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("TELEX_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Fatal startup errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid interval `{value}`: {source}")]
    InvalidInterval {
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("interval must be greater than zero")]
    ZeroInterval,
    #[error("invalid filter for application `{application}`: {source}")]
    InvalidFilter {
        application: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid glob pattern `{pattern}`: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("config must declare at least one client")]
    NoClients,
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::set_var("TELEX_SKIP_DOTENV", "1");
        env::remove_var("TELEX_CONFIG_PATH");
        env::remove_var("TELEX_DATABASE_URL");
        env::remove_var("TELEX_STATE_DIR");
    }

    fn document(dir: &Path, filter: &str) -> String {
        format!(
            r#"
clients:
  - webhook_urls: ["http://a.example/hook", "http://b.example/hook"]
targets:
  - filter: "{filter}"
    application: billing
    paths: ["{}/*.log"]
interval: 30s
"#,
            dir.display()
        )
    }

    #[test]
    fn bootstrap_falls_back_to_system_locations() {
        let _guard = ENV_GUARD.lock().unwrap();
        clear_env();

        let config = BootstrapConfig::load_from_env().expect("config loads");
        assert_eq!(config.config_path(), Path::new(DEFAULT_CONFIG_PATH));
        assert_eq!(config.database_url(), DEFAULT_DATABASE_URL);
        assert_eq!(config.state_dir(), Path::new(DEFAULT_STATE_DIR));
    }

    #[test]
    fn bootstrap_reads_trimmed_overrides() {
        let _guard = ENV_GUARD.lock().unwrap();
        clear_env();
        env::set_var("TELEX_CONFIG_PATH", "  /tmp/telex.yaml ");
        env::set_var("TELEX_DATABASE_URL", "sqlite::memory:");
        env::set_var("TELEX_STATE_DIR", "   ");

        let config = BootstrapConfig::load_from_env().expect("config loads");
        assert_eq!(config.config_path(), Path::new("/tmp/telex.yaml"));
        assert_eq!(config.database_url(), "sqlite::memory:");
        assert_eq!(config.state_dir(), Path::new(DEFAULT_STATE_DIR));

        clear_env();
    }

    #[test]
    fn parses_document_and_interval() {
        let dir = TempDir::new().unwrap();
        let config = MonitorConfig::from_yaml_str(&document(dir.path(), "ERROR.*")).unwrap();
        assert_eq!(config.interval(), Duration::from_secs(30));
        assert_eq!(config.webhook_urls().len(), 2);
        assert_eq!(config.targets()[0].application, "billing");
    }

    #[test]
    fn compound_interval_is_accepted() {
        let config = MonitorConfig::from_yaml_str(
            "clients: [{webhook_urls: []}]\ntargets: []\ninterval: 1m30s\n",
        )
        .unwrap();
        assert_eq!(config.interval(), Duration::from_secs(90));
    }

    #[test]
    fn rejects_bad_interval() {
        let err = MonitorConfig::from_yaml_str(
            "clients: [{webhook_urls: []}]\ntargets: []\ninterval: soon\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterval { .. }));

        let err =
            MonitorConfig::from_yaml_str("clients: [{webhook_urls: []}]\ninterval: 0s\n")
                .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroInterval));
    }

    #[test]
    fn rejects_malformed_yaml_and_missing_clients() {
        let err = MonitorConfig::from_yaml_str("clients: [\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));

        let err = MonitorConfig::from_yaml_str("targets: []\ninterval: 5s\n").unwrap_err();
        assert!(matches!(err, ConfigError::NoClients));
    }

    #[test]
    fn only_first_client_urls_are_used() {
        let config = MonitorConfig::from_yaml_str(
            r#"
clients:
  - webhook_urls: ["http://first/hook"]
  - webhook_urls: ["http://second/hook"]
interval: 10s
"#,
        )
        .unwrap();
        assert_eq!(config.webhook_urls(), ["http://first/hook".to_string()]);
    }

    #[test]
    fn resolves_one_target_per_matched_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.log"), "").unwrap();
        fs::write(dir.path().join("b.log"), "").unwrap();
        fs::write(dir.path().join("c.txt"), "").unwrap();
        fs::create_dir(dir.path().join("d.log")).unwrap();

        let config = MonitorConfig::from_yaml_str(&document(dir.path(), "ERROR.*")).unwrap();
        let mut targets = config.resolve_targets().unwrap();
        targets.sort_by(|a, b| a.file_path().cmp(b.file_path()));

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].file_path(), dir.path().join("a.log"));
        assert_eq!(targets[1].file_path(), dir.path().join("b.log"));
        assert_eq!(targets[0].application(), "billing");
        assert_eq!(targets[0].webhook_urls().len(), 2);
        assert!(targets[0].filter().matches("ERROR disk full"));
    }

    #[test]
    fn missing_filter_matches_every_line() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.log"), "").unwrap();
        let yaml = format!(
            "clients: [{{webhook_urls: []}}]\ntargets:\n  - application: app\n    paths: [\"{}/*.log\"]\ninterval: 1s\n",
            dir.path().display()
        );

        let targets = MonitorConfig::from_yaml_str(&yaml)
            .unwrap()
            .resolve_targets()
            .unwrap();
        assert_eq!(targets.len(), 1);
        assert!(targets[0].filter().matches("whatever"));
    }

    #[test]
    fn invalid_filter_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = MonitorConfig::from_yaml_str(&document(dir.path(), "(unclosed")).unwrap();
        let err = config.resolve_targets().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFilter { .. }));
    }

    #[test]
    fn invalid_glob_is_fatal() {
        let config = MonitorConfig::from_yaml_str(
            "clients: [{webhook_urls: []}]\ntargets:\n  - application: app\n    paths: [\"/var/log/[*.log\"]\ninterval: 1s\n",
        )
        .unwrap();
        let err = config.resolve_targets().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGlob { .. }));
    }

    #[test]
    fn duplicate_paths_are_monitored_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.log"), "").unwrap();
        let yaml = format!(
            "clients: [{{webhook_urls: []}}]\ntargets:\n  - application: one\n    paths: [\"{0}/*.log\", \"{0}/a.log\"]\n  - application: two\n    paths: [\"{0}/a.log\"]\ninterval: 1s\n",
            dir.path().display()
        );

        let targets = MonitorConfig::from_yaml_str(&yaml)
            .unwrap()
            .resolve_targets()
            .unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].application(), "one");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = MonitorConfig::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
