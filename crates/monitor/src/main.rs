//! Monitor binary that tails the configured log files and forwards matching
//! lines to webhooks.

use std::io;

use telex_domain::config::{BootstrapConfig, MonitorConfig};
use telex_domain::services::telemetry::{init_telemetry, TelemetryConfig};
use telex_monitor::{spawn_monitors, MonitorError, WebhookDispatcher};
use telex_storage::SeaOrmStorage;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> io::Result<()> {
    if let Err(err) = bootstrap().await {
        eprintln!("[monitor] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}

async fn bootstrap() -> Result<(), MonitorError> {
    let config = BootstrapConfig::load_from_env()?;
    let telemetry_config = TelemetryConfig::from_env("MONITOR");
    init_telemetry(&telemetry_config)?;

    let storage = SeaOrmStorage::builder()
        .database_url(config.database_url())
        .state_dir(config.state_dir())
        .build()
        .await?;

    let monitor_config = MonitorConfig::load(config.config_path())?;
    let targets = monitor_config.resolve_targets()?;
    if targets.is_empty() {
        warn!("no files matched any target; nothing to monitor");
    }

    let acting_user = whoami::fallible::username().map_err(MonitorError::Identity)?;
    info!(
        config = %config.config_path().display(),
        user = acting_user,
        "bootstrap complete"
    );

    spawn_monitors(
        targets,
        storage,
        WebhookDispatcher::new(),
        &acting_user,
        monitor_config.interval(),
    );

    // Monitors run until the process is killed.
    std::future::pending::<()>().await;
    Ok(())
}
