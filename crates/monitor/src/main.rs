//! Monitor binary: certificate expiry, wallet balances and chain activity.

use std::io;

use healthwatch_domain::config::BootstrapConfig;
use healthwatch_domain::services::telemetry::{init_telemetry, TelemetryConfig};
use healthwatch_monitor::{build_pipeline, run_monitor, MonitorError};
use healthwatch_storage::SeaOrmStorage;

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
    let _telemetry = init_telemetry(&telemetry_config)?;
    let storage = SeaOrmStorage::builder()
        .database_url(config.database_url())
        .sql_logging(config.sql_logging())
        .build()
        .await?;
    let pipeline = build_pipeline(&config, storage)?;
    run_monitor(&config, pipeline).await
}
