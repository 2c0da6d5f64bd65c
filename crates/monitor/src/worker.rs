use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, warn};

use healthwatch_domain::{
    config::{BootstrapConfig, ConfigError},
    services::{SecretError, TelemetryError},
    storage::StorageError,
    Schedule,
};
use healthwatch_storage::SeaOrmStorage;

use crate::{
    credentials::CredentialSource,
    notify::{DeliveryError, HttpWebhook, Notifier, SmtpMailer},
    pipeline::{Family, Pipeline, PipelineSettings, Probes},
    probe::ProbeError,
    rpc::JsonRpcClient,
    tls::TlsCertificateProbe,
};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to load {what}: {source}")]
    ConfigLoad {
        what: &'static str,
        #[source]
        source: StorageError,
    },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("secret error: {0}")]
    Secret(#[from] SecretError),
    #[error("probe setup failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("notifier setup failed: {0}")]
    Delivery(#[from] DeliveryError),
}

impl MonitorError {
    /// `map_err` adapter tagging a storage failure with the worklist item
    /// that could not be loaded.
    pub fn config_load(what: &'static str) -> impl Fn(StorageError) -> MonitorError + Copy {
        move |source| MonitorError::ConfigLoad { what, source }
    }
}

/// Wires the production probes and channels around a storage handle.
pub fn build_pipeline(
    config: &BootstrapConfig,
    storage: SeaOrmStorage,
) -> Result<Pipeline, MonitorError> {
    let storage = Arc::new(storage);
    let rpc = Arc::new(JsonRpcClient::new(config.probe_timeout())?);
    let probes = Probes {
        certificates: Arc::new(TlsCertificateProbe::new(config.probe_timeout())?),
        balances: rpc.clone(),
        chain: rpc,
    };
    let notifier = Notifier::new(
        Arc::new(SmtpMailer::new(config.smtp_host(), config.smtp_port())),
        Arc::new(HttpWebhook::new(config.probe_timeout())?),
    );
    let settings = PipelineSettings {
        cert_alert_window: chrono::Duration::from_std(config.cert_alert_window())
            .unwrap_or_else(|_| PipelineSettings::default().cert_alert_window),
        ..PipelineSettings::default()
    };

    Ok(Pipeline::new(
        storage.clone(),
        storage,
        probes,
        notifier,
        CredentialSource::from_bootstrap(config),
        settings,
    ))
}

/// Runs every enabled family on its own schedule until the process stops.
pub async fn run_monitor(config: &BootstrapConfig, pipeline: Pipeline) -> Result<(), MonitorError> {
    let mut families = JoinSet::new();
    families.spawn(run_family(
        Family::Certificate,
        config.cert_schedule().clone(),
        pipeline.clone(),
    ));
    families.spawn(run_family(
        Family::Wallet,
        config.wallet_schedule().clone(),
        pipeline.clone(),
    ));
    match config.chain_schedule() {
        Some(schedule) => {
            families.spawn(run_family(Family::Chain, schedule.clone(), pipeline));
        }
        None => info!("chain health family disabled"),
    }

    while let Some(joined) = families.join_next().await {
        if let Err(err) = joined {
            error!(?err, "family loop exited");
        }
    }
    Ok(())
}

async fn run_family(family: Family, schedule: Schedule, pipeline: Pipeline) {
    info!(%family, %schedule, "family scheduled");
    loop {
        run_tick(family, &pipeline).await;
        let delay = schedule.delay_from(Utc::now());
        info!(%family, next_in_secs = delay.as_secs(), "waiting for next tick");
        sleep(delay).await;
    }
}

/// Runs one tick on its own task so a panic inside it is contained.
async fn run_tick(family: Family, pipeline: &Pipeline) {
    let pipeline = pipeline.clone();
    let handle = tokio::spawn(async move { pipeline.run(family, Utc::now()).await });
    let label = family.to_string();

    match handle.await {
        Ok(Ok(report)) => {
            counter!("monitor_ticks_total", "family" => label, "result" => "ok").increment(1);
            info!(
                %family,
                probed = report.probed,
                failed = report.failed,
                alerts = report.digest.alerts().len(),
                "tick finished"
            );
        }
        Ok(Err(err)) => {
            counter!("monitor_ticks_total", "family" => label, "result" => "aborted").increment(1);
            warn!(%family, error = %err, "tick aborted");
        }
        Err(err) => {
            counter!("monitor_ticks_total", "family" => label, "result" => "panicked").increment(1);
            error!(%family, ?err, "tick panicked");
        }
    }
}
