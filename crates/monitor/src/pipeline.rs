//! One tick per probe family: load the worklist, probe each item, fold the
//! results into a digest and deliver the alert lines.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use healthwatch_domain::config::keys;
use healthwatch_domain::model::{
    Balance, CertificateInfo, ChainEndpoints, ChainHealth, ConfigCategory, Network, SmtpCredentials,
    WalletState, WalletTarget,
};
use healthwatch_domain::storage::{ConfigStore, StorageError, WalletStateStore};
use metrics::{counter, gauge};
use strum_macros::Display;
use tracing::{info, warn};

use crate::credentials::CredentialSource;
use crate::notify::Notifier;
use crate::probe::ProbeError;
use crate::rpc::{BalanceSource, ChainSource};
use crate::tls::CertificateProbe;
use crate::worker::MonitorError;

pub const CERTIFICATE_TITLE: &str = "SSL Certificate Expiration Warning";
pub const WALLET_SUBJECT: &str = "Wallet Balance Update";
pub const WALLET_WEBHOOK_TITLE: &str = "Wallet Balance Change Update";
pub const CHAIN_WEBHOOK_TITLE: &str = "Chain Status Warning";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Family {
    Certificate,
    Wallet,
    Chain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Certificates with less validity left than this alert.
    pub cert_alert_window: Duration,
    /// Blocks scanned before the latest one by the chain-health family.
    pub chain_window: u64,
    pub chain_min_transactions: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            cert_alert_window: Duration::hours(48),
            chain_window: 10,
            chain_min_transactions: 5,
        }
    }
}

/// Lines collected during a tick. Status lines are only logged; alert lines
/// are delivered to every channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Digest {
    status: Vec<String>,
    alerts: Vec<String>,
}

impl Digest {
    pub fn push_status(&mut self, line: String) {
        self.status.push(line);
    }

    pub fn push_alert(&mut self, line: String) {
        self.alerts.push(line);
    }

    pub fn status(&self) -> &[String] {
        &self.status
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    pub fn has_alerts(&self) -> bool {
        !self.alerts.is_empty()
    }

    pub fn email_body(&self) -> String {
        self.alerts.join("\n")
    }

    pub fn webhook_text(&self) -> String {
        self.alerts.join("\n\n")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelStatus {
    #[default]
    Skipped,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub webhook: ChannelStatus,
    pub emails_sent: usize,
    pub emails_failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub family: Family,
    pub probed: usize,
    pub failed: usize,
    pub digest: Digest,
    pub delivery: DeliveryReport,
}

impl TickReport {
    fn new(family: Family) -> Self {
        Self {
            family,
            probed: 0,
            failed: 0,
            digest: Digest::default(),
            delivery: DeliveryReport::default(),
        }
    }

    fn record_probe<T>(&mut self, outcome: &Result<T, ProbeError>) {
        let family = self.family.to_string();
        match outcome {
            Ok(_) => {
                counter!("monitor_probes_total", "family" => family, "result" => "ok").increment(1);
                self.probed += 1;
            }
            Err(err) => {
                counter!("monitor_probes_total", "family" => family, "result" => err.kind())
                    .increment(1);
                self.failed += 1;
            }
        }
    }
}

/// Probe implementations used by the families.
#[derive(Clone)]
pub struct Probes {
    pub certificates: Arc<dyn CertificateProbe>,
    pub balances: Arc<dyn BalanceSource>,
    pub chain: Arc<dyn ChainSource>,
}

/// Everything a tick needs. Cheap to clone; each scheduled tick runs on its
/// own clone.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<dyn ConfigStore>,
    wallets: Arc<dyn WalletStateStore>,
    probes: Probes,
    notifier: Notifier,
    credentials: CredentialSource,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        wallets: Arc<dyn WalletStateStore>,
        probes: Probes,
        notifier: Notifier,
        credentials: CredentialSource,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            config,
            wallets,
            probes,
            notifier,
            credentials,
            settings,
        }
    }

    pub async fn run(&self, family: Family, now: DateTime<Utc>) -> Result<TickReport, MonitorError> {
        match family {
            Family::Certificate => self.certificate_tick(now).await,
            Family::Wallet => self.wallet_tick(now).await,
            Family::Chain => self.chain_tick().await,
        }
    }

    pub async fn certificate_tick(&self, now: DateTime<Utc>) -> Result<TickReport, MonitorError> {
        let domains = self
            .config
            .list(ConfigCategory::Domain, true)
            .await
            .map_err(MonitorError::config_load("domains"))?;
        let recipients = self.load_recipients().await?;
        let webhook_url = self.load_webhook_url().await?;
        let credentials = self.credentials.resolve(self.config.as_ref()).await?;

        let mut outcomes = Vec::with_capacity(domains.len());
        for entry in &domains {
            outcomes.push(self.probes.certificates.check_expiry(&entry.value).await);
        }

        let mut report = TickReport::new(Family::Certificate);
        for (entry, outcome) in domains.iter().zip(outcomes) {
            report.record_probe(&outcome);
            match outcome {
                Ok(certificate) => {
                    let remaining = certificate.not_after - now;
                    let status = certificate_status_line(&certificate, remaining);
                    info!(domain = %entry.value, %status, "certificate checked");
                    report.digest.push_status(status);
                    if is_alerting(remaining, self.settings.cert_alert_window) {
                        report
                            .digest
                            .push_alert(certificate_alert_line(&certificate, remaining));
                    }
                }
                Err(err) => {
                    warn!(domain = %entry.value, error = %err, "certificate probe failed");
                }
            }
        }

        report.delivery = self
            .deliver(
                &report.digest,
                CERTIFICATE_TITLE,
                CERTIFICATE_TITLE,
                &webhook_url,
                &recipients,
                &credentials,
            )
            .await;
        Ok(report)
    }

    pub async fn wallet_tick(&self, now: DateTime<Utc>) -> Result<TickReport, MonitorError> {
        let recipients = self.load_recipients().await?;
        let webhook_url = self.load_webhook_url().await?;
        let credentials = self.credentials.resolve(self.config.as_ref()).await?;
        let endpoints = self.load_endpoints().await?;

        let mut targets = Vec::new();
        for network in Network::ALL {
            let entries = self
                .config
                .list(ConfigCategory::Wallet(network), false)
                .await
                .map_err(MonitorError::config_load("wallets"))?;
            targets.extend(entries.iter().filter_map(WalletTarget::from_entry));
        }

        let mut report = TickReport::new(Family::Wallet);
        for target in &targets {
            let outcome = self
                .probes
                .balances
                .balance(endpoints.rpc(target.network), &target.address)
                .await;
            report.record_probe(&outcome);
            let balance = match outcome {
                Ok(balance) => balance,
                Err(err) => {
                    warn!(address = %target.address, network = %target.network, error = %err, "balance probe failed");
                    continue;
                }
            };

            match self.record_balance(target, &balance, now).await {
                Ok(state) => {
                    let line = wallet_line(target, &state, endpoints.explorer(target.network));
                    info!(address = %target.address, network = %target.network, %line, "wallet checked");
                    report.digest.push_status(line.clone());
                    report.digest.push_alert(line);
                }
                Err(err) => {
                    warn!(address = %target.address, network = %target.network, error = %err, "wallet state not stored; line omitted");
                }
            }
        }

        report.delivery = self
            .deliver(
                &report.digest,
                WALLET_SUBJECT,
                WALLET_WEBHOOK_TITLE,
                &webhook_url,
                &recipients,
                &credentials,
            )
            .await;
        Ok(report)
    }

    pub async fn chain_tick(&self) -> Result<TickReport, MonitorError> {
        let webhook_url = self.load_webhook_url().await?;
        let endpoint = self
            .config
            .get(keys::L2_RPC)
            .await
            .map_err(MonitorError::config_load("l2 rpc endpoint"))?;

        let mut report = TickReport::new(Family::Chain);
        let outcome = self
            .probes
            .chain
            .chain_health(&endpoint, self.settings.chain_window)
            .await;
        report.record_probe(&outcome);

        let warning = match outcome {
            Ok(health) if health.transactions >= self.settings.chain_min_transactions => {
                info!(
                    latest_block = health.latest_block,
                    transactions = health.transactions,
                    "chain healthy"
                );
                report.digest.push_status(chain_line(&health));
                None
            }
            Ok(health) => Some(chain_warning_line(&health, self.settings.chain_min_transactions)),
            Err(err) => {
                warn!(endpoint = %endpoint, error = %err, "chain health probe failed");
                Some(format!("Chain status check against {endpoint} failed: {err}"))
            }
        };

        if let Some(line) = warning {
            report.digest.push_alert(line);
            report.delivery.webhook = self
                .post_webhook(&webhook_url, CHAIN_WEBHOOK_TITLE, &report.digest)
                .await;
        }
        Ok(report)
    }

    async fn load_recipients(&self) -> Result<Vec<String>, MonitorError> {
        let entries = self
            .config
            .list(ConfigCategory::Email, false)
            .await
            .map_err(MonitorError::config_load("recipients"))?;
        Ok(entries
            .into_iter()
            .filter(|entry| !keys::is_credential(&entry.key))
            .filter_map(|entry| match entry.value.parse::<lettre::Address>() {
                Ok(_) => Some(entry.value),
                Err(_) => {
                    warn!(key = %entry.key, "email row is not an address, skipped");
                    None
                }
            })
            .collect())
    }

    async fn load_webhook_url(&self) -> Result<String, MonitorError> {
        self.config
            .get(keys::WEBHOOK_URL)
            .await
            .map_err(MonitorError::config_load("webhook url"))
    }

    /// Endpoint snapshot for this tick; every probe of the tick uses it.
    async fn load_endpoints(&self) -> Result<ChainEndpoints, MonitorError> {
        let load = MonitorError::config_load("chain endpoints");
        Ok(ChainEndpoints {
            l1_rpc: self.config.get(keys::L1_RPC).await.map_err(load)?,
            l2_rpc: self.config.get(keys::L2_RPC).await.map_err(load)?,
            l1_explorer: self
                .config
                .get_optional(keys::L1_EXPLORER)
                .await
                .map_err(load)?,
            l2_explorer: self
                .config
                .get_optional(keys::L2_EXPLORER)
                .await
                .map_err(load)?,
        })
    }

    async fn record_balance(
        &self,
        target: &WalletTarget,
        balance: &Balance,
        now: DateTime<Utc>,
    ) -> Result<WalletState, StorageError> {
        let state = self
            .wallets
            .upsert_balance(&target.address, target.network, balance, now)
            .await?;
        gauge!("monitor_wallet_balance", "network" => target.network.to_string())
            .set(state.balance.to_f64());
        Ok(state)
    }

    async fn deliver(
        &self,
        digest: &Digest,
        subject: &str,
        webhook_title: &str,
        webhook_url: &str,
        recipients: &[String],
        credentials: &SmtpCredentials,
    ) -> DeliveryReport {
        if !digest.has_alerts() {
            info!(subject, "no alerts");
            return DeliveryReport::default();
        }

        let webhook = self.post_webhook(webhook_url, webhook_title, digest).await;
        let emails = self
            .notifier
            .send_email(credentials, recipients, subject, &digest.email_body())
            .await;

        DeliveryReport {
            webhook,
            emails_sent: emails.sent,
            emails_failed: emails.failed.len(),
        }
    }

    async fn post_webhook(&self, url: &str, title: &str, digest: &Digest) -> ChannelStatus {
        match self
            .notifier
            .send_webhook(url, title, &digest.webhook_text())
            .await
        {
            Ok(()) => ChannelStatus::Sent,
            Err(_) => ChannelStatus::Failed,
        }
    }
}

/// Alerting when strictly less validity than `window` is left.
pub fn is_alerting(remaining: Duration, window: Duration) -> bool {
    remaining < window
}

/// Renders a duration rounded to the minute, e.g. `5 days 3 hours 30 minutes`.
/// The sign is dropped.
pub fn format_remaining(remaining: Duration) -> String {
    let minutes = (remaining.num_seconds().abs() + 30) / 60;
    format!(
        "{} days {} hours {} minutes",
        minutes / (24 * 60),
        (minutes / 60) % 24,
        minutes % 60
    )
}

fn certificate_status_line(certificate: &CertificateInfo, remaining: Duration) -> String {
    if remaining < Duration::zero() {
        format!(
            "{} expired {} ago",
            certificate.domain,
            format_remaining(remaining)
        )
    } else {
        format!(
            "{} expires in {}",
            certificate.domain,
            format_remaining(remaining)
        )
    }
}

fn certificate_alert_line(certificate: &CertificateInfo, remaining: Duration) -> String {
    let at = certificate.not_after.format("%Y-%m-%d %H:%M:%S UTC");
    if remaining < Duration::zero() {
        format!(
            "The SSL certificate for {} expired {} ago ({at}).",
            certificate.domain,
            format_remaining(remaining)
        )
    } else {
        format!(
            "The SSL certificate for {} will expire in {} ({at}).",
            certificate.domain,
            format_remaining(remaining)
        )
    }
}

fn wallet_line(target: &WalletTarget, state: &WalletState, explorer: Option<&str>) -> String {
    let mut line = format!(
        "[{}] {} {}: balance {} ETH, change {} ETH",
        target.network.label(),
        target.name,
        target.address,
        state.balance,
        state.balance_change.signed()
    );
    if let Some(explorer) = explorer {
        line.push_str(&format!(
            " - {}/address/{}",
            explorer.trim_end_matches('/'),
            target.address
        ));
    }
    line
}

fn chain_line(health: &ChainHealth) -> String {
    format!(
        "{} transactions in the last {} blocks (latest #{})",
        health.transactions, health.blocks_scanned, health.latest_block
    )
}

fn chain_warning_line(health: &ChainHealth, minimum: u64) -> String {
    format!(
        "Only {} (minimum {minimum}).",
        chain_line(health)
    )
}
