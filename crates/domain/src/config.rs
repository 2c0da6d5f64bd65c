//! Environment-driven configuration for the monitor binary.

use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::schedule::{Schedule, ScheduleError};

/// Config-table keys resolved by the monitor at the start of each tick.
pub mod keys {
    pub const L1_RPC: &str = "sepolia-rpc";
    pub const L2_RPC: &str = "saturn-rpc";
    pub const L1_EXPLORER: &str = "sepolia-block-explorer";
    pub const L2_EXPLORER: &str = "saturn-block-explorer";
    pub const WEBHOOK_URL: &str = "teams-webhook";
    pub const ADMIN_EMAIL: &str = "admin-email";
    pub const ADMIN_EMAIL_PASSWORD: &str = "admin-email-psw";

    /// Sender credentials share the `email` row type with recipients.
    pub fn is_credential(key: &str) -> bool {
        key == ADMIN_EMAIL || key == ADMIN_EMAIL_PASSWORD
    }
}

const DEFAULT_SMTP_HOST: &str = "smtp.office365.com";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_CERT_ALERT_WINDOW_HOURS: u64 = 48;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// Everything the monitor reads from `.env`/process variables. Settings that
/// may change between ticks live in the config table instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    database_url: String,
    smtp_host: String,
    smtp_port: u16,
    admin_email: Option<String>,
    admin_email_password: Option<String>,
    decrypt_key: Option<String>,
    cert_alert_window: Duration,
    probe_timeout: Duration,
    sql_logging: bool,
    cert_schedule: Schedule,
    wallet_schedule: Schedule,
    chain_schedule: Option<Schedule>,
}

impl BootstrapConfig {
    /// Loads configuration by hydrating `.env` (if present) and reading the
    /// process variables. Missing or malformed entries surface as
    /// `ConfigError`.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let database_url = match get_optional_var("DATABASE_URL") {
            Some(url) => url,
            None => postgres_url_from_parts()?,
        };
        let smtp_port = match get_optional_var("SMTP_PORT") {
            Some(raw) => raw.parse().map_err(|source| ConfigError::InvalidNumber {
                key: "SMTP_PORT",
                source,
            })?,
            None => DEFAULT_SMTP_PORT,
        };
        let cert_alert_window_hours =
            parse_u64_or("CERT_ALERT_WINDOW_HOURS", DEFAULT_CERT_ALERT_WINDOW_HOURS)?;
        let cert_alert_window_secs = cert_alert_window_hours.checked_mul(3600).ok_or(
            ConfigError::OutOfRange {
                key: "CERT_ALERT_WINDOW_HOURS",
            },
        )?;
        let probe_timeout_secs = parse_u64_or("PROBE_TIMEOUT_SECS", DEFAULT_PROBE_TIMEOUT_SECS)?;

        Ok(Self {
            database_url,
            smtp_host: get_optional_var("SMTP_HOST")
                .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            smtp_port,
            admin_email: get_optional_var("ADMIN_EMAIL"),
            admin_email_password: get_optional_var("ADMIN_EMAIL_PASSWORD"),
            decrypt_key: get_optional_var("DECRYPT_KEY"),
            cert_alert_window: Duration::from_secs(cert_alert_window_secs),
            probe_timeout: Duration::from_secs(probe_timeout_secs),
            sql_logging: parse_flag("DATABASE_SQL_LOGGING")?,
            cert_schedule: parse_schedule("CERT_SCHEDULE")?
                .unwrap_or_else(|| Schedule::daily_at(1, 0)),
            wallet_schedule: parse_schedule("WALLET_SCHEDULE")?
                .unwrap_or_else(|| Schedule::daily_at(8, 0)),
            chain_schedule: parse_schedule("CHAIN_SCHEDULE")?,
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn smtp_host(&self) -> &str {
        &self.smtp_host
    }

    pub fn smtp_port(&self) -> u16 {
        self.smtp_port
    }

    pub fn admin_email(&self) -> Option<&str> {
        self.admin_email.as_deref()
    }

    pub fn admin_email_password(&self) -> Option<&str> {
        self.admin_email_password.as_deref()
    }

    pub fn decrypt_key(&self) -> Option<&str> {
        self.decrypt_key.as_deref()
    }

    pub fn cert_alert_window(&self) -> Duration {
        self.cert_alert_window
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Echo every SQL statement through `tracing`.
    pub fn sql_logging(&self) -> bool {
        self.sql_logging
    }

    pub fn cert_schedule(&self) -> &Schedule {
        &self.cert_schedule
    }

    pub fn wallet_schedule(&self) -> &Schedule {
        &self.wallet_schedule
    }

    pub fn chain_schedule(&self) -> Option<&Schedule> {
        self.chain_schedule.as_ref()
    }
}

fn postgres_url_from_parts() -> Result<String, ConfigError> {
    let host = get_required_var("INFO_DB_HOST").map_err(|_| ConfigError::MissingVar {
        key: "DATABASE_URL",
    })?;
    let port = get_required_var("INFO_DB_PORT")?;
    let user = get_required_var("INFO_DB_USERNAME")?;
    let password = get_required_var("INFO_DB_PASSWORD")?;
    let name = get_required_var("INFO_DB_NAME")?;

    // `Url` percent-encodes the credentials.
    let mut url = Url::parse(&format!("postgres://{host}:{port}/{name}"))
        .map_err(|_| ConfigError::InvalidDatabaseUrl)?;
    url.set_username(&user)
        .map_err(|()| ConfigError::InvalidDatabaseUrl)?;
    url.set_password(Some(&password))
        .map_err(|()| ConfigError::InvalidDatabaseUrl)?;
    Ok(url.into())
}

fn parse_flag(key: &'static str) -> Result<bool, ConfigError> {
    match get_optional_var(key).map(|raw| raw.to_ascii_lowercase()) {
        None => Ok(false),
        Some(raw) => match raw.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key }),
        },
    }
}

fn parse_u64_or(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match get_optional_var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|source| ConfigError::InvalidNumber { key, source }),
        None => Ok(default),
    }
}

fn parse_schedule(key: &'static str) -> Result<Option<Schedule>, ConfigError> {
    get_optional_var(key)
        .map(|raw| raw.parse())
        .transpose()
        .map_err(|source| ConfigError::InvalidSchedule { key, source })
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    get_optional_var(key).ok_or(ConfigError::MissingVar { key })
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
    if env::var_os("HEALTHWATCH_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("`{key}` is out of range")]
    OutOfRange { key: &'static str },
    #[error("invalid boolean in `{key}`")]
    InvalidFlag { key: &'static str },
    #[error("INFO_DB_* settings do not form a valid database url")]
    InvalidDatabaseUrl,
    #[error("invalid schedule in `{key}`: {source}")]
    InvalidSchedule {
        key: &'static str,
        #[source]
        source: ScheduleError,
    },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}
