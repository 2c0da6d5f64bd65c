use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Balance, ConfigCategory, ConfigEntry, Network, NewConfigEntry, WalletState};

/// Common result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("config key `{key}` not found")]
    NotFound { key: String },
}

impl StorageError {
    pub fn from_source(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Read path over the generic key/value config table. Nothing is cached:
/// every call observes the table as it is now.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Value of the first row carrying `key`, active rows first.
    async fn get(&self, key: &str) -> StorageResult<String>;

    /// Rows of one category in table order.
    async fn list(
        &self,
        category: ConfigCategory,
        active_only: bool,
    ) -> StorageResult<Vec<ConfigEntry>>;

    /// Like [`ConfigStore::get`] but maps `NotFound` to `None`.
    async fn get_optional(&self, key: &str) -> StorageResult<Option<String>> {
        match self.get(key).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Write path used by seeding and tests; the monitor never writes config.
#[async_trait]
pub trait ConfigWriter: Send + Sync {
    async fn insert_entry(&self, entry: NewConfigEntry) -> StorageResult<ConfigEntry>;
}

#[async_trait]
pub trait WalletStateStore: Send + Sync {
    /// Records `balance` for `(address, network)` and returns the stored
    /// state, whose `balance_change` is measured against the previous row
    /// (zero when there was none).
    async fn upsert_balance(
        &self,
        address: &str,
        network: Network,
        balance: &Balance,
        observed_at: DateTime<Utc>,
    ) -> StorageResult<WalletState>;

    async fn find_wallet_state(
        &self,
        address: &str,
        network: Network,
    ) -> StorageResult<Option<WalletState>>;
}
