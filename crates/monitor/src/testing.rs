//! In-memory doubles for the storage traits, probes and delivery channels.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use healthwatch_domain::model::{
    Balance, CertificateInfo, ChainHealth, ConfigCategory, ConfigEntry, Network, NewConfigEntry,
    SmtpCredentials, WalletState,
};
use healthwatch_domain::storage::{ConfigStore, StorageError, StorageResult, WalletStateStore};

use crate::notify::{DeliveryError, Mailer, MessageCard, WebhookSender};
use crate::probe::ProbeError;
use crate::rpc::{BalanceSource, ChainSource};
use crate::tls::CertificateProbe;

pub fn domain(key: &str, value: &str) -> NewConfigEntry {
    NewConfigEntry::new(ConfigCategory::Domain, key, value)
}

pub fn email(key: &str, value: &str) -> NewConfigEntry {
    NewConfigEntry::new(ConfigCategory::Email, key, value)
}

pub fn endpoint(key: &str, value: &str) -> NewConfigEntry {
    NewConfigEntry::new(ConfigCategory::Endpoint, key, value)
}

pub fn wallet(network: Network, key: &str, value: &str) -> NewConfigEntry {
    NewConfigEntry::new(ConfigCategory::Wallet(network), key, value)
}

pub fn expires_in(now: DateTime<Utc>, remaining: Duration) -> DateTime<Utc> {
    now + remaining
}

pub fn config_with(entries: Vec<NewConfigEntry>) -> MemoryConfig {
    let rows = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| ConfigEntry {
            id: index as i32 + 1,
            key: entry.key,
            value: entry.value,
            category: entry.category,
            active: entry.active,
            note: entry.note,
        })
        .collect();
    MemoryConfig {
        rows: Mutex::new(rows),
        failure: Mutex::new(None),
    }
}

pub struct MemoryConfig {
    rows: Mutex<Vec<ConfigEntry>>,
    failure: Mutex<Option<String>>,
}

impl MemoryConfig {
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn replace_value(&self, key: &str, value: &str) {
        for row in self.rows.lock().unwrap().iter_mut() {
            if row.key == key {
                row.value = value.to_string();
            }
        }
    }

    fn check(&self) -> StorageResult<()> {
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(StorageError::Database(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryConfig {
    async fn get(&self, key: &str) -> StorageResult<String> {
        self.check()?;
        let rows = self.rows.lock().unwrap();
        rows.iter()
            .filter(|row| row.key == key)
            .max_by_key(|row| (row.active, -row.id))
            .map(|row| row.value.clone())
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn list(
        &self,
        category: ConfigCategory,
        active_only: bool,
    ) -> StorageResult<Vec<ConfigEntry>> {
        self.check()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| category.matches(row.category.row_type(), &row.key))
            .filter(|row| !active_only || row.active)
            .cloned()
            .map(|row| ConfigEntry { category, ..row })
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryWallets {
    balances: Mutex<HashMap<(String, Network), Balance>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryWallets {
    pub fn fail_for(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }
}

#[async_trait]
impl WalletStateStore for MemoryWallets {
    async fn upsert_balance(
        &self,
        address: &str,
        network: Network,
        balance: &Balance,
        observed_at: DateTime<Utc>,
    ) -> StorageResult<WalletState> {
        if self.failing.lock().unwrap().contains(address) {
            return Err(StorageError::Database("disk full".into()));
        }
        let mut balances = self.balances.lock().unwrap();
        let previous = balances
            .insert((address.to_string(), network), balance.clone())
            .unwrap_or_default();
        Ok(WalletState {
            address: address.to_string(),
            network,
            balance: balance.clone(),
            balance_change: balance - &previous,
            updated_at: observed_at,
        })
    }

    async fn find_wallet_state(
        &self,
        _address: &str,
        _network: Network,
    ) -> StorageResult<Option<WalletState>> {
        Ok(None)
    }
}

#[derive(Default)]
pub struct FakeCertificates {
    results: Mutex<HashMap<String, Result<DateTime<Utc>, ProbeError>>>,
    probed: Mutex<Vec<String>>,
}

impl FakeCertificates {
    pub fn set(&self, target: &str, result: Result<DateTime<Utc>, ProbeError>) {
        self.results
            .lock()
            .unwrap()
            .insert(target.to_string(), result);
    }

    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl CertificateProbe for FakeCertificates {
    async fn check_expiry(&self, target: &str) -> Result<CertificateInfo, ProbeError> {
        self.probed.lock().unwrap().push(target.to_string());
        let result = self
            .results
            .lock()
            .unwrap()
            .get(target)
            .cloned()
            .unwrap_or_else(|| Err(ProbeError::Connect(format!("{target}: refused"))));
        result.map(|not_after| CertificateInfo {
            domain: target.to_string(),
            not_after,
        })
    }
}

#[derive(Default)]
pub struct FakeBalances {
    results: Mutex<HashMap<String, Result<Balance, ProbeError>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeBalances {
    pub fn set(&self, address: &str, result: Result<Balance, ProbeError>) {
        self.results
            .lock()
            .unwrap()
            .insert(address.to_string(), result);
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BalanceSource for FakeBalances {
    async fn balance(&self, endpoint: &str, address: &str) -> Result<Balance, ProbeError> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), address.to_string()));
        self.results
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_else(|| Err(ProbeError::Rpc(format!("no balance for {address}"))))
    }
}

#[derive(Default)]
pub struct FakeChain {
    result: Mutex<Option<Result<ChainHealth, ProbeError>>>,
    calls: Mutex<Vec<(String, u64)>>,
}

impl FakeChain {
    pub fn set(&self, result: Result<ChainHealth, ProbeError>) {
        *self.result.lock().unwrap() = Some(result);
    }

    pub fn calls(&self) -> Vec<(String, u64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainSource for FakeChain {
    async fn chain_health(&self, endpoint: &str, window: u64) -> Result<ChainHealth, ProbeError> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), window));
        self.result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ProbeError::Rpc("not configured".into())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    pub fn fail_for(&self, recipient: &str) {
        self.failing.lock().unwrap().insert(recipient.to_string());
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        credentials: &SmtpCredentials,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        if self.failing.lock().unwrap().contains(recipient) {
            return Err(DeliveryError::Build(format!("{recipient} rejected")));
        }
        self.sent.lock().unwrap().push(SentEmail {
            sender: credentials.username.clone(),
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingWebhook {
    posts: Mutex<Vec<(String, MessageCard)>>,
    failure_status: Mutex<Option<u16>>,
}

impl RecordingWebhook {
    pub fn fail_with_status(&self, status: u16) {
        *self.failure_status.lock().unwrap() = Some(status);
    }

    /// Successful posts only.
    pub fn posts(&self) -> Vec<(String, MessageCard)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookSender for RecordingWebhook {
    async fn post(&self, url: &str, card: &MessageCard) -> Result<(), DeliveryError> {
        if let Some(status) = *self.failure_status.lock().unwrap() {
            return Err(DeliveryError::Webhook {
                status,
                body: "upstream error".into(),
            });
        }
        self.posts
            .lock()
            .unwrap()
            .push((url.to_string(), card.clone()));
        Ok(())
    }
}
