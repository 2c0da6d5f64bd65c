//! Data structures shared across the storage adapters and the monitor.

mod balance;

use chrono::{DateTime, Utc};
use strum_macros::{Display, EnumString};

pub use balance::{Balance, BalanceParseError, WEI_DECIMALS};

/// Config row type used for every wallet, whichever network it belongs to.
pub const WALLET_ROW_TYPE: &str = "wallet-address";

/// Chain context a wallet lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Network {
    /// Sepolia testnet.
    L1,
    /// The chain under monitoring.
    L2,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::L1, Network::L2];

    /// Human label used in digest lines.
    pub fn label(self) -> &'static str {
        match self {
            Network::L1 => "Sepolia",
            Network::L2 => "Swan Chain",
        }
    }

    /// Key prefix that tags a `wallet-address` config row with this network.
    pub fn key_prefix(self) -> &'static str {
        match self {
            Network::L1 => "l1",
            Network::L2 => "l2",
        }
    }
}

/// Logical category of a config row. Wallet categories share the
/// `wallet-address` row type and are told apart by key prefix once, here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigCategory {
    Domain,
    Email,
    Wallet(Network),
    Secret,
    Endpoint,
}

impl ConfigCategory {
    /// Value stored in the `type` column.
    pub fn row_type(self) -> &'static str {
        match self {
            ConfigCategory::Domain => "domain",
            ConfigCategory::Email => "email",
            ConfigCategory::Wallet(_) => WALLET_ROW_TYPE,
            ConfigCategory::Secret => "secret",
            ConfigCategory::Endpoint => "endpoint",
        }
    }

    /// Whether a row with the given type and key belongs to this category.
    pub fn matches(self, row_type: &str, key: &str) -> bool {
        if !row_type.eq_ignore_ascii_case(self.row_type()) {
            return false;
        }
        match self {
            ConfigCategory::Wallet(network) => key
                .get(..network.key_prefix().len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(network.key_prefix())),
            _ => true,
        }
    }

    pub fn network(self) -> Option<Network> {
        match self {
            ConfigCategory::Wallet(network) => Some(network),
            _ => None,
        }
    }
}

/// One row of the generic key/value config table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub id: i32,
    pub key: String,
    pub value: String,
    pub category: ConfigCategory,
    pub active: bool,
    pub note: Option<String>,
}

/// Insert payload for a config row; used by seeding tools and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConfigEntry {
    pub key: String,
    pub value: String,
    pub category: ConfigCategory,
    pub active: bool,
    pub note: Option<String>,
}

impl NewConfigEntry {
    pub fn new(category: ConfigCategory, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            category,
            active: true,
            note: None,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Wallet worklist item with its network decided at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletTarget {
    pub name: String,
    pub address: String,
    pub network: Network,
}

impl WalletTarget {
    /// Returns `None` for entries that are not wallet rows.
    pub fn from_entry(entry: &ConfigEntry) -> Option<Self> {
        let network = entry.category.network()?;
        Some(Self {
            name: entry.key.clone(),
            address: entry.value.trim().to_string(),
            network,
        })
    }
}

/// Last known balance for one `(address, network)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletState {
    pub address: String,
    pub network: Network,
    pub balance: Balance,
    pub balance_change: Balance,
    pub updated_at: DateTime<Utc>,
}

/// Leaf certificate expiry observed during a probe. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub domain: String,
    pub not_after: DateTime<Utc>,
}

/// Block activity observed over a short trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHealth {
    pub latest_block: u64,
    pub blocks_scanned: u64,
    pub transactions: u64,
}

/// RPC and explorer endpoints resolved at the start of a wallet tick and
/// handed to every probe of that tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEndpoints {
    pub l1_rpc: String,
    pub l2_rpc: String,
    pub l1_explorer: Option<String>,
    pub l2_explorer: Option<String>,
}

impl ChainEndpoints {
    pub fn rpc(&self, network: Network) -> &str {
        match network {
            Network::L1 => &self.l1_rpc,
            Network::L2 => &self.l2_rpc,
        }
    }

    pub fn explorer(&self, network: Network) -> Option<&str> {
        match network {
            Network::L1 => self.l1_explorer.as_deref(),
            Network::L2 => self.l2_explorer.as_deref(),
        }
    }
}

/// SMTP submission credentials; the username doubles as the sender.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn wallet_category_matches_prefix_case_insensitively() {
        let l1 = ConfigCategory::Wallet(Network::L1);
        assert!(l1.matches("wallet-address", "l1-faucet"));
        assert!(l1.matches("wallet-address", "L1-bridge"));
        assert!(!l1.matches("wallet-address", "l2-faucet"));
        assert!(!l1.matches("domain", "l1-faucet"));
        assert!(!l1.matches("wallet-address", "l"));
    }

    #[test]
    fn plain_categories_ignore_key() {
        assert!(ConfigCategory::Domain.matches("domain", "anything"));
        assert!(!ConfigCategory::Domain.matches("email", "anything"));
    }

    #[test]
    fn network_round_trips_through_strum() {
        assert_eq!(Network::L2.to_string(), "l2");
        assert_eq!(Network::from_str("l1").unwrap(), Network::L1);
        assert!(Network::from_str("mainnet").is_err());
    }

    #[test]
    fn wallet_target_takes_network_from_category() {
        let entry = ConfigEntry {
            id: 1,
            key: "l2-relayer".into(),
            value: " 0xabc ".into(),
            category: ConfigCategory::Wallet(Network::L2),
            active: true,
            note: None,
        };
        let target = WalletTarget::from_entry(&entry).expect("wallet entry");
        assert_eq!(target.network, Network::L2);
        assert_eq!(target.address, "0xabc");

        let domain = ConfigEntry {
            category: ConfigCategory::Domain,
            ..entry
        };
        assert!(WalletTarget::from_entry(&domain).is_none());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = SmtpCredentials {
            username: "ops@example.com".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("ops@example.com"));
        assert!(!rendered.contains("hunter2"));
    }
}
