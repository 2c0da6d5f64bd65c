use std::str::FromStr;

use chrono::{DateTime, Utc};
use healthwatch_domain::model::{Balance, Network, WalletState};
use healthwatch_domain::storage::{StorageError, StorageResult, WalletStateStore};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use tracing::debug;

use crate::entity::wallet_state;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl WalletStateStore for SeaOrmStorage {
    async fn upsert_balance(
        &self,
        address: &str,
        network: Network,
        balance: &Balance,
        observed_at: DateTime<Utc>,
    ) -> StorageResult<WalletState> {
        let txn = self
            .connection()
            .begin()
            .await
            .map_err(StorageError::from_source)?;

        let existing = wallet_state::Entity::find()
            .filter(wallet_state::Column::WalletAddress.eq(address))
            .filter(wallet_state::Column::NetworkEnv.eq(network.to_string()))
            .one(&txn)
            .await
            .map_err(StorageError::from_source)?;

        let previous = match &existing {
            Some(model) => parse_balance(&model.balance)?,
            None => Balance::zero(),
        };
        let change = balance - &previous;

        let stored = match existing {
            Some(model) => {
                let mut active: wallet_state::ActiveModel = model.into();
                active.balance = Set(balance.to_string());
                active.balance_change = Set(change.to_string());
                active.updated_at = Set(observed_at);
                active.update(&txn).await
            }
            None => {
                wallet_state::ActiveModel {
                    wallet_address: Set(address.to_string()),
                    balance: Set(balance.to_string()),
                    balance_change: Set(change.to_string()),
                    network_env: Set(network.to_string()),
                    updated_at: Set(observed_at),
                    ..Default::default()
                }
                .insert(&txn)
                .await
            }
        }
        .map_err(StorageError::from_source)?;

        txn.commit().await.map_err(StorageError::from_source)?;
        debug!(address, %network, previous = %previous, change = %change, "wallet state stored");
        model_to_state(stored)
    }

    async fn find_wallet_state(
        &self,
        address: &str,
        network: Network,
    ) -> StorageResult<Option<WalletState>> {
        let maybe = wallet_state::Entity::find()
            .filter(wallet_state::Column::WalletAddress.eq(address))
            .filter(wallet_state::Column::NetworkEnv.eq(network.to_string()))
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        maybe.map(model_to_state).transpose()
    }
}

fn parse_balance(raw: &str) -> StorageResult<Balance> {
    Balance::from_str(raw).map_err(StorageError::from_source)
}

fn model_to_state(model: wallet_state::Model) -> StorageResult<WalletState> {
    let network =
        Network::from_str(&model.network_env).map_err(|err| StorageError::Database(err.to_string()))?;

    Ok(WalletState {
        address: model.wallet_address,
        network,
        balance: parse_balance(&model.balance)?,
        balance_change: parse_balance(&model.balance_change)?,
        updated_at: model.updated_at,
    })
}
