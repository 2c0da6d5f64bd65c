use std::time::Duration;

use async_trait::async_trait;
use healthwatch_domain::model::{Balance, ChainHealth};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::probe::ProbeError;

mod types;

pub use types::{BlockSummary, JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse};

#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Current balance of `address` at the latest block, in ether.
    async fn balance(&self, endpoint: &str, address: &str) -> Result<Balance, ProbeError>;
}

#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Counts transactions from `latest - window` through `latest`.
    async fn chain_health(&self, endpoint: &str, window: u64) -> Result<ChainHealth, ProbeError>;
}

/// Plain JSON-RPC 2.0 over HTTP POST. The endpoint is passed per call so a
/// tick can hand in the URLs it resolved from the config table.
#[derive(Clone)]
pub struct JsonRpcClient {
    http: reqwest::Client,
}

impl JsonRpcClient {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ProbeError::Rpc(err.to_string()))?;
        Ok(Self { http })
    }

    async fn call<P, R>(&self, endpoint: &str, method: &'static str, params: P) -> Result<R, ProbeError>
    where
        P: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        let request = JsonRpcRequest::new(method, params);
        let response = self
            .http
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| ProbeError::Rpc(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Rpc(format!("{method} returned http {status}")));
        }

        let body: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|err| ProbeError::MalformedResponse(err.to_string()))?;
        if let Some(error) = body.error {
            return Err(ProbeError::Rpc(format!("{} (code {})", error.message, error.code)));
        }
        body.result
            .ok_or_else(|| ProbeError::MalformedResponse(format!("{method} returned no result")))
    }

    async fn block_number(&self, endpoint: &str) -> Result<u64, ProbeError> {
        let raw: String = self.call(endpoint, "eth_blockNumber", Vec::<String>::new()).await?;
        parse_quantity(&raw)
    }

    async fn block_transaction_count(&self, endpoint: &str, number: u64) -> Result<u64, ProbeError> {
        let block: Option<BlockSummary> = self
            .call(endpoint, "eth_getBlockByNumber", (format!("0x{number:x}"), false))
            .await?;
        let block =
            block.ok_or_else(|| ProbeError::MalformedResponse(format!("block {number} not found")))?;
        Ok(block.transactions.len() as u64)
    }
}

#[async_trait]
impl BalanceSource for JsonRpcClient {
    async fn balance(&self, endpoint: &str, address: &str) -> Result<Balance, ProbeError> {
        let raw: String = self
            .call(endpoint, "eth_getBalance", (address, "latest"))
            .await?;
        Balance::from_hex_wei(&raw).map_err(|err| ProbeError::MalformedResponse(err.to_string()))
    }
}

#[async_trait]
impl ChainSource for JsonRpcClient {
    async fn chain_health(&self, endpoint: &str, window: u64) -> Result<ChainHealth, ProbeError> {
        let latest = self.block_number(endpoint).await?;
        let first = latest.saturating_sub(window);

        let mut transactions = 0;
        for number in first..=latest {
            let count = self.block_transaction_count(endpoint, number).await?;
            debug!(number, count, "block scanned");
            transactions += count;
        }

        Ok(ChainHealth {
            latest_block: latest,
            blocks_scanned: latest - first + 1,
            transactions,
        })
    }
}

fn parse_quantity(raw: &str) -> Result<u64, ProbeError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| ProbeError::MalformedResponse(format!("quantity `{raw}` lacks 0x prefix")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|err| ProbeError::MalformedResponse(format!("quantity `{raw}`: {err}")))
}
