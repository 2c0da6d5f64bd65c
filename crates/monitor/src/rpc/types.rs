use serde::{Deserialize, Serialize};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<T> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: T,
    pub id: u64,
}

impl<T> JsonRpcRequest<T> {
    pub fn new(method: &'static str, params: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id: 1,
        }
    }
}

/// Nodes return either `result` or `error`; both are optional here so a
/// missing field is reported as a malformed response instead of a decode
/// failure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// The part of `eth_getBlockByNumber(n, false)` the chain-health probe reads;
/// `transactions` holds hashes only.
#[derive(Debug, Deserialize)]
pub struct BlockSummary {
    #[serde(default)]
    pub transactions: Vec<serde_json::Value>,
}
