//! JSON-RPC integrations: the wallet provider and the fixed mint contract,
//! both speaking to an Ethereum-style endpoint over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub mod contract;
pub mod wallet;

pub use contract::{ContractSpec, RpcMintContract};
pub use wallet::RpcWalletProvider;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport failure talking to {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed rpc response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    // `eth_getTransactionReceipt` answers `result: null` for pending
    // transactions, so null must stay distinguishable from a decode failure.
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

pub struct JsonRpcClient {
    http: Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: Client::new(),
            endpoint,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| RpcError::Transport {
                endpoint: self.endpoint.to_string(),
                source,
            })?;

        let body: RpcResponse = response.json().await.map_err(|source| RpcError::Transport {
            endpoint: self.endpoint.to_string(),
            source,
        })?;

        if let Some(err) = body.error {
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        serde_json::from_value(body.result)
            .map_err(|err| RpcError::InvalidResponse(format!("{method}: {err}")))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
