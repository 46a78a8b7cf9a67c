//! Wallet provider backed by the account/chain subset of JSON-RPC.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mint_flow::WalletProvider;
use serde_json::json;
use shared::domain::{Address, ChainId};

use crate::JsonRpcClient;

pub struct RpcWalletProvider {
    rpc: Arc<JsonRpcClient>,
}

impl RpcWalletProvider {
    pub fn new(rpc: Arc<JsonRpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl WalletProvider for RpcWalletProvider {
    async fn get_accounts(&self) -> Result<Vec<Address>> {
        let raw: Vec<String> = self.rpc.call("eth_accounts", json!([])).await?;
        parse_accounts(raw)
    }

    async fn request_accounts(&self) -> Result<Vec<Address>> {
        let raw: Vec<String> = self.rpc.call("eth_requestAccounts", json!([])).await?;
        parse_accounts(raw)
    }

    async fn chain_id(&self) -> Result<ChainId> {
        let raw: String = self.rpc.call("eth_chainId", json!([])).await?;
        Ok(raw.parse::<ChainId>()?)
    }
}

fn parse_accounts(raw: Vec<String>) -> Result<Vec<Address>> {
    raw.into_iter()
        .map(|account| Ok(account.parse::<Address>()?))
        .collect()
}
