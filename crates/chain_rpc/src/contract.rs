//! The fixed mint contract over JSON-RPC: one read call, one write call with
//! a receipt-polling confirmation wait, and a log-polling event subscription.

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mint_flow::{MintContract, MintEvent, MintEventSubscription, PendingMint};
use serde::Deserialize;
use serde_json::json;
use shared::{
    abi,
    domain::{format_quantity, Address, BlockNumber, TxHash},
};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::IntervalStream, StreamExt};
use tracing::warn;

use crate::JsonRpcClient;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const RECEIPT_POLL_ATTEMPTS: usize = 150;
const LOG_POLL_INTERVAL: Duration = Duration::from_secs(4);
const EVENT_QUEUE_CAPACITY: usize = 64;

/// Compiled-in contract wiring for one app variant.
#[derive(Debug, Clone)]
pub struct ContractSpec {
    pub address: Address,
    /// Canonical mint signature, e.g. `"mintDoodle(string)"` or `"mint()"`.
    pub mint_signature: String,
    pub total_minted_signature: String,
    /// Event shape `Name(address indexed minter, uint256 tokenId)`.
    pub mint_event_signature: String,
}

pub struct RpcMintContract {
    rpc: Arc<JsonRpcClient>,
    spec: ContractSpec,
    receipt_poll_interval: Duration,
    receipt_poll_attempts: usize,
    log_poll_interval: Duration,
}

impl RpcMintContract {
    pub fn new(rpc: Arc<JsonRpcClient>, spec: ContractSpec) -> Self {
        Self {
            rpc,
            spec,
            receipt_poll_interval: RECEIPT_POLL_INTERVAL,
            receipt_poll_attempts: RECEIPT_POLL_ATTEMPTS,
            log_poll_interval: LOG_POLL_INTERVAL,
        }
    }

    /// Shortens the polling cadence; tests use millisecond intervals.
    pub fn with_poll_intervals(
        mut self,
        receipt_interval: Duration,
        receipt_attempts: usize,
        log_interval: Duration,
    ) -> Self {
        self.receipt_poll_interval = receipt_interval;
        self.receipt_poll_attempts = receipt_attempts;
        self.log_poll_interval = log_interval;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ReceiptBody {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogBody {
    topics: Vec<String>,
    data: String,
    #[serde(rename = "blockNumber")]
    block_number: String,
}

struct RpcPendingMint {
    rpc: Arc<JsonRpcClient>,
    tx_hash: TxHash,
    poll_interval: Duration,
    poll_attempts: usize,
}

#[async_trait]
impl PendingMint for RpcPendingMint {
    fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    async fn wait(self: Box<Self>) -> Result<TxHash> {
        for _ in 0..self.poll_attempts {
            let receipt: Option<ReceiptBody> = self
                .rpc
                .call("eth_getTransactionReceipt", json!([self.tx_hash]))
                .await?;
            if let Some(receipt) = receipt {
                return match receipt.status.as_deref() {
                    Some("0x1") => Ok(self.tx_hash),
                    Some("0x0") => Err(anyhow!("transaction {} reverted", self.tx_hash)),
                    other => Err(anyhow!(
                        "transaction {} confirmed with unrecognized status {other:?}",
                        self.tx_hash
                    )),
                };
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(anyhow!(
            "no receipt for {} after {} polls",
            self.tx_hash,
            self.poll_attempts
        ))
    }
}

#[async_trait]
impl MintContract for RpcMintContract {
    async fn total_minted(&self) -> Result<u64> {
        let data = abi::to_hex_payload(&abi::encode_call(&self.spec.total_minted_signature));
        let raw: String = self
            .rpc
            .call(
                "eth_call",
                json!([{ "to": self.spec.address, "data": data }, "latest"]),
            )
            .await?;
        let word = abi::from_hex_payload(&raw)?;
        Ok(abi::decode_uint_word(&word)?)
    }

    async fn mint(&self, from: Address, payload: Option<&str>) -> Result<Box<dyn PendingMint>> {
        let calldata = match payload {
            Some(value) => abi::encode_call_with_string(&self.spec.mint_signature, value),
            None => abi::encode_call(&self.spec.mint_signature),
        };
        let raw: String = self
            .rpc
            .call(
                "eth_sendTransaction",
                json!([{
                    "from": from,
                    "to": self.spec.address,
                    "data": abi::to_hex_payload(&calldata),
                }]),
            )
            .await?;
        let tx_hash: TxHash = raw.parse()?;
        Ok(Box::new(RpcPendingMint {
            rpc: Arc::clone(&self.rpc),
            tx_hash,
            poll_interval: self.receipt_poll_interval,
            poll_attempts: self.receipt_poll_attempts,
        }))
    }

    async fn subscribe_mint_events(&self) -> Result<MintEventSubscription> {
        let tip: String = self.rpc.call("eth_blockNumber", json!([])).await?;
        let tip: BlockNumber = tip.parse()?;

        let rpc = Arc::clone(&self.rpc);
        let address = self.spec.address;
        let topic0 = abi::to_hex_payload(&abi::event_topic(&self.spec.mint_event_signature));
        let interval = self.log_poll_interval;
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        let task = tokio::spawn(async move {
            // Only emissions after subscription time are interesting.
            let mut from_block = BlockNumber(tip.0 + 1);
            let mut ticks = IntervalStream::new(tokio::time::interval(interval));
            while ticks.next().await.is_some() {
                let filter = json!([{
                    "address": address,
                    "topics": [topic0],
                    "fromBlock": format_quantity(from_block.0),
                    "toBlock": "latest",
                }]);
                let logs: Vec<LogBody> = match rpc.call("eth_getLogs", filter).await {
                    Ok(logs) => logs,
                    Err(err) => {
                        warn!("mint log poll failed: {err}");
                        continue;
                    }
                };
                for log in &logs {
                    if let Ok(block) = log.block_number.parse::<BlockNumber>() {
                        if block.0 >= from_block.0 {
                            from_block = BlockNumber(block.0 + 1);
                        }
                    }
                    match decode_log(log) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                // Subscriber dropped; the session is over.
                                return;
                            }
                        }
                        Err(err) => warn!("skipping undecodable mint log: {err:#}"),
                    }
                }
            }
        });

        Ok(MintEventSubscription::new(rx, Some(task)))
    }
}

fn decode_log(log: &LogBody) -> Result<MintEvent> {
    let topics = log
        .topics
        .iter()
        .map(|topic| abi::from_hex_payload(topic))
        .collect::<Result<Vec<_>, _>>()?;
    let data = abi::from_hex_payload(&log.data)?;
    let (minter, token_id) = abi::decode_mint_log(&topics, &data)?;
    Ok(MintEvent { minter, token_id })
}
