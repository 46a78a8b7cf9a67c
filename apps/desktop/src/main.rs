//! Headless mint client: the no-doodle variant of the flow. Connects a
//! wallet, reports the remaining supply, mints once, and waits for the
//! on-chain mint event to print the marketplace link.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chain_rpc::{ContractSpec, JsonRpcClient, RpcMintContract, RpcWalletProvider};
use clap::Parser;
use mint_flow::{MintFlowConfig, MintFlowController, MintFlowEvent};
use shared::domain::{Address, ChainId};
use tracing::warn;

#[derive(Parser, Debug)]
struct Args {
    /// Wallet/node JSON-RPC endpoint.
    #[arg(long, default_value = "http://127.0.0.1:8545")]
    rpc_url: String,
    #[arg(long, default_value = "0xe606a90181235ecA2af8fA1D69e5e1659eDc1501")]
    contract_address: String,
    #[arg(long, default_value = "0xaa36a7")]
    required_chain_id: String,
    #[arg(long, default_value_t = 50)]
    total_supply: u64,
    /// This variant mints without a payload.
    #[arg(long, default_value = "mint()")]
    mint_signature: String,
    #[arg(long, default_value = "getTotalMinted()")]
    total_minted_signature: String,
    #[arg(long, default_value = "DoodleMinted(address,uint256)")]
    mint_event_signature: String,
    #[arg(long, default_value = "https://testnets.opensea.io/assets")]
    marketplace_base_url: String,
    #[arg(long, default_value = "doodle-nft-collection")]
    collection_slug: String,
    #[arg(long, default_value = "https://sepolia.etherscan.io")]
    explorer_base_url: String,
    /// Seconds to wait for the on-chain mint event after confirmation.
    #[arg(long, default_value_t = 120)]
    event_wait_seconds: u64,
    /// Only report the remaining supply, do not mint.
    #[arg(long)]
    count_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let contract_address: Address = args
        .contract_address
        .parse()
        .with_context(|| format!("invalid contract address '{}'", args.contract_address))?;
    let required_chain: ChainId = args
        .required_chain_id
        .parse()
        .with_context(|| format!("invalid chain id '{}'", args.required_chain_id))?;

    let config = MintFlowConfig {
        contract_address,
        required_chain,
        total_supply: args.total_supply,
        marketplace_base_url: args.marketplace_base_url.clone(),
        collection_slug: args.collection_slug.clone(),
        explorer_base_url: args.explorer_base_url.clone(),
        requires_doodle: false,
    };

    let rpc = Arc::new(JsonRpcClient::new(
        args.rpc_url
            .parse()
            .with_context(|| format!("invalid rpc url '{}'", args.rpc_url))?,
    ));
    let wallet = Arc::new(RpcWalletProvider::new(Arc::clone(&rpc)));
    let contract = Arc::new(RpcMintContract::new(
        rpc,
        ContractSpec {
            address: contract_address,
            mint_signature: args.mint_signature.clone(),
            total_minted_signature: args.total_minted_signature.clone(),
            mint_event_signature: args.mint_event_signature.clone(),
        },
    ));
    let controller = MintFlowController::new(config, wallet, contract);
    let mut events = controller.subscribe_events();

    controller.refresh_minted_count().await;
    let snapshot = controller.snapshot();
    match snapshot.remaining(args.total_supply) {
        Some(remaining) => println!("{remaining} of {} NFTs remaining", args.total_supply),
        None => println!("Could not read the minted count; continuing"),
    }

    controller.check_existing_connection().await;
    let account = match controller.snapshot().account {
        Some(account) => account,
        None => {
            println!("No authorized account found; requesting access (check your wallet)...");
            controller.connect().await?
        }
    };
    println!("Connected as {account}");

    if args.count_only {
        controller.shutdown().await;
        return Ok(());
    }

    let tx_hash = controller.mint(None).await?;
    println!(
        "Mint confirmed: {}",
        controller.config().explorer_tx_url(tx_hash)
    );

    println!(
        "Waiting up to {}s for the mint event...",
        args.event_wait_seconds
    );
    let observed = tokio::time::timeout(Duration::from_secs(args.event_wait_seconds), async {
        loop {
            match events.recv().await {
                Ok(MintFlowEvent::MintObserved {
                    token_id,
                    marketplace_url,
                    ..
                }) => break Some((token_id, marketplace_url)),
                Ok(_) => continue,
                Err(err) => {
                    warn!("event stream ended: {err}");
                    break None;
                }
            }
        }
    })
    .await;

    match observed {
        Ok(Some((token_id, marketplace_url))) => {
            println!("Minted token #{token_id}: {marketplace_url}");
        }
        Ok(None) => println!("Event stream closed before the mint event arrived"),
        Err(_) => println!("No mint event observed in time; it may still land on the marketplace"),
    }

    controller.shutdown().await;
    Ok(())
}
