//! Runtime bridge: a dedicated worker thread running a tokio runtime, the
//! mint flow controller, and the pumps between crossbeam queues and the
//! controller's event stream.

use std::{sync::Arc, thread};

use anyhow::Result;
use chain_rpc::{JsonRpcClient, RpcMintContract, RpcWalletProvider};
use crossbeam_channel::{Receiver, Sender};
use mint_flow::{MintFlowController, MintFlowEvent};
use tracing::error;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};
use crate::settings::VariantSettings;

pub fn launch(settings: VariantSettings, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let controller = match build_controller(&settings) {
                Ok(controller) => controller,
                Err(err) => {
                    let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                        UiErrorContext::BackendStartup,
                        format!("backend worker startup failure: {err:#}"),
                    )));
                    error!("failed to build mint flow controller: {err:#}");
                    return;
                }
            };

            let mut events = controller.subscribe_events();
            let ui_events = ui_tx.clone();
            let forward_task = tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    let _ = ui_events.try_send(map_flow_event(event));
                }
            });

            let _ = ui_tx.try_send(UiEvent::BackendReady);

            // Match the page-load order: show a count even when disconnected,
            // then adopt an already-authorized account silently.
            controller.refresh_minted_count().await;
            controller.check_existing_connection().await;

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    BackendCommand::Connect => {
                        if let Err(err) = controller.connect().await {
                            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                UiErrorContext::Connect,
                                err.to_string(),
                            )));
                        }
                    }
                    BackendCommand::Mint { doodle } => {
                        if let Err(err) = controller.mint(doodle.as_deref()).await {
                            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                UiErrorContext::Mint,
                                err.to_string(),
                            )));
                        }
                    }
                    BackendCommand::RefreshCount => {
                        controller.refresh_minted_count().await;
                    }
                    BackendCommand::Shutdown => {
                        controller.shutdown().await;
                        break;
                    }
                }
            }

            forward_task.abort();
        });
    });
}

fn build_controller(settings: &VariantSettings) -> Result<Arc<MintFlowController>> {
    let rpc = Arc::new(JsonRpcClient::new(settings.rpc_endpoint()?));
    let wallet = Arc::new(RpcWalletProvider::new(Arc::clone(&rpc)));
    let contract = Arc::new(RpcMintContract::new(rpc, settings.contract_spec()?));
    Ok(MintFlowController::new(
        settings.mint_flow_config(true)?,
        wallet,
        contract,
    ))
}

fn map_flow_event(event: MintFlowEvent) -> UiEvent {
    match event {
        MintFlowEvent::StateChanged(snapshot) => UiEvent::Snapshot(snapshot),
        MintFlowEvent::CountUpdated { minted } => UiEvent::CountUpdated { minted },
        MintFlowEvent::MintSubmitted { tx_hash } => UiEvent::MintSubmitted { tx_hash },
        MintFlowEvent::MintConfirmed {
            tx_hash,
            explorer_url,
        } => UiEvent::MintConfirmed {
            tx_hash,
            explorer_url,
        },
        MintFlowEvent::MintFailed { reason } => {
            UiEvent::Error(UiError::from_message(UiErrorContext::Mint, reason))
        }
        MintFlowEvent::MintObserved {
            minter,
            token_id,
            marketplace_url,
            observed_at,
        } => UiEvent::MintObserved {
            minter,
            token_id,
            marketplace_url,
            observed_at,
        },
        MintFlowEvent::Error(message) => {
            UiEvent::Error(UiError::from_message(UiErrorContext::General, message))
        }
    }
}
