//! The mint flow controller: owns the connect / mint / event-listen / refresh
//! sequencing and exposes it to UIs as a state snapshot plus an event stream.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::{Address, ChainId, TokenId, TxHash};
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Compiled-in description of one app variant: the fixed contract, the
/// network it lives on, and the outbound link bases.
#[derive(Debug, Clone)]
pub struct MintFlowConfig {
    pub contract_address: Address,
    pub required_chain: ChainId,
    pub total_supply: u64,
    pub marketplace_base_url: String,
    pub collection_slug: String,
    pub explorer_base_url: String,
    /// The doodle variant refuses to mint without a captured drawing.
    pub requires_doodle: bool,
}

impl MintFlowConfig {
    pub fn marketplace_item_url(&self, token_id: TokenId) -> String {
        format!(
            "{}/{}/{}",
            self.marketplace_base_url.trim_end_matches('/'),
            self.contract_address,
            token_id
        )
    }

    pub fn marketplace_collection_url(&self) -> String {
        format!(
            "{}/{}",
            self.marketplace_base_url.trim_end_matches('/'),
            self.collection_slug
        )
    }

    pub fn explorer_tx_url(&self, tx_hash: TxHash) -> String {
        format!(
            "{}/tx/{}",
            self.explorer_base_url.trim_end_matches('/'),
            tx_hash
        )
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Whether a wallet endpoint is present at all. The null provider reports
    /// false, the moral equivalent of a page loaded without an injected
    /// wallet object.
    fn is_available(&self) -> bool {
        true
    }

    /// Already-authorized accounts, without prompting the user.
    async fn get_accounts(&self) -> Result<Vec<Address>>;

    /// Requests account access; the wallet may prompt the user.
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    async fn chain_id(&self) -> Result<ChainId>;
}

pub struct MissingWalletProvider;

#[async_trait]
impl WalletProvider for MissingWalletProvider {
    fn is_available(&self) -> bool {
        false
    }

    async fn get_accounts(&self) -> Result<Vec<Address>> {
        Err(anyhow!("wallet provider is unavailable"))
    }

    async fn request_accounts(&self) -> Result<Vec<Address>> {
        Err(anyhow!("wallet provider is unavailable"))
    }

    async fn chain_id(&self) -> Result<ChainId> {
        Err(anyhow!("wallet provider is unavailable"))
    }
}

/// A submitted but not-yet-confirmed mint write.
#[async_trait]
pub trait PendingMint: Send + Sync {
    fn tx_hash(&self) -> TxHash;

    /// Suspends until the transaction is confirmed on chain.
    async fn wait(self: Box<Self>) -> Result<TxHash>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintEvent {
    pub minter: Address,
    pub token_id: TokenId,
}

/// Single-consumer stream of on-chain mint events. Dropping the subscription
/// aborts the producer task, so listeners cannot outlive the session that
/// opened them.
pub struct MintEventSubscription {
    events: mpsc::Receiver<MintEvent>,
    task: Option<JoinHandle<()>>,
}

impl MintEventSubscription {
    pub fn new(events: mpsc::Receiver<MintEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { events, task }
    }

    /// A detached subscription fed by hand; used by in-process producers and
    /// test doubles.
    pub fn channel(capacity: usize) -> (mpsc::Sender<MintEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx, None))
    }

    pub async fn recv(&mut self) -> Option<MintEvent> {
        self.events.recv().await
    }
}

impl Drop for MintEventSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
pub trait MintContract: Send + Sync {
    async fn total_minted(&self) -> Result<u64>;

    async fn mint(&self, from: Address, payload: Option<&str>) -> Result<Box<dyn PendingMint>>;

    async fn subscribe_mint_events(&self) -> Result<MintEventSubscription>;
}

pub struct MissingMintContract;

#[async_trait]
impl MintContract for MissingMintContract {
    async fn total_minted(&self) -> Result<u64> {
        Err(anyhow!("mint contract client is unavailable"))
    }

    async fn mint(&self, _from: Address, _payload: Option<&str>) -> Result<Box<dyn PendingMint>> {
        Err(anyhow!("mint contract client is unavailable"))
    }

    async fn subscribe_mint_events(&self) -> Result<MintEventSubscription> {
        Err(anyhow!("mint contract client is unavailable"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Idle,
    Minting,
}

/// Immutable view of controller state, emitted on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintFlowSnapshot {
    pub phase: ConnectionPhase,
    pub account: Option<Address>,
    pub minted_count: Option<u64>,
}

impl MintFlowSnapshot {
    pub fn remaining(&self, total_supply: u64) -> Option<u64> {
        self.minted_count
            .map(|minted| total_supply.saturating_sub(minted))
    }
}

#[derive(Debug, Clone)]
pub enum MintFlowEvent {
    StateChanged(MintFlowSnapshot),
    CountUpdated {
        minted: u64,
    },
    MintSubmitted {
        tx_hash: TxHash,
    },
    MintConfirmed {
        tx_hash: TxHash,
        explorer_url: String,
    },
    MintFailed {
        reason: String,
    },
    /// One-time notification per on-chain mint emission, carrying the
    /// marketplace deep link for the freshly minted token.
    MintObserved {
        minter: Address,
        token_id: TokenId,
        marketplace_url: String,
        observed_at: DateTime<Utc>,
    },
    Error(String),
}

#[derive(Debug, Error)]
pub enum MintFlowError {
    #[error("wallet provider is unavailable; start or install a wallet")]
    WalletUnavailable,
    #[error("the wallet returned no authorized accounts")]
    NoAccountAuthorized,
    #[error("no wallet account connected")]
    NotConnected,
    #[error("a mint transaction is already in flight")]
    AlreadyMinting,
    #[error("no drawing captured; finish the doodle before minting")]
    MissingDoodle,
    #[error("connected to chain {actual}, but chain {required} is required")]
    WrongNetwork { actual: ChainId, required: ChainId },
    #[error("wallet request failed: {0}")]
    Wallet(#[source] anyhow::Error),
    #[error("contract call failed: {0}")]
    Contract(#[source] anyhow::Error),
}

struct ListenerHandle {
    task: JoinHandle<()>,
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct ControllerState {
    phase: ConnectionPhase,
    account: Option<Address>,
    minted_count: Option<u64>,
    listener: Option<ListenerHandle>,
}

pub struct MintFlowController {
    config: MintFlowConfig,
    wallet: Arc<dyn WalletProvider>,
    contract: Arc<dyn MintContract>,
    state: Mutex<ControllerState>,
    events: broadcast::Sender<MintFlowEvent>,
}

/// Scoped hold on the `Minting` phase: acquired atomically out of `Idle`,
/// released back to `Idle` on drop, so the flag resets on every exit path of
/// the mint flow, including failures.
struct MintingGuard {
    controller: Arc<MintFlowController>,
}

impl MintingGuard {
    fn try_acquire(controller: &Arc<MintFlowController>) -> Result<Self, MintFlowError> {
        {
            let mut state = controller.state.lock().expect("controller state lock");
            match state.phase {
                ConnectionPhase::Disconnected => return Err(MintFlowError::NotConnected),
                ConnectionPhase::Minting => return Err(MintFlowError::AlreadyMinting),
                ConnectionPhase::Idle => state.phase = ConnectionPhase::Minting,
            }
        }
        controller.emit_state();
        Ok(Self {
            controller: Arc::clone(controller),
        })
    }
}

impl Drop for MintingGuard {
    fn drop(&mut self) {
        {
            let mut state = self
                .controller
                .state
                .lock()
                .expect("controller state lock");
            if state.phase == ConnectionPhase::Minting {
                state.phase = ConnectionPhase::Idle;
            }
        }
        self.controller.emit_state();
    }
}

impl MintFlowController {
    pub fn new(
        config: MintFlowConfig,
        wallet: Arc<dyn WalletProvider>,
        contract: Arc<dyn MintContract>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            config,
            wallet,
            contract,
            state: Mutex::new(ControllerState {
                phase: ConnectionPhase::Disconnected,
                account: None,
                minted_count: None,
                listener: None,
            }),
            events,
        })
    }

    pub fn config(&self) -> &MintFlowConfig {
        &self.config
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MintFlowEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> MintFlowSnapshot {
        let state = self.state.lock().expect("controller state lock");
        MintFlowSnapshot {
            phase: state.phase,
            account: state.account,
            minted_count: state.minted_count,
        }
    }

    fn emit_state(&self) {
        let snapshot = self.snapshot();
        let _ = self.events.send(MintFlowEvent::StateChanged(snapshot));
    }

    /// Startup probe: adopts an already-authorized account without prompting.
    /// Absence of a wallet or of an authorized account is logged, nothing
    /// more.
    pub async fn check_existing_connection(self: &Arc<Self>) {
        if !self.wallet.is_available() {
            info!("no wallet provider detected; skipping the authorization check");
            return;
        }
        let accounts = match self.wallet.get_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                warn!("authorization check failed: {err:#}");
                return;
            }
        };
        match accounts.first().copied() {
            Some(account) => {
                info!(%account, "found an already-authorized account");
                self.activate_session(account).await;
            }
            None => info!("no authorized account found"),
        }
    }

    /// Requests account access, prompting the user through the wallet.
    pub async fn connect(self: &Arc<Self>) -> Result<Address, MintFlowError> {
        if !self.wallet.is_available() {
            return Err(MintFlowError::WalletUnavailable);
        }
        let accounts = self
            .wallet
            .request_accounts()
            .await
            .map_err(MintFlowError::Wallet)?;
        let account = accounts
            .first()
            .copied()
            .ok_or(MintFlowError::NoAccountAuthorized)?;
        self.activate_session(account).await;
        Ok(account)
    }

    async fn activate_session(self: &Arc<Self>, account: Address) {
        {
            let mut state = self.state.lock().expect("controller state lock");
            state.account = Some(account);
            if state.phase == ConnectionPhase::Disconnected {
                state.phase = ConnectionPhase::Idle;
            }
        }
        info!(%account, "wallet session active");
        self.emit_state();
        self.start_event_listener().await;
        self.refresh_minted_count().await;
    }

    /// Submits the mint write and suspends until it is confirmed. Valid only
    /// in `Connected(Idle)`; preconditions are checked in a fixed order
    /// before anything touches the chain.
    pub async fn mint(
        self: &Arc<Self>,
        payload: Option<&str>,
    ) -> Result<TxHash, MintFlowError> {
        let from = {
            let state = self.state.lock().expect("controller state lock");
            match state.phase {
                ConnectionPhase::Disconnected => return Err(MintFlowError::NotConnected),
                ConnectionPhase::Minting => return Err(MintFlowError::AlreadyMinting),
                ConnectionPhase::Idle => state.account.ok_or(MintFlowError::NotConnected)?,
            }
        };

        if !self.wallet.is_available() {
            return Err(MintFlowError::WalletUnavailable);
        }
        if self.config.requires_doodle && payload.is_none() {
            return Err(MintFlowError::MissingDoodle);
        }
        let actual = self
            .wallet
            .chain_id()
            .await
            .map_err(MintFlowError::Wallet)?;
        if actual != self.config.required_chain {
            return Err(MintFlowError::WrongNetwork {
                actual,
                required: self.config.required_chain,
            });
        }

        let guard = MintingGuard::try_acquire(self)?;

        let pending = match self.contract.mint(from, payload).await {
            Ok(pending) => pending,
            Err(err) => {
                error!("mint submission failed: {err:#}");
                let _ = self.events.send(MintFlowEvent::MintFailed {
                    reason: err.to_string(),
                });
                drop(guard);
                return Err(MintFlowError::Contract(err));
            }
        };

        let tx_hash = pending.tx_hash();
        info!(%tx_hash, "mint transaction submitted; awaiting confirmation");
        let _ = self.events.send(MintFlowEvent::MintSubmitted { tx_hash });

        match pending.wait().await {
            Ok(confirmed) => {
                let explorer_url = self.config.explorer_tx_url(confirmed);
                info!(%confirmed, explorer_url, "mint transaction confirmed");
                let _ = self.events.send(MintFlowEvent::MintConfirmed {
                    tx_hash: confirmed,
                    explorer_url,
                });
                drop(guard);
                Ok(confirmed)
            }
            Err(err) => {
                error!(%tx_hash, "confirmation wait failed: {err:#}");
                let _ = self.events.send(MintFlowEvent::MintFailed {
                    reason: err.to_string(),
                });
                drop(guard);
                Err(MintFlowError::Contract(err))
            }
        }
    }

    /// Re-reads the minted count. A failed read keeps the previous value and
    /// is logged only.
    pub async fn refresh_minted_count(&self) {
        match self.contract.total_minted().await {
            Ok(minted) => {
                {
                    let mut state = self.state.lock().expect("controller state lock");
                    state.minted_count = Some(minted);
                }
                let _ = self.events.send(MintFlowEvent::CountUpdated { minted });
            }
            Err(err) => {
                warn!("minted-count refresh failed; keeping the previous value: {err:#}");
            }
        }
    }

    async fn start_event_listener(self: &Arc<Self>) {
        if self
            .state
            .lock()
            .expect("controller state lock")
            .listener
            .is_some()
        {
            return;
        }

        let subscription = match self.contract.subscribe_mint_events().await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!("mint event subscription failed: {err:#}");
                let _ = self.events.send(MintFlowEvent::Error(format!(
                    "mint event subscription failed: {err}"
                )));
                return;
            }
        };

        let controller = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut subscription = subscription;
            while let Some(event) = subscription.recv().await {
                controller.handle_mint_event(event).await;
            }
        });

        let mut state = self.state.lock().expect("controller state lock");
        if state.listener.is_some() {
            // Lost a connect/check race; the first listener stands.
            task.abort();
            return;
        }
        state.listener = Some(ListenerHandle { task });
    }

    async fn handle_mint_event(self: &Arc<Self>, event: MintEvent) {
        let marketplace_url = self.config.marketplace_item_url(event.token_id);
        info!(
            minter = %event.minter,
            token_id = %event.token_id,
            marketplace_url,
            "observed on-chain mint"
        );
        let _ = self.events.send(MintFlowEvent::MintObserved {
            minter: event.minter,
            token_id: event.token_id,
            marketplace_url,
            observed_at: Utc::now(),
        });
        self.refresh_minted_count().await;
    }

    /// Ends the session: stops the event listener and returns to
    /// `Disconnected`.
    pub async fn shutdown(&self) {
        let listener = {
            let mut state = self.state.lock().expect("controller state lock");
            state.phase = ConnectionPhase::Disconnected;
            state.account = None;
            state.listener.take()
        };
        drop(listener);
        self.emit_state();
        info!("mint flow controller shut down");
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
