use super::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

fn test_address(fill: u8) -> Address {
    Address::new([fill; 20])
}

fn test_hash(fill: u8) -> TxHash {
    TxHash::new([fill; 32])
}

fn test_config(requires_doodle: bool) -> MintFlowConfig {
    MintFlowConfig {
        contract_address: "0xe606a90181235eca2af8fa1d69e5e1659edc1501"
            .parse()
            .expect("contract address"),
        required_chain: ChainId(11155111),
        total_supply: 50,
        marketplace_base_url: "https://testnets.opensea.io/assets".to_string(),
        collection_slug: "doodle-collection".to_string(),
        explorer_base_url: "https://sepolia.etherscan.io".to_string(),
        requires_doodle,
    }
}

struct TestWallet {
    available: bool,
    authorized: Vec<Address>,
    prompted: Vec<Address>,
    chain: ChainId,
    fail_with: Option<String>,
}

impl TestWallet {
    fn with_authorized(accounts: Vec<Address>) -> Self {
        Self {
            available: true,
            authorized: accounts,
            prompted: Vec::new(),
            chain: ChainId(11155111),
            fail_with: None,
        }
    }

    fn with_prompted(accounts: Vec<Address>) -> Self {
        Self {
            available: true,
            authorized: Vec::new(),
            prompted: accounts,
            chain: ChainId(11155111),
            fail_with: None,
        }
    }

    fn on_chain(mut self, chain: ChainId) -> Self {
        self.chain = chain;
        self
    }
}

#[async_trait]
impl WalletProvider for TestWallet {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn get_accounts(&self) -> Result<Vec<Address>> {
        if let Some(err) = &self.fail_with {
            return Err(anyhow!(err.clone()));
        }
        Ok(self.authorized.clone())
    }

    async fn request_accounts(&self) -> Result<Vec<Address>> {
        if let Some(err) = &self.fail_with {
            return Err(anyhow!(err.clone()));
        }
        Ok(self.prompted.clone())
    }

    async fn chain_id(&self) -> Result<ChainId> {
        if let Some(err) = &self.fail_with {
            return Err(anyhow!(err.clone()));
        }
        Ok(self.chain)
    }
}

struct TestContract {
    total: std::sync::Mutex<u64>,
    fail_total: AtomicBool,
    total_calls: AtomicUsize,
    mint_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
    fail_mint: Option<String>,
    wait_error: Option<String>,
    event_tx: std::sync::Mutex<Option<mpsc::Sender<MintEvent>>>,
}

impl TestContract {
    fn with_total(total: u64) -> Self {
        Self {
            total: std::sync::Mutex::new(total),
            fail_total: AtomicBool::new(false),
            total_calls: AtomicUsize::new(0),
            mint_calls: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
            fail_mint: None,
            wait_error: None,
            event_tx: std::sync::Mutex::new(None),
        }
    }

    fn failing_mint(mut self, err: impl Into<String>) -> Self {
        self.fail_mint = Some(err.into());
        self
    }

    fn failing_wait(mut self, err: impl Into<String>) -> Self {
        self.wait_error = Some(err.into());
        self
    }

    fn event_sender(&self) -> mpsc::Sender<MintEvent> {
        self.event_tx
            .lock()
            .expect("event sender lock")
            .clone()
            .expect("subscription not started")
    }
}

struct TestPendingMint {
    hash: TxHash,
    wait_error: Option<String>,
}

#[async_trait]
impl PendingMint for TestPendingMint {
    fn tx_hash(&self) -> TxHash {
        self.hash
    }

    async fn wait(self: Box<Self>) -> Result<TxHash> {
        match self.wait_error {
            Some(err) => Err(anyhow!(err)),
            None => Ok(self.hash),
        }
    }
}

#[async_trait]
impl MintContract for TestContract {
    async fn total_minted(&self) -> Result<u64> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_total.load(Ordering::SeqCst) {
            return Err(anyhow!("read call failed"));
        }
        Ok(*self.total.lock().expect("total lock"))
    }

    async fn mint(&self, _from: Address, _payload: Option<&str>) -> Result<Box<dyn PendingMint>> {
        self.mint_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.fail_mint {
            return Err(anyhow!(err.clone()));
        }
        Ok(Box::new(TestPendingMint {
            hash: test_hash(0x42),
            wait_error: self.wait_error.clone(),
        }))
    }

    async fn subscribe_mint_events(&self) -> Result<MintEventSubscription> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, subscription) = MintEventSubscription::channel(8);
        *self.event_tx.lock().expect("event sender lock") = Some(tx);
        Ok(subscription)
    }
}

fn controller_with(
    config: MintFlowConfig,
    wallet: TestWallet,
    contract: Arc<TestContract>,
) -> Arc<MintFlowController> {
    MintFlowController::new(config, Arc::new(wallet), contract)
}

async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<MintFlowEvent>,
    mut matches: F,
) -> MintFlowEvent
where
    F: FnMut(&MintFlowEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event stream closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn check_existing_connection_without_authorized_accounts_stays_disconnected() {
    let contract = Arc::new(TestContract::with_total(12));
    let controller = controller_with(
        test_config(true),
        TestWallet::with_authorized(Vec::new()),
        Arc::clone(&contract),
    );

    controller.check_existing_connection().await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, ConnectionPhase::Disconnected);
    assert_eq!(snapshot.account, None);
    assert_eq!(contract.subscribe_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn check_existing_connection_adopts_authorized_account() {
    let contract = Arc::new(TestContract::with_total(12));
    let account = test_address(0xaa);
    let controller = controller_with(
        test_config(true),
        TestWallet::with_authorized(vec![account]),
        Arc::clone(&contract),
    );

    controller.check_existing_connection().await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, ConnectionPhase::Idle);
    assert_eq!(snapshot.account, Some(account));
    assert_eq!(snapshot.minted_count, Some(12));
    assert_eq!(contract.subscribe_calls.load(Ordering::SeqCst), 1);
    assert_eq!(contract.total_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn connect_registers_exactly_one_event_listener() {
    let contract = Arc::new(TestContract::with_total(0));
    let account = test_address(0xbb);
    let controller = controller_with(
        test_config(true),
        TestWallet::with_prompted(vec![account]),
        Arc::clone(&contract),
    );

    let connected = controller.connect().await.expect("connect");
    assert_eq!(connected, account);
    assert_eq!(controller.snapshot().phase, ConnectionPhase::Idle);
    assert_eq!(contract.subscribe_calls.load(Ordering::SeqCst), 1);

    // Reconnecting keeps the first listener instead of stacking another.
    controller.connect().await.expect("reconnect");
    assert_eq!(contract.subscribe_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn connect_without_wallet_provider_is_a_user_visible_failure() {
    let controller = MintFlowController::new(
        test_config(true),
        Arc::new(MissingWalletProvider),
        Arc::new(TestContract::with_total(0)),
    );

    let err = controller.connect().await.expect_err("must fail");
    assert!(matches!(err, MintFlowError::WalletUnavailable));
    assert_eq!(controller.snapshot().phase, ConnectionPhase::Disconnected);
}

#[tokio::test]
async fn connect_with_empty_prompt_result_fails() {
    let controller = controller_with(
        test_config(true),
        TestWallet::with_prompted(Vec::new()),
        Arc::new(TestContract::with_total(0)),
    );

    let err = controller.connect().await.expect_err("must fail");
    assert!(matches!(err, MintFlowError::NoAccountAuthorized));
}

#[tokio::test]
async fn mint_while_minting_is_rejected_before_any_chain_call() {
    let contract = Arc::new(TestContract::with_total(0));
    let controller = controller_with(
        test_config(false),
        TestWallet::with_prompted(vec![test_address(1)]),
        Arc::clone(&contract),
    );
    controller.connect().await.expect("connect");
    let mint_calls_after_connect = contract.mint_calls.load(Ordering::SeqCst);

    controller.state.lock().expect("state lock").phase = ConnectionPhase::Minting;

    let err = controller.mint(None).await.expect_err("must fail");
    assert!(matches!(err, MintFlowError::AlreadyMinting));
    assert_eq!(
        contract.mint_calls.load(Ordering::SeqCst),
        mint_calls_after_connect
    );
    assert_eq!(controller.snapshot().phase, ConnectionPhase::Minting);
}

#[tokio::test]
async fn mint_on_wrong_chain_aborts_before_submission() {
    let contract = Arc::new(TestContract::with_total(0));
    let controller = controller_with(
        test_config(false),
        TestWallet::with_prompted(vec![test_address(1)]).on_chain(ChainId(1)),
        Arc::clone(&contract),
    );
    controller.connect().await.expect("connect");

    let err = controller.mint(None).await.expect_err("must fail");
    match err {
        MintFlowError::WrongNetwork { actual, required } => {
            assert_eq!(actual, ChainId(1));
            assert_eq!(required, ChainId(11155111));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(contract.mint_calls.load(Ordering::SeqCst), 0);
    assert_eq!(controller.snapshot().phase, ConnectionPhase::Idle);
}

#[tokio::test]
async fn doodle_variant_requires_a_captured_payload() {
    let contract = Arc::new(TestContract::with_total(0));
    let controller = controller_with(
        test_config(true),
        TestWallet::with_prompted(vec![test_address(1)]),
        Arc::clone(&contract),
    );
    controller.connect().await.expect("connect");

    let err = controller.mint(None).await.expect_err("must fail");
    assert!(matches!(err, MintFlowError::MissingDoodle));
    assert_eq!(contract.mint_calls.load(Ordering::SeqCst), 0);

    controller
        .mint(Some("data:image/png;base64,AAAA"))
        .await
        .expect("mint with payload");
}

#[tokio::test]
async fn successful_mint_emits_submitted_then_confirmed_and_returns_to_idle() {
    let contract = Arc::new(TestContract::with_total(0));
    let controller = controller_with(
        test_config(false),
        TestWallet::with_prompted(vec![test_address(1)]),
        Arc::clone(&contract),
    );
    controller.connect().await.expect("connect");
    let mut rx = controller.subscribe_events();

    let hash = controller.mint(None).await.expect("mint");
    assert_eq!(hash, test_hash(0x42));

    wait_for_event(&mut rx, |event| {
        matches!(event, MintFlowEvent::MintSubmitted { tx_hash } if *tx_hash == hash)
    })
    .await;
    let confirmed = wait_for_event(&mut rx, |event| {
        matches!(event, MintFlowEvent::MintConfirmed { .. })
    })
    .await;
    match confirmed {
        MintFlowEvent::MintConfirmed {
            tx_hash,
            explorer_url,
        } => {
            assert_eq!(tx_hash, hash);
            assert_eq!(
                explorer_url,
                format!("https://sepolia.etherscan.io/tx/{hash}")
            );
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(controller.snapshot().phase, ConnectionPhase::Idle);
}

#[tokio::test]
async fn failing_confirmation_resets_the_minting_flag_and_emits_no_confirmation() {
    let contract = Arc::new(TestContract::with_total(0).failing_wait("transaction dropped"));
    let controller = controller_with(
        test_config(false),
        TestWallet::with_prompted(vec![test_address(1)]),
        Arc::clone(&contract),
    );
    controller.connect().await.expect("connect");
    let mut rx = controller.subscribe_events();

    let err = controller.mint(None).await.expect_err("must fail");
    assert!(matches!(err, MintFlowError::Contract(_)));
    assert_eq!(controller.snapshot().phase, ConnectionPhase::Idle);

    let mut saw_failed = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            MintFlowEvent::MintConfirmed { .. } => panic!("confirmation after failed wait"),
            MintFlowEvent::MintFailed { reason } => {
                assert!(reason.contains("transaction dropped"));
                saw_failed = true;
            }
            _ => {}
        }
    }
    assert!(saw_failed, "expected a MintFailed event");
}

#[tokio::test]
async fn failing_submission_resets_the_minting_flag() {
    let contract = Arc::new(TestContract::with_total(0).failing_mint("nonce too low"));
    let controller = controller_with(
        test_config(false),
        TestWallet::with_prompted(vec![test_address(1)]),
        Arc::clone(&contract),
    );
    controller.connect().await.expect("connect");

    let err = controller.mint(None).await.expect_err("must fail");
    assert!(matches!(err, MintFlowError::Contract(_)));
    assert_eq!(controller.snapshot().phase, ConnectionPhase::Idle);
}

#[tokio::test]
async fn observed_mint_event_notifies_once_with_deep_link_then_refreshes_count() {
    let contract = Arc::new(TestContract::with_total(12));
    let minter = test_address(0xcc);
    let controller = controller_with(
        test_config(true),
        TestWallet::with_authorized(vec![minter]),
        Arc::clone(&contract),
    );
    controller.check_existing_connection().await;
    let refreshes_before = contract.total_calls.load(Ordering::SeqCst);
    let mut rx = controller.subscribe_events();

    contract
        .event_sender()
        .send(MintEvent {
            minter,
            token_id: TokenId(7),
        })
        .await
        .expect("push event");

    let observed = wait_for_event(&mut rx, |event| {
        matches!(event, MintFlowEvent::MintObserved { .. })
    })
    .await;
    match observed {
        MintFlowEvent::MintObserved {
            minter: from,
            token_id,
            marketplace_url,
            ..
        } => {
            assert_eq!(from, minter);
            assert_eq!(token_id, TokenId(7));
            assert_eq!(
                marketplace_url,
                "https://testnets.opensea.io/assets/0xe606a90181235eca2af8fa1d69e5e1659edc1501/7"
            );
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // The notification triggers exactly one count re-read.
    wait_for_event(&mut rx, |event| {
        matches!(event, MintFlowEvent::CountUpdated { .. })
    })
    .await;
    assert_eq!(
        contract.total_calls.load(Ordering::SeqCst),
        refreshes_before + 1
    );
}

#[tokio::test]
async fn refresh_failure_keeps_the_previous_count() {
    let contract = Arc::new(TestContract::with_total(12));
    let controller = controller_with(
        test_config(true),
        TestWallet::with_authorized(vec![test_address(1)]),
        Arc::clone(&contract),
    );
    controller.check_existing_connection().await;
    assert_eq!(controller.snapshot().minted_count, Some(12));

    contract.fail_total.store(true, Ordering::SeqCst);
    controller.refresh_minted_count().await;
    assert_eq!(controller.snapshot().minted_count, Some(12));
}

#[tokio::test]
async fn shutdown_stops_the_event_listener() {
    let contract = Arc::new(TestContract::with_total(0));
    let controller = controller_with(
        test_config(true),
        TestWallet::with_authorized(vec![test_address(1)]),
        Arc::clone(&contract),
    );
    controller.check_existing_connection().await;
    let sender = contract.event_sender();

    controller.shutdown().await;
    assert_eq!(controller.snapshot().phase, ConnectionPhase::Disconnected);

    // The subscription was dropped with the listener task, so the producer
    // side closes shortly after.
    tokio::time::timeout(Duration::from_secs(2), sender.closed())
        .await
        .expect("subscription should close on shutdown");
}

#[test]
fn remaining_count_subtracts_minted_from_total_supply() {
    let snapshot = MintFlowSnapshot {
        phase: ConnectionPhase::Idle,
        account: None,
        minted_count: Some(12),
    };
    assert_eq!(snapshot.remaining(50), Some(38));

    let unknown = MintFlowSnapshot {
        phase: ConnectionPhase::Disconnected,
        account: None,
        minted_count: None,
    };
    assert_eq!(unknown.remaining(50), None);
}

#[test]
fn link_builders_compose_contract_address_and_ids() {
    let config = test_config(true);
    assert_eq!(
        config.marketplace_item_url(TokenId(7)),
        "https://testnets.opensea.io/assets/0xe606a90181235eca2af8fa1d69e5e1659edc1501/7"
    );
    assert_eq!(
        config.marketplace_collection_url(),
        "https://testnets.opensea.io/assets/doodle-collection"
    );
    assert_eq!(
        config.explorer_tx_url(test_hash(0x42)),
        format!("https://sepolia.etherscan.io/tx/{}", test_hash(0x42))
    );
}
