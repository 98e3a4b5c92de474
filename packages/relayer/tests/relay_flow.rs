//! End-to-end flows: YAML config -> registry -> watchers -> mint on the
//! destination chain, with both chains served by `MockRpc`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{address, Address, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use multichain_rs::evm::{ChainClient, ChainClientConfig, MintableToken};
use multichain_rs::testing::MockRpc;
use relayer::config::Config;
use relayer::metrics::Metrics;
use relayer::{
    ChainRegistry, CheckpointStore, PollOutcome, TransactionRelay, Validator, WatcherManager,
};

const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const BRIDGE: Address = address!("1111111111111111111111111111111111111111");
const TOKEN: Address = address!("2222222222222222222222222222222222222222");
const ALICE: Address = address!("00000000000000000000000000000000000000a1");
const BOB: Address = address!("00000000000000000000000000000000000000b0");

const CONFIG: &str = r#"
networks:
  - chain_id: 1
    endpoint: http://localhost:8545
    coin:
      symbol: ETH
  - chain_id: 56
    endpoint: http://localhost:8546
    gas_fee_cap: 3
    gas_limit: 150000
    relay: true
    coin:
      symbol: BNB
bridges:
  - chain_id: 1
    address: "0x1111111111111111111111111111111111111111"
    token: "0x2222222222222222222222222222222222222222"
    start_block: 900
    destination_chain_id: 56
relayer:
  relay_deposits: true
  private_key: "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
"#;

struct Deployment {
    config: Config,
    validator: Arc<Validator>,
    rpcs: HashMap<u64, Arc<MockRpc>>,
    registry: Arc<ChainRegistry>,
    checkpoints: Arc<CheckpointStore>,
    metrics: Arc<Metrics>,
}

impl Deployment {
    async fn start(dir: &Path, relay_deposits: bool) -> Self {
        let yaml = if relay_deposits {
            CONFIG.to_string()
        } else {
            CONFIG.replace("relay_deposits: true", "relay_deposits: false")
        };
        fs::write(dir.join("relayer.yaml"), yaml).unwrap();

        let config = Config::load_files(dir).unwrap();
        let validator = Arc::new(Validator::default());
        validator.check(&config).unwrap();

        let signer: PrivateKeySigner = TEST_KEY.parse().unwrap();
        let registry = Arc::new(ChainRegistry::new(validator.clone()));
        let mut rpcs = HashMap::new();
        for network in &config.networks {
            let rpc = Arc::new(MockRpc::new(network.chain_id));
            let client_config = ChainClientConfig {
                chain_id: network.chain_id,
                rpc_url: network.endpoint.clone(),
                fees: network.fee_config(),
                coin: config.coin_for_chain(network.chain_id).cloned(),
            };
            let client_signer = network.relay.then(|| signer.clone());
            let client = ChainClient::from_rpc(&client_config, rpc.clone(), client_signer)
                .await
                .unwrap();
            registry.register(client).await.unwrap();
            rpcs.insert(network.chain_id, rpc);
        }

        let checkpoints = Arc::new(
            CheckpointStore::open(config.checkpoint_path(dir), validator.clone())
                .await
                .unwrap(),
        );

        Self {
            config,
            validator,
            rpcs,
            registry,
            checkpoints,
            metrics: Arc::new(Metrics::new()),
        }
    }

    fn rpc(&self, chain_id: u64) -> &Arc<MockRpc> {
        &self.rpcs[&chain_id]
    }

    fn manager(&self) -> WatcherManager {
        let relay = Arc::new(
            TransactionRelay::new(self.registry.clone()).with_metrics(self.metrics.clone()),
        );
        WatcherManager::new(
            self.config.bridges.clone(),
            self.config.relayer.clone(),
            self.registry.clone(),
            self.checkpoints.clone(),
        )
        .with_relay(relay)
        .with_metrics(self.metrics.clone())
    }

    async fn checkpoint(&self) -> Option<u64> {
        self.checkpoints
            .get_progress(1, &BRIDGE.to_string())
            .await
            .ok()
    }
}

fn decode_mint(raw: &[u8]) -> (Address, MintableToken::mintCall, u64) {
    match TxEnvelope::decode_2718(&mut &raw[..]).unwrap() {
        TxEnvelope::Legacy(signed) => {
            let tx = signed.tx();
            let call = MintableToken::mintCall::abi_decode(&tx.input, true).unwrap();
            (*tx.to.to().unwrap(), call, tx.gas_limit)
        }
        other => panic!("expected legacy transaction, got {:?}", other),
    }
}

#[tokio::test]
async fn deposit_is_minted_on_destination_chain() {
    let dir = tempfile::tempdir().unwrap();
    let deployment = Deployment::start(dir.path(), true).await;
    let source = deployment.rpc(1);
    let destination = deployment.rpc(56);

    source.set_height(1000);
    source.push_deposit(BRIDGE, 905, ALICE, U256::from(250u64));
    source.push_deposit(BRIDGE, 920, BOB, U256::from(4u64));

    let mut watchers = deployment.manager().build_watchers().await;
    assert_eq!(watchers.len(), 1);
    let watcher = &mut watchers[0];
    assert_eq!(watcher.initialize().await, 900);

    let outcome = watcher.poll_once().await;
    assert!(matches!(outcome, PollOutcome::Behind { deposits: 2, .. }));

    let broadcasts = destination.broadcasts();
    assert_eq!(broadcasts.len(), 2);
    assert!(source.broadcasts().is_empty());

    let (to, call, gas_limit) = decode_mint(&broadcasts[0]);
    assert_eq!(to, TOKEN);
    assert_eq!(call.account, ALICE);
    assert_eq!(call.amount, U256::from(250u64));
    assert_eq!(gas_limit, 150_000);

    let (_, call, _) = decode_mint(&broadcasts[1]);
    assert_eq!(call.account, BOB);

    assert_eq!(deployment.checkpoint().await, Some(929));
    assert_eq!(
        deployment
            .metrics
            .relays_total
            .with_label_values(&["56", "submitted"])
            .get(),
        2
    );
}

#[tokio::test]
async fn relay_disabled_only_records_progress() {
    let dir = tempfile::tempdir().unwrap();
    let deployment = Deployment::start(dir.path(), false).await;
    let source = deployment.rpc(1);
    source.set_height(1000);
    source.push_deposit(BRIDGE, 905, ALICE, U256::from(250u64));

    let mut watchers = deployment.manager().build_watchers().await;
    let watcher = &mut watchers[0];
    watcher.initialize().await;
    watcher.poll_once().await;

    assert!(deployment.rpc(56).broadcasts().is_empty());
    assert_eq!(deployment.checkpoint().await, Some(929));
}

#[tokio::test]
async fn rejected_mint_is_retried_next_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let deployment = Deployment::start(dir.path(), true).await;
    let source = deployment.rpc(1);
    let destination = deployment.rpc(56);
    source.set_height(1000);
    source.push_deposit(BRIDGE, 905, ALICE, U256::from(250u64));
    destination.reject_broadcasts("insufficient funds for gas * price + value");

    let mut watchers = deployment.manager().build_watchers().await;
    let watcher = &mut watchers[0];
    watcher.initialize().await;

    let outcome = watcher.poll_once().await;
    assert!(matches!(outcome, PollOutcome::Failed { .. }));
    assert_eq!(deployment.checkpoint().await, None);

    destination.accept_broadcasts();
    watcher.poll_once().await;
    assert_eq!(destination.broadcasts().len(), 1);
    assert_eq!(source.log_queries(), vec![(900, 929), (900, 929)]);
    assert_eq!(deployment.checkpoint().await, Some(929));
}

#[tokio::test]
async fn restart_resumes_from_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    {
        let deployment = Deployment::start(dir.path(), false).await;
        deployment.rpc(1).set_height(2000);

        let mut watchers = deployment.manager().build_watchers().await;
        let watcher = &mut watchers[0];
        watcher.initialize().await;
        for _ in 0..3 {
            watcher.poll_once().await;
        }
        assert_eq!(deployment.checkpoint().await, Some(987));
        deployment.checkpoints.snapshot().await.unwrap();
    }

    let deployment = Deployment::start(dir.path(), false).await;
    deployment.rpc(1).set_height(2000);
    assert_eq!(deployment.checkpoint().await, Some(987));

    let mut watchers = deployment.manager().build_watchers().await;
    let watcher = &mut watchers[0];
    assert_eq!(watcher.initialize().await, 987);
    watcher.poll_once().await;
    assert_eq!(deployment.rpc(1).log_queries(), vec![(987, 1016)]);
}

#[tokio::test]
async fn corrupt_snapshot_blocks_startup() {
    let dir = tempfile::tempdir().unwrap();
    let deployment = Deployment::start(dir.path(), false).await;
    let path = deployment.checkpoints.path().to_path_buf();
    fs::write(&path, b"garbage").unwrap();

    let result = CheckpointStore::open(&path, deployment.validator.clone()).await;
    assert!(matches!(
        result,
        Err(relayer::RelayerError::CorruptState { .. })
    ));
}
