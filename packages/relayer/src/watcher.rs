//! Per-bridge deposit watcher
//!
//! Each configured bridge gets one [`BridgeWatcher`] running on its own task.
//! A cycle reads the chain head, queries deposits in `[start, start + window]`
//! clamped to the head, optionally relays them, then checkpoints the range end
//! and makes it the next start. The boundary block is scanned again on the
//! following cycle, so a deposit there is seen twice and relayed at least once.
//!
//! ```text
//! Initializing -> Polling -+-> Steady (caught up, 30s) ---+-> Polling
//!                          +-> Accelerating (behind, 3s) -+
//!                          +-> Backoff (any failure, 30s) +
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use multichain_rs::evm::{ChainClient, DepositEvent};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::config::{BridgeConfig, RelayerSettings};
use crate::error::RelayerError;
use crate::metrics::Metrics;
use crate::registry::ChainRegistry;
use crate::relay::TransactionRelay;
use crate::validation::ValidationError;

/// Delays between poll cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// After a cycle that reached the chain head
    pub steady: Duration,
    /// After a cycle that stopped short of the head
    pub catch_up: Duration,
    /// After any failed cycle
    pub error_backoff: Duration,
    /// Before the very first cycle
    pub startup_delay: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            steady: Duration::from_secs(30),
            catch_up: Duration::from_secs(3),
            error_backoff: Duration::from_secs(30),
            startup_delay: Duration::from_secs(5),
        }
    }
}

impl From<&RelayerSettings> for PollSchedule {
    fn from(settings: &RelayerSettings) -> Self {
        Self {
            steady: Duration::from_secs(settings.steady_interval_secs),
            catch_up: Duration::from_secs(settings.catch_up_interval_secs),
            error_backoff: Duration::from_secs(settings.error_backoff_secs),
            startup_delay: Duration::from_secs(settings.startup_delay_secs),
        }
    }
}

/// Inclusive block range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

/// Result of one poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing left to scan; `scanned` is `None` when start was past the head
    CaughtUp {
        scanned: Option<BlockRange>,
        head: u64,
        deposits: usize,
    },
    /// Scanned a full window, more blocks remain
    Behind {
        scanned: BlockRange,
        head: u64,
        deposits: usize,
    },
    /// Head query, event query or relay failed; the checkpoint did not move
    Failed { attempted: Option<BlockRange> },
}

impl PollOutcome {
    pub fn delay(&self, schedule: &PollSchedule) -> Duration {
        match self {
            PollOutcome::CaughtUp { .. } => schedule.steady,
            PollOutcome::Behind { .. } => schedule.catch_up,
            PollOutcome::Failed { .. } => schedule.error_backoff,
        }
    }

    pub fn state(&self) -> WatcherState {
        match self {
            PollOutcome::CaughtUp { .. } => WatcherState::Steady,
            PollOutcome::Behind { .. } => WatcherState::Accelerating,
            PollOutcome::Failed { .. } => WatcherState::Backoff,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            PollOutcome::CaughtUp { .. } => "caught_up",
            PollOutcome::Behind { .. } => "behind",
            PollOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Initializing,
    Polling,
    Steady,
    Accelerating,
    Backoff,
}

/// Where mints for a bridge's deposits are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayTarget {
    pub chain_id: u64,
    pub token: Address,
}

/// A bridge contract resolved from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedBridge {
    pub chain_id: u64,
    pub address: Address,
    /// Lower-cased address, used as the checkpoint key
    pub key: String,
    /// Scanning never starts below this block
    pub start_block: u64,
    pub target: RelayTarget,
}

impl WatchedBridge {
    pub fn from_config(config: &BridgeConfig) -> Result<Self, RelayerError> {
        let address: Address = config.address.parse().map_err(|e| {
            ValidationError::new("bridge.address", format!("'{}': {}", config.address, e))
        })?;
        let token: Address = config.token.parse().map_err(|e| {
            ValidationError::new("bridge.token", format!("'{}': {}", config.token, e))
        })?;
        Ok(Self {
            chain_id: config.chain_id,
            address,
            key: config.address.to_lowercase(),
            start_block: config.start_block,
            target: RelayTarget {
                chain_id: config.destination_chain(),
                token,
            },
        })
    }
}

pub struct BridgeWatcher {
    bridge: WatchedBridge,
    client: Arc<ChainClient>,
    checkpoints: Arc<CheckpointStore>,
    relay: Option<Arc<TransactionRelay>>,
    metrics: Option<Arc<Metrics>>,
    schedule: PollSchedule,
    window: u64,
    next_start: u64,
    state: WatcherState,
}

impl BridgeWatcher {
    /// Resolve the bridge's chain client; fails if the chain is not registered
    pub async fn new(
        bridge: WatchedBridge,
        registry: &ChainRegistry,
        checkpoints: Arc<CheckpointStore>,
        schedule: PollSchedule,
        window: u64,
    ) -> Result<Self, RelayerError> {
        let client = registry.lookup(bridge.chain_id).await?;
        Ok(Self {
            next_start: bridge.start_block,
            bridge,
            client,
            checkpoints,
            relay: None,
            metrics: None,
            schedule,
            window,
            state: WatcherState::Initializing,
        })
    }

    /// Relay qualifying deposits through `relay`
    pub fn with_relay(mut self, relay: Arc<TransactionRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn bridge(&self) -> &WatchedBridge {
        &self.bridge
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Block the next cycle will start scanning from
    pub fn next_start(&self) -> u64 {
        self.next_start
    }

    /// Pick the starting block: the checkpoint, but never below the configured floor
    pub async fn initialize(&mut self) -> u64 {
        let checkpoint = self
            .checkpoints
            .get_progress(self.bridge.chain_id, &self.bridge.key)
            .await
            .unwrap_or(0);
        self.next_start = checkpoint.max(self.bridge.start_block);
        self.state = WatcherState::Polling;

        info!(
            chain_id = self.bridge.chain_id,
            bridge = %self.bridge.key,
            checkpoint,
            start_block = self.bridge.start_block,
            from_block = self.next_start,
            relay = self.relay.is_some(),
            "Bridge watcher initialized"
        );
        self.next_start
    }

    /// Run a single poll cycle
    pub async fn poll_once(&mut self) -> PollOutcome {
        self.state = WatcherState::Polling;
        let outcome = self.poll_inner().await;
        self.state = outcome.state();
        if let Some(metrics) = &self.metrics {
            metrics.record_poll(self.bridge.chain_id, outcome.label());
        }
        outcome
    }

    async fn poll_inner(&mut self) -> PollOutcome {
        let chain_id = self.bridge.chain_id;
        let start = self.next_start;

        let head = match self.client.current_block_height().await {
            Ok(head) => head,
            Err(e) => {
                error!(
                    chain_id,
                    bridge = %self.bridge.key,
                    from_block = start,
                    error = %e,
                    "Failed to get block height"
                );
                return PollOutcome::Failed { attempted: None };
            }
        };

        if start > head {
            debug!(chain_id, bridge = %self.bridge.key, start, head, "Start is past chain head");
            return PollOutcome::CaughtUp {
                scanned: None,
                head,
                deposits: 0,
            };
        }

        let range = BlockRange {
            from: start,
            to: start.saturating_add(self.window).min(head),
        };

        let events = match self
            .client
            .query_deposit_events(self.bridge.address, range.from, range.to)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                error!(
                    chain_id,
                    bridge = %self.bridge.key,
                    from_block = range.from,
                    to_block = range.to,
                    error = %e,
                    "Failed to query deposit events"
                );
                return PollOutcome::Failed {
                    attempted: Some(range),
                };
            }
        };

        for event in &events {
            info!(
                chain_id,
                bridge = %self.bridge.key,
                block = event.block_number,
                tx_hash = %event.tx_hash,
                receiver = %event.receiver,
                amount = %event.amount,
                timestamp = event.timestamp,
                "Deposit detected"
            );
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_deposits(chain_id, events.len());
        }

        if let Err(e) = self.relay_events(&events).await {
            error!(
                chain_id,
                bridge = %self.bridge.key,
                from_block = range.from,
                to_block = range.to,
                error = %e,
                "Relay failed, range will be retried"
            );
            return PollOutcome::Failed {
                attempted: Some(range),
            };
        }

        self.checkpoints
            .record_progress(chain_id, &self.bridge.key, range.to)
            .await;
        if let Some(metrics) = &self.metrics {
            metrics.set_checkpoint(chain_id, &self.bridge.key, range.to);
        }
        self.next_start = range.to;

        debug!(
            chain_id,
            bridge = %self.bridge.key,
            from_block = range.from,
            to_block = range.to,
            head,
            deposits = events.len(),
            "Range processed"
        );

        if range.to == head {
            PollOutcome::CaughtUp {
                scanned: Some(range),
                head,
                deposits: events.len(),
            }
        } else {
            PollOutcome::Behind {
                scanned: range,
                head,
                deposits: events.len(),
            }
        }
    }

    async fn relay_events(&self, events: &[DepositEvent]) -> Result<(), RelayerError> {
        let Some(relay) = &self.relay else {
            return Ok(());
        };

        for event in events {
            if !event.is_relayable() {
                warn!(
                    chain_id = self.bridge.chain_id,
                    tx_hash = %event.tx_hash,
                    receiver = %event.receiver,
                    amount = %event.amount,
                    "Skipping deposit that cannot be minted"
                );
                continue;
            }
            relay
                .relay(
                    self.bridge.target.chain_id,
                    self.bridge.target.token,
                    event.receiver,
                    event.amount,
                )
                .await?;
        }
        Ok(())
    }

    /// Poll until `shutdown` flips to true
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.initialize().await;
        let mut delay = self.schedule.startup_delay;

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let outcome = self.poll_once().await;
            delay = outcome.delay(&self.schedule);
        }

        info!(
            chain_id = self.bridge.chain_id,
            bridge = %self.bridge.key,
            next_start = self.next_start,
            "Bridge watcher stopped"
        );
    }
}
