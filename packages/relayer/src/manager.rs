//! Watcher supervision
//!
//! [`WatcherManager`] turns the configured bridges into [`BridgeWatcher`]s,
//! runs each on its own task and snapshots the checkpoint store on a fixed
//! interval. When the shutdown signal fires it waits for every watcher to
//! stop and writes one last snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::config::{BridgeConfig, RelayerSettings};
use crate::error::RelayerError;
use crate::metrics::Metrics;
use crate::registry::ChainRegistry;
use crate::relay::TransactionRelay;
use crate::watcher::{BridgeWatcher, PollSchedule, WatchedBridge};

pub struct WatcherManager {
    bridges: Vec<BridgeConfig>,
    settings: RelayerSettings,
    registry: Arc<ChainRegistry>,
    checkpoints: Arc<CheckpointStore>,
    relay: Option<Arc<TransactionRelay>>,
    metrics: Option<Arc<Metrics>>,
}

impl WatcherManager {
    pub fn new(
        bridges: Vec<BridgeConfig>,
        settings: RelayerSettings,
        registry: Arc<ChainRegistry>,
        checkpoints: Arc<CheckpointStore>,
    ) -> Self {
        Self {
            bridges,
            settings,
            registry,
            checkpoints,
            relay: None,
            metrics: None,
        }
    }

    /// Relay used when `relay_deposits` is enabled
    pub fn with_relay(mut self, relay: Arc<TransactionRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// One watcher per bridge whose chain is registered.
    ///
    /// Bridges on an unregistered chain, or with an unparseable address, are
    /// logged and skipped.
    pub async fn build_watchers(&self) -> Vec<BridgeWatcher> {
        let schedule = PollSchedule::from(&self.settings);
        let relay = if self.settings.relay_deposits {
            self.relay.clone()
        } else {
            None
        };
        let mut watchers = Vec::with_capacity(self.bridges.len());

        for config in &self.bridges {
            let bridge = match WatchedBridge::from_config(config) {
                Ok(bridge) => bridge,
                Err(e) => {
                    error!(chain_id = config.chain_id, bridge = %config.address, error = %e, "Skipping bridge");
                    continue;
                }
            };

            let mut watcher = match BridgeWatcher::new(
                bridge,
                &self.registry,
                self.checkpoints.clone(),
                schedule,
                self.settings.events_window,
            )
            .await
            {
                Ok(watcher) => watcher,
                Err(e) => {
                    error!(
                        chain_id = config.chain_id,
                        bridge = %config.address,
                        error = %e,
                        "No client for bridge chain, skipping bridge"
                    );
                    continue;
                }
            };

            if let Some(relay) = &relay {
                watcher = watcher.with_relay(relay.clone());
            }
            if let Some(metrics) = &self.metrics {
                watcher = watcher.with_metrics(metrics.clone());
            }
            watchers.push(watcher);
        }

        watchers
    }

    /// Write a snapshot, logging instead of failing
    async fn periodic_snapshot(&self) {
        let result = self.checkpoints.snapshot().await;
        if let Some(metrics) = &self.metrics {
            metrics.record_snapshot(result.is_ok());
        }
        if let Err(e) = result {
            error!(error = %e, "Periodic checkpoint snapshot failed");
        }
    }

    /// Run every watcher until `shutdown` flips to true, then flush checkpoints.
    ///
    /// Only the final snapshot can fail this call.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), RelayerError> {
        let watchers = self.build_watchers().await;
        if watchers.is_empty() {
            warn!("No bridges to watch");
        }

        let mut tasks = JoinSet::new();
        for watcher in watchers {
            tasks.spawn(watcher.run(shutdown.clone()));
        }
        info!(
            watchers = tasks.len(),
            relay = self.settings.relay_deposits,
            "Watchers started"
        );

        let interval = self.settings.snapshot_interval().max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => self.periodic_snapshot().await,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(joined) = tasks.join_next() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Watcher task ended abnormally");
                    }
                }
            }
        }

        info!("Shutdown requested, waiting for watchers");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Watcher task ended abnormally");
            }
        }

        let result = self.checkpoints.snapshot().await;
        if let Some(metrics) = &self.metrics {
            metrics.record_snapshot(result.is_ok());
        }
        let taken_at = result?;
        info!(
            path = %self.checkpoints.path().display(),
            taken_at = %taken_at,
            "Final checkpoint snapshot written"
        );
        Ok(())
    }
}
