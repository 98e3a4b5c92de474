//! AEVM Bridge Relayer
//!
//! Watches bridge contracts on EVM chains for `Deposit` events, checkpoints
//! scan progress per bridge and, when enabled, mints the deposited amount on
//! the destination chain.
//!
//! The binary in `main.rs` wires the pieces together:
//!
//! 1. [`config::Config`] is loaded from a directory of YAML files and checked
//!    by a [`validation::Validator`]
//! 2. One [`multichain_rs::evm::ChainClient`] per network goes into the
//!    [`registry::ChainRegistry`]
//! 3. [`checkpoint::CheckpointStore`] restores progress from its snapshot
//! 4. [`manager::WatcherManager`] runs a [`watcher::BridgeWatcher`] per bridge
//!    and writes snapshots until shutdown

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod registry;
pub mod relay;
pub mod server;
pub mod validation;
pub mod watcher;

pub use checkpoint::{CheckpointKey, CheckpointStore};
pub use config::Config;
pub use error::RelayerError;
pub use manager::WatcherManager;
pub use registry::ChainRegistry;
pub use relay::TransactionRelay;
pub use validation::{Validate, ValidationError, Validator};
pub use watcher::{BridgeWatcher, PollOutcome, PollSchedule, WatchedBridge};
