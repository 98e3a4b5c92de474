//! Relayer configuration
//!
//! Configuration lives in a directory of YAML files. Every `*.yaml` / `*.yml`
//! file below the directory is merged in path order; any file or directory
//! whose name starts with `_` is skipped so operators can park drafts next to
//! live configs. A handful of settings can be overridden from the environment
//! (or a `.env` file), which is where the operator key normally comes from.
//!
//! ```yaml
//! networks:
//!   - chain_id: 56
//!     endpoint: https://bsc-dataseed.binance.org
//!     fee_model: legacy
//!     gas_fee_cap: 3
//!     coin: { symbol: BNB, decimals: 18 }
//!     relay: true
//! bridges:
//!   - chain_id: 1
//!     address: "0x..."
//!     token: "0x..."
//!     start_block: 19000000
//!     destination_chain_id: 56
//! relayer:
//!   relay_deposits: true
//! ```

use eyre::{eyre, Result, WrapErr};
use multichain_rs::{FeeConfig, FeeModelKind, NativeCoin, Secret, DEFAULT_GAS_LIMIT};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Root of the merged configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
    #[serde(default)]
    pub bridges: Vec<BridgeConfig>,
    #[serde(default)]
    pub relayer: RelayerSettings,
}

/// One EVM network the relayer connects to
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    /// JSON-RPC endpoint
    pub endpoint: String,
    #[serde(default)]
    pub fee_model: FeeModelKind,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Gas price / max fee per gas in gwei; 0 = use the node's suggestion
    #[serde(default)]
    pub gas_fee_cap: f64,
    /// Max priority fee per gas in gwei; 0 = use the node's suggestion
    #[serde(default)]
    pub gas_tip_cap: f64,
    #[serde(default)]
    pub coin: Option<NativeCoin>,
    /// Attach the operator key so mints can be sent on this chain
    #[serde(default)]
    pub relay: bool,
}

impl NetworkConfig {
    pub fn fee_config(&self) -> FeeConfig {
        FeeConfig {
            model: self.fee_model,
            gas_limit: self.gas_limit,
            gas_fee_cap: self.gas_fee_cap,
            gas_tip_cap: self.gas_tip_cap,
        }
    }
}

/// One bridge contract to watch
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Chain the bridge contract lives on
    pub chain_id: u64,
    /// Bridge contract address (case-insensitive)
    pub address: String,
    /// Token contract minted for each deposit
    pub token: String,
    /// Never scan below this block, whatever the checkpoint says
    #[serde(default)]
    pub start_block: u64,
    /// Chain where `token` lives; defaults to `chain_id`
    #[serde(default)]
    pub destination_chain_id: Option<u64>,
}

impl BridgeConfig {
    pub fn destination_chain(&self) -> u64 {
        self.destination_chain_id.unwrap_or(self.chain_id)
    }
}

/// Process-wide relayer settings
#[derive(Clone, Deserialize)]
pub struct RelayerSettings {
    /// Operator private key (hex), required when relaying
    #[serde(default)]
    pub private_key: Option<Secret<String>>,
    /// Submit a mint for every qualifying deposit
    #[serde(default)]
    pub relay_deposits: bool,
    /// Checkpoint file name, relative to the config directory
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,
    #[serde(default = "default_steady_interval")]
    pub steady_interval_secs: u64,
    #[serde(default = "default_catch_up_interval")]
    pub catch_up_interval_secs: u64,
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
    #[serde(default = "default_startup_delay")]
    pub startup_delay_secs: u64,
    /// Blocks added to the range start per query (`to - from`)
    #[serde(default = "default_events_window")]
    pub events_window: u64,
    /// Port for /health and /metrics; disabled when unset
    #[serde(default)]
    pub health_port: Option<u16>,
}

/// Custom Debug that shows only whether a key is configured.
impl fmt::Debug for RelayerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayerSettings")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("relay_deposits", &self.relay_deposits)
            .field("checkpoint_file", &self.checkpoint_file)
            .field("snapshot_interval_secs", &self.snapshot_interval_secs)
            .field("steady_interval_secs", &self.steady_interval_secs)
            .field("catch_up_interval_secs", &self.catch_up_interval_secs)
            .field("error_backoff_secs", &self.error_backoff_secs)
            .field("startup_delay_secs", &self.startup_delay_secs)
            .field("events_window", &self.events_window)
            .field("health_port", &self.health_port)
            .finish()
    }
}

impl Default for RelayerSettings {
    fn default() -> Self {
        Self {
            private_key: None,
            relay_deposits: false,
            checkpoint_file: default_checkpoint_file(),
            snapshot_interval_secs: default_snapshot_interval(),
            steady_interval_secs: default_steady_interval(),
            catch_up_interval_secs: default_catch_up_interval(),
            error_backoff_secs: default_error_backoff(),
            startup_delay_secs: default_startup_delay(),
            events_window: default_events_window(),
            health_port: None,
        }
    }
}

impl RelayerSettings {
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }
}

/// Default functions
fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

fn default_checkpoint_file() -> String {
    "checkpoints.bin".to_string()
}

fn default_snapshot_interval() -> u64 {
    60
}

fn default_steady_interval() -> u64 {
    30
}

fn default_catch_up_interval() -> u64 {
    3
}

fn default_error_backoff() -> u64 {
    30
}

fn default_startup_delay() -> u64 {
    5
}

fn default_events_window() -> u64 {
    multichain_rs::evm::MAX_LOG_RANGE
}

impl Config {
    /// Load `.env`, merge every YAML file under `dir`, then apply env overrides.
    pub fn load(dir: &Path) -> Result<Self> {
        let dotenv = dir.join(".env");
        if dotenv.exists() {
            dotenvy::from_path(&dotenv)
                .wrap_err_with(|| format!("Failed to load {}", dotenv.display()))?;
        } else {
            dotenvy::dotenv().ok();
        }

        let mut config = Self::load_files(dir)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Merge the YAML files under `dir` without touching the environment
    pub fn load_files(dir: &Path) -> Result<Self> {
        let files = collect_config_files(dir)?;
        if files.is_empty() {
            return Err(eyre!("No *.yaml config files found in {}", dir.display()));
        }

        let mut builder = config::Config::builder();
        for file in &files {
            debug!(path = %file.display(), "Adding config file");
            builder = builder
                .add_source(config::File::from(file.as_path()).format(config::FileFormat::Yaml));
        }

        builder
            .build()
            .wrap_err_with(|| format!("Failed to read config files in {}", dir.display()))?
            .try_deserialize()
            .wrap_err("Failed to parse relayer configuration")
    }

    /// `AEVM_PRIVATE_KEY`, `AEVM_RELAY_DEPOSITS` and `AEVM_HEALTH_PORT` win over files
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(key) = env::var("AEVM_PRIVATE_KEY") {
            self.relayer.private_key = Some(Secret::new(key));
        }
        if let Ok(flag) = env::var("AEVM_RELAY_DEPOSITS") {
            self.relayer.relay_deposits = flag
                .parse()
                .wrap_err("AEVM_RELAY_DEPOSITS must be true or false")?;
        }
        if let Ok(port) = env::var("AEVM_HEALTH_PORT") {
            self.relayer.health_port =
                Some(port.parse().wrap_err("AEVM_HEALTH_PORT must be a valid port")?);
        }
        Ok(())
    }

    pub fn network(&self, chain_id: u64) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.chain_id == chain_id)
    }

    /// Native coin configured for `chain_id`
    pub fn coin_for_chain(&self, chain_id: u64) -> Option<&NativeCoin> {
        self.network(chain_id).and_then(|n| n.coin.as_ref())
    }

    pub fn checkpoint_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.relayer.checkpoint_file)
    }
}

fn is_skipped(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Every YAML file below `dir`, sorted, honouring the `_` skip rule
fn collect_config_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = fs::read_dir(&current)
            .wrap_err_with(|| format!("Failed to read config directory {}", current.display()))?;
        for entry in entries {
            let path = entry?.path();
            if is_skipped(&path) {
                continue;
            }
            if path.is_dir() {
                pending.push(path);
            } else if is_yaml(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
