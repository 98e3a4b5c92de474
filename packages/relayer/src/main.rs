//! AEVM Bridge Relayer
//!
//! Long-running process that watches configured bridge contracts and relays
//! deposits as mints on the destination chain.
//!
//! ```text
//! aevm-relayer --dir ~/.aevm
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines and `RUST_LOG` to change levels.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use alloy::signers::local::PrivateKeySigner;
use clap::Parser;
use eyre::{eyre, Result, WrapErr};
use multichain_rs::evm::{ChainClient, ChainClientConfig};
use tokio::sync::watch;
use tracing::{error, info, warn};

use relayer::config::Config;
use relayer::metrics::Metrics;
use relayer::server::{self, AppState};
use relayer::{ChainRegistry, CheckpointStore, TransactionRelay, Validator, WatcherManager};

#[derive(Parser)]
#[command(name = "aevm-relayer")]
#[command(about = "Deposit watcher and mint relayer for AEVM bridges", long_about = None)]
struct Cli {
    /// Configuration directory (defaults to $HOME/.aevm)
    #[arg(long, env = "AEVM_DIR")]
    dir: Option<PathBuf>,

    /// Reject plain http/ws RPC endpoints
    #[arg(long)]
    strict: bool,
}

impl Cli {
    fn config_dir(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => env::var("HOME")
                .map(|home| PathBuf::from(home).join(".aevm"))
                .wrap_err("HOME is not set; pass --dir"),
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    init_logging();
    let started_at = Instant::now();

    let dir = cli.config_dir()?;
    info!(dir = %dir.display(), "Starting AEVM Bridge Relayer");

    let config = Config::load(&dir)?;
    let validator = Arc::new(if cli.strict {
        Validator::strict()
    } else {
        Validator::default()
    });
    validator
        .check(&config)
        .wrap_err("Invalid relayer configuration")?;
    info!(
        networks = config.networks.len(),
        bridges = config.bridges.len(),
        relay_deposits = config.relayer.relay_deposits,
        "Configuration loaded"
    );

    let signer = operator_signer(&config)?;

    let registry = Arc::new(ChainRegistry::new(validator.clone()));
    for network in &config.networks {
        let client_config = ChainClientConfig {
            chain_id: network.chain_id,
            rpc_url: network.endpoint.clone(),
            fees: network.fee_config(),
            coin: config.coin_for_chain(network.chain_id).cloned(),
        };
        let client_signer = if network.relay { signer.clone() } else { None };
        let client = ChainClient::connect(&client_config, client_signer)
            .await
            .wrap_err_with(|| format!("Failed to connect to chain {}", network.chain_id))?;
        registry.register(client).await?;
    }

    let checkpoints =
        Arc::new(CheckpointStore::open(config.checkpoint_path(&dir), validator.clone()).await?);
    let metrics = Arc::new(Metrics::new());
    let relay = Arc::new(TransactionRelay::new(registry.clone()).with_metrics(metrics.clone()));

    if let Some(port) = config.relayer.health_port {
        let state = AppState {
            registry: registry.clone(),
            checkpoints: checkpoints.clone(),
            metrics: metrics.clone(),
            started_at,
        };
        tokio::spawn(async move {
            if let Err(e) = server::start_server("0.0.0.0", port, state).await {
                error!(error = %e, "Health server stopped");
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    WatcherManager::new(
        config.bridges.clone(),
        config.relayer.clone(),
        registry,
        checkpoints,
    )
    .with_relay(relay)
    .with_metrics(metrics)
    .run(shutdown_rx)
    .await?;

    info!("AEVM Bridge Relayer stopped");
    Ok(())
}

/// Import the operator key, if one is configured
fn operator_signer(config: &Config) -> Result<Option<PrivateKeySigner>> {
    let Some(key) = config.relayer.private_key.as_ref().filter(|k| !k.is_blank()) else {
        if config.networks.iter().any(|n| n.relay) {
            warn!("Networks marked relay: true but no operator key is configured");
        }
        return Ok(None);
    };

    let signer: PrivateKeySigner = key
        .expose()
        .trim()
        .parse()
        .map_err(|e| eyre!("Invalid operator private key: {}", e))?;
    info!(address = %signer.address(), "Operator key loaded");
    Ok(Some(signer))
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,aevm_relayer=debug,relayer=debug,multichain_rs=info")
    });

    let json = env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .with(filter)
            .init();
    }
}

/// Wait for shutdown signals (SIGINT/SIGTERM)
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
