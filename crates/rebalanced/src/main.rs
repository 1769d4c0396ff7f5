//! rebalanced: the memory-pressure rebalancing daemon.
//!
//! Wires the decision engine to its surroundings:
//! - Config (`rebalance.toml`)
//! - Metrics snapshot file, re-read every tick
//! - Controller (criticality, selection, admission)
//! - Checkpoint-script executor
//!
//! # Usage
//!
//! ```text
//! rebalanced run  --config /etc/rebalance/rebalance.toml --snapshot /run/rebalance/metrics.json
//! rebalanced plan --snapshot metrics.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rebalance_controller::{Controller, ControllerError};
use rebalance_core::{MetricsSource, RebalanceConfig, Timestamp};
use rebalanced::{ControlLoop, DryRunExecutor, Executor, ScriptExecutor, SnapshotFileSource};

#[derive(Parser)]
#[command(name = "rebalanced", about = "Memory-pressure rebalancing daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Poll metrics and relocate workloads until interrupted.
    Run {
        /// Path to rebalance.toml; built-in defaults when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Metrics snapshot JSON written by the collector.
        #[arg(long)]
        snapshot: PathBuf,

        /// Log relocations instead of running the checkpoint script.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run one decision round and print the batch as JSON.
    Plan {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        snapshot: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run {
            config,
            snapshot,
            dry_run,
        } => run(config, snapshot, dry_run).await,
        Command::Plan { config, snapshot } => plan(config, snapshot),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rebalanced=debug,rebalance=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn controller(
    config_path: Option<PathBuf>,
    snapshot: PathBuf,
) -> anyhow::Result<(RebalanceConfig, Controller)> {
    let config = rebalanced::load_config(config_path.as_deref())?;
    let source: Arc<dyn MetricsSource> = Arc::new(SnapshotFileSource::new(snapshot));
    let controller = Controller::from_config(&config, source)?;
    Ok((config, controller))
}

async fn run(config_path: Option<PathBuf>, snapshot: PathBuf, dry_run: bool) -> anyhow::Result<()> {
    info!(snapshot = %snapshot.display(), dry_run, "rebalancer starting");
    let (config, controller) = controller(config_path, snapshot)?;

    let executor: Arc<dyn Executor> = if dry_run {
        Arc::new(DryRunExecutor)
    } else {
        Arc::new(ScriptExecutor::new(config.executor.clone()))
    };
    info!(
        criticality = ?config.criticality.strategy,
        selection = ?config.selection.strategy,
        admission = ?config.admission.mode,
        threshold = config.criticality.threshold_free_percent,
        "controller initialized"
    );

    let interval = Duration::from_secs(config.controller.poll_interval_secs);
    let mut control = ControlLoop::new(controller, executor, interval);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        control.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = handle.await;

    info!("rebalancer stopped");
    Ok(())
}

fn plan(config_path: Option<PathBuf>, snapshot: PathBuf) -> anyhow::Result<()> {
    let (_, mut controller) = controller(config_path, snapshot)?;
    let batch = match controller.tick(Timestamp::now()) {
        Ok(batch) => batch,
        Err(ControllerError::NodeFull(full)) => {
            warn!(
                node = %full.request.node,
                "rebalancing currently impossible, printing partial batch"
            );
            full.admitted
        }
        Err(e) => return Err(e.into()),
    };
    println!("{}", serde_json::to_string_pretty(&batch)?);
    Ok(())
}
