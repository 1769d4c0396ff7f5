//! Relocation executors.
//!
//! The checkpoint script does the actual work (checkpoint the pod, restore
//! it on the target node); the daemon only hands it the command through the
//! environment:
//!
//! ```text
//!   WORKER       workload id
//!   NS           namespace
//!   TARGET_NODE  destination node
//!   KUBECONFIG   only when configured
//! ```

use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, bail};
use tokio::process::Command;
use tracing::{debug, info};

use rebalance_core::RelocationCommand;
use rebalance_core::config::ExecutorConfig;

/// Boxed future returned by [`Executor::execute`].
pub type ExecuteFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Carries out one admitted relocation.
pub trait Executor: Send + Sync {
    fn execute<'a>(&'a self, cmd: &'a RelocationCommand) -> ExecuteFuture<'a>;
}

/// Runs `/bin/sh <script>` in the script directory, once per command.
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    config: ExecutorConfig,
}

impl ScriptExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    fn command(&self, cmd: &RelocationCommand) -> Command {
        let mut command = Command::new("/bin/sh");
        command
            .arg(&self.config.script)
            .current_dir(&self.config.script_dir)
            .env("WORKER", &cmd.workload)
            .env("NS", &self.config.namespace)
            .env("TARGET_NODE", &cmd.destination_node)
            .kill_on_drop(true);
        if let Some(kubeconfig) = &self.config.kubeconfig {
            command.env("KUBECONFIG", kubeconfig);
        }
        command
    }
}

impl Executor for ScriptExecutor {
    fn execute<'a>(&'a self, cmd: &'a RelocationCommand) -> ExecuteFuture<'a> {
        Box::pin(async move {
            if !cmd.has_destination() {
                bail!("relocation of {} has no destination node", cmd.workload);
            }
            let mut command = self.command(cmd);
            debug!(
                workload = %cmd.workload,
                script = %self.config.script,
                "running checkpoint script"
            );

            let output = command.output().await.with_context(|| {
                format!(
                    "failed to run {} in {}",
                    self.config.script,
                    self.config.script_dir.display()
                )
            })?;

            if !output.status.success() {
                bail!(
                    "checkpoint script failed for {} (exit code: {}): {}",
                    cmd.workload,
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            info!(
                workload = %cmd.workload,
                destination = %cmd.destination_node,
                "checkpoint script finished"
            );
            Ok(())
        })
    }
}

/// Logs what would run and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

impl Executor for DryRunExecutor {
    fn execute<'a>(&'a self, cmd: &'a RelocationCommand) -> ExecuteFuture<'a> {
        Box::pin(async move {
            info!(
                workload = %cmd.workload,
                usage_gb = cmd.usage_gb,
                destination = %cmd.destination_node,
                "dry run, not relocating"
            );
            Ok(())
        })
    }
}
