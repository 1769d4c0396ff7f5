//! Poll loop: one controller tick per interval, then run what it admitted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use rebalance_controller::{Controller, ControllerError};
use rebalance_core::{RelocationCommand, Timestamp};

use crate::executor::Executor;

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Commands the executor completed.
    pub executed: Vec<String>,
    /// Commands the executor failed on.
    pub failed: Vec<String>,
    /// The controller stopped the round early with an error.
    pub aborted: bool,
}

pub struct ControlLoop {
    controller: Controller,
    executor: Arc<dyn Executor>,
    interval: Duration,
}

impl ControlLoop {
    pub fn new(controller: Controller, executor: Arc<dyn Executor>, interval: Duration) -> Self {
        Self {
            controller,
            executor,
            interval,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    /// Decide at `now` and execute the batch.
    ///
    /// On `NodeFull` the commands admitted before the failing request are
    /// still executed; any other controller error skips execution.
    pub async fn tick(&mut self, now: Timestamp) -> TickReport {
        let mut report = TickReport::default();
        let batch = match self.controller.tick(now) {
            Ok(batch) => batch,
            Err(ControllerError::NodeFull(full)) => {
                warn!(
                    node = %full.request.node,
                    amount_gb = full.request.amount_gb,
                    candidates = full.commands.len(),
                    admitted = full.admitted.len(),
                    "rebalancing currently impossible, backing off"
                );
                report.aborted = true;
                full.admitted
            }
            Err(e) => {
                error!(error = %e, "rebalancing round failed");
                report.aborted = true;
                return report;
            }
        };

        self.execute(&batch, &mut report).await;
        report
    }

    async fn execute(&self, batch: &[RelocationCommand], report: &mut TickReport) {
        for cmd in batch {
            match self.executor.execute(cmd).await {
                Ok(()) => report.executed.push(cmd.workload.clone()),
                Err(e) => {
                    error!(
                        workload = %cmd.workload,
                        error = %format_args!("{e:#}"),
                        "relocation failed"
                    );
                    report.failed.push(cmd.workload.clone());
                }
            }
        }
    }

    /// Tick every `interval` until `shutdown` flips.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "rebalancer started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    let report = self.tick(Timestamp::now()).await;
                    if !report.executed.is_empty() || !report.failed.is_empty() {
                        info!(
                            executed = report.executed.len(),
                            failed = report.failed.len(),
                            "round complete"
                        );
                    }
                }
                _ = shutdown.changed() => {
                    info!("rebalancer shutting down");
                    break;
                }
            }
        }
    }
}
