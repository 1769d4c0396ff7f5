//! The decision tick.
//!
//! ```text
//!   criticality ──requests──▶ selector ──commands──▶ criticality.validate
//!                                                         │
//!                                          accepted ◀─────┘
//!                                              │
//!                              selector.admit (stamp finish) ──▶ batch
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use rebalance_core::{
    Cluster, MetricsSource, RebalanceConfig, RelocationCommand, RuntimeFilteredSource, Timestamp,
    total_usage_gb,
};
use rebalance_criticality::Criticality;
use rebalance_selection::Selector;

use crate::error::{ControllerError, ControllerResult, NodeFull};

pub struct Controller {
    criticality: Criticality,
    selector: Selector,
    /// Requests below this size are noise.
    min_request_gb: f64,
}

impl Controller {
    pub const DEFAULT_MIN_REQUEST_GB: f64 = 7.0;

    pub fn new(criticality: Criticality, selector: Selector) -> Self {
        Self {
            criticality,
            selector,
            min_request_gb: Self::DEFAULT_MIN_REQUEST_GB,
        }
    }

    pub fn with_min_request_gb(mut self, min_request_gb: f64) -> Self {
        self.min_request_gb = min_request_gb;
        self
    }

    /// Wire criticality, selection and admission from a parsed config.
    ///
    /// With `selection.filter_finishing` the selector sees `source` through a
    /// [`RuntimeFilteredSource`]; criticality always sees every workload.
    pub fn from_config(
        config: &RebalanceConfig,
        source: Arc<dyn MetricsSource>,
    ) -> ControllerResult<Self> {
        let cluster = Cluster::from_config(&config.cluster)?;
        let criticality = Criticality::from_config(&config.criticality, cluster, source.clone());
        let selection_source: Arc<dyn MetricsSource> = if config.selection.filter_finishing {
            Arc::new(RuntimeFilteredSource::new(source))
        } else {
            source
        };
        let selector =
            Selector::from_config(&config.selection, &config.admission, cluster, selection_source);
        Ok(Self::new(criticality, selector).with_min_request_gb(config.controller.min_request_gb))
    }

    pub fn criticality(&self) -> &Criticality {
        &self.criticality
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut Selector {
        &mut self.selector
    }

    pub fn set_threshold(&mut self, percent: f64) {
        self.criticality.set_threshold(percent);
    }

    /// Run one decision round at `now` and return the admitted batch.
    ///
    /// The first request smaller than the minimum ends the round; requests
    /// after it are not looked at until the next tick. A selection or
    /// metrics error aborts the round. When selection proposes commands
    /// that no destination can take, the round stops with
    /// [`ControllerError::NodeFull`], which carries the commands admitted
    /// before it.
    pub fn tick(&mut self, now: Timestamp) -> ControllerResult<Vec<RelocationCommand>> {
        let requests = self.criticality.free_capacity_requests()?;
        let mut batch = Vec::new();

        for request in requests {
            if request.amount_gb < self.min_request_gb {
                debug!(
                    node = %request.node,
                    amount_gb = request.amount_gb,
                    min_request_gb = self.min_request_gb,
                    "request below minimum, ending round"
                );
                break;
            }

            let commands = self.selector.relocation_commands(now, &request)?;
            if commands.is_empty() {
                continue;
            }

            let accepted = self.criticality.validate(&request.node, commands.clone())?;
            if accepted.is_empty() {
                warn!(
                    node = %request.node,
                    amount_gb = request.amount_gb,
                    candidates = commands.len(),
                    "no destination can take relocations"
                );
                return Err(ControllerError::NodeFull(Box::new(NodeFull {
                    request,
                    commands,
                    admitted: batch,
                })));
            }

            for mut cmd in accepted {
                self.selector.admit(&mut cmd, now);
                info!(
                    source = %request.node,
                    destination = %cmd.destination_node,
                    workload = %cmd.workload,
                    usage_gb = cmd.usage_gb,
                    "relocation scheduled"
                );
                batch.push(cmd);
            }
        }

        if !batch.is_empty() {
            debug!(
                count = batch.len(),
                total_gb = total_usage_gb(&batch),
                "round batch admitted"
            );
        }
        Ok(batch)
    }
}
