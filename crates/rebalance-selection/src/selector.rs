//! The selector: strategy, admission gate and candidate filtering in one
//! place, so the controller sees a single `relocation_commands` call.

use std::sync::Arc;

use tracing::debug;

use rebalance_admission::{AdmissionTracker, Gate};
use rebalance_core::config::{AdmissionConfig, SelectionConfig};
use rebalance_core::{
    Cluster, MetricsSource, NodeFreeCapacityRequest, RelocationCommand, Timestamp,
    WorkloadMemoryMap,
};

use crate::error::SelectionResult;
use crate::strategy::{self, Strategy};

pub struct Selector {
    strategy: Strategy,
    tracker: AdmissionTracker,
    cluster: Cluster,
    source: Arc<dyn MetricsSource>,
}

impl Selector {
    pub fn new(
        strategy: Strategy,
        tracker: AdmissionTracker,
        cluster: Cluster,
        source: Arc<dyn MetricsSource>,
    ) -> Self {
        Self {
            strategy,
            tracker,
            cluster,
            source,
        }
    }

    pub fn from_config(
        selection: &SelectionConfig,
        admission: &AdmissionConfig,
        cluster: Cluster,
        source: Arc<dyn MetricsSource>,
    ) -> Self {
        Self::new(
            Strategy::from_config(selection),
            AdmissionTracker::from_config(admission),
            cluster,
            source,
        )
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn tracker(&self) -> &AdmissionTracker {
        &self.tracker
    }

    /// Candidate relocations for `request`.
    ///
    /// Returns an empty list without error while the admission gate is
    /// cooling down. Workloads still being relocated are never candidates.
    pub fn relocation_commands(
        &self,
        now: Timestamp,
        request: &NodeFreeCapacityRequest,
    ) -> SelectionResult<Vec<RelocationCommand>> {
        if let Gate::Cooling { until } = self.tracker.gate(now) {
            debug!(
                node = %request.node,
                now = %now,
                until = %until,
                "admission cooling down, skipping selection"
            );
            return Ok(Vec::new());
        }

        let candidates = self.candidates(now, &request.node)?;
        let commands = match self.strategy {
            Strategy::Optimal { min_workload_gb } => {
                strategy::optimal(request, &candidates, min_workload_gb, &self.tracker)?
            }
            Strategy::Max => strategy::max(request, &candidates)?,
            Strategy::BigEnough => strategy::big_enough(request, &candidates)?,
            Strategy::Slope { look_ahead_minutes } => strategy::slope(
                request,
                &candidates,
                look_ahead_minutes,
                &self.cluster,
                self.source.as_ref(),
            )?,
        };

        debug!(
            node = %request.node,
            strategy = self.strategy.name(),
            amount_gb = request.amount_gb,
            selected = commands.len(),
            "selection complete"
        );
        Ok(commands)
    }

    /// Register `cmd` with the tracker and stamp its expected finish time.
    pub fn admit(&mut self, cmd: &mut RelocationCommand, now: Timestamp) {
        let finish_at = self.tracker.admit(now, cmd.usage_gb, &cmd.workload);
        cmd.expected_finish_at = Some(finish_at);
    }

    fn candidates(&self, now: Timestamp, node: &str) -> SelectionResult<WorkloadMemoryMap> {
        let mut memories = self.source.workload_memories(node)?;
        let in_flight = self.tracker.in_flight(now);
        memories.retain(|workload, usage_gb| {
            if in_flight.contains(workload) {
                debug!(node, workload = %workload, "skipping workload still in flight");
                return false;
            }
            *usage_gb > 0.0
        });
        Ok(memories)
    }
}
