//! Slope criticality: act on nodes that will run low within the look-ahead
//! window if their workloads keep growing at the current rate.
//!
//! ```text
//!   growth_gb     = Σ growth_rate(w) × prediction_minutes
//!   predicted     = free_percent − usage_percent(growth_gb)
//!   critical  iff   predicted < threshold
//!   request       = shortfall_gb(threshold, predicted)
//! ```
//!
//! Shrinking workloads contribute negative growth, so a node may be rescued
//! by its own workloads releasing memory.

use std::sync::Arc;

use tracing::{debug, info};

use rebalance_core::{
    Cluster, MetricsResult, MetricsSource, NodeFreeCapacityRequest, RelocationCommand,
};

use crate::destination::{DestinationRules, validate_commands};

pub struct SlopePolicy {
    threshold_percent: f64,
    prediction_minutes: f64,
    cluster: Cluster,
    source: Arc<dyn MetricsSource>,
    rules: DestinationRules,
}

impl SlopePolicy {
    pub fn new(
        threshold_percent: f64,
        prediction_minutes: f64,
        cluster: Cluster,
        source: Arc<dyn MetricsSource>,
    ) -> Self {
        Self {
            threshold_percent,
            prediction_minutes,
            cluster,
            source,
            rules: DestinationRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: DestinationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold_percent
    }

    pub fn prediction_minutes(&self) -> f64 {
        self.prediction_minutes
    }

    pub fn set_threshold(&mut self, percent: f64) {
        info!(from = self.threshold_percent, to = percent, "threshold changed");
        self.threshold_percent = percent;
    }

    /// Free percent of `node` expected after the look-ahead window.
    pub fn predicted_free_percent(&self, node: &str, free_percent: f64) -> MetricsResult<f64> {
        let memories = self.source.workload_memories(node)?;
        let mut slope_gb_per_min = 0.0;
        for workload in memories.keys() {
            slope_gb_per_min += self.source.workload_growth_rate(node, workload)?;
        }
        let growth_gb = slope_gb_per_min * self.prediction_minutes;
        Ok(free_percent - self.cluster.usage_percent(growth_gb))
    }

    pub fn free_capacity_requests(&self) -> MetricsResult<Vec<NodeFreeCapacityRequest>> {
        let free = self.source.all_nodes_free_percent()?;
        let mut requests = Vec::new();
        for (node, free_percent) in free {
            let predicted = self.predicted_free_percent(&node, free_percent)?;
            if predicted >= self.threshold_percent {
                debug!(node = %node, free_percent, predicted, "node healthy over look-ahead");
                continue;
            }
            let amount_gb = self.cluster.shortfall_gb(self.threshold_percent, predicted);
            info!(
                node = %node,
                free_percent,
                predicted,
                threshold = self.threshold_percent,
                minutes = self.prediction_minutes,
                amount_gb,
                "node predicted to drop below free-memory threshold"
            );
            requests.push(NodeFreeCapacityRequest::new(node, amount_gb));
        }
        Ok(requests)
    }

    pub fn validate(
        &self,
        source_node: &str,
        commands: Vec<RelocationCommand>,
    ) -> MetricsResult<Vec<RelocationCommand>> {
        let free = self.source.all_nodes_free_percent()?;
        Ok(validate_commands(
            &self.cluster,
            &free,
            source_node,
            self.threshold_percent,
            &self.rules,
            commands,
        ))
    }
}
