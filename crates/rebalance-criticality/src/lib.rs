//! rebalance-criticality: when to act, and where relocated memory may go.
//!
//! # Components
//!
//! - **`threshold`**: node is critical when its free memory is below threshold
//! - **`slope`**: node is critical when free memory predicted from workload
//!   growth over a look-ahead window is below threshold
//! - **`destination`**: shared validation: pick the node with the most
//!   headroom and accept commands while it stays above `threshold + margin`
//!
//! Both policies produce `NodeFreeCapacityRequest`s sized as the GB needed to
//! bring the node (current or predicted) back up to the threshold.

pub mod destination;
pub mod slope;
pub mod threshold;

use std::sync::Arc;

use rebalance_core::config::{CriticalityConfig, CriticalityKind};
use rebalance_core::{
    Cluster, MetricsResult, MetricsSource, NodeFreeCapacityRequest, RelocationCommand,
};

pub use destination::{DestinationRules, most_headroom, validate_commands};
pub use slope::SlopePolicy;
pub use threshold::ThresholdPolicy;

/// Criticality policy, chosen once at construction.
pub enum Criticality {
    Threshold(ThresholdPolicy),
    Slope(SlopePolicy),
}

impl Criticality {
    pub fn from_config(
        config: &CriticalityConfig,
        cluster: Cluster,
        source: Arc<dyn MetricsSource>,
    ) -> Self {
        let rules = DestinationRules {
            margin_percent: config.destination_margin_percent,
            single_relocation: config.single_relocation,
        };
        match config.strategy {
            CriticalityKind::Threshold => Self::Threshold(
                ThresholdPolicy::new(config.threshold_free_percent, cluster, source)
                    .with_rules(rules),
            ),
            CriticalityKind::Slope => Self::Slope(
                SlopePolicy::new(
                    config.threshold_free_percent,
                    config.prediction_minutes,
                    cluster,
                    source,
                )
                .with_rules(rules),
            ),
        }
    }

    /// Nodes that need relief, with the GB to free on each.
    pub fn free_capacity_requests(&self) -> MetricsResult<Vec<NodeFreeCapacityRequest>> {
        match self {
            Self::Threshold(p) => p.free_capacity_requests(),
            Self::Slope(p) => p.free_capacity_requests(),
        }
    }

    /// Assign a destination to as many of `commands` as fit, in order.
    pub fn validate(
        &self,
        source_node: &str,
        commands: Vec<RelocationCommand>,
    ) -> MetricsResult<Vec<RelocationCommand>> {
        match self {
            Self::Threshold(p) => p.validate(source_node, commands),
            Self::Slope(p) => p.validate(source_node, commands),
        }
    }

    pub fn set_threshold(&mut self, percent: f64) {
        match self {
            Self::Threshold(p) => p.set_threshold(percent),
            Self::Slope(p) => p.set_threshold(percent),
        }
    }

    pub fn threshold(&self) -> f64 {
        match self {
            Self::Threshold(p) => p.threshold(),
            Self::Slope(p) => p.threshold(),
        }
    }
}
