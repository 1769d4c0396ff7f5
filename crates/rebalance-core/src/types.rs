//! Requests and commands passed between the policies.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

/// Workload id → current memory usage in GB.
///
/// Ordered so that every decision made over it is reproducible.
pub type WorkloadMemoryMap = BTreeMap<String, f64>;

/// Node name → free memory percent.
pub type NodeFreeMap = BTreeMap<String, f64>;

/// "Free at least `amount_gb` more on `node`."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFreeCapacityRequest {
    pub node: String,
    pub amount_gb: f64,
}

impl NodeFreeCapacityRequest {
    pub fn new(node: impl Into<String>, amount_gb: f64) -> Self {
        Self {
            node: node.into(),
            amount_gb,
        }
    }
}

impl fmt::Display for NodeFreeCapacityRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "free {:.2} GB on {}", self.amount_gb, self.node)
    }
}

/// Move `workload` off its node.
///
/// Created by a selection strategy; `destination_node` is filled in by the
/// criticality policy's validation and `expected_finish_at` at admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelocationCommand {
    pub workload: String,
    pub usage_gb: f64,
    #[serde(default)]
    pub destination_node: String,
    #[serde(default)]
    pub expected_finish_at: Option<Timestamp>,
}

impl RelocationCommand {
    pub fn new(workload: impl Into<String>, usage_gb: f64) -> Self {
        Self {
            workload: workload.into(),
            usage_gb,
            destination_node: String::new(),
            expected_finish_at: None,
        }
    }

    pub fn has_destination(&self) -> bool {
        !self.destination_node.is_empty()
    }
}

impl fmt::Display for RelocationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.2} GB)", self.workload, self.usage_gb)?;
        if self.has_destination() {
            write!(f, " -> {}", self.destination_node)?;
        }
        Ok(())
    }
}

/// Total memory moved by a batch of commands.
pub fn total_usage_gb(commands: &[RelocationCommand]) -> f64 {
    commands.iter().map(|c| c.usage_gb).sum()
}
