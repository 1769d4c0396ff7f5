//! Point-in-time view of cluster memory, as reported by the metrics backend.
//!
//! The daemon reads one of these from a JSON file on every call; tests build
//! them in memory through [`StaticMetrics`](crate::StaticMetrics).
//!
//! ```json
//! {
//!   "nodes": {
//!     "z1": {
//!       "free_percent": 42.0,
//!       "workloads": {
//!         "worker-a": { "usage_gb": 31.5, "growth_gb_per_min": 0.4 },
//!         "worker-b": { "usage_bytes": 8589934592,
//!                       "runtime": { "elapsed_secs": 600, "expected_secs": 3600 } }
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cluster::bytes_to_gb;
use crate::metrics::{MetricsError, MetricsResult, MetricsSource};
use crate::types::{NodeFreeMap, WorkloadMemoryMap};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub free_percent: f64,
    #[serde(default)]
    pub workloads: BTreeMap<String, WorkloadSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_bytes: Option<u64>,
    /// Memory growth in GB per minute.
    #[serde(default)]
    pub growth_gb_per_min: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<WorkloadRuntime>,
}

impl WorkloadSnapshot {
    pub fn with_usage_gb(usage_gb: f64) -> Self {
        Self {
            usage_gb: Some(usage_gb),
            ..Default::default()
        }
    }

    /// Usage in GB; an explicit GB value wins over a byte count.
    pub fn usage_gb(&self) -> f64 {
        self.usage_gb
            .or_else(|| self.usage_bytes.map(bytes_to_gb))
            .unwrap_or(0.0)
    }
}

/// How far a batch workload is through its expected runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadRuntime {
    pub elapsed_secs: u64,
    pub expected_secs: u64,
}

impl WorkloadRuntime {
    pub fn percent_complete(&self) -> f64 {
        if self.expected_secs == 0 {
            return 100.0;
        }
        self.elapsed_secs as f64 / self.expected_secs as f64 * 100.0
    }

    pub fn remaining_secs(&self) -> u64 {
        self.expected_secs.saturating_sub(self.elapsed_secs)
    }
}

impl ClusterSnapshot {
    pub fn from_json(json: &str) -> MetricsResult<Self> {
        serde_json::from_str(json).map_err(|e| MetricsError::Parse(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> MetricsResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MetricsError::Parse(e.to_string()))
    }

    pub fn node(&self, node: &str) -> MetricsResult<&NodeSnapshot> {
        self.nodes
            .get(node)
            .ok_or_else(|| MetricsError::UnknownNode(node.to_string()))
    }

    fn workload(&self, node: &str, workload: &str) -> MetricsResult<&WorkloadSnapshot> {
        self.node(node)?
            .workloads
            .get(workload)
            .ok_or_else(|| MetricsError::UnknownWorkload {
                node: node.to_string(),
                workload: workload.to_string(),
            })
    }
}

impl MetricsSource for ClusterSnapshot {
    fn workload_memories(&self, node: &str) -> MetricsResult<WorkloadMemoryMap> {
        Ok(self
            .node(node)?
            .workloads
            .iter()
            .map(|(id, w)| (id.clone(), w.usage_gb()))
            .collect())
    }

    fn node_free_percent(&self, node: &str) -> MetricsResult<f64> {
        Ok(self.node(node)?.free_percent)
    }

    fn all_nodes_free_percent(&self) -> MetricsResult<NodeFreeMap> {
        Ok(self
            .nodes
            .iter()
            .map(|(name, n)| (name.clone(), n.free_percent))
            .collect())
    }

    fn workload_growth_rate(&self, node: &str, workload: &str) -> MetricsResult<f64> {
        Ok(self.workload(node, workload)?.growth_gb_per_min)
    }

    fn workload_runtime(&self, workload: &str) -> MetricsResult<Option<WorkloadRuntime>> {
        Ok(self
            .nodes
            .values()
            .find_map(|n| n.workloads.get(workload))
            .and_then(|w| w.runtime))
    }
}
