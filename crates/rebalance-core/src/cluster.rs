//! Cluster model: static capacity facts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ClusterConfig;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    #[error("cluster needs at least one node")]
    NoNodes,

    #[error("node capacity must be positive, got {0} GB")]
    InvalidCapacity(f64),
}

/// A fixed-size cluster of identical nodes.
///
/// Capacity is checked once in [`Cluster::new`], so the conversions below
/// never divide by zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    node_count: u32,
    node_capacity_gb: f64,
}

impl Cluster {
    pub fn new(node_count: u32, node_capacity_gb: f64) -> Result<Self, ClusterError> {
        if node_count == 0 {
            return Err(ClusterError::NoNodes);
        }
        if !node_capacity_gb.is_finite() || node_capacity_gb <= 0.0 {
            return Err(ClusterError::InvalidCapacity(node_capacity_gb));
        }
        Ok(Self {
            node_count,
            node_capacity_gb,
        })
    }

    pub fn from_config(config: &ClusterConfig) -> Result<Self, ClusterError> {
        Self::new(config.node_count, config.node_capacity_gb)
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    pub fn node_capacity_gb(&self) -> f64 {
        self.node_capacity_gb
    }

    /// Share of one node's capacity that `gb` represents, in percent.
    pub fn usage_percent(&self, gb: f64) -> f64 {
        gb / self.node_capacity_gb * 100.0
    }

    /// GB corresponding to `percent` of one node's capacity.
    pub fn available_gb(&self, percent: f64) -> f64 {
        percent / 100.0 * self.node_capacity_gb
    }

    /// GB that must be freed on a node at `free_percent` to bring it back to
    /// `threshold_percent`. Positive when the node is below threshold.
    pub fn shortfall_gb(&self, threshold_percent: f64, free_percent: f64) -> f64 {
        self.available_gb(threshold_percent) - self.available_gb(free_percent)
    }
}

/// Convert a byte count reported by the metrics backend to GiB, rounded
/// half-up to two decimals.
pub fn bytes_to_gb(bytes: u64) -> f64 {
    let gb = bytes as f64 / (1u64 << 30) as f64;
    let scaled = gb * 100.0;
    let rounded = if scaled.fract() >= 0.5 {
        scaled.ceil()
    } else {
        scaled.floor()
    };
    rounded / 100.0
}
