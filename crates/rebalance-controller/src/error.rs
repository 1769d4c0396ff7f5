//! Controller error types.

use thiserror::Error;

use rebalance_core::{ClusterError, MetricsError, NodeFreeCapacityRequest, RelocationCommand};
use rebalance_selection::SelectionError;

/// Selected relocations for which no destination has room.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFull {
    pub request: NodeFreeCapacityRequest,
    /// What selection proposed for `request`.
    pub commands: Vec<RelocationCommand>,
    /// Commands admitted earlier in the same tick. They are registered with
    /// the tracker and should still be executed.
    pub admitted: Vec<RelocationCommand>,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(
        "rebalancing currently impossible: no destination has room for {} relocation(s) off node {}",
        .0.commands.len(),
        .0.request.node
    )]
    NodeFull(Box<NodeFull>),

    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),
}

impl ControllerError {
    pub fn is_node_full(&self) -> bool {
        matches!(self, Self::NodeFull(_))
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;
