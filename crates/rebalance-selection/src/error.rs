//! Selection error types.

use thiserror::Error;

use rebalance_core::MetricsError;

/// Errors that can occur while choosing workloads to relocate.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no relocation candidates on node {0}")]
    NoCandidates(String),

    #[error(
        "largest workload {workload} ({usage_gb:.2} GB) on node {node} does not cover request ({amount_gb:.2} GB)"
    )]
    Insufficient {
        node: String,
        workload: String,
        usage_gb: f64,
        amount_gb: f64,
    },

    #[error("no workload on node {node} is at least {amount_gb:.2} GB")]
    NoneBigEnough { node: String, amount_gb: f64 },

    #[error(
        "no workload subset on node {node} fits {capacity_gb} GB; is the smallest candidate bigger than the request?"
    )]
    NoFit { node: String, capacity_gb: usize },

    #[error("request for node {node} has no finite size ({amount_gb} GB)")]
    UnboundedRequest { node: String, amount_gb: f64 },

    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),
}

pub type SelectionResult<T> = Result<T, SelectionError>;
