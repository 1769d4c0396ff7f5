//! rebalance-core: shared types for the memory-pressure rebalancer.
//!
//! Everything the decision engine needs that is not itself a decision:
//!
//! - **`cluster`**: static capacity facts and percent ⇄ GB conversions
//! - **`clock`**: injected `Timestamp`; nothing in the engine reads the wall clock
//! - **`types`**: capacity requests and relocation commands
//! - **`metrics`**: the `MetricsSource` collaborator trait and its in-memory form
//! - **`snapshot`**: serializable cluster snapshot (the in-memory/file source model)
//! - **`config`**: `rebalance.toml` parsing

pub mod clock;
pub mod cluster;
pub mod config;
pub mod metrics;
pub mod snapshot;
pub mod types;

pub use clock::Timestamp;
pub use cluster::{Cluster, ClusterError, bytes_to_gb};
pub use config::{ConfigError, RebalanceConfig};
pub use metrics::{
    MetricsError, MetricsResult, MetricsSource, RuntimeFilteredSource, StaticMetrics,
};
pub use snapshot::{ClusterSnapshot, NodeSnapshot, WorkloadRuntime, WorkloadSnapshot};
pub use types::*;
