//! rebalanced: control loop, relocation executors and the snapshot-file
//! metrics source behind the daemon binary.

pub mod control_loop;
pub mod executor;
pub mod snapshot_source;

use std::path::Path;

use anyhow::Context;
use rebalance_core::RebalanceConfig;

pub use control_loop::{ControlLoop, TickReport};
pub use executor::{DryRunExecutor, ExecuteFuture, Executor, ScriptExecutor};
pub use snapshot_source::SnapshotFileSource;

/// Load `path`, or the built-in defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RebalanceConfig> {
    match path {
        Some(path) => RebalanceConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(RebalanceConfig::default()),
    }
}
