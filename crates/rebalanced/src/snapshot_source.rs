//! Metrics read from a JSON snapshot file written by an external collector.

use std::path::{Path, PathBuf};

use rebalance_core::{
    ClusterSnapshot, MetricsResult, MetricsSource, NodeFreeMap, WorkloadMemoryMap, WorkloadRuntime,
};

/// Re-reads the file on every call, so each tick sees the collector's
/// latest write and nothing is cached between ticks.
#[derive(Debug, Clone)]
pub struct SnapshotFileSource {
    path: PathBuf,
}

impl SnapshotFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> MetricsResult<ClusterSnapshot> {
        let text = std::fs::read_to_string(&self.path)?;
        ClusterSnapshot::from_json(&text)
    }
}

impl MetricsSource for SnapshotFileSource {
    fn workload_memories(&self, node: &str) -> MetricsResult<WorkloadMemoryMap> {
        self.load()?.workload_memories(node)
    }

    fn node_free_percent(&self, node: &str) -> MetricsResult<f64> {
        self.load()?.node_free_percent(node)
    }

    fn all_nodes_free_percent(&self) -> MetricsResult<NodeFreeMap> {
        self.load()?.all_nodes_free_percent()
    }

    fn workload_growth_rate(&self, node: &str, workload: &str) -> MetricsResult<f64> {
        self.load()?.workload_growth_rate(node, workload)
    }

    fn workload_runtime(&self, workload: &str) -> MetricsResult<Option<WorkloadRuntime>> {
        self.load()?.workload_runtime(workload)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use rebalance_core::MetricsError;

    #[test]
    fn sees_rewrites_between_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, r#"{ "nodes": { "z1": { "free_percent": 40.0 } } }"#).unwrap();
        let source = SnapshotFileSource::new(&path);
        assert_eq!(source.node_free_percent("z1").unwrap(), 40.0);

        fs::write(&path, r#"{ "nodes": { "z1": { "free_percent": 12.5 } } }"#).unwrap();
        assert_eq!(source.node_free_percent("z1").unwrap(), 12.5);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = SnapshotFileSource::new(dir.path().join("does-not-exist.json"));
        assert!(matches!(source.all_nodes_free_percent(), Err(MetricsError::Io(_))));
    }
}
