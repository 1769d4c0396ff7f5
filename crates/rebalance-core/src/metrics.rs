//! Metrics collaborator.
//!
//! The engine never stores metrics between ticks; every decision pulls a fresh
//! view through [`MetricsSource`]. Failures are surfaced as [`MetricsError`]
//! and abort the current tick.

use std::sync::{Arc, RwLock, RwLockReadGuard};

use thiserror::Error;
use tracing::debug;

use crate::cluster::Cluster;
use crate::snapshot::{ClusterSnapshot, NodeSnapshot, WorkloadRuntime, WorkloadSnapshot};
use crate::types::{NodeFreeMap, WorkloadMemoryMap};

pub type MetricsResult<T> = Result<T, MetricsError>;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics backend unavailable: {0}")]
    Unavailable(String),

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("unknown workload {workload} on node {node}")]
    UnknownWorkload { node: String, workload: String },

    #[error("failed to read metrics: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse metrics: {0}")]
    Parse(String),
}

/// Source of per-node and per-workload memory figures.
pub trait MetricsSource: Send + Sync {
    /// Memory usage (GB) of every workload resident on `node`.
    fn workload_memories(&self, node: &str) -> MetricsResult<WorkloadMemoryMap>;

    /// Free memory of `node`, in percent of its capacity.
    fn node_free_percent(&self, node: &str) -> MetricsResult<f64>;

    /// Free memory percent of every node.
    fn all_nodes_free_percent(&self) -> MetricsResult<NodeFreeMap>;

    /// Memory growth rate of `workload` on `node`, in GB per minute.
    fn workload_growth_rate(&self, node: &str, workload: &str) -> MetricsResult<f64>;

    /// Runtime progress of a batch workload, when the backend knows it.
    fn workload_runtime(&self, _workload: &str) -> MetricsResult<Option<WorkloadRuntime>> {
        Ok(None)
    }
}

impl<T: MetricsSource + ?Sized> MetricsSource for Arc<T> {
    fn workload_memories(&self, node: &str) -> MetricsResult<WorkloadMemoryMap> {
        (**self).workload_memories(node)
    }

    fn node_free_percent(&self, node: &str) -> MetricsResult<f64> {
        (**self).node_free_percent(node)
    }

    fn all_nodes_free_percent(&self) -> MetricsResult<NodeFreeMap> {
        (**self).all_nodes_free_percent()
    }

    fn workload_growth_rate(&self, node: &str, workload: &str) -> MetricsResult<f64> {
        (**self).workload_growth_rate(node, workload)
    }

    fn workload_runtime(&self, workload: &str) -> MetricsResult<Option<WorkloadRuntime>> {
        (**self).workload_runtime(workload)
    }
}

/// In-memory metrics source.
///
/// Built like a fixture, but can also be mutated through a shared reference
/// so that a test can change the cluster between controller ticks.
pub struct StaticMetrics {
    cluster: Cluster,
    snapshot: RwLock<ClusterSnapshot>,
    unavailable: RwLock<Option<String>>,
}

impl StaticMetrics {
    pub fn new(cluster: Cluster) -> Self {
        Self::from_snapshot(cluster, ClusterSnapshot::default())
    }

    pub fn from_snapshot(cluster: Cluster, snapshot: ClusterSnapshot) -> Self {
        Self {
            cluster,
            snapshot: RwLock::new(snapshot),
            unavailable: RwLock::new(None),
        }
    }

    /// Add a node hosting `workloads`; its free percent is derived from the
    /// summed usage against the node capacity.
    pub fn with_node<'a>(
        mut self,
        node: &str,
        workloads: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Self {
        let workloads: std::collections::BTreeMap<String, WorkloadSnapshot> = workloads
            .into_iter()
            .map(|(id, gb)| (id.to_string(), WorkloadSnapshot::with_usage_gb(gb)))
            .collect();
        let used: f64 = workloads.values().map(WorkloadSnapshot::usage_gb).sum();
        let free_percent = self
            .cluster
            .usage_percent(self.cluster.node_capacity_gb() - used);
        self.snapshot_mut().nodes.insert(
            node.to_string(),
            NodeSnapshot {
                free_percent,
                workloads,
            },
        );
        self
    }

    pub fn with_free_percent(mut self, node: &str, free_percent: f64) -> Self {
        self.snapshot_mut()
            .nodes
            .entry(node.to_string())
            .or_default()
            .free_percent = free_percent;
        self
    }

    pub fn with_growth_rate(mut self, node: &str, workload: &str, gb_per_min: f64) -> Self {
        self.workload_mut(node, workload).growth_gb_per_min = gb_per_min;
        self
    }

    pub fn with_runtime(mut self, node: &str, workload: &str, runtime: WorkloadRuntime) -> Self {
        self.workload_mut(node, workload).runtime = Some(runtime);
        self
    }

    pub fn set_free_percent(&self, node: &str, free_percent: f64) {
        let mut snap = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        snap.nodes.entry(node.to_string()).or_default().free_percent = free_percent;
    }

    pub fn set_growth_rate(&self, node: &str, workload: &str, gb_per_min: f64) {
        let mut snap = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        snap.nodes
            .entry(node.to_string())
            .or_default()
            .workloads
            .entry(workload.to_string())
            .or_default()
            .growth_gb_per_min = gb_per_min;
    }

    pub fn set_workload(&self, node: &str, workload: &str, usage_gb: f64) {
        let mut snap = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        snap.nodes
            .entry(node.to_string())
            .or_default()
            .workloads
            .entry(workload.to_string())
            .or_default()
            .usage_gb = Some(usage_gb);
    }

    pub fn remove_workload(&self, node: &str, workload: &str) {
        let mut snap = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        if let Some(n) = snap.nodes.get_mut(node) {
            n.workloads.remove(workload);
        }
    }

    /// Make every call fail with [`MetricsError::Unavailable`] until cleared.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        *self.unavailable.write().unwrap_or_else(|e| e.into_inner()) = reason.map(String::from);
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        self.read().map(|s| s.clone()).unwrap_or_default()
    }

    fn snapshot_mut(&mut self) -> &mut ClusterSnapshot {
        self.snapshot.get_mut().unwrap_or_else(|e| e.into_inner())
    }

    fn workload_mut(&mut self, node: &str, workload: &str) -> &mut WorkloadSnapshot {
        self.snapshot_mut()
            .nodes
            .entry(node.to_string())
            .or_default()
            .workloads
            .entry(workload.to_string())
            .or_default()
    }

    fn read(&self) -> MetricsResult<RwLockReadGuard<'_, ClusterSnapshot>> {
        if let Some(reason) = self
            .unavailable
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            return Err(MetricsError::Unavailable(reason.clone()));
        }
        Ok(self.snapshot.read().unwrap_or_else(|e| e.into_inner()))
    }
}

impl MetricsSource for StaticMetrics {
    fn workload_memories(&self, node: &str) -> MetricsResult<WorkloadMemoryMap> {
        self.read()?.workload_memories(node)
    }

    fn node_free_percent(&self, node: &str) -> MetricsResult<f64> {
        self.read()?.node_free_percent(node)
    }

    fn all_nodes_free_percent(&self) -> MetricsResult<NodeFreeMap> {
        self.read()?.all_nodes_free_percent()
    }

    fn workload_growth_rate(&self, node: &str, workload: &str) -> MetricsResult<f64> {
        self.read()?.workload_growth_rate(node, workload)
    }

    fn workload_runtime(&self, workload: &str) -> MetricsResult<Option<WorkloadRuntime>> {
        self.read()?.workload_runtime(workload)
    }
}

/// Hides workloads that are about to finish on their own: more than
/// 95 % through their expected runtime, or under three minutes left.
/// Workloads without runtime information pass through.
pub struct RuntimeFilteredSource<S> {
    inner: S,
    max_percent_complete: f64,
    min_remaining_secs: u64,
}

impl<S: MetricsSource> RuntimeFilteredSource<S> {
    pub const DEFAULT_MAX_PERCENT_COMPLETE: f64 = 95.0;
    pub const DEFAULT_MIN_REMAINING_SECS: u64 = 180;

    pub fn new(inner: S) -> Self {
        Self {
            inner,
            max_percent_complete: Self::DEFAULT_MAX_PERCENT_COMPLETE,
            min_remaining_secs: Self::DEFAULT_MIN_REMAINING_SECS,
        }
    }

    fn is_worth_moving(&self, workload: &str, runtime: &WorkloadRuntime) -> bool {
        let percent = runtime.percent_complete();
        if percent > self.max_percent_complete {
            debug!(workload, percent, "workload nearly complete, not a relocation candidate");
            return false;
        }
        let remaining = runtime.remaining_secs();
        if remaining < self.min_remaining_secs {
            debug!(workload, remaining, "workload finishes soon, not a relocation candidate");
            return false;
        }
        true
    }
}

impl<S: MetricsSource> MetricsSource for RuntimeFilteredSource<S> {
    fn workload_memories(&self, node: &str) -> MetricsResult<WorkloadMemoryMap> {
        let all = self.inner.workload_memories(node)?;
        let mut kept = WorkloadMemoryMap::new();
        for (workload, usage) in all {
            if let Some(runtime) = self.inner.workload_runtime(&workload)?
                && !self.is_worth_moving(&workload, &runtime)
            {
                continue;
            }
            kept.insert(workload, usage);
        }
        Ok(kept)
    }

    fn node_free_percent(&self, node: &str) -> MetricsResult<f64> {
        self.inner.node_free_percent(node)
    }

    fn all_nodes_free_percent(&self) -> MetricsResult<NodeFreeMap> {
        self.inner.all_nodes_free_percent()
    }

    fn workload_growth_rate(&self, node: &str, workload: &str) -> MetricsResult<f64> {
        self.inner.workload_growth_rate(node, workload)
    }

    fn workload_runtime(&self, workload: &str) -> MetricsResult<Option<WorkloadRuntime>> {
        self.inner.workload_runtime(workload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> Cluster {
        Cluster::new(2, 100.0).unwrap()
    }

    #[test]
    fn free_percent_derived_from_usage() {
        let metrics = StaticMetrics::new(cluster())
            .with_node("z1", [("a", 30.0), ("b", 20.0)])
            .with_node("z2", [("c", 10.0)]);

        let free = metrics.all_nodes_free_percent().unwrap();
        assert_eq!(free["z1"], 50.0);
        assert_eq!(free["z2"], 90.0);
        assert_eq!(metrics.workload_memories("z1").unwrap().len(), 2);
    }

    #[test]
    fn mutation_through_shared_reference() {
        let metrics = Arc::new(StaticMetrics::new(cluster()).with_node("z1", [("a", 30.0)]));
        metrics.set_workload("z1", "b", 5.0);
        metrics.set_growth_rate("z1", "b", 1.5);
        metrics.remove_workload("z1", "a");

        let mems = metrics.workload_memories("z1").unwrap();
        assert_eq!(mems.len(), 1);
        assert_eq!(mems["b"], 5.0);
        assert_eq!(metrics.workload_growth_rate("z1", "b").unwrap(), 1.5);
    }

    #[test]
    fn unavailable_fails_every_call() {
        let metrics = StaticMetrics::new(cluster()).with_node("z1", [("a", 30.0)]);
        metrics.set_unavailable(Some("backend down"));
        assert!(matches!(
            metrics.all_nodes_free_percent(),
            Err(MetricsError::Unavailable(r)) if r == "backend down"
        ));
        metrics.set_unavailable(None);
        assert!(metrics.all_nodes_free_percent().is_ok());
    }

    fn runtime(elapsed_secs: u64, expected_secs: u64) -> WorkloadRuntime {
        WorkloadRuntime {
            elapsed_secs,
            expected_secs,
        }
    }

    #[test]
    fn runtime_filter_hides_finishing_workloads() {
        let metrics = StaticMetrics::new(cluster())
            .with_node(
                "z1",
                [("almost", 10.0), ("short", 10.0), ("long", 10.0), ("unknown", 10.0)],
            )
            .with_runtime("z1", "almost", runtime(9_600, 10_000))
            .with_runtime("z1", "short", runtime(100, 200))
            .with_runtime("z1", "long", runtime(100, 10_000));

        let filtered = RuntimeFilteredSource::new(metrics);
        let mems = filtered.workload_memories("z1").unwrap();

        let ids: Vec<&str> = mems.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["long", "unknown"]);
        // Node-level figures are untouched.
        assert_eq!(filtered.node_free_percent("z1").unwrap(), 60.0);
    }
}
