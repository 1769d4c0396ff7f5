//! Threshold criticality: act on nodes whose free memory is already low.

use std::sync::Arc;

use tracing::{debug, info};

use rebalance_core::{
    Cluster, MetricsResult, MetricsSource, NodeFreeCapacityRequest, RelocationCommand,
};

use crate::destination::{DestinationRules, validate_commands};

pub struct ThresholdPolicy {
    threshold_percent: f64,
    cluster: Cluster,
    source: Arc<dyn MetricsSource>,
    rules: DestinationRules,
}

impl ThresholdPolicy {
    pub fn new(threshold_percent: f64, cluster: Cluster, source: Arc<dyn MetricsSource>) -> Self {
        Self {
            threshold_percent,
            cluster,
            source,
            rules: DestinationRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: DestinationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold_percent
    }

    pub fn set_threshold(&mut self, percent: f64) {
        info!(from = self.threshold_percent, to = percent, "threshold changed");
        self.threshold_percent = percent;
    }

    /// One request per node whose free percent is strictly below threshold,
    /// for the GB that brings it back up to the threshold.
    pub fn free_capacity_requests(&self) -> MetricsResult<Vec<NodeFreeCapacityRequest>> {
        let free = self.source.all_nodes_free_percent()?;
        let mut requests = Vec::new();
        for (node, free_percent) in free {
            if free_percent >= self.threshold_percent {
                debug!(
                    node = %node,
                    free_percent,
                    threshold = self.threshold_percent,
                    "node healthy"
                );
                continue;
            }
            let amount_gb = self.cluster.shortfall_gb(self.threshold_percent, free_percent);
            info!(
                node = %node,
                free_percent,
                threshold = self.threshold_percent,
                amount_gb,
                "node below free-memory threshold"
            );
            requests.push(NodeFreeCapacityRequest::new(node, amount_gb));
        }
        Ok(requests)
    }

    pub fn validate(
        &self,
        source_node: &str,
        commands: Vec<RelocationCommand>,
    ) -> MetricsResult<Vec<RelocationCommand>> {
        let free = self.source.all_nodes_free_percent()?;
        Ok(validate_commands(
            &self.cluster,
            &free,
            source_node,
            self.threshold_percent,
            &self.rules,
            commands,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebalance_core::StaticMetrics;

    fn cluster() -> Cluster {
        Cluster::new(3, 100.0).unwrap()
    }

    fn policy(threshold: f64, metrics: StaticMetrics) -> ThresholdPolicy {
        ThresholdPolicy::new(threshold, cluster(), Arc::new(metrics))
    }

    #[test]
    fn requests_for_nodes_below_threshold() {
        let metrics = StaticMetrics::new(cluster())
            .with_free_percent("z1", 69.0)
            .with_free_percent("z2", 0.0)
            .with_free_percent("z3", 65.0);
        let requests = policy(20.0, metrics).free_capacity_requests().unwrap();
        assert_eq!(requests, vec![NodeFreeCapacityRequest::new("z2", 20.0)]);
    }

    #[test]
    fn node_exactly_at_threshold_is_healthy() {
        let metrics = StaticMetrics::new(cluster())
            .with_free_percent("z1", 20.0)
            .with_free_percent("z2", 19.5);
        let requests = policy(20.0, metrics).free_capacity_requests().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].node, "z2");
        assert!((requests[0].amount_gb - 0.5).abs() < 1e-9);
    }

    #[test]
    fn set_threshold_changes_criticality() {
        let metrics = StaticMetrics::new(cluster())
            .with_free_percent("z1", 50.0)
            .with_free_percent("z2", 25.0);
        let mut policy = policy(20.0, metrics);
        assert!(policy.free_capacity_requests().unwrap().is_empty());

        policy.set_threshold(30.0);
        assert_eq!(policy.threshold(), 30.0);
        let requests = policy.free_capacity_requests().unwrap();
        assert_eq!(requests, vec![NodeFreeCapacityRequest::new("z2", 5.0)]);
    }

    #[test]
    fn validate_uses_live_free_percent() {
        let metrics = StaticMetrics::new(cluster())
            .with_free_percent("z1", 69.0)
            .with_free_percent("z2", 0.0)
            .with_free_percent("z3", 65.0);
        let policy = policy(10.0, metrics);
        let accepted = policy
            .validate(
                "z2",
                vec![RelocationCommand::new("w", 60.0), RelocationCommand::new("q", 40.0)],
            )
            .unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].workload, "q");
        assert_eq!(accepted[0].destination_node, "z1");
    }

    #[test]
    fn metrics_failure_propagates() {
        let metrics = StaticMetrics::new(cluster()).with_free_percent("z1", 10.0);
        metrics.set_unavailable(Some("backend down"));
        assert!(policy(20.0, metrics).free_capacity_requests().is_err());
    }
}
