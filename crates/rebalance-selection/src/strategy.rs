//! Selection strategies.
//!
//! Each strategy sees the candidate pool the [`Selector`](crate::Selector)
//! has already filtered (in-flight and empty workloads removed) and answers
//! one [`NodeFreeCapacityRequest`].

use tracing::{debug, info};

use rebalance_admission::AdmissionTracker;
use rebalance_core::config::{SelectionConfig, SelectionKind};
use rebalance_core::{
    Cluster, MetricsSource, NodeFreeCapacityRequest, RelocationCommand, WorkloadMemoryMap,
};

use crate::error::{SelectionError, SelectionResult};
use crate::knapsack::{self, Item};
use crate::queue::RateQueue;

/// How candidates are chosen, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// Knapsack over integer GB, penalizing workloads relocated before.
    Optimal { min_workload_gb: f64 },
    /// The single largest workload.
    Max,
    /// The smallest single workload that covers the request.
    BigEnough,
    /// Fastest-growing workloads until predicted growth fits the node.
    Slope { look_ahead_minutes: f64 },
}

impl Strategy {
    pub const DEFAULT_MIN_WORKLOAD_GB: f64 = 5.0;

    pub fn from_config(config: &SelectionConfig) -> Self {
        match config.strategy {
            SelectionKind::Optimal => Self::Optimal {
                min_workload_gb: config.min_workload_gb,
            },
            SelectionKind::Max => Self::Max,
            SelectionKind::BigEnough => Self::BigEnough,
            SelectionKind::Slope => Self::Slope {
                look_ahead_minutes: config.look_ahead_minutes,
            },
        }
    }

    pub fn optimal() -> Self {
        Self::Optimal {
            min_workload_gb: Self::DEFAULT_MIN_WORKLOAD_GB,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Optimal { .. } => "optimal",
            Self::Max => "max",
            Self::BigEnough => "big-enough",
            Self::Slope { .. } => "slope",
        }
    }
}

/// Value of relocating a workload: its size, halved for every earlier
/// relocation.
pub fn penalized_value(usage_gb: f64, relocations: u32) -> f64 {
    usage_gb * 0.5_f64.powf(f64::from(relocations))
}

pub fn optimal(
    request: &NodeFreeCapacityRequest,
    candidates: &WorkloadMemoryMap,
    min_workload_gb: f64,
    tracker: &AdmissionTracker,
) -> SelectionResult<Vec<RelocationCommand>> {
    if !request.amount_gb.is_finite() {
        return Err(SelectionError::UnboundedRequest {
            node: request.node.clone(),
            amount_gb: request.amount_gb,
        });
    }

    let mut names = Vec::with_capacity(candidates.len());
    let mut items = Vec::with_capacity(candidates.len());
    for (workload, &usage_gb) in candidates {
        if usage_gb <= min_workload_gb {
            continue;
        }
        let relocations = tracker.relocation_count(workload);
        names.push(workload.as_str());
        items.push(Item {
            weight: usage_gb.floor() as usize,
            value: penalized_value(usage_gb, relocations),
        });
    }

    let capacity = if request.amount_gb > 0.0 {
        request.amount_gb.floor() as usize
    } else {
        0
    };
    let solution = knapsack::solve(capacity, &items);
    if solution.is_empty() {
        return Err(SelectionError::NoFit {
            node: request.node.clone(),
            capacity_gb: capacity,
        });
    }

    let mut commands: Vec<RelocationCommand> = solution
        .chosen
        .iter()
        .map(|&i| RelocationCommand::new(names[i], candidates[names[i]]))
        .collect();
    commands.sort_by(|a, b| b.usage_gb.total_cmp(&a.usage_gb));

    debug!(
        node = %request.node,
        capacity_gb = capacity,
        chosen_weight = solution.weight,
        value = solution.value,
        count = commands.len(),
        "knapsack selection"
    );
    Ok(commands)
}

pub fn max(
    request: &NodeFreeCapacityRequest,
    candidates: &WorkloadMemoryMap,
) -> SelectionResult<Vec<RelocationCommand>> {
    let mut largest: Option<(&str, f64)> = None;
    for (workload, &usage_gb) in candidates {
        match largest {
            Some((_, best)) if usage_gb <= best => {}
            _ => largest = Some((workload.as_str(), usage_gb)),
        }
    }
    let Some((workload, usage_gb)) = largest else {
        return Err(SelectionError::NoCandidates(request.node.clone()));
    };
    if usage_gb < request.amount_gb {
        return Err(SelectionError::Insufficient {
            node: request.node.clone(),
            workload: workload.to_string(),
            usage_gb,
            amount_gb: request.amount_gb,
        });
    }
    Ok(vec![RelocationCommand::new(workload, usage_gb)])
}

pub fn big_enough(
    request: &NodeFreeCapacityRequest,
    candidates: &WorkloadMemoryMap,
) -> SelectionResult<Vec<RelocationCommand>> {
    if candidates.is_empty() {
        return Err(SelectionError::NoCandidates(request.node.clone()));
    }
    let mut smallest: Option<(&str, f64)> = None;
    for (workload, &usage_gb) in candidates {
        if usage_gb < request.amount_gb {
            continue;
        }
        match smallest {
            Some((_, best)) if usage_gb >= best => {}
            _ => smallest = Some((workload.as_str(), usage_gb)),
        }
    }
    smallest
        .map(|(workload, usage_gb)| vec![RelocationCommand::new(workload, usage_gb)])
        .ok_or_else(|| SelectionError::NoneBigEnough {
            node: request.node.clone(),
            amount_gb: request.amount_gb,
        })
}

/// Relocate the fastest-growing workloads until the growth predicted over
/// `look_ahead_minutes` fits in the node's current free memory.
///
/// Running out of growing workloads is not an error; whatever was selected
/// is returned.
pub fn slope(
    request: &NodeFreeCapacityRequest,
    candidates: &WorkloadMemoryMap,
    look_ahead_minutes: f64,
    cluster: &Cluster,
    source: &dyn MetricsSource,
) -> SelectionResult<Vec<RelocationCommand>> {
    let buffer_gb = cluster.available_gb(source.node_free_percent(&request.node)?);

    let mut queue = RateQueue::new();
    let mut predicted_gb = 0.0;
    for workload in candidates.keys() {
        let rate = source.workload_growth_rate(&request.node, workload)?;
        if rate > 0.0 {
            queue.push(workload.as_str(), rate);
            predicted_gb += rate * look_ahead_minutes;
        }
    }

    let initial_prediction = predicted_gb;
    let mut commands = Vec::new();
    while predicted_gb > buffer_gb {
        let Some(entry) = queue.pop() else {
            info!(
                node = %request.node,
                buffer_gb,
                predicted_gb = initial_prediction,
                "cannot fully relieve node by relocating every growing workload"
            );
            break;
        };
        predicted_gb -= entry.rate * look_ahead_minutes;
        debug!(
            node = %request.node,
            workload = %entry.workload,
            rate = entry.rate,
            "selected by growth rate"
        );
        let usage_gb = candidates.get(&entry.workload).copied().unwrap_or_default();
        commands.push(RelocationCommand::new(entry.workload, usage_gb));
    }

    if commands.is_empty() {
        debug!(
            node = %request.node,
            predicted_gb = initial_prediction,
            buffer_gb,
            "predicted growth fits in free memory"
        );
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use rebalance_core::{StaticMetrics, Timestamp};

    fn pool(entries: &[(&str, f64)]) -> WorkloadMemoryMap {
        entries.iter().map(|(w, gb)| (w.to_string(), *gb)).collect()
    }

    fn ids(commands: &[RelocationCommand]) -> Vec<&str> {
        commands.iter().map(|c| c.workload.as_str()).collect()
    }

    #[test]
    fn penalty_halves_per_relocation() {
        assert_eq!(penalized_value(32.0, 0), 32.0);
        assert_eq!(penalized_value(32.0, 1), 16.0);
        assert_eq!(penalized_value(32.0, 3), 4.0);
    }

    #[test]
    fn optimal_avoids_previously_relocated() {
        let mut tracker = AdmissionTracker::unthrottled();
        tracker.admit(Timestamp::from_secs(0), 33.0, "mr");

        let candidates = pool(&[("ow", 20.0), ("oq", 16.0), ("mr", 33.0), ("ot", 17.0)]);
        let request = NodeFreeCapacityRequest::new("z1", 50.0);
        let commands = optimal(&request, &candidates, 5.0, &tracker).unwrap();
        assert_eq!(ids(&commands), vec!["ow", "ot"]);
    }

    #[test]
    fn optimal_keeps_exact_usage_and_skips_small() {
        let tracker = AdmissionTracker::unthrottled();
        let candidates = pool(&[("tiny", 5.0), ("a", 12.7), ("b", 3.0)]);
        let request = NodeFreeCapacityRequest::new("z1", 20.4);
        let commands = optimal(&request, &candidates, 5.0, &tracker).unwrap();
        assert_eq!(ids(&commands), vec!["a"]);
        assert_eq!(commands[0].usage_gb, 12.7);
    }

    #[test]
    fn optimal_errors_when_everything_is_too_big() {
        let tracker = AdmissionTracker::unthrottled();
        let candidates = pool(&[("a", 40.0), ("b", 60.0)]);
        let request = NodeFreeCapacityRequest::new("z1", 20.0);
        assert!(matches!(
            optimal(&request, &candidates, 5.0, &tracker),
            Err(SelectionError::NoFit { capacity_gb: 20, .. })
        ));
    }

    #[test]
    fn optimal_rejects_unbounded_request() {
        let tracker = AdmissionTracker::unthrottled();
        let candidates = pool(&[("a", 20.0)]);
        for amount_gb in [f64::INFINITY, f64::NAN] {
            let request = NodeFreeCapacityRequest::new("z1", amount_gb);
            assert!(matches!(
                optimal(&request, &candidates, 5.0, &tracker),
                Err(SelectionError::UnboundedRequest { .. })
            ));
        }
    }

    #[test]
    fn optimal_takes_everything_for_a_huge_request() {
        let tracker = AdmissionTracker::unthrottled();
        let candidates = pool(&[("a", 20.0), ("b", 33.5), ("tiny", 2.0)]);
        let request = NodeFreeCapacityRequest::new("z1", 1e12);
        let commands = optimal(&request, &candidates, 5.0, &tracker).unwrap();
        assert_eq!(ids(&commands), vec!["b", "a"]);
    }

    #[test]
    fn max_returns_largest() {
        let candidates = pool(&[("a", 20.0), ("b", 30.0), ("c", 40.0)]);
        let commands = max(&NodeFreeCapacityRequest::new("z1", 35.0), &candidates).unwrap();
        assert_eq!(ids(&commands), vec!["c"]);
    }

    #[test]
    fn max_errors_when_largest_is_too_small() {
        let candidates = pool(&[("a", 20.0), ("b", 30.0)]);
        let err = max(&NodeFreeCapacityRequest::new("z1", 35.0), &candidates).unwrap_err();
        assert!(matches!(
            err,
            SelectionError::Insufficient { ref workload, .. } if workload == "b"
        ));
        assert!(matches!(
            max(&NodeFreeCapacityRequest::new("z1", 1.0), &pool(&[])),
            Err(SelectionError::NoCandidates(_))
        ));
    }

    #[test]
    fn big_enough_picks_smallest_cover() {
        let candidates = pool(&[("a", 20.0), ("b", 30.0), ("c", 40.0)]);
        let commands = big_enough(&NodeFreeCapacityRequest::new("z1", 26.0), &candidates).unwrap();
        assert_eq!(ids(&commands), vec!["b"]);
        assert_eq!(commands[0].usage_gb, 30.0);
    }

    #[test]
    fn big_enough_accepts_exact_match_and_errors_otherwise() {
        let candidates = pool(&[("a", 20.0), ("b", 30.0)]);
        let commands = big_enough(&NodeFreeCapacityRequest::new("z1", 30.0), &candidates).unwrap();
        assert_eq!(ids(&commands), vec!["b"]);
        assert!(matches!(
            big_enough(&NodeFreeCapacityRequest::new("z1", 31.0), &candidates),
            Err(SelectionError::NoneBigEnough { .. })
        ));
    }

    fn slope_source(free_percent: f64) -> StaticMetrics {
        let cluster = Cluster::new(2, 100.0).unwrap();
        StaticMetrics::new(cluster)
            .with_node("z1", [("w", 10.0), ("q", 10.0), ("z", 10.0), ("s", 10.0)])
            .with_free_percent("z1", free_percent)
            .with_growth_rate("z1", "w", 2.0)
            .with_growth_rate("z1", "q", 1.5)
            .with_growth_rate("z1", "z", 2.0)
            .with_growth_rate("z1", "s", -1.0)
    }

    fn run_slope(free_percent: f64) -> Vec<RelocationCommand> {
        let cluster = Cluster::new(2, 100.0).unwrap();
        let source = Arc::new(slope_source(free_percent));
        let candidates = source.workload_memories("z1").unwrap();
        slope(
            &NodeFreeCapacityRequest::new("z1", 1.0),
            &candidates,
            5.0,
            &cluster,
            &*source,
        )
        .unwrap()
    }

    #[test]
    fn slope_selects_by_descending_rate_until_within_buffer() {
        // 27.5 GB predicted against a 10 GB buffer.
        assert_eq!(ids(&run_slope(10.0)), vec!["w", "z"]);
        assert_eq!(ids(&run_slope(5.0)), vec!["w", "z", "q"]);
    }

    #[test]
    fn slope_returns_nothing_when_growth_fits() {
        assert!(run_slope(30.0).is_empty());
    }

    #[test]
    fn slope_exhausting_the_queue_is_not_an_error() {
        // Buffer below zero can never be met.
        let commands = run_slope(-5.0);
        assert_eq!(ids(&commands), vec!["w", "z", "q"]);
    }

    #[test]
    fn strategy_from_config() {
        let mut config = SelectionConfig::default();
        assert_eq!(Strategy::from_config(&config), Strategy::optimal());
        config.strategy = SelectionKind::Slope;
        config.look_ahead_minutes = 3.0;
        assert_eq!(
            Strategy::from_config(&config),
            Strategy::Slope {
                look_ahead_minutes: 3.0
            }
        );
        assert_eq!(Strategy::BigEnough.name(), "big-enough");
    }
}
