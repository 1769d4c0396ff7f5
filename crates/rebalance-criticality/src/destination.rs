//! Destination validation shared by every criticality policy.
//!
//! The destination is the node (other than the source) with the highest free
//! percent. Commands are walked in the order given and accepted greedily
//! while the destination's projected free percent stays at or above
//! `threshold + margin`; a command that does not fit is skipped and later,
//! smaller ones are still tried against the reduced headroom.

use tracing::{debug, info};

use rebalance_core::{Cluster, NodeFreeMap, RelocationCommand};

/// Knobs for [`validate_commands`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DestinationRules {
    /// Percentage points of free memory a destination keeps above the threshold.
    pub margin_percent: f64,
    /// Keep only the largest accepted command.
    pub single_relocation: bool,
}

impl DestinationRules {
    pub const DEFAULT_MARGIN_PERCENT: f64 = 5.0;
}

impl Default for DestinationRules {
    fn default() -> Self {
        Self {
            margin_percent: Self::DEFAULT_MARGIN_PERCENT,
            single_relocation: false,
        }
    }
}

/// The node other than `source` with the most free memory.
///
/// Ties go to the first node in name order.
pub fn most_headroom<'a>(free: &'a NodeFreeMap, source: &str) -> Option<(&'a str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for (node, &percent) in free {
        if node == source {
            continue;
        }
        match best {
            Some((_, best_percent)) if percent <= best_percent => {}
            _ => best = Some((node.as_str(), percent)),
        }
    }
    best
}

/// Stamp a destination on every command that fits, in order.
///
/// Returns an empty list when there is no other node or nothing fits.
pub fn validate_commands(
    cluster: &Cluster,
    free: &NodeFreeMap,
    source: &str,
    threshold_percent: f64,
    rules: &DestinationRules,
    commands: Vec<RelocationCommand>,
) -> Vec<RelocationCommand> {
    let Some((destination, free_percent)) = most_headroom(free, source) else {
        info!(source, "no destination node available");
        return Vec::new();
    };

    let floor_percent = threshold_percent + rules.margin_percent;
    let mut free_gb = cluster.available_gb(free_percent);
    let mut accepted = Vec::with_capacity(commands.len());

    for mut cmd in commands {
        let projected_gb = free_gb - cmd.usage_gb;
        let projected_percent = cluster.usage_percent(projected_gb);
        if projected_percent < floor_percent {
            info!(
                workload = %cmd.workload,
                usage_gb = cmd.usage_gb,
                destination,
                projected_percent,
                floor_percent,
                "skipping relocation, destination would drop below its floor"
            );
            continue;
        }
        debug!(
            workload = %cmd.workload,
            usage_gb = cmd.usage_gb,
            destination,
            projected_percent,
            "relocation accepted"
        );
        cmd.destination_node = destination.to_string();
        free_gb = projected_gb;
        accepted.push(cmd);
    }

    if rules.single_relocation && accepted.len() > 1 {
        let (kept, dropped) = split_largest(accepted);
        let dropped: Vec<&str> = dropped.iter().map(|c| c.workload.as_str()).collect();
        debug!(
            source,
            destination,
            kept = ?kept.as_ref().map(|c| c.workload.as_str()),
            ?dropped,
            "single relocation per round, dropping smaller commands"
        );
        return kept.into_iter().collect();
    }

    if accepted.is_empty() {
        info!(source, destination, free_percent, "destination has no room for any candidate");
    }
    accepted
}

/// The largest command (first one on ties) and the rest in their original order.
fn split_largest(
    mut commands: Vec<RelocationCommand>,
) -> (Option<RelocationCommand>, Vec<RelocationCommand>) {
    let mut largest = None::<usize>;
    for (i, cmd) in commands.iter().enumerate() {
        match largest {
            Some(best) if cmd.usage_gb <= commands[best].usage_gb => {}
            _ => largest = Some(i),
        }
    }
    let kept = largest.map(|i| commands.remove(i));
    (kept, commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> Cluster {
        Cluster::new(3, 100.0).unwrap()
    }

    fn free(entries: &[(&str, f64)]) -> NodeFreeMap {
        entries.iter().map(|(n, p)| (n.to_string(), *p)).collect()
    }

    fn cmds(entries: &[(&str, f64)]) -> Vec<RelocationCommand> {
        entries
            .iter()
            .map(|(w, gb)| RelocationCommand::new(*w, *gb))
            .collect()
    }

    #[test]
    fn picks_node_with_most_headroom() {
        let nodes = free(&[("z1", 69.0), ("z2", 0.0), ("z3", 65.0)]);
        assert_eq!(most_headroom(&nodes, "z2"), Some(("z1", 69.0)));
        assert_eq!(most_headroom(&nodes, "z1"), Some(("z3", 65.0)));
    }

    #[test]
    fn ties_go_to_first_node() {
        let nodes = free(&[("a", 50.0), ("b", 50.0), ("c", 10.0)]);
        assert_eq!(most_headroom(&nodes, "c"), Some(("a", 50.0)));
    }

    #[test]
    fn no_destination_without_other_nodes() {
        let nodes = free(&[("only", 10.0)]);
        assert_eq!(most_headroom(&nodes, "only"), None);
        let accepted = validate_commands(
            &cluster(),
            &nodes,
            "only",
            10.0,
            &DestinationRules::default(),
            cmds(&[("w", 1.0)]),
        );
        assert!(accepted.is_empty());
    }

    #[test]
    fn skips_commands_that_do_not_fit_and_tries_the_rest() {
        let nodes = free(&[("z1", 69.0), ("z2", 0.0), ("z3", 65.0)]);
        let accepted = validate_commands(
            &cluster(),
            &nodes,
            "z2",
            10.0,
            &DestinationRules::default(),
            cmds(&[("w", 60.0), ("q", 40.0)]),
        );
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].workload, "q");
        assert_eq!(accepted[0].destination_node, "z1");
    }

    #[test]
    fn headroom_shrinks_with_each_accepted_command() {
        // 90 GB free, floor 35 % -> 55 GB may move.
        let nodes = free(&[("z1", 90.0), ("z2", 45.0)]);
        let accepted = validate_commands(
            &cluster(),
            &nodes,
            "z2",
            30.0,
            &DestinationRules::default(),
            cmds(&[("a", 30.0), ("b", 30.0), ("c", 25.0)]),
        );
        let ids: Vec<&str> = accepted.iter().map(|c| c.workload.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn landing_exactly_on_the_floor_is_accepted() {
        let nodes = free(&[("z1", 90.0), ("z2", 45.0)]);
        let accepted = validate_commands(
            &cluster(),
            &nodes,
            "z2",
            30.0,
            &DestinationRules::default(),
            cmds(&[("a", 20.0), ("b", 35.0)]),
        );
        assert_eq!(accepted.len(), 2);
    }

    #[test]
    fn split_largest_reports_what_is_dropped() {
        let (kept, dropped) = split_largest(cmds(&[("a", 10.0), ("b", 30.0), ("c", 30.0)]));
        assert_eq!(kept.map(|c| c.workload), Some("b".to_string()));
        let dropped: Vec<&str> = dropped.iter().map(|c| c.workload.as_str()).collect();
        assert_eq!(dropped, vec!["a", "c"]);

        let (kept, dropped) = split_largest(Vec::new());
        assert!(kept.is_none());
        assert!(dropped.is_empty());
    }

    #[test]
    fn single_relocation_keeps_largest() {
        let nodes = free(&[("z1", 90.0), ("z2", 45.0)]);
        let rules = DestinationRules {
            single_relocation: true,
            ..Default::default()
        };
        let accepted = validate_commands(
            &cluster(),
            &nodes,
            "z2",
            30.0,
            &rules,
            cmds(&[("a", 20.0), ("b", 35.0)]),
        );
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].workload, "b");
        assert_eq!(accepted[0].destination_node, "z1");
    }

    #[test]
    fn never_breaches_the_floor() {
        let cluster = cluster();
        let nodes = free(&[("z1", 72.5), ("z2", 3.0), ("z3", 40.0)]);
        let candidates = cmds(&[
            ("a", 12.3),
            ("b", 7.7),
            ("c", 30.1),
            ("d", 4.4),
            ("e", 19.9),
            ("f", 1.0),
        ]);
        for threshold in [0.0, 10.0, 20.0, 35.0, 60.0, 80.0] {
            let accepted = validate_commands(
                &cluster,
                &nodes,
                "z2",
                threshold,
                &DestinationRules::default(),
                candidates.clone(),
            );
            let moved: f64 = accepted.iter().map(|c| c.usage_gb).sum();
            let remaining = cluster.usage_percent(cluster.available_gb(72.5) - moved);
            assert!(
                remaining >= threshold + DestinationRules::DEFAULT_MARGIN_PERCENT - 1e-9,
                "threshold {threshold}: remaining {remaining}"
            );
        }
    }
}
