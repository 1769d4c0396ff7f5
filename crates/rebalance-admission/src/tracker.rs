//! Admission tracker: per-workload relocation records and the global gate.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use rebalance_core::Timestamp;
use rebalance_core::config::{AdmissionConfig, AdmissionMode};

/// Seconds the relocation mechanism needs per GB of workload memory.
pub const SECS_PER_GB: f64 = 3.3506;

/// Time to checkpoint and restore a workload of `size_gb`.
///
/// Rounded up to whole seconds; non-positive sizes take no time.
pub fn relocation_duration(size_gb: f64) -> Duration {
    if size_gb.is_nan() || size_gb <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs((SECS_PER_GB * size_gb).ceil() as u64)
}

/// How the tracker gates new rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    /// Always ready; admissions only serialize finish times.
    Unthrottled,
    /// Ready once the last relocation finished plus `backoff`.
    Cooldown { backoff: Duration },
}

/// What the tracker knows about one workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    /// When the relocation was admitted.
    pub started_at: Timestamp,
    /// When the shared pipe gets to this relocation.
    pub queued_until: Timestamp,
    pub finish_at: Timestamp,
    /// Admissions of this workload over the life of the tracker.
    pub relocations: u32,
}

/// Lifecycle of a single workload relative to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadPhase {
    /// Never admitted.
    Idle,
    /// Admitted, waiting for earlier relocations to drain.
    Pending,
    /// Being relocated.
    InFlight,
    /// Relocation finished.
    Settled,
}

/// Global admission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Ready,
    Cooling { until: Timestamp },
}

/// Tracks admitted relocations against one shared completion horizon.
///
/// All mutation goes through `&mut self`, so a tracker shared between
/// callers has to sit behind a lock.
#[derive(Debug, Clone)]
pub struct AdmissionTracker {
    throttle: Throttle,
    records: HashMap<String, AdmissionRecord>,
    latest_finish: Option<Timestamp>,
}

impl AdmissionTracker {
    pub fn new(throttle: Throttle) -> Self {
        Self {
            throttle,
            records: HashMap::new(),
            latest_finish: None,
        }
    }

    pub fn unthrottled() -> Self {
        Self::new(Throttle::Unthrottled)
    }

    pub fn cooling_down(backoff: Duration) -> Self {
        Self::new(Throttle::Cooldown { backoff })
    }

    pub fn from_config(config: &AdmissionConfig) -> Self {
        match config.mode {
            AdmissionMode::Unthrottled => Self::unthrottled(),
            AdmissionMode::Cooldown => {
                Self::cooling_down(Duration::from_secs(config.backoff_secs))
            }
        }
    }

    pub fn throttle(&self) -> Throttle {
        self.throttle
    }

    /// Register a relocation of `workload` and return its finish time.
    ///
    /// The relocation starts once every earlier admission has finished.
    /// A previous record for the same workload is replaced; its relocation
    /// count carries over.
    pub fn admit(&mut self, now: Timestamp, size_gb: f64, workload: &str) -> Timestamp {
        let queued_until = match self.latest_finish {
            Some(latest) if now.before(latest) => latest,
            _ => now,
        };
        let finish_at = queued_until.add(relocation_duration(size_gb));
        self.latest_finish = Some(finish_at);

        let relocations = self
            .records
            .get(workload)
            .map_or(0, |r| r.relocations)
            .saturating_add(1);
        self.records.insert(
            workload.to_string(),
            AdmissionRecord {
                started_at: now,
                queued_until,
                finish_at,
                relocations,
            },
        );

        debug!(
            workload,
            size_gb,
            started_at = %now,
            queued_until = %queued_until,
            finish_at = %finish_at,
            relocations,
            "relocation admitted"
        );
        finish_at
    }

    pub fn record(&self, workload: &str) -> Option<&AdmissionRecord> {
        self.records.get(workload)
    }

    pub fn finish_time_of(&self, workload: &str) -> Option<Timestamp> {
        self.records.get(workload).map(|r| r.finish_at)
    }

    /// How many times `workload` has been admitted.
    pub fn relocation_count(&self, workload: &str) -> u32 {
        self.records.get(workload).map_or(0, |r| r.relocations)
    }

    pub fn latest_finish(&self) -> Option<Timestamp> {
        self.latest_finish
    }

    /// Workloads whose relocation has not finished by `now`.
    pub fn in_flight(&self, now: Timestamp) -> BTreeSet<String> {
        self.records
            .iter()
            .filter(|(_, r)| now.before(r.finish_at))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn phase(&self, workload: &str, now: Timestamp) -> WorkloadPhase {
        match self.records.get(workload) {
            None => WorkloadPhase::Idle,
            Some(r) if now.before(r.queued_until) => WorkloadPhase::Pending,
            Some(r) if now.before(r.finish_at) => WorkloadPhase::InFlight,
            Some(_) => WorkloadPhase::Settled,
        }
    }

    pub fn gate(&self, current: Timestamp) -> Gate {
        match (self.throttle, self.latest_finish) {
            (Throttle::Unthrottled, _) | (_, None) => Gate::Ready,
            (Throttle::Cooldown { backoff }, Some(latest)) => {
                let until = latest.add(backoff);
                if until.before_or_equal(current) {
                    Gate::Ready
                } else {
                    Gate::Cooling { until }
                }
            }
        }
    }

    /// Whether a new relocation round may start at `current`.
    pub fn is_ready(&self, current: Timestamp) -> bool {
        self.gate(current) == Gate::Ready
    }
}
