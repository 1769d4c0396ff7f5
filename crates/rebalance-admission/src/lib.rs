//! rebalance-admission: decides when relocations may start.
//!
//! The cluster's checkpoint/restore mechanism moves one workload at a time,
//! so every admitted relocation is queued behind the previous one on a single
//! shared completion horizon:
//!
//! ```text
//! effective_start = max(latest_finish, now)
//! finish_at       = effective_start + ceil(3.3506 s/GB * size_gb)
//! latest_finish   = finish_at
//! ```
//!
//! In cooldown mode no new round starts until `latest_finish + backoff`,
//! which keeps the controller from acting on metrics that do not yet reflect
//! the previous round.

pub mod tracker;

pub use tracker::{
    AdmissionRecord, AdmissionTracker, Gate, SECS_PER_GB, Throttle, WorkloadPhase,
    relocation_duration,
};
