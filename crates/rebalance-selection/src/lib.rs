//! rebalance-selection: which workloads leave a critical node.
//!
//! # Strategies
//!
//! ```text
//!   optimal     0/1 knapsack, weight ⌊usage⌋, value usage × 0.5^relocations
//!   max         the largest workload; error if it does not cover the request
//!   big-enough  the smallest workload that covers the request
//!   slope       fastest growers until growth over the look-ahead fits
//! ```
//!
//! Strategies only see what the [`Selector`] lets through: nothing while the
//! admission gate is cooling down, and never a workload still in flight.

pub mod error;
pub mod knapsack;
pub mod queue;
pub mod selector;
pub mod strategy;

pub use error::{SelectionError, SelectionResult};
pub use queue::{RateEntry, RateQueue};
pub use selector::Selector;
pub use strategy::{Strategy, penalized_value};
