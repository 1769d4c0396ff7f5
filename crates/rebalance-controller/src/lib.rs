//! rebalance-controller: one rebalancing decision per tick.
//!
//! The controller asks criticality which nodes need relief, asks selection
//! which workloads to move off each, lets criticality pick a destination
//! that stays healthy, and admits what was accepted. The returned batch is
//! what the executor runs; nothing here touches the cluster.

pub mod controller;
pub mod error;

pub use controller::Controller;
pub use error::{ControllerError, ControllerResult, NodeFull};
