//! rebalance.toml configuration parser.
//!
//! Every field has a default, so an empty file is a valid configuration for a
//! two-node, 450 GB cluster with threshold criticality and knapsack selection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalanceConfig {
    pub cluster: ClusterConfig,
    pub criticality: CriticalityConfig,
    pub selection: SelectionConfig,
    pub admission: AdmissionConfig,
    pub controller: ControllerConfig,
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub node_count: u32,
    pub node_capacity_gb: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_count: 2,
            node_capacity_gb: 450.0,
        }
    }
}

/// Which nodes count as critical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CriticalityKind {
    /// Current free memory below threshold.
    #[default]
    Threshold,
    /// Free memory predicted from workload growth below threshold.
    Slope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticalityConfig {
    pub strategy: CriticalityKind,
    pub threshold_free_percent: f64,
    /// Look-ahead window of the slope strategy.
    pub prediction_minutes: f64,
    /// Headroom above the threshold a destination must keep after accepting.
    pub destination_margin_percent: f64,
    /// Collapse each validated batch to its single largest relocation.
    pub single_relocation: bool,
}

impl Default for CriticalityConfig {
    fn default() -> Self {
        Self {
            strategy: CriticalityKind::Threshold,
            threshold_free_percent: 30.0,
            prediction_minutes: 5.0,
            destination_margin_percent: 5.0,
            single_relocation: false,
        }
    }
}

/// Which workloads to move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionKind {
    #[default]
    Optimal,
    Max,
    BigEnough,
    Slope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub strategy: SelectionKind,
    /// Workloads at or below this size are never relocated by the optimizer.
    pub min_workload_gb: f64,
    pub look_ahead_minutes: f64,
    /// Hide workloads that are about to finish on their own.
    pub filter_finishing: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            strategy: SelectionKind::Optimal,
            min_workload_gb: 5.0,
            look_ahead_minutes: 5.0,
            filter_finishing: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdmissionMode {
    /// No new round until the last relocation finished plus the backoff.
    #[default]
    Cooldown,
    /// Always ready; relocations only serialize their finish times.
    Unthrottled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    pub mode: AdmissionMode,
    pub backoff_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            mode: AdmissionMode::Cooldown,
            backoff_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Requests below this many GB are treated as noise.
    pub min_request_gb: f64,
    pub poll_interval_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            min_request_gb: 7.0,
            poll_interval_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub script_dir: PathBuf,
    pub script: String,
    pub namespace: String,
    pub kubeconfig: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            script_dir: PathBuf::from("/opt/rebalance"),
            script: "checkpoint.sh".to_string(),
            namespace: "default".to_string(),
            kubeconfig: None,
        }
    }
}

impl RebalanceConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RebalanceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Cross-field checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.node_count == 0 {
            return Err(ConfigError::Invalid("cluster.node_count must be at least 1".into()));
        }
        if !self.cluster.node_capacity_gb.is_finite() || self.cluster.node_capacity_gb <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "cluster.node_capacity_gb must be positive, got {}",
                self.cluster.node_capacity_gb
            )));
        }
        let threshold = self.criticality.threshold_free_percent;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "criticality.threshold_free_percent must be within 0..=100, got {threshold}"
            )));
        }
        if self.criticality.destination_margin_percent < 0.0 {
            return Err(ConfigError::Invalid(
                "criticality.destination_margin_percent must not be negative".into(),
            ));
        }
        if self.controller.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "controller.poll_interval_secs must be at least 1".into(),
            ));
        }
        // A just-admitted relocation must be visible in the metrics before the
        // next readiness check.
        if self.admission.mode == AdmissionMode::Cooldown
            && self.admission.backoff_secs < self.controller.poll_interval_secs
        {
            return Err(ConfigError::Invalid(format!(
                "admission.backoff_secs ({}) must be at least controller.poll_interval_secs ({})",
                self.admission.backoff_secs, self.controller.poll_interval_secs
            )));
        }
        Ok(())
    }
}
