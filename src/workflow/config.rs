//! Per-Run Configuration
//!
//! Settings that apply to a single scenario run.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::Parameters;

/// Default thread budget handed to tools.
pub const DEFAULT_MAX_THREADS: usize = 10;

/// Default per-step timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration for one scenario run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Thread budget passed to each tool invocation
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,

    /// Upper bound for a single step invocation
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Escalate every step failure as if the step were critical
    #[serde(default)]
    pub stop_on_failure: bool,

    /// Defaults merged beneath each step's declared parameters
    #[serde(default)]
    pub parameters: Parameters,
}

fn default_max_threads() -> usize {
    DEFAULT_MAX_THREADS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl WorkflowConfig {
    pub fn new() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            stop_on_failure: false,
            parameters: Parameters::new(),
        }
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Per-step timeout as a `Duration`.
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Thread budget for tools, capped at the host's CPU count.
    pub fn effective_threads(&self) -> usize {
        self.max_threads.min(num_cpus::get()).max(1)
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.max_threads, 10);
        assert_eq!(config.timeout_secs, 300);
        assert!(!config.stop_on_failure);
        assert!(config.parameters.is_empty());
    }

    #[test]
    fn test_config_builders() {
        let config = WorkflowConfig::new()
            .with_max_threads(2)
            .with_timeout_secs(5)
            .with_stop_on_failure(true)
            .with_parameter("interface", "wlan1");

        assert_eq!(config.step_timeout(), Duration::from_secs(5));
        assert!(config.stop_on_failure);
        assert_eq!(config.parameters.len(), 1);
    }

    #[test]
    fn test_effective_threads_capped() {
        let config = WorkflowConfig::new().with_max_threads(100_000);
        assert!(config.effective_threads() <= num_cpus::get());

        let single = WorkflowConfig::new().with_max_threads(1);
        assert_eq!(single.effective_threads(), 1);
    }

    #[test]
    fn test_config_yaml_partial() {
        let config: WorkflowConfig = serde_yaml::from_str("stop_on_failure: true").unwrap();
        assert!(config.stop_on_failure);
        assert_eq!(config.max_threads, DEFAULT_MAX_THREADS);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }
}
