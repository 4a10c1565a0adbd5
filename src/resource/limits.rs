//! Admission Ceilings
//!
//! Limits enforced by the resource coordinator. Every field has a
//! default so a settings file may override any subset.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Ceilings and timings for the resource coordinator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ResourceLimits {
    /// Size of the admitted-task worker pool
    pub max_threads: usize,
    /// Memory ceiling in megabytes
    pub max_memory_mb: u64,
    /// Permits per named resource
    pub lock_permits: usize,
    /// Bounded wait for a named resource, in milliseconds
    pub lock_wait_ms: u64,
    /// Utilization ratio above which the monitor warns
    pub high_water_ratio: f64,
    /// Utilization ratio above which `is_available` reports false
    pub availability_ratio: f64,
    /// Seconds between monitor ticks
    pub monitor_interval_secs: u64,
    /// Named resources registered up front
    pub resources: Vec<String>,
}

impl ResourceLimits {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs.max(1))
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_max_memory_mb(mut self, max_memory_mb: u64) -> Self {
        self.max_memory_mb = max_memory_mb;
        self
    }

    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait_ms = wait.as_millis() as u64;
        self
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_threads: 20,
            max_memory_mb: 512,
            lock_permits: 1,
            lock_wait_ms: 5_000,
            high_water_ratio: 0.8,
            availability_ratio: 0.9,
            monitor_interval_secs: 10,
            resources: ["wlan0", "wlan1", "wlp2s0", "eth0", "enp0s3"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}
