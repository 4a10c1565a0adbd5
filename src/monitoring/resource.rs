//! Process Resource Sampling
//!
//! Tracks the memory and CPU usage of the current process. The resource
//! coordinator reads memory through the [`MemoryProbe`] trait so admission
//! checks can be driven by a fixed value in tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sysinfo::{get_current_pid, Pid, ProcessRefreshKind, System};

/// Source of the approximate memory usage used for admission control.
pub trait MemoryProbe: Send + Sync {
    /// Current memory usage in megabytes.
    fn used_memory_mb(&self) -> u64;

    /// Human-readable usage summary, if the probe keeps history.
    fn summary(&self) -> Option<String> {
        None
    }
}

/// A single resource usage sample.
#[derive(Debug, Clone)]
pub struct ResourceSample {
    /// When this sample was taken
    pub timestamp: Instant,
    /// CPU usage percentage (0-100+)
    pub cpu_usage: f32,
    /// Memory usage in megabytes
    pub memory_mb: u64,
}

/// Default number of samples kept before the oldest are dropped.
pub const DEFAULT_MAX_SAMPLES: usize = 240;

/// Samples resource usage of the current process.
///
/// Only the most recent `max_samples` readings are kept, so a monitor
/// shared for the life of the process stays bounded.
///
/// # Example
///
/// ```rust,no_run
/// use scenario_runner::monitoring::ProcessMonitor;
///
/// let mut monitor = ProcessMonitor::new();
/// let used = monitor.sample();
/// println!("{} MB", used);
/// println!("{}", monitor.get_summary());
/// ```
pub struct ProcessMonitor {
    system: System,
    process_id: Option<Pid>,
    samples: VecDeque<ResourceSample>,
    max_samples: usize,
    last_sample: Option<Instant>,
    min_interval: Duration,
}

impl ProcessMonitor {
    /// Creates a monitor for the current process.
    ///
    /// If the process id cannot be determined every reading is zero.
    pub fn new() -> Self {
        Self {
            system: System::new(),
            process_id: get_current_pid().ok(),
            samples: VecDeque::new(),
            max_samples: DEFAULT_MAX_SAMPLES,
            last_sample: None,
            min_interval: Duration::from_millis(250),
        }
    }

    /// Sets the minimum interval between recorded samples.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Sets how many samples are kept. At least one is always kept.
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples.max(1);
        self
    }

    /// Takes a sample and returns the current memory usage in MB.
    ///
    /// Calls closer together than `min_interval` return the last
    /// recorded reading instead of refreshing.
    pub fn sample(&mut self) -> u64 {
        let Some(pid) = self.process_id else {
            return 0;
        };
        let now = Instant::now();

        if let (Some(last), Some(previous)) = (self.last_sample, self.samples.back()) {
            if now.duration_since(last) < self.min_interval {
                return previous.memory_mb;
            }
        }

        let refresh_kind = ProcessRefreshKind::new().with_cpu().with_memory();
        self.system.refresh_process_specifics(pid, refresh_kind);
        self.last_sample = Some(now);

        match self.system.process(pid) {
            Some(process) => {
                let memory_mb = process.memory() / (1024 * 1024);
                while self.samples.len() >= self.max_samples {
                    self.samples.pop_front();
                }
                self.samples.push_back(ResourceSample {
                    timestamp: now,
                    cpu_usage: process.cpu_usage(),
                    memory_mb,
                });
                memory_mb
            }
            None => 0,
        }
    }

    /// Returns a human-readable summary of resource usage.
    pub fn get_summary(&self) -> String {
        if self.samples.is_empty() {
            return "No resource data collected".to_string();
        }

        let min_memory = self.samples.iter().map(|s| s.memory_mb).min().unwrap_or(0);

        format!(
            "Resource Usage:\n  Average CPU: {:.1}%\n  Peak Memory: {} MB\n  Min Memory: {} MB\n  Samples: {}",
            self.average_cpu(),
            self.peak_memory_mb(),
            min_memory,
            self.samples.len()
        )
    }

    /// Returns the retained samples, oldest first.
    pub fn get_samples(&self) -> &VecDeque<ResourceSample> {
        &self.samples
    }

    /// Returns the peak memory usage in MB.
    pub fn peak_memory_mb(&self) -> u64 {
        self.samples.iter().map(|s| s.memory_mb).max().unwrap_or(0)
    }

    /// Returns the average CPU usage.
    pub fn average_cpu(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.cpu_usage).sum::<f32>() / self.samples.len() as f32
    }
}

impl Default for ProcessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// [`MemoryProbe`] backed by a shared [`ProcessMonitor`].
#[derive(Default)]
pub struct ProcessMemoryProbe {
    monitor: Mutex<ProcessMonitor>,
}

impl ProcessMemoryProbe {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn used_memory_mb(&self) -> u64 {
        let mut monitor = self.monitor.lock().unwrap_or_else(|e| e.into_inner());
        monitor.sample()
    }

    fn summary(&self) -> Option<String> {
        let monitor = self.monitor.lock().unwrap_or_else(|e| e.into_inner());
        Some(monitor.get_summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_monitor_creation() {
        let monitor = ProcessMonitor::new();
        assert!(monitor.samples.is_empty());
        assert!(monitor.process_id.is_some());
    }

    #[test]
    fn test_sampling_records_history() {
        let mut monitor = ProcessMonitor::new();
        let used = monitor.sample();

        assert_eq!(monitor.get_samples().len(), 1);
        assert_eq!(monitor.peak_memory_mb(), used);
    }

    #[test]
    fn test_monitor_with_min_interval() {
        let mut monitor = ProcessMonitor::new().with_min_interval(Duration::from_millis(200));

        let first = monitor.sample();
        // Within the interval the previous reading is reused
        assert_eq!(monitor.sample(), first);
        assert_eq!(monitor.get_samples().len(), 1);

        thread::sleep(Duration::from_millis(250));
        monitor.sample();
        assert_eq!(monitor.get_samples().len(), 2);
    }

    #[test]
    fn test_history_is_capped() {
        let mut monitor = ProcessMonitor::new()
            .with_min_interval(Duration::ZERO)
            .with_max_samples(3);

        for _ in 0..10 {
            monitor.sample();
            thread::sleep(Duration::from_millis(2));
        }

        let samples = monitor.get_samples();
        assert_eq!(samples.len(), 3);
        assert!(samples[0].timestamp < samples[2].timestamp);
        assert!(monitor.get_summary().contains("Samples: 3"));
    }

    #[test]
    fn test_admission_reads_keep_history_bounded() {
        let memory = ProcessMemoryProbe {
            monitor: Mutex::new(
                ProcessMonitor::new()
                    .with_min_interval(Duration::ZERO)
                    .with_max_samples(5),
            ),
        };
        for _ in 0..50 {
            memory.used_memory_mb();
        }
        assert!(memory.summary().unwrap().contains("Samples: 5"));
    }

    #[test]
    fn test_monitor_average_cpu() {
        let mut monitor = ProcessMonitor::new();
        assert_eq!(monitor.average_cpu(), 0.0);

        monitor.sample();
        assert!(monitor.average_cpu() >= 0.0);
    }

    #[test]
    fn test_monitor_summary_format() {
        let mut monitor = ProcessMonitor::new();
        monitor.sample();

        let summary = monitor.get_summary();
        assert!(summary.contains("Resource Usage"));
        assert!(summary.contains("Peak Memory"));
        assert!(summary.contains("Samples: 1"));
    }

    #[test]
    fn test_monitor_summary_empty() {
        let monitor = ProcessMonitor::default();
        assert!(monitor.get_summary().contains("No resource data collected"));
        assert_eq!(monitor.peak_memory_mb(), 0);
    }

    #[test]
    fn test_process_probe() {
        let probe = ProcessMemoryProbe::new();
        let _ = probe.used_memory_mb();
        let summary = probe.summary().unwrap();
        assert!(summary.contains("Samples"));
    }
}
