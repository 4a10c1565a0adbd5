//! Resource Coordinator
//!
//! Admission control for tool invocations. Every admitted task passes
//! through the same gates in order:
//!
//! 1. Duplicate operation ids are rejected without waiting
//! 2. The named resource lock is acquired with a bounded wait
//! 3. Memory and worker-pool ceilings are checked
//! 4. The task runs on its own tokio task, holding every permit
//!
//! Permits and the operation id are released when the task ends, however
//! it ends, or when the caller stops waiting for it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::{DashMap, DashSet};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::limits::ResourceLimits;
use crate::error::{ResourceError, TaskPanicked};
use crate::monitoring::{MemoryProbe, ProcessMemoryProbe};

/// Point-in-time view of the coordinator.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ResourceSnapshot {
    pub active_threads: usize,
    pub max_threads: usize,
    pub memory_usage_mb: u64,
    pub max_memory_mb: u64,
    pub active_operations: usize,
    /// Named resources with at least one free permit
    pub available_resources: usize,
}

impl ResourceSnapshot {
    pub fn thread_usage_percent(&self) -> f64 {
        if self.max_threads == 0 {
            return 0.0;
        }
        self.active_threads as f64 / self.max_threads as f64 * 100.0
    }

    pub fn memory_usage_percent(&self) -> f64 {
        if self.max_memory_mb == 0 {
            return 0.0;
        }
        self.memory_usage_mb as f64 / self.max_memory_mb as f64 * 100.0
    }
}

/// Removes an operation id from the active set when dropped.
struct OperationGuard {
    operations: Arc<DashSet<String>>,
    id: String,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.operations.remove(&self.id);
        debug!("Released operation: {}", self.id);
    }
}

/// Aborts the admitted task if the caller stops waiting for it.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Gates access to the worker pool and to named exclusive resources.
///
/// # Example
///
/// ```rust,no_run
/// use scenario_runner::resource::{ResourceCoordinator, ResourceLimits};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let coordinator = ResourceCoordinator::new(ResourceLimits::default());
/// let answer = coordinator
///     .run_admitted("scan-1", Some("wlan0"), async { 42 })
///     .await??;
/// assert_eq!(answer, 42);
/// # Ok(())
/// # }
/// ```
pub struct ResourceCoordinator {
    limits: ResourceLimits,
    pool: Arc<Semaphore>,
    locks: DashMap<String, Arc<Semaphore>>,
    operations: Arc<DashSet<String>>,
    memory: Arc<dyn MemoryProbe>,
    monitor_running: AtomicBool,
    shutdown: CancellationToken,
}

impl ResourceCoordinator {
    /// Creates a coordinator that reads this process's memory usage.
    pub fn new(limits: ResourceLimits) -> Self {
        Self::with_probe(limits, Arc::new(ProcessMemoryProbe::new()))
    }

    /// Creates a coordinator with a custom memory probe.
    pub fn with_probe(limits: ResourceLimits, memory: Arc<dyn MemoryProbe>) -> Self {
        let locks = DashMap::new();
        for name in &limits.resources {
            locks.insert(name.clone(), Arc::new(Semaphore::new(limits.lock_permits.max(1))));
        }

        info!(
            "Resource coordinator ready: {} threads, {} MB, {} named resources",
            limits.max_threads,
            limits.max_memory_mb,
            locks.len()
        );

        Self {
            pool: Arc::new(Semaphore::new(limits.max_threads)),
            limits,
            locks,
            operations: Arc::new(DashSet::new()),
            memory,
            monitor_running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Runs `task` once it is admitted, returning its output.
    ///
    /// The outer error is an admission failure; the inner one means the
    /// admitted task panicked. Dropping the returned future aborts the
    /// admitted task and releases its permits.
    pub async fn run_admitted<Fut, T>(
        &self,
        operation_id: &str,
        resource: Option<&str>,
        task: Fut,
    ) -> Result<Result<T, TaskPanicked>, ResourceError>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(ResourceError::ShuttingDown);
        }

        if !self.operations.insert(operation_id.to_string()) {
            warn!("Rejected duplicate operation: {}", operation_id);
            return Err(ResourceError::DuplicateOperation(operation_id.to_string()));
        }
        let guard = OperationGuard {
            operations: Arc::clone(&self.operations),
            id: operation_id.to_string(),
        };

        let lock_permit = match resource {
            Some(name) => {
                let lock = self.lock_for(name);
                let wait = self.limits.lock_wait();
                match tokio::time::timeout(wait, lock.acquire_owned()).await {
                    Ok(Ok(permit)) => Some(permit),
                    Ok(Err(_)) => return Err(ResourceError::ShuttingDown),
                    Err(_) => {
                        warn!("Resource '{}' busy for operation {}", name, operation_id);
                        return Err(ResourceError::Busy {
                            resource: name.to_string(),
                            waited: wait,
                        });
                    }
                }
            }
            None => None,
        };

        let used_mb = self.memory.used_memory_mb();
        if used_mb > self.limits.max_memory_mb {
            warn!("Memory ceiling reached: {} MB", used_mb);
            return Err(ResourceError::MemoryExhausted {
                used_mb,
                max_mb: self.limits.max_memory_mb,
            });
        }

        let worker_permit = match Arc::clone(&self.pool).try_acquire_owned() {
            Ok(permit) => permit,
            Err(tokio::sync::TryAcquireError::Closed) => return Err(ResourceError::ShuttingDown),
            Err(tokio::sync::TryAcquireError::NoPermits) => {
                warn!("Worker pool saturated, rejecting {}", operation_id);
                return Err(ResourceError::ThreadsExhausted {
                    active: self.active_threads(),
                    max: self.limits.max_threads,
                });
            }
        };

        debug!(
            "Started operation: {} on resource: {}",
            operation_id,
            resource.unwrap_or("-")
        );

        let mut handle = AbortOnDrop(tokio::spawn(async move {
            let _held = (guard, lock_permit, worker_permit);
            task.await
        }));

        match (&mut handle.0).await {
            Ok(output) => Ok(Ok(output)),
            Err(e) => {
                warn!("Operation {} ended abnormally: {}", operation_id, e);
                Ok(Err(TaskPanicked {
                    operation: operation_id.to_string(),
                }))
            }
        }
    }

    /// Non-blocking guess at whether an admission would succeed now.
    ///
    /// Resources never seen before count as available; their lock is
    /// created on first use.
    pub fn is_available(&self, resource: Option<&str>) -> bool {
        let ratio = self.limits.availability_ratio;

        if self.memory.used_memory_mb() as f64 > self.limits.max_memory_mb as f64 * ratio {
            return false;
        }
        if self.active_threads() as f64 >= self.limits.max_threads as f64 * ratio {
            return false;
        }

        match resource {
            Some(name) => self
                .locks
                .get(name)
                .map_or(true, |lock| lock.available_permits() > 0),
            None => true,
        }
    }

    /// Removes an operation id from the active set.
    ///
    /// The task itself keeps running; only the duplicate guard is lifted.
    pub fn cancel_operation(&self, operation_id: &str) {
        if self.operations.remove(operation_id).is_some() {
            info!("Cancelled operation: {}", operation_id);
        }
    }

    pub fn status(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            active_threads: self.active_threads(),
            max_threads: self.limits.max_threads,
            memory_usage_mb: self.memory.used_memory_mb(),
            max_memory_mb: self.limits.max_memory_mb,
            active_operations: self.operations.len(),
            available_resources: self
                .locks
                .iter()
                .filter(|entry| entry.value().available_permits() > 0)
                .count(),
        }
    }

    /// Usage summary from the memory probe, if it keeps one.
    pub fn usage_summary(&self) -> Option<String> {
        self.memory.summary()
    }

    /// Warnings for utilization above the high-water mark.
    pub fn utilization_warnings(&self) -> Vec<String> {
        let snapshot = self.status();
        let high_water = self.limits.high_water_ratio * 100.0;
        let mut warnings = Vec::new();

        if snapshot.memory_usage_percent() > high_water {
            warnings.push(format!(
                "High memory usage: {} MB ({:.0}%)",
                snapshot.memory_usage_mb,
                snapshot.memory_usage_percent()
            ));
        }
        if snapshot.thread_usage_percent() > high_water {
            warnings.push(format!(
                "High thread usage: {} threads ({:.0}%)",
                snapshot.active_threads,
                snapshot.thread_usage_percent()
            ));
        }

        warnings
    }

    /// Starts the periodic utilization monitor. Calling it again is a no-op.
    ///
    /// Must be called from within a tokio runtime. The monitor stops on
    /// [`shutdown`](Self::shutdown) or when the coordinator is dropped.
    pub fn start_monitoring(self: &Arc<Self>) {
        if self.monitor_running.swap(true, Ordering::SeqCst) {
            return;
        }

        let coordinator: Weak<Self> = Arc::downgrade(self);
        let token = self.shutdown.clone();
        let period = self.limits.monitor_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                if !coordinator.monitor_running.load(Ordering::SeqCst) {
                    break;
                }
                for warning in coordinator.utilization_warnings() {
                    warn!("{}", warning);
                }
            }
            debug!("Resource monitor stopped");
        });
    }

    /// Stops the monitor and closes the worker pool.
    ///
    /// Tasks already admitted run to completion; new admissions fail
    /// with [`ResourceError::ShuttingDown`].
    pub fn shutdown(&self) {
        self.monitor_running.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
        self.pool.close();
        for entry in self.locks.iter() {
            entry.value().close();
        }
        info!("Resource coordinator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn active_threads(&self) -> usize {
        self.limits
            .max_threads
            .saturating_sub(self.pool.available_permits())
    }

    fn lock_for(&self, name: &str) -> Arc<Semaphore> {
        let permits = self.limits.lock_permits.max(1);
        let entry = self.locks.entry(name.to_string()).or_insert_with(|| {
            debug!("Registering resource lock: {}", name);
            Arc::new(Semaphore::new(permits))
        });
        Arc::clone(entry.value())
    }
}

impl Drop for ResourceCoordinator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
