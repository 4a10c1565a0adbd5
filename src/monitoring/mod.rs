//! Resource Monitoring Module
//!
//! Utilities for tracking process resource usage and the execution
//! timeline of a run.
//!
//! # Components
//!
//! - [`ProcessMonitor`]: CPU and memory usage sampling
//! - [`MemoryProbe`]: Memory reading used by admission control
//! - [`ExecutionTimeline`]: Step start/end timing for Gantt charts

pub mod resource;
pub mod timeline;

pub use resource::{MemoryProbe, ProcessMemoryProbe, ProcessMonitor, ResourceSample};
pub use timeline::{EventType, ExecutionTimeline, StepDuration, TimelineEvent};
