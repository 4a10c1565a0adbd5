//! Resource Admission Control
//!
//! Bounded worker pool plus named exclusive resource locks, shared by
//! every run in the process.
//!
//! - [`limits`]: Ceilings and timings
//! - [`coordinator`]: The coordinator itself

pub mod coordinator;
pub mod limits;

pub use coordinator::{ResourceCoordinator, ResourceSnapshot};
pub use limits::ResourceLimits;
