//! ScenarioRunner - Scenario Execution Engine
//!
//! Runs ordered scenarios of tool-backed steps against shared named
//! resources. Each step's results feed the parameters of later steps,
//! and a finished run is correlated into findings, attack paths and a
//! risk rating.
//!
//! # Architecture
//!
//! The library is organized into these modules:
//!
//! - [`workflow`]: Scenario definitions, run configuration and the state machine
//! - [`execution`]: The run engine and the tool invocation seam
//! - [`context`]: Fact extraction and context-driven parameters
//! - [`resource`]: Admission control over workers, memory and named locks
//! - [`correlation`]: Post-run findings, attack paths and risk
//! - [`monitoring`]: Process memory sampling and execution timelines
//! - [`settings`]: The operator settings file
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use scenario_runner::execution::{DryRunToolAdapter, WorkflowEngine};
//! use scenario_runner::resource::ResourceCoordinator;
//! use scenario_runner::workflow::{resolve_scenario, WorkflowConfig};
//! use scenario_runner::load_settings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = load_settings("settings.yaml")?;
//!     let coordinator = Arc::new(ResourceCoordinator::new(settings.resources));
//!     let engine = WorkflowEngine::new(
//!         Arc::new(DryRunToolAdapter),
//!         coordinator,
//!         settings.engine.max_concurrent_runs,
//!     );
//!
//!     let scenario = resolve_scenario("network_reconnaissance")?;
//!     let result = engine.start(scenario, WorkflowConfig::default())?.result().await?;
//!     println!("{}", result.message);
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod correlation;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod resource;
pub mod settings;
pub mod workflow;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use error::{ResourceError, TaskPanicked, WorkflowError};
pub use execution::{WorkflowEngine, WorkflowResult};
pub use settings::{load_settings, Settings};
pub use workflow::model::{Scenario, Step, StepResult, StepType};
pub use workflow::parser::load_scenario;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "ScenarioRunner";
