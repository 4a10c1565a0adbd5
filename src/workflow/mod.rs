//! Scenario Definition Module
//!
//! Provides data structures and utilities for defining, parsing, and
//! validating scenarios, plus the run state machine.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (Scenario, Step, StepResult)
//! - [`scenarios`]: Built-in scenario catalogue
//! - [`config`]: Per-run configuration
//! - [`state`]: Run state machine and coarse status
//! - [`parser`]: YAML loading and saving
//! - [`validator`]: Validation rules

pub mod config;
pub mod model;
pub mod parser;
pub mod scenarios;
pub mod state;
pub mod validator;

pub use config::WorkflowConfig;
pub use model::{Credential, Parameters, Scenario, Stage, Step, StepResult, StepType};
pub use parser::{load_scenario, resolve_scenario, save_scenario};
pub use scenarios::BuiltinScenario;
pub use state::{WorkflowState, WorkflowStatus};
pub use validator::{validate_config, validate_scenario, ValidationError};
