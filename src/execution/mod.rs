//! Scenario Execution Module
//!
//! Drives scenario runs and hands each step to a tool adapter.
//!
//! # Architecture
//!
//! - [`engine`]: Run orchestration and the pause/resume/abort surface
//! - [`run`]: Per-run records, summaries and results
//! - [`tool`]: The tool invocation seam
//! - [`command`]: Shell-command tools configured per step type

pub mod command;
pub mod engine;
pub mod run;
pub mod tool;

pub use command::{CommandToolAdapter, ToolCommand};
pub use engine::WorkflowEngine;
pub use run::{RunHandle, RunSummary, WorkflowExecution, WorkflowResult};
pub use tool::{DryRunToolAdapter, ToolAdapter, ToolError};
