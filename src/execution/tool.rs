//! Tool Invocation Seam
//!
//! The engine never runs external tools itself. It hands each step's
//! type and effective parameters to a [`ToolAdapter`] and gets a
//! [`StepResult`] back.

use async_trait::async_trait;
use log::info;
use thiserror::Error;

use crate::workflow::{Parameters, StepResult, StepType};

/// Parameter naming the exclusive resource a step needs.
pub const RESOURCE_PARAMETER: &str = "interface";

/// Failures of the tool layer itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("No tool configured for step type '{0}'")]
    Unsupported(StepType),

    #[error("Failed to launch tool: {0}")]
    Launch(String),

    #[error("Tool exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

/// Executes the real work of one step.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Runs the tool for `step_type` with the effective parameters.
    async fn invoke(&self, step_type: StepType, params: Parameters) -> Result<StepResult, ToolError>;

    /// Named resource the invocation must hold exclusively, if any.
    fn resource_for(&self, _step_type: StepType, params: &Parameters) -> Option<String> {
        params
            .get(RESOURCE_PARAMETER)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

/// Adapter that runs nothing and reports success.
#[derive(Debug, Clone, Default)]
pub struct DryRunToolAdapter;

#[async_trait]
impl ToolAdapter for DryRunToolAdapter {
    async fn invoke(&self, step_type: StepType, params: Parameters) -> Result<StepResult, ToolError> {
        let rendered: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        info!("[DRY RUN] {} {}", step_type, rendered.join(" "));

        Ok(StepResult::success(
            step_type,
            format!("[DRY RUN] {} skipped", step_type),
        ))
    }
}
