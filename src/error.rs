//! Error Types
//!
//! Run-level and resource-layer errors. Validation errors live with the
//! validator and tool errors with the tool seam; both convert into
//! [`WorkflowError`].

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::workflow::{ValidationError, WorkflowState};

/// Admission-control failures, always distinct from a task's own failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("Operation '{0}' is already active")]
    DuplicateOperation(String),

    #[error("Resource '{resource}' is busy (waited {waited:?})")]
    Busy { resource: String, waited: Duration },

    #[error("Worker threads exhausted ({active}/{max} active)")]
    ThreadsExhausted { active: usize, max: usize },

    #[error("Memory exhausted ({used_mb} MB used, ceiling {max_mb} MB)")]
    MemoryExhausted { used_mb: u64, max_mb: u64 },

    #[error("Resource coordinator is shutting down")]
    ShuttingDown,
}

/// An admitted task that did not run to completion.
///
/// This is the task's own failure, so it is kept apart from
/// [`ResourceError`] and handled like any other step failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Task for operation '{operation}' panicked")]
pub struct TaskPanicked {
    pub operation: String,
}

impl ResourceError {
    /// True for thread and memory ceiling failures.
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            Self::ThreadsExhausted { .. } | Self::MemoryExhausted { .. }
        )
    }

    /// True when trying again later may succeed without any change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

/// Errors that end or reject a run.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    #[error("Invalid scenario: {0}")]
    Validation(#[from] ValidationError),

    #[error("Resource failure: {0}")]
    Resource(#[from] ResourceError),

    #[error("Step '{step}' failed: {reason}")]
    StepExecution { step: String, reason: String },

    #[error("Critical step '{step}' failed: {reason}")]
    CriticalStepFailure { step: String, reason: String },

    #[error("Step '{step}' timed out after {timeout:?}")]
    Timeout { step: String, timeout: Duration },

    #[error("Run {0} not found")]
    RunNotFound(Uuid),

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition {
        from: WorkflowState,
        to: WorkflowState,
    },

    #[error("Run task failed: {0}")]
    Join(String),
}

impl WorkflowError {
    /// Escalates a step-level failure into a critical one.
    pub fn escalate(self) -> Self {
        match self {
            Self::StepExecution { step, reason } => Self::CriticalStepFailure { step, reason },
            Self::Timeout { step, timeout } => Self::CriticalStepFailure {
                reason: format!("timed out after {:?}", timeout),
                step,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_error_kinds() {
        let busy = ResourceError::Busy {
            resource: "wlan0".to_string(),
            waited: Duration::from_secs(5),
        };
        assert!(busy.is_retryable());
        assert!(!busy.is_exhausted());

        let threads = ResourceError::ThreadsExhausted { active: 20, max: 20 };
        assert!(threads.is_exhausted());
        assert!(!threads.is_retryable());

        assert!(!ResourceError::ShuttingDown.is_exhausted());
    }

    #[test]
    fn test_escalate() {
        let err = WorkflowError::StepExecution {
            step: "Discover".to_string(),
            reason: "no interface".to_string(),
        };
        let escalated = err.escalate();
        assert!(matches!(escalated, WorkflowError::CriticalStepFailure { .. }));
        assert!(escalated.to_string().contains("Discover"));

        let timeout = WorkflowError::Timeout {
            step: "Scan".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(timeout.escalate().to_string().contains("timed out"));
    }

    #[test]
    fn test_conversions() {
        let err: WorkflowError = ValidationError::EmptyScenario.into();
        assert!(err.to_string().contains("no steps"));

        let err: WorkflowError = ResourceError::ShuttingDown.into();
        assert!(matches!(err, WorkflowError::Resource(ResourceError::ShuttingDown)));
    }
}
