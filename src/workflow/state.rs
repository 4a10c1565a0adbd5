//! Run State Machine
//!
//! Fine-grained states a run moves through, the coarse status reported
//! to callers, and the table of legal transitions.
//!
//! ```text
//! INITIALIZED -> RUNNING -> STEP_EXECUTING -> STEP_COMPLETED | STEP_FAILED
//!             -> RUNNING (next step) -> ... -> COMPLETED | ERROR
//! RUNNING <-> PAUSED
//! any non-terminal state -> ABORTED
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Internal state of a run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Initialized,
    Running,
    StepExecuting,
    StepCompleted,
    StepFailed,
    Paused,
    Completed,
    Aborted,
    Error,
}

impl WorkflowState {
    /// Returns true for COMPLETED, ERROR and ABORTED.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Aborted)
    }

    /// Returns true if the run is sitting between steps.
    pub fn is_between_steps(&self) -> bool {
        matches!(
            self,
            Self::Initialized | Self::Running | Self::StepCompleted | Self::StepFailed
        )
    }

    /// Checks whether moving from `self` to `next` is legal.
    pub fn can_transition_to(&self, next: WorkflowState) -> bool {
        use WorkflowState::*;

        if self.is_terminal() {
            return false;
        }

        match (self, next) {
            (_, Aborted) => true,
            (Initialized, Running) => true,
            (Running, StepExecuting) => true,
            (StepExecuting, StepCompleted | StepFailed) => true,
            (StepCompleted | StepFailed, Running | StepExecuting) => true,
            // A critical failure or the last step ends the run.
            (StepFailed, Error) => true,
            (Running | StepCompleted | StepFailed, Completed) => true,
            (Running | StepExecuting, Error) => true,
            (Initialized | Running | StepCompleted | StepFailed, Paused) => true,
            (Paused, Running) => true,
            _ => false,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialized => "INITIALIZED",
            Self::Running => "RUNNING",
            Self::StepExecuting => "STEP_EXECUTING",
            Self::StepCompleted => "STEP_COMPLETED",
            Self::StepFailed => "STEP_FAILED",
            Self::Paused => "PAUSED",
            Self::Completed => "COMPLETED",
            Self::Aborted => "ABORTED",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Coarse status reported to callers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Paused,
    Aborted,
    NotFound,
}

impl WorkflowStatus {
    /// Derives the coarse status from an internal state.
    ///
    /// A non-critical step failure leaves the run going, so STEP_FAILED
    /// reports RUNNING; only ERROR reports FAILED.
    pub fn from_state(state: WorkflowState) -> Self {
        match state {
            WorkflowState::Initialized => Self::Pending,
            WorkflowState::Running
            | WorkflowState::StepExecuting
            | WorkflowState::StepCompleted
            | WorkflowState::StepFailed => Self::Running,
            WorkflowState::Completed => Self::Completed,
            WorkflowState::Error => Self::Failed,
            WorkflowState::Paused => Self::Paused,
            WorkflowState::Aborted => Self::Aborted,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Paused => "PAUSED",
            Self::Aborted => "ABORTED",
            Self::NotFound => "NOT_FOUND",
        };
        f.write_str(name)
    }
}

impl From<WorkflowState> for WorkflowStatus {
    fn from(state: WorkflowState) -> Self {
        Self::from_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use WorkflowState::*;

    const ALL_STATES: [WorkflowState; 9] = [
        Initialized,
        Running,
        StepExecuting,
        StepCompleted,
        StepFailed,
        Paused,
        Completed,
        Aborted,
        Error,
    ];

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            Initialized,
            Running,
            StepExecuting,
            StepCompleted,
            StepExecuting,
            StepFailed,
            Running,
            Completed,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [Completed, Error, Aborted] {
            assert!(terminal.is_terminal());
            for next in ALL_STATES {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_abort_from_any_non_terminal() {
        for state in ALL_STATES.iter().filter(|s| !s.is_terminal()) {
            assert!(state.can_transition_to(Aborted), "{} -> ABORTED", state);
        }
    }

    #[test]
    fn test_pause_resume() {
        assert!(Running.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Running));
        assert!(!Paused.can_transition_to(StepExecuting));
        assert!(!StepExecuting.can_transition_to(Paused));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(WorkflowStatus::from_state(Initialized), WorkflowStatus::Pending);
        assert_eq!(WorkflowStatus::from_state(StepExecuting), WorkflowStatus::Running);
        assert_eq!(WorkflowStatus::from_state(StepFailed), WorkflowStatus::Running);
        assert_eq!(WorkflowStatus::from_state(Error), WorkflowStatus::Failed);
        assert_eq!(WorkflowStatus::from_state(Paused), WorkflowStatus::Paused);
        assert_eq!(WorkflowStatus::from(Aborted), WorkflowStatus::Aborted);
        assert_eq!(WorkflowStatus::from(Completed), WorkflowStatus::Completed);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(StepExecuting.to_string(), "STEP_EXECUTING");
        assert_eq!(WorkflowStatus::NotFound.to_string(), "NOT_FOUND");
    }
}
