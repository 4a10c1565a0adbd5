//! Run Records
//!
//! The live record of one run, the summaries handed out while it is
//! running, and the final result delivered through its [`RunHandle`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::context::WorkflowContext;
use crate::correlation::CorrelatedFindings;
use crate::error::WorkflowError;
use crate::monitoring::ExecutionTimeline;
use crate::workflow::{Scenario, Step, StepResult, WorkflowConfig, WorkflowState, WorkflowStatus};

/// One run of a scenario. Mutated only by the task driving it.
#[derive(Debug, Clone)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub scenario: Arc<Scenario>,
    pub config: WorkflowConfig,
    pub context: WorkflowContext,
    pub state: WorkflowState,
    /// Index of the step being executed or last executed
    pub current_step: Option<usize>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Results in execution order
    pub results: Vec<StepResult>,
    /// Steps that succeeded, in execution order
    pub completed_steps: Vec<Step>,
    pub timeline: ExecutionTimeline,
}

impl WorkflowExecution {
    pub fn new(scenario: Arc<Scenario>, config: WorkflowConfig) -> Self {
        Self {
            id: Uuid::now_v7(),
            scenario,
            config,
            context: WorkflowContext::new(),
            state: WorkflowState::Initialized,
            current_step: None,
            started_at: Utc::now(),
            ended_at: None,
            results: Vec::new(),
            completed_steps: Vec::new(),
            timeline: ExecutionTimeline::new(),
        }
    }

    /// Moves to `next` if the state machine allows it.
    pub fn transition(&mut self, next: WorkflowState) -> Result<(), WorkflowError> {
        if !self.state.can_transition_to(next) {
            return Err(WorkflowError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!("Run {}: {} -> {}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }

    pub fn status(&self) -> WorkflowStatus {
        WorkflowStatus::from_state(self.state)
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.current_step.and_then(|i| self.scenario.steps.get(i))
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            id: self.id,
            scenario: self.scenario.name.clone(),
            status: self.status(),
            state: self.state,
            current_step: self.current_step().map(|s| s.name.clone()),
            completed: self.results.len(),
            total: self.scenario.len(),
            started_at: self.started_at,
        }
    }
}

/// Snapshot of a live run.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub id: Uuid,
    pub scenario: String,
    pub status: WorkflowStatus,
    pub state: WorkflowState,
    pub current_step: Option<String>,
    /// Steps that produced a result so far
    pub completed: usize,
    pub total: usize,
    pub started_at: DateTime<Utc>,
}

/// Final outcome of a run.
#[derive(Serialize, Debug, Clone)]
pub struct WorkflowResult {
    pub id: Uuid,
    pub scenario: String,
    pub status: WorkflowStatus,
    pub message: String,
    pub results: Vec<StepResult>,
    /// Present for completed and aborted runs
    pub findings: Option<CorrelatedFindings>,
    /// The error that ended a failed run
    #[serde(skip)]
    pub failure: Option<WorkflowError>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub timeline: ExecutionTimeline,
}

impl WorkflowResult {
    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    pub fn succeeded_steps(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed_steps(&self) -> usize {
        self.results.len() - self.succeeded_steps()
    }
}

/// Handle to a started run.
#[derive(Debug)]
pub struct RunHandle {
    id: Uuid,
    handle: JoinHandle<WorkflowResult>,
}

impl RunHandle {
    pub(crate) fn new(id: Uuid, handle: JoinHandle<WorkflowResult>) -> Self {
        Self { id, handle }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the run to reach a terminal state.
    pub async fn result(self) -> Result<WorkflowResult, WorkflowError> {
        self.handle
            .await
            .map_err(|e| WorkflowError::Join(e.to_string()))
    }
}
