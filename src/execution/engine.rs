//! Scenario Execution Engine
//!
//! Orchestrates scenario runs end to end:
//! - Strictly sequential steps within a run, many runs at once
//! - Context-driven parameter building before each step
//! - Resource-admitted tool invocation with a per-step timeout
//! - Cooperative pause/resume between steps, best-effort abort
//! - Correlation of results once a run completes or is aborted

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::run::{RunHandle, RunSummary, WorkflowExecution, WorkflowResult};
use super::tool::ToolAdapter;
use crate::context::ContextAccumulator;
use crate::correlation::ResultCorrelator;
use crate::error::{ResourceError, WorkflowError};
use crate::monitoring::EventType;
use crate::resource::ResourceCoordinator;
use crate::workflow::{
    validate_config, validate_scenario, Parameters, Scenario, Step, StepResult, WorkflowConfig,
    WorkflowState, WorkflowStatus,
};

/// Default number of runs driven at once.
pub const DEFAULT_MAX_CONCURRENT_RUNS: usize = 5;

/// Parameter carrying the per-tool thread budget.
const THREADS_PARAMETER: &str = "threads";

/// Shared control block of a live run.
struct RunControl {
    execution: RwLock<WorkflowExecution>,
    pause_requested: AtomicBool,
    resumed: Notify,
    cancel: CancellationToken,
}

impl RunControl {
    fn new(execution: WorkflowExecution) -> Self {
        Self {
            execution: RwLock::new(execution),
            pause_requested: AtomicBool::new(false),
            resumed: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, WorkflowExecution> {
        self.execution.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, WorkflowExecution> {
        self.execution.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How one step invocation ended.
enum StepOutcome {
    Succeeded(StepResult),
    Failed(StepResult, WorkflowError),
    ResourceFailed(StepResult, ResourceError),
}

/// Whether the next step may start.
enum StepStart {
    Ready(Parameters, WorkflowConfig),
    Paused,
    Aborted,
}

/// How the step loop ended.
enum RunOutcome {
    Completed,
    Aborted,
    Failed(WorkflowError),
}

/// Runs scenarios and exposes their control surface.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use scenario_runner::execution::{DryRunToolAdapter, WorkflowEngine};
/// use scenario_runner::resource::{ResourceCoordinator, ResourceLimits};
/// use scenario_runner::workflow::{BuiltinScenario, WorkflowConfig};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let coordinator = Arc::new(ResourceCoordinator::new(ResourceLimits::default()));
/// let engine = WorkflowEngine::new(Arc::new(DryRunToolAdapter), coordinator, 5);
///
/// let handle = engine.start(
///     BuiltinScenario::NetworkReconnaissance.scenario(),
///     WorkflowConfig::default(),
/// )?;
/// let result = handle.result().await?;
/// println!("{}: {}", result.status, result.message);
/// # Ok(())
/// # }
/// ```
pub struct WorkflowEngine {
    runs: Arc<DashMap<Uuid, Arc<RunControl>>>,
    tools: Arc<dyn ToolAdapter>,
    coordinator: Arc<ResourceCoordinator>,
    run_slots: Arc<Semaphore>,
    accumulator: ContextAccumulator,
    correlator: ResultCorrelator,
}

impl WorkflowEngine {
    pub fn new(
        tools: Arc<dyn ToolAdapter>,
        coordinator: Arc<ResourceCoordinator>,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            runs: Arc::new(DashMap::new()),
            tools,
            coordinator,
            run_slots: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            accumulator: ContextAccumulator::new(),
            correlator: ResultCorrelator::new(),
        }
    }

    pub fn coordinator(&self) -> &Arc<ResourceCoordinator> {
        &self.coordinator
    }

    /// Registers a new run and starts driving it in the background.
    ///
    /// Must be called from within a tokio runtime. The run waits for a
    /// free orchestration slot, reporting PENDING until it gets one.
    pub fn start(&self, scenario: Scenario, config: WorkflowConfig) -> Result<RunHandle, WorkflowError> {
        validate_scenario(&scenario)?;
        validate_config(&config)?;

        let driver = self.register(scenario, config);
        let id = driver.id;
        info!(
            target: "audit",
            "WORKFLOW_START id={} scenario='{}'",
            id,
            driver.control.read().scenario.name
        );

        Ok(RunHandle::new(id, tokio::spawn(driver.drive())))
    }

    /// Adds a run to the live registry and builds the task that drives it.
    fn register(&self, scenario: Scenario, config: WorkflowConfig) -> RunDriver {
        let execution = WorkflowExecution::new(Arc::new(scenario), config);
        let id = execution.id;
        let control = Arc::new(RunControl::new(execution));
        self.runs.insert(id, Arc::clone(&control));

        RunDriver {
            id,
            control,
            runs: Arc::clone(&self.runs),
            tools: Arc::clone(&self.tools),
            coordinator: Arc::clone(&self.coordinator),
            run_slots: Arc::clone(&self.run_slots),
            accumulator: self.accumulator.clone(),
            correlator: self.correlator.clone(),
        }
    }

    /// Requests a pause. Takes effect before the next step starts.
    pub fn pause(&self, id: Uuid) -> Result<(), WorkflowError> {
        let control = self.control(id)?;
        {
            let mut exec = control.write();
            if !exec.state.can_transition_to(WorkflowState::Paused)
                && exec.state != WorkflowState::StepExecuting
            {
                return Err(WorkflowError::InvalidTransition {
                    from: exec.state,
                    to: WorkflowState::Paused,
                });
            }
            control.pause_requested.store(true, Ordering::SeqCst);
            if exec.state.is_between_steps() {
                exec.transition(WorkflowState::Paused)?;
            }
        }

        info!(target: "audit", "WORKFLOW_PAUSE id={}", id);
        Ok(())
    }

    /// Lifts a pause.
    pub fn resume(&self, id: Uuid) -> Result<(), WorkflowError> {
        let control = self.control(id)?;
        {
            let mut exec = control.write();
            if !control.pause_requested.load(Ordering::SeqCst) {
                return Err(WorkflowError::InvalidTransition {
                    from: exec.state,
                    to: WorkflowState::Running,
                });
            }
            control.pause_requested.store(false, Ordering::SeqCst);
            if exec.state == WorkflowState::Paused {
                exec.transition(WorkflowState::Running)?;
            }
        }
        control.resumed.notify_one();

        info!(target: "audit", "WORKFLOW_RESUME id={}", id);
        Ok(())
    }

    /// Aborts a run and drops it from the live registry.
    ///
    /// No further step starts, and an in-flight invocation is abandoned,
    /// releasing its resource lock.
    pub fn abort(&self, id: Uuid) -> Result<(), WorkflowError> {
        let control = self.control(id)?;
        {
            let mut exec = control.write();
            exec.transition(WorkflowState::Aborted)?;
            exec.ended_at = Some(Utc::now());
        }
        control.cancel.cancel();
        self.runs.remove(&id);

        info!(target: "audit", "WORKFLOW_ABORT id={}", id);
        Ok(())
    }

    /// Coarse status of a run; NOT_FOUND once it left the registry.
    pub fn status(&self, id: Uuid) -> WorkflowStatus {
        match self.runs.get(&id) {
            Some(control) => control.read().status(),
            None => WorkflowStatus::NotFound,
        }
    }

    /// Snapshots of every live run.
    pub fn list_active(&self) -> Vec<RunSummary> {
        let mut summaries: Vec<RunSummary> = self
            .runs
            .iter()
            .map(|entry| entry.value().read().summary())
            .collect();
        summaries.sort_by_key(|s| s.started_at);
        summaries
    }

    /// Steps a live run has completed so far.
    pub fn history(&self, id: Uuid) -> Option<Vec<Step>> {
        self.runs
            .get(&id)
            .map(|control| control.read().completed_steps.clone())
    }

    fn control(&self, id: Uuid) -> Result<Arc<RunControl>, WorkflowError> {
        self.runs
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(WorkflowError::RunNotFound(id))
    }
}

/// Everything a background run task needs.
struct RunDriver {
    id: Uuid,
    control: Arc<RunControl>,
    runs: Arc<DashMap<Uuid, Arc<RunControl>>>,
    tools: Arc<dyn ToolAdapter>,
    coordinator: Arc<ResourceCoordinator>,
    run_slots: Arc<Semaphore>,
    accumulator: ContextAccumulator,
    correlator: ResultCorrelator,
}

impl RunDriver {
    async fn drive(self) -> WorkflowResult {
        let slot = tokio::select! {
            _ = self.control.cancel.cancelled() => None,
            permit = Arc::clone(&self.run_slots).acquire_owned() => permit.ok(),
        };

        let outcome = if self.control.cancel.is_cancelled() {
            RunOutcome::Aborted
        } else {
            match self.execute_steps().await {
                Ok(outcome) => outcome,
                Err(e) => RunOutcome::Failed(e),
            }
        };
        drop(slot);

        let result = self.finish(outcome);
        self.runs.remove(&self.id);
        result
    }

    async fn execute_steps(&self) -> Result<RunOutcome, WorkflowError> {
        let scenario = {
            let mut exec = self.control.write();
            if exec.state == WorkflowState::Initialized {
                exec.transition(WorkflowState::Running)?;
            }
            Arc::clone(&exec.scenario)
        };

        info!("Running scenario '{}' ({} steps)", scenario.name, scenario.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            let (params, config) = loop {
                if !self.checkpoint().await {
                    return Ok(RunOutcome::Aborted);
                }
                match self.begin_step(index, step)? {
                    StepStart::Ready(params, config) => break (params, config),
                    StepStart::Paused => continue,
                    StepStart::Aborted => return Ok(RunOutcome::Aborted),
                }
            };

            info!(
                "Step {}/{}: {} ({})",
                index + 1,
                scenario.len(),
                step.name,
                step.step_type
            );

            let outcome = tokio::select! {
                _ = self.control.cancel.cancelled() => return Ok(RunOutcome::Aborted),
                outcome = self.invoke(index, step, params, &config) => outcome,
            };

            let mut exec = self.control.write();
            if exec.state.is_terminal() {
                return Ok(RunOutcome::Aborted);
            }

            match outcome {
                StepOutcome::Succeeded(result) => {
                    info!("Step '{}' completed: {}", step.name, result.message);
                    self.accumulator.enhance(&mut exec.context, step, &result);
                    exec.results.push(result);
                    exec.completed_steps.push(step.clone());
                    exec.timeline.add_event(index, &step.name, EventType::Completed);
                    exec.transition(WorkflowState::StepCompleted)?;
                }
                StepOutcome::Failed(result, err) => {
                    self.accumulator.enhance(&mut exec.context, step, &result);
                    exec.results.push(result);
                    exec.timeline.add_event(index, &step.name, EventType::Failed);
                    exec.transition(WorkflowState::StepFailed)?;

                    if step.critical || config.stop_on_failure {
                        error!("Step '{}' failed, stopping run: {}", step.name, err);
                        return Ok(RunOutcome::Failed(err.escalate()));
                    }
                    warn!("Step '{}' failed, continuing: {}", step.name, err);
                }
                StepOutcome::ResourceFailed(result, err) => {
                    exec.results.push(result);
                    exec.timeline.add_event(index, &step.name, EventType::Failed);
                    exec.transition(WorkflowState::StepFailed)?;
                    error!("Step '{}' could not be admitted: {}", step.name, err);
                    return Ok(RunOutcome::Failed(WorkflowError::Resource(err)));
                }
            }

            exec.transition(WorkflowState::Running)?;
        }

        Ok(RunOutcome::Completed)
    }

    /// Moves the run into STEP_EXECUTING for `step`.
    ///
    /// The pause flag is re-read under the write lock, so a pause that
    /// lands after the checkpoint holds the run instead of racing it.
    fn begin_step(&self, index: usize, step: &Step) -> Result<StepStart, WorkflowError> {
        let mut exec = self.control.write();
        if exec.state.is_terminal() {
            return Ok(StepStart::Aborted);
        }
        if exec.state == WorkflowState::Paused || self.control.pause_requested.load(Ordering::SeqCst) {
            return Ok(StepStart::Paused);
        }

        let params = self.effective_parameters(step, &exec);
        exec.current_step = Some(index);
        exec.transition(WorkflowState::StepExecuting)?;
        exec.timeline.add_event(index, &step.name, EventType::Started);
        Ok(StepStart::Ready(params, exec.config.clone()))
    }

    /// Waits while a pause is requested. Returns false if aborted.
    async fn checkpoint(&self) -> bool {
        while self.control.pause_requested.load(Ordering::SeqCst) {
            {
                let mut exec = self.control.write();
                if exec.state.is_terminal() {
                    return false;
                }
                if exec.state != WorkflowState::Paused {
                    if let Err(e) = exec.transition(WorkflowState::Paused) {
                        warn!("Run {} could not pause: {}", self.id, e);
                        return !exec.state.is_terminal();
                    }
                    info!("Run {} paused", self.id);
                }
            }

            tokio::select! {
                _ = self.control.cancel.cancelled() => return false,
                _ = self.control.resumed.notified() => {}
            }
        }

        !self.control.cancel.is_cancelled()
    }

    /// Declared parameters, then context, then config defaults, then threads.
    fn effective_parameters(&self, step: &Step, exec: &WorkflowExecution) -> Parameters {
        let mut params = self.accumulator.build_parameters(step, &exec.context);

        for (key, value) in &exec.config.parameters {
            params.entry(key.clone()).or_insert_with(|| value.clone());
        }
        params
            .entry(THREADS_PARAMETER.to_string())
            .or_insert_with(|| Value::from(exec.config.effective_threads()));

        params
    }

    async fn invoke(
        &self,
        index: usize,
        step: &Step,
        params: Parameters,
        config: &WorkflowConfig,
    ) -> StepOutcome {
        let step_type = step.step_type;
        let operation_id = format!("{}:{}:{}", self.id, index, step_type);
        let resource = self.tools.resource_for(step_type, &params);
        let timeout = config.step_timeout();

        debug!(
            "Invoking {} on resource {:?} with {} parameters",
            operation_id,
            resource,
            params.len()
        );

        // The step timeout starts once the step is admitted, so waiting
        // for a busy resource is reported as such.
        let tools = Arc::clone(&self.tools);
        let task = async move { tokio::time::timeout(timeout, tools.invoke(step_type, params)).await };
        let admitted = self
            .coordinator
            .run_admitted(&operation_id, resource.as_deref(), task)
            .await;

        match admitted {
            Err(err) => {
                StepOutcome::ResourceFailed(StepResult::failure(step_type, err.to_string()), err)
            }
            Ok(Err(panicked)) => {
                let reason = panicked.to_string();
                StepOutcome::Failed(
                    StepResult::failure(step_type, reason.clone()),
                    WorkflowError::StepExecution {
                        step: step.name.clone(),
                        reason,
                    },
                )
            }
            Ok(Ok(Err(_elapsed))) => StepOutcome::Failed(
                StepResult::failure(step_type, format!("Timed out after {:?}", timeout)),
                WorkflowError::Timeout {
                    step: step.name.clone(),
                    timeout,
                },
            ),
            Ok(Ok(Ok(Err(tool_err)))) => {
                let reason = tool_err.to_string();
                StepOutcome::Failed(
                    StepResult::failure(step_type, reason.clone()),
                    WorkflowError::StepExecution {
                        step: step.name.clone(),
                        reason,
                    },
                )
            }
            Ok(Ok(Ok(Ok(mut result)))) => {
                result.label = step_type;
                if result.success {
                    StepOutcome::Succeeded(result)
                } else {
                    let err = WorkflowError::StepExecution {
                        step: step.name.clone(),
                        reason: result.message.clone(),
                    };
                    StepOutcome::Failed(result, err)
                }
            }
        }
    }

    fn finish(&self, outcome: RunOutcome) -> WorkflowResult {
        let mut exec = self.control.write();
        let total = exec.scenario.len();

        let (message, findings, failure) = match outcome {
            RunOutcome::Completed => {
                if let Err(e) = exec.transition(WorkflowState::Completed) {
                    warn!("Run {} finished in unexpected state: {}", self.id, e);
                }
                let succeeded = exec.results.iter().filter(|r| r.success).count();
                let message = format!(
                    "Scenario '{}' completed: {}/{} steps succeeded",
                    exec.scenario.name, succeeded, total
                );
                (message, Some(self.correlator.correlate(&exec.results)), None)
            }
            RunOutcome::Aborted => {
                if !exec.state.is_terminal() {
                    exec.state = WorkflowState::Aborted;
                }
                let message = format!(
                    "Scenario '{}' aborted after {}/{} steps",
                    exec.scenario.name,
                    exec.results.len(),
                    total
                );
                (message, Some(self.correlator.correlate(&exec.results)), None)
            }
            RunOutcome::Failed(err) => {
                if exec.state == WorkflowState::Aborted {
                    let message = format!("Scenario '{}' aborted", exec.scenario.name);
                    (message, Some(self.correlator.correlate(&exec.results)), None)
                } else {
                    if !exec.state.is_terminal() {
                        exec.state = WorkflowState::Error;
                    }
                    (err.to_string(), None, Some(err))
                }
            }
        };

        let ended_at = *exec.ended_at.get_or_insert_with(Utc::now);
        exec.timeline.finish();

        let status = exec.status();
        info!(
            target: "audit",
            "WORKFLOW_COMPLETE id={} status={} results={}",
            self.id,
            status,
            exec.results.len()
        );

        WorkflowResult {
            id: self.id,
            scenario: exec.scenario.name.clone(),
            status,
            message,
            results: exec.results.clone(),
            findings,
            failure,
            started_at: exec.started_at,
            ended_at,
            timeline: exec.timeline.clone(),
        }
    }
}
