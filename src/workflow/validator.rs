//! Scenario Validation
//!
//! Checks a scenario and its run configuration before anything is
//! scheduled:
//! - Scenario has a name and at least one step
//! - Every step has a display name
//! - Run configuration has a usable thread budget and timeout

use std::collections::HashSet;

use log::{debug, info, warn};
use thiserror::Error;

use super::config::WorkflowConfig;
use super::model::{Scenario, Step};

/// Reasons a scenario or configuration is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Scenario has no steps")]
    EmptyScenario,

    #[error("Scenario has an empty or whitespace-only name")]
    EmptyScenarioName,

    #[error("Step #{0} has an empty or whitespace-only name")]
    EmptyStepName(usize),

    #[error("Configuration must allow at least one thread")]
    ZeroThreads,

    #[error("Configuration step timeout must be greater than zero")]
    ZeroTimeout,
}

/// Validates a single step's fields. `index` is 1-based.
fn validate_step(index: usize, step: &Step) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if step.name.trim().is_empty() {
        errors.push(ValidationError::EmptyStepName(index));
    }

    if step.critical {
        debug!("Step '{}' is critical", step.name);
    }

    errors
}

/// Validates the scenario structure.
///
/// Returns the first error found. Duplicate step names are allowed but
/// logged, since results are labelled by step type rather than by name.
pub fn validate_scenario(scenario: &Scenario) -> Result<(), ValidationError> {
    if scenario.name.trim().is_empty() {
        return Err(ValidationError::EmptyScenarioName);
    }

    if scenario.steps.is_empty() {
        return Err(ValidationError::EmptyScenario);
    }

    let mut seen_names: HashSet<&str> = HashSet::new();
    for (i, step) in scenario.steps.iter().enumerate() {
        if let Some(err) = validate_step(i + 1, step).into_iter().next() {
            return Err(err);
        }

        if !seen_names.insert(step.name.as_str()) {
            warn!(
                "Scenario '{}' has more than one step named '{}'",
                scenario.name, step.name
            );
        }
    }

    info!(
        "Scenario validated: '{}' with {} steps ({} critical)",
        scenario.name,
        scenario.steps.len(),
        scenario.critical_steps().len()
    );
    Ok(())
}

/// Validates a run configuration.
pub fn validate_config(config: &WorkflowConfig) -> Result<(), ValidationError> {
    if config.max_threads == 0 {
        return Err(ValidationError::ZeroThreads);
    }

    if config.timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout);
    }

    Ok(())
}

/// Quick validation that returns every problem as a message.
///
/// Useful for listing scenario files without stopping at the first error.
pub fn quick_validate(scenario: &Scenario) -> Vec<String> {
    let mut errors = Vec::new();

    if scenario.name.trim().is_empty() {
        errors.push(ValidationError::EmptyScenarioName.to_string());
    }

    if scenario.steps.is_empty() {
        errors.push(ValidationError::EmptyScenario.to_string());
        return errors;
    }

    for (i, step) in scenario.steps.iter().enumerate() {
        errors.extend(validate_step(i + 1, step).iter().map(|e| e.to_string()));
    }

    errors
}
