//! Scenario Parser
//!
//! Handles loading and saving scenario definitions as YAML, and resolving
//! a command-line scenario argument to either a built-in scenario or a file.

use std::error::Error;
use std::fs;
use std::path::Path;

use log::{debug, info};

use super::model::Scenario;
use super::scenarios::BuiltinScenario;
use super::validator::validate_scenario;

/// Loads a scenario from a YAML file.
///
/// This function:
/// 1. Reads and parses the YAML file
/// 2. Validates the scenario structure
///
/// # Example
///
/// ```rust,no_run
/// use scenario_runner::workflow::load_scenario;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let scenario = load_scenario("sweep.yaml")?;
///     println!("Loaded {} steps", scenario.steps.len());
///     Ok(())
/// }
/// ```
pub fn load_scenario(path: &str) -> Result<Scenario, Box<dyn Error>> {
    info!("Loading scenario from: {}", path);

    let yaml_content = fs::read_to_string(path).map_err(|e| {
        format!(
            "Failed to read scenario file '{}': {}. Check that the file exists and is readable.",
            path, e
        )
    })?;

    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    let scenario: Scenario = serde_yaml::from_str(&yaml_content).map_err(|e| {
        format!(
            "Failed to parse scenario YAML: {}. Check the file format.",
            e
        )
    })?;

    info!(
        "Parsed scenario '{}' with {} steps",
        scenario.name,
        scenario.steps.len()
    );

    validate_scenario(&scenario)?;

    Ok(scenario)
}

/// Resolves a scenario argument.
///
/// A built-in tag (e.g. `network_reconnaissance`) wins; anything else is
/// treated as a path to a scenario file.
pub fn resolve_scenario(arg: &str) -> Result<Scenario, Box<dyn Error>> {
    if let Ok(builtin) = arg.parse::<BuiltinScenario>() {
        info!("Using built-in scenario: {}", builtin.display_name());
        return Ok(builtin.scenario());
    }

    if !Path::new(arg).exists() {
        return Err(format!(
            "'{}' is neither a built-in scenario nor an existing file. Use --list to see built-ins.",
            arg
        )
        .into());
    }

    load_scenario(arg)
}

/// Saves a scenario to a YAML file.
pub fn save_scenario(scenario: &Scenario, path: &str) -> Result<(), Box<dyn Error>> {
    let yaml_content = serde_yaml::to_string(scenario)?;
    fs::write(path, yaml_content)?;
    info!("Scenario saved to: {}", path);
    Ok(())
}
