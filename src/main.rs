//! ScenarioRunner CLI Entry Point
//!
//! Provides command-line interface for scenario execution.
//!
//! # Usage
//!
//! ```bash
//! # Run a built-in scenario with the tools from a settings file
//! scenario-runner network_reconnaissance --settings settings.yaml
//!
//! # Run a scenario file without invoking any tool
//! scenario-runner sweep.yaml --dry-run
//!
//! # Machine-readable result
//! scenario-runner full_red_team --dry-run --json
//!
//! # List built-in scenarios
//! scenario-runner --list
//! ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use colored::*;
use log::{info, warn};

use scenario_runner::correlation::{CorrelatedFindings, RiskCategory, RiskLevel};
use scenario_runner::execution::{
    CommandToolAdapter, DryRunToolAdapter, ToolAdapter, WorkflowEngine, WorkflowResult,
};
use scenario_runner::resource::ResourceCoordinator;
use scenario_runner::workflow::{resolve_scenario, BuiltinScenario, WorkflowConfig, WorkflowStatus};
use scenario_runner::{load_settings, Settings, APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    scenario: Option<String>,
    settings_path: Option<String>,
    dry_run: bool,
    json: bool,
    list: bool,
    stop_on_failure: bool,
    timeout_secs: Option<u64>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Scenario Execution Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: scenario-runner [OPTIONS] <SCENARIO>");
    println!();
    println!("Arguments:");
    println!("  <SCENARIO>          Built-in scenario tag or path to a scenario YAML file");
    println!();
    println!("Options:");
    println!("  --settings PATH     Settings file (engine, resources, tool commands)");
    println!("  --dry-run           Run every step without invoking any tool");
    println!("  --json              Print the run result as JSON");
    println!("  --list              List built-in scenarios");
    println!("  --stop-on-failure   Treat every step failure as critical");
    println!("  --timeout SECS      Per-step timeout in seconds");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  scenario-runner network_reconnaissance --dry-run");
    println!("  scenario-runner sweep.yaml --settings settings.yaml --timeout 120");
}

fn print_builtins() {
    println!("{}", "Built-in scenarios:".bold());
    for builtin in BuiltinScenario::ALL {
        let scenario = builtin.scenario();
        println!(
            "  {:<24} {} ({} steps)",
            builtin.tag().cyan(),
            builtin.display_name(),
            scenario.len()
        );
    }
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--dry-run" => config.dry_run = true,
            "--json" => config.json = true,
            "--list" => config.list = true,
            "--stop-on-failure" => config.stop_on_failure = true,
            "--verbose" | "-v" => config.verbose = true,
            "--settings" => {
                i += 1;
                let path = args
                    .get(i)
                    .ok_or_else(|| "--settings requires a path argument".to_string())?;
                config.settings_path = Some(path.clone());
            }
            "--timeout" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "--timeout requires a number argument".to_string())?;
                let secs: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid timeout value: {}", value))?;
                if secs == 0 {
                    return Err("--timeout must be greater than zero".to_string());
                }
                config.timeout_secs = Some(secs);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.scenario.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.scenario = Some(arg.clone());
            }
        }
        i += 1;
    }

    if config.scenario.is_none() && !config.list {
        return Err("No scenario given".to_string());
    }

    Ok(config)
}

fn status_label(status: WorkflowStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        WorkflowStatus::Completed => text.green().bold(),
        WorkflowStatus::Failed => text.red().bold(),
        _ => text.yellow().bold(),
    }
}

fn risk_label(level: RiskLevel) -> ColoredString {
    let text = level.to_string();
    match level {
        RiskLevel::Critical => text.red().bold(),
        RiskLevel::High => text.red(),
        RiskLevel::Medium => text.yellow(),
        RiskLevel::Low => text.green(),
    }
}

fn print_findings(findings: &CorrelatedFindings) {
    println!("{}", "FINDINGS".bold().yellow());
    for (step_type, items) in &findings.findings {
        if items.is_empty() {
            continue;
        }
        println!("  {}", step_type.to_string().bold());
        for finding in items {
            println!("    - {}", finding);
        }
    }
    println!();

    println!("{}", "ATTACK PATHS".bold().yellow());
    if findings.attack_paths.is_empty() {
        println!("  none");
    }
    for path in &findings.attack_paths {
        println!(
            "  {} ({:.0}%): {}",
            path.name.bold(),
            path.probability * 100.0,
            path.stages.join(" -> ")
        );
    }
    println!();

    println!("{}", "RISK".bold().yellow());
    for category in RiskCategory::ALL {
        if let Some(level) = findings.risk.level(category) {
            println!("  {:<18} {}", category.label(), risk_label(level));
        }
    }
    println!("  {:<18} {}", "Overall", risk_label(findings.risk.overall));
}

fn print_result(result: &WorkflowResult) {
    println!();
    println!("{}", "STEP RESULTS".bold().yellow());
    for (i, step) in result.results.iter().enumerate() {
        let mark = if step.success { "ok".green() } else { "FAILED".red() };
        println!("  {:2}. [{}] {}: {}", i + 1, mark, step.label, step.message);
    }
    println!();

    if let Some(findings) = &result.findings {
        print_findings(findings);
    }

    print!("{}", result.timeline.gantt_chart());
    println!();
    println!(
        "Run {} {}: {}",
        result.id,
        status_label(result.status),
        result.message
    );
}

fn build_tools(settings: &Settings, dry_run: bool) -> Arc<dyn ToolAdapter> {
    if dry_run {
        info!("Mode: DRY RUN (no tool will be invoked)");
        return Arc::new(DryRunToolAdapter);
    }

    if settings.tools.is_empty() {
        warn!("No tool commands configured; every step will fail. Use --settings or --dry-run.");
    }
    Arc::new(CommandToolAdapter::new(settings.tools.clone()))
}

/// Main application entry point.
fn run() -> Result<WorkflowStatus, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    if config.list {
        print_builtins();
        return Ok(WorkflowStatus::Completed);
    }

    setup_logging(config.verbose);
    if !config.json {
        print_banner();
    }

    let settings = match &config.settings_path {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };

    let scenario_arg = config.scenario.as_deref().unwrap_or_default();
    let scenario = resolve_scenario(scenario_arg)?;
    info!(
        "Scenario loaded: '{}' with {} steps",
        scenario.name,
        scenario.len()
    );

    let mut run_config = WorkflowConfig::new().with_stop_on_failure(config.stop_on_failure);
    if let Some(secs) = config.timeout_secs {
        run_config = run_config.with_timeout_secs(secs);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        let coordinator = Arc::new(ResourceCoordinator::new(settings.resources.clone()));
        coordinator.start_monitoring();

        let engine = WorkflowEngine::new(
            build_tools(&settings, config.dry_run),
            Arc::clone(&coordinator),
            settings.engine.max_concurrent_runs,
        );

        let outcome = match engine.start(scenario, run_config) {
            Ok(handle) => handle.result().await,
            Err(e) => Err(e),
        };

        if let Some(summary) = coordinator.usage_summary() {
            info!("{}", summary);
        }
        coordinator.shutdown();
        outcome
    })?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    Ok(result.status)
}

fn main() -> ExitCode {
    match run() {
        Ok(WorkflowStatus::Completed) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
