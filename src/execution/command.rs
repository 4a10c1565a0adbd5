//! Command-Backed Tools
//!
//! Runs an operator-configured shell command for each step type.
//! Handles:
//! - `{param}` placeholder substitution from the effective parameters
//! - Script generation
//! - Output capture and exit-code mapping

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use uuid::Uuid;

use super::tool::{ToolAdapter, ToolError};
use crate::workflow::{Parameters, StepResult, StepType};

/// Command template for one step type.
///
/// ```yaml
/// wifi_scan:
///   command: "iw dev {interface} scan | grep SSID"
///   resource: wlan0
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolCommand {
    /// Shell command; `{name}` is replaced by the parameter `name`
    pub command: String,

    /// Resource to hold while the command runs, when the step has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl ToolCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            resource: None,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }
}

/// [`ToolAdapter`] that runs configured shell commands with bash.
///
/// A zero exit status is a successful step whose message is the last
/// non-empty line of stdout; any other exit is a [`ToolError::Failed`].
pub struct CommandToolAdapter {
    commands: BTreeMap<StepType, ToolCommand>,
    working_dir: Option<PathBuf>,
    script_dir: PathBuf,
}

impl CommandToolAdapter {
    pub fn new(commands: BTreeMap<StepType, ToolCommand>) -> Self {
        Self {
            commands,
            working_dir: None,
            script_dir: std::env::temp_dir().join("scenario_runner_scripts"),
        }
    }

    /// Sets the working directory for every command.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Step types that have a command configured.
    pub fn configured(&self) -> Vec<StepType> {
        self.commands.keys().copied().collect()
    }
}

#[async_trait]
impl ToolAdapter for CommandToolAdapter {
    async fn invoke(&self, step_type: StepType, params: Parameters) -> Result<StepResult, ToolError> {
        let template = self
            .commands
            .get(&step_type)
            .ok_or(ToolError::Unsupported(step_type))?;

        let command_text = render_command(&template.command, &params);
        debug!("{} command: {}", step_type, command_text);

        let script = create_execution_script(&self.script_dir, step_type, &command_text)?;
        let output = execute_with_bash(script.path(), self.working_dir.as_deref()).await?;
        drop(script);

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if output.status.success() {
            let message = stdout
                .lines()
                .rev()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} completed", step_type));

            debug!("{} completed successfully", step_type);
            Ok(StepResult::success(step_type, message).with_output(stdout))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(
                "{} failed with exit code: {:?}",
                step_type,
                output.status.code()
            );
            if !stderr.is_empty() {
                error!("stderr:\n{}", stderr);
            }

            Err(ToolError::Failed {
                code: output.status.code(),
                stderr,
            })
        }
    }

    fn resource_for(&self, step_type: StepType, params: &Parameters) -> Option<String> {
        params
            .get(super::tool::RESOURCE_PARAMETER)
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                self.commands
                    .get(&step_type)
                    .and_then(|c| c.resource.clone())
            })
    }
}

/// Replaces `{name}` placeholders with parameter values.
///
/// Strings are inserted bare, other values in their JSON form.
/// Placeholders without a matching parameter are left as written.
pub fn render_command(template: &str, params: &Parameters) -> String {
    params.iter().fold(template.to_string(), |text, (key, value)| {
        let placeholder = format!("{{{}}}", key);
        if !text.contains(&placeholder) {
            return text;
        }
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        text.replace(&placeholder, &rendered)
    })
}

/// Generated script, removed when dropped.
struct ScriptFile(PathBuf);

impl ScriptFile {
    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScriptFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.0) {
            warn!("Failed to clean up script {}: {}", self.0.display(), e);
        }
    }
}

/// Creates a bash script for one invocation.
fn create_execution_script(
    script_dir: &Path,
    step_type: StepType,
    command_text: &str,
) -> Result<ScriptFile, ToolError> {
    let launch = |e: std::io::Error| ToolError::Launch(e.to_string());

    fs::create_dir_all(script_dir).map_err(launch)?;

    let script = ScriptFile(script_dir.join(format!("{}_{}.sh", step_type, Uuid::now_v7())));
    let mut file = File::create(script.path()).map_err(launch)?;

    writeln!(file, "#!/bin/bash").map_err(launch)?;
    writeln!(file, "set -e").map_err(launch)?;
    writeln!(file, "{}", command_text).map_err(launch)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(script.path(), fs::Permissions::from_mode(0o755)).map_err(launch)?;
    }

    Ok(script)
}

/// Executes a script with bash.
///
/// The child is killed if the returned future is dropped, so a step
/// that times out or is aborted leaves no process behind.
async fn execute_with_bash(script_path: &Path, working_dir: Option<&Path>) -> Result<Output, ToolError> {
    let mut cmd = Command::new("bash");
    cmd.arg(script_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
        debug!("Executing in directory: {}", dir.display());
    }

    let child = cmd
        .spawn()
        .map_err(|e| ToolError::Launch(format!("failed to run bash: {}", e)))?;

    child
        .wait_with_output()
        .await
        .map_err(|e| ToolError::Launch(format!("failed to collect output: {}", e)))
}
