//! Settings File
//!
//! Operator settings loaded from YAML. Every section is optional and
//! every field falls back to its default.
//!
//! ```yaml
//! engine:
//!   max_concurrent_runs: 5
//! resources:
//!   max_threads: 20
//!   max_memory_mb: 512
//!   lock_wait_ms: 5000
//! tools:
//!   wifi_scan:
//!     command: "iw dev {interface} scan"
//!     resource: wlan0
//! ```

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::execution::engine::DEFAULT_MAX_CONCURRENT_RUNS;
use crate::execution::ToolCommand;
use crate::resource::ResourceLimits;
use crate::workflow::StepType;

/// Engine section.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// Runs driven at once; later runs stay PENDING until a slot frees
    pub max_concurrent_runs: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_runs: DEFAULT_MAX_CONCURRENT_RUNS,
        }
    }
}

/// Top-level settings file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub resources: ResourceLimits,
    /// Command template per step type
    pub tools: BTreeMap<StepType, ToolCommand>,
}

/// Loads settings from a YAML file.
pub fn load_settings(path: &str) -> Result<Settings, Box<dyn Error>> {
    info!("Loading settings from: {}", path);

    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read settings file '{}': {}", path, e))?;

    let settings: Settings = if content.trim().is_empty() {
        Settings::default()
    } else {
        serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse settings YAML: {}", e))?
    };

    if settings.engine.max_concurrent_runs == 0 {
        return Err("engine.max_concurrent_runs must be at least 1".into());
    }

    debug!(
        "Settings: {} concurrent runs, {} tool commands, {} resources",
        settings.engine.max_concurrent_runs,
        settings.tools.len(),
        settings.resources.resources.len()
    );

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_settings(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.engine.max_concurrent_runs, 5);
        assert_eq!(settings.resources.max_threads, 20);
        assert!(settings.tools.is_empty());
    }

    #[test]
    fn test_load_partial_settings() {
        let file = write_settings(
            r#"
resources:
  max_memory_mb: 1024
tools:
  ssh_bruteforce:
    command: "hydra -t {threads} ssh://{target}"
  wifi_scan:
    command: "iw dev {interface} scan"
    resource: wlan1
"#,
        );

        let settings = load_settings(file.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.engine.max_concurrent_runs, 5);
        assert_eq!(settings.resources.max_memory_mb, 1024);
        assert_eq!(settings.resources.max_threads, 20);
        assert_eq!(settings.tools.len(), 2);
        assert_eq!(
            settings.tools[&StepType::WifiScan].resource.as_deref(),
            Some("wlan1")
        );
    }

    #[test]
    fn test_empty_file_is_default() {
        let file = write_settings("");
        assert_eq!(load_settings(file.path().to_str().unwrap()).unwrap(), Settings::default());
    }

    #[test]
    fn test_zero_runs_rejected() {
        let file = write_settings("engine:\n  max_concurrent_runs: 0\n");
        assert!(load_settings(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_unknown_step_type_rejected() {
        let file = write_settings("tools:\n  teleport:\n    command: beam\n");
        assert!(load_settings(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_settings("/nonexistent/settings.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
