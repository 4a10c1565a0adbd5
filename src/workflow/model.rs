//! Scenario Data Model
//!
//! Core data structures describing scenarios, their steps, and the
//! results a step produces.
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: Perimeter Sweep
//! steps:
//!   - type: wifi_scan
//!     name: Wireless Discovery
//!     critical: true
//!     parameters:
//!       interface: wlan0
//!
//!   - type: network_analysis
//!     name: Service Enumeration
//!
//!   - type: ssh_bruteforce
//!     name: Credential Audit
//!     parameters:
//!       wordlist: common.txt
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters handed to a tool invocation, keyed by name.
pub type Parameters = BTreeMap<String, Value>;

/// Closed set of step types known to the engine.
///
/// The YAML/JSON tag of each variant is its snake_case name
/// (e.g. `wifi_scan`, `ssh_bruteforce`).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    WifiScan,
    NetworkAnalysis,
    TargetSelection,
    SshBruteforce,
    Bruteforce,
    DeployKeylogger,
    CredentialExtraction,
    PrivilegeEscalation,
    PersistenceSetup,
    NetworkPivot,
    Reconnaissance,
    Exploitation,
    PostExploitation,
    Persistence,
    DataExfiltration,
    Cleanup,
    WifiInterfaceSetup,
    WifiNetworkScan,
    WifiTargetSelection,
    WifiHandshakeCapture,
    WifiDictionaryAttack,
    WifiResultAnalysis,
}

impl StepType {
    /// Every step type, in declaration order.
    pub const ALL: &'static [StepType] = &[
        StepType::WifiScan,
        StepType::NetworkAnalysis,
        StepType::TargetSelection,
        StepType::SshBruteforce,
        StepType::Bruteforce,
        StepType::DeployKeylogger,
        StepType::CredentialExtraction,
        StepType::PrivilegeEscalation,
        StepType::PersistenceSetup,
        StepType::NetworkPivot,
        StepType::Reconnaissance,
        StepType::Exploitation,
        StepType::PostExploitation,
        StepType::Persistence,
        StepType::DataExfiltration,
        StepType::Cleanup,
        StepType::WifiInterfaceSetup,
        StepType::WifiNetworkScan,
        StepType::WifiTargetSelection,
        StepType::WifiHandshakeCapture,
        StepType::WifiDictionaryAttack,
        StepType::WifiResultAnalysis,
    ];

    /// Returns the tag used in scenario files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WifiScan => "wifi_scan",
            Self::NetworkAnalysis => "network_analysis",
            Self::TargetSelection => "target_selection",
            Self::SshBruteforce => "ssh_bruteforce",
            Self::Bruteforce => "bruteforce",
            Self::DeployKeylogger => "deploy_keylogger",
            Self::CredentialExtraction => "credential_extraction",
            Self::PrivilegeEscalation => "privilege_escalation",
            Self::PersistenceSetup => "persistence_setup",
            Self::NetworkPivot => "network_pivot",
            Self::Reconnaissance => "reconnaissance",
            Self::Exploitation => "exploitation",
            Self::PostExploitation => "post_exploitation",
            Self::Persistence => "persistence",
            Self::DataExfiltration => "data_exfiltration",
            Self::Cleanup => "cleanup",
            Self::WifiInterfaceSetup => "wifi_interface_setup",
            Self::WifiNetworkScan => "wifi_network_scan",
            Self::WifiTargetSelection => "wifi_target_selection",
            Self::WifiHandshakeCapture => "wifi_handshake_capture",
            Self::WifiDictionaryAttack => "wifi_dictionary_attack",
            Self::WifiResultAnalysis => "wifi_result_analysis",
        }
    }

    /// Returns the correlation stage this step type feeds, if any.
    ///
    /// Only stage-bearing step types take part in context extraction,
    /// parameter enrichment and attack-path inference.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::WifiScan => Some(Stage::Discovery),
            Self::NetworkAnalysis => Some(Stage::Analysis),
            Self::SshBruteforce | Self::Bruteforce => Some(Stage::CredentialAttack),
            Self::DeployKeylogger => Some(Stage::Persistence),
            _ => None,
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| format!("Unknown step type: '{}'", tag))
    }
}

/// The four stages that correlation reasons about.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Wireless / network discovery
    Discovery,
    /// Host and service analysis
    Analysis,
    /// Credential attacks against discovered services
    CredentialAttack,
    /// Establishing a foothold on a compromised host
    Persistence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discovery => "discovery",
            Self::Analysis => "analysis",
            Self::CredentialAttack => "credential_attack",
            Self::Persistence => "persistence",
        };
        f.write_str(name)
    }
}

/// A single step in a scenario.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Step {
    /// What kind of work this step performs
    #[serde(rename = "type")]
    pub step_type: StepType,

    /// Display name
    pub name: String,

    /// Whether a failure of this step aborts the whole run
    #[serde(default)]
    pub critical: bool,

    /// Declared parameters; the engine works on a per-run copy
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: Parameters,
}

impl Step {
    /// Creates a new step.
    ///
    /// # Example
    ///
    /// ```
    /// use scenario_runner::workflow::{Step, StepType};
    ///
    /// let step = Step::new(StepType::WifiScan, "Wireless Discovery", true)
    ///     .with_parameter("interface", "wlan0");
    /// assert!(step.critical);
    /// ```
    pub fn new(step_type: StepType, name: impl Into<String>, critical: bool) -> Self {
        Self {
            step_type,
            name: name.into().trim().to_string(),
            critical,
            parameters: Parameters::new(),
        }
    }

    /// Adds a declared parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// An immutable, ordered sequence of steps.
///
/// Step order is fixed: the engine executes steps exactly in the order
/// they appear here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Display name
    pub name: String,

    /// Ordered steps
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Creates a scenario from a list of steps.
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            steps,
        }
    }

    /// Returns the number of steps in the scenario.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the scenario has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the critical steps in order.
    pub fn critical_steps(&self) -> Vec<&Step> {
        self.steps.iter().filter(|s| s.critical).collect()
    }
}

/// Outcome of one step invocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Step type that produced this result
    pub label: StepType,
    /// Human-readable summary
    pub message: String,
    /// Whether the step succeeded
    pub success: bool,
    /// Raw tool output, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

impl StepResult {
    /// Creates a successful result.
    pub fn success(label: StepType, message: impl Into<String>) -> Self {
        Self {
            label,
            message: message.into(),
            success: true,
            raw_output: None,
        }
    }

    /// Creates a failed result.
    pub fn failure(label: StepType, message: impl Into<String>) -> Self {
        Self {
            label,
            message: message.into(),
            success: false,
            raw_output: None,
        }
    }

    /// Attaches raw tool output.
    pub fn with_output(mut self, raw: impl Into<String>) -> Self {
        self.raw_output = Some(raw.into());
        self
    }
}

/// A username/secret pair harvested during a run.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    #[serde(skip_serializing)]
    secret: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

// Secrets never reach logs through Debug or Display.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"***")
            .finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:***", self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_creation() {
        let step = Step::new(StepType::SshBruteforce, "  Credential Audit ", true)
            .with_parameter("target", "10.0.0.5")
            .with_parameter("port", 22);

        assert_eq!(step.name, "Credential Audit");
        assert!(step.critical);
        assert_eq!(step.parameters.get("port"), Some(&Value::from(22)));
    }

    #[test]
    fn test_step_type_roundtrip_tags() {
        for step_type in StepType::ALL {
            let parsed: StepType = step_type.as_str().parse().unwrap();
            assert_eq!(parsed, *step_type);
        }
    }

    #[test]
    fn test_step_type_unknown_tag() {
        let result = "port_knock".parse::<StepType>();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("port_knock"));
    }

    #[test]
    fn test_step_type_serde_tag_matches_as_str() {
        let json = serde_json::to_string(&StepType::DeployKeylogger).unwrap();
        assert_eq!(json, "\"deploy_keylogger\"");
    }

    #[test]
    fn test_stage_mapping() {
        assert_eq!(StepType::WifiScan.stage(), Some(Stage::Discovery));
        assert_eq!(StepType::NetworkAnalysis.stage(), Some(Stage::Analysis));
        assert_eq!(StepType::SshBruteforce.stage(), Some(Stage::CredentialAttack));
        assert_eq!(StepType::Bruteforce.stage(), Some(Stage::CredentialAttack));
        assert_eq!(StepType::DeployKeylogger.stage(), Some(Stage::Persistence));
        assert_eq!(StepType::Cleanup.stage(), None);
    }

    #[test]
    fn test_scenario_yaml_parsing() {
        let yaml = r#"
name: Sweep
steps:
  - type: wifi_scan
    name: Discover
    critical: true
    parameters:
      interface: wlan0
  - type: network_analysis
    name: Analyse
"#;
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.len(), 2);
        assert_eq!(scenario.steps[0].step_type, StepType::WifiScan);
        assert!(!scenario.steps[1].critical);
        assert!(scenario.steps[1].parameters.is_empty());
        assert_eq!(scenario.critical_steps().len(), 1);
    }

    #[test]
    fn test_step_result_builders() {
        let ok = StepResult::success(StepType::WifiScan, "found 2").with_output("Network: lab");
        assert!(ok.success);
        assert_eq!(ok.raw_output.as_deref(), Some("Network: lab"));

        let failed = StepResult::failure(StepType::WifiScan, "no interface");
        assert!(!failed.success);
        assert!(failed.raw_output.is_none());
    }

    #[test]
    fn test_credential_masks_secret() {
        let cred = Credential::new("admin", "hunter2");
        assert_eq!(cred.to_string(), "admin:***");
        assert!(!format!("{:?}", cred).contains("hunter2"));
        assert_eq!(cred.secret(), "hunter2");
    }
}
