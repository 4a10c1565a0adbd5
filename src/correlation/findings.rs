//! Correlated Findings
//!
//! What correlation produces from a run's results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use super::risk::RiskAssessment;
use crate::workflow::StepType;

/// One observation extracted from a step result.
///
/// Credentials only ever carry the username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    WirelessNetwork(String),
    OpenPort(String),
    TargetAddress(String),
    /// Username of the first credential in the message, if one was found
    CredentialFound(Option<String>),
    AttackStatus(String),
    PersistenceActive,
    DataCollectionEnabled,
    PersistenceFailed(String),
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WirelessNetwork(ssid) => write!(f, "WiFi Network: {}", ssid),
            Self::OpenPort(port) => write!(f, "Open Port: {}", port),
            Self::TargetAddress(ip) => write!(f, "Target IP: {}", ip),
            Self::CredentialFound(Some(user)) => write!(f, "Credential Found: {}:***", user),
            Self::CredentialFound(None) => f.write_str("Credential Found: Found valid credentials"),
            Self::AttackStatus(message) => write!(f, "Attack Status: {}", message),
            Self::PersistenceActive => f.write_str("Keylogger Status: Active"),
            Self::DataCollectionEnabled => f.write_str("Data Collection: Enabled"),
            Self::PersistenceFailed(message) => write!(f, "Keylogger Status: Failed - {}", message),
        }
    }
}

impl Serialize for Finding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// An inferred chain of successful stages.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AttackPath {
    pub name: String,
    pub stages: Vec<String>,
    /// Estimated likelihood in `[0, 1]`
    pub probability: f64,
}

impl AttackPath {
    pub fn new(name: &str, stages: &[&str], probability: f64) -> Self {
        Self {
            name: name.to_string(),
            stages: stages.iter().map(|s| s.to_string()).collect(),
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

/// Everything correlation produced for one run.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CorrelatedFindings {
    /// Findings grouped by the step type that produced them
    pub findings: BTreeMap<StepType, Vec<Finding>>,
    pub attack_paths: Vec<AttackPath>,
    pub risk: RiskAssessment,
}

impl CorrelatedFindings {
    pub fn total_findings(&self) -> usize {
        self.findings.values().map(Vec::len).sum()
    }

    /// Findings for one step type, empty if it never ran.
    pub fn for_step_type(&self, step_type: StepType) -> &[Finding] {
        self.findings
            .get(&step_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn most_likely_path(&self) -> Option<&AttackPath> {
        self.attack_paths
            .iter()
            .max_by(|a, b| a.probability.total_cmp(&b.probability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_display() {
        assert_eq!(
            Finding::CredentialFound(Some("admin".into())).to_string(),
            "Credential Found: admin:***"
        );
        assert_eq!(
            Finding::PersistenceFailed("timeout".into()).to_string(),
            "Keylogger Status: Failed - timeout"
        );
        assert_eq!(Finding::OpenPort("22/tcp".into()).to_string(), "Open Port: 22/tcp");
    }

    #[test]
    fn test_finding_serializes_as_text() {
        let json = serde_json::to_string(&Finding::WirelessNetwork("Lab".into())).unwrap();
        assert_eq!(json, "\"WiFi Network: Lab\"");
    }

    #[test]
    fn test_attack_path_probability_clamped() {
        let path = AttackPath::new("Odd", &["a"], 1.5);
        assert_eq!(path.probability, 1.0);
        assert_eq!(path.stages, vec!["a"]);
    }
}
