//! Built-in Scenario Catalogue
//!
//! Ready-made scenarios that can be run by tag without a scenario file.

use std::fmt;
use std::str::FromStr;

use super::model::{Scenario, Step, StepType};

/// Scenarios compiled into the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinScenario {
    NetworkReconnaissance,
    CredentialHarvesting,
    LateralMovement,
    FullRedTeam,
    WifiPasswordAttack,
}

impl BuiltinScenario {
    pub const ALL: &'static [BuiltinScenario] = &[
        BuiltinScenario::NetworkReconnaissance,
        BuiltinScenario::CredentialHarvesting,
        BuiltinScenario::LateralMovement,
        BuiltinScenario::FullRedTeam,
        BuiltinScenario::WifiPasswordAttack,
    ];

    /// Tag accepted on the command line.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::NetworkReconnaissance => "network_reconnaissance",
            Self::CredentialHarvesting => "credential_harvesting",
            Self::LateralMovement => "lateral_movement",
            Self::FullRedTeam => "full_red_team",
            Self::WifiPasswordAttack => "wifi_password_attack",
        }
    }

    /// Display name of the scenario.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::NetworkReconnaissance => "Network Discovery & Analysis",
            Self::CredentialHarvesting => "Credential Attack & Harvesting",
            Self::LateralMovement => "Post-Exploitation Movement",
            Self::FullRedTeam => "Complete Red Team Engagement",
            Self::WifiPasswordAttack => "WiFi Password Audit",
        }
    }

    /// Builds the scenario definition.
    pub fn scenario(&self) -> Scenario {
        let steps = match self {
            Self::NetworkReconnaissance => vec![
                Step::new(StepType::WifiScan, "WiFi Network Discovery", true),
                Step::new(StepType::NetworkAnalysis, "Vulnerability Assessment", false),
                Step::new(StepType::TargetSelection, "Priority Target Identification", false),
            ],
            Self::CredentialHarvesting => vec![
                Step::new(StepType::SshBruteforce, "SSH Credential Attack", true),
                Step::new(StepType::DeployKeylogger, "Keylogger Deployment", false),
                Step::new(StepType::CredentialExtraction, "Credential Harvesting", false),
            ],
            Self::LateralMovement => vec![
                Step::new(StepType::PrivilegeEscalation, "Escalate Privileges", true),
                Step::new(StepType::PersistenceSetup, "Maintain Access", false),
                Step::new(StepType::NetworkPivot, "Lateral Movement", false),
            ],
            Self::FullRedTeam => vec![
                Step::new(StepType::Reconnaissance, "Initial Reconnaissance", true),
                Step::new(StepType::Exploitation, "Initial Compromise", true),
                Step::new(StepType::PostExploitation, "Post-Exploitation", false),
                Step::new(StepType::Persistence, "Maintain Persistence", false),
                Step::new(StepType::DataExfiltration, "Data Collection", false),
                Step::new(StepType::Cleanup, "Evidence Cleanup", false),
            ],
            Self::WifiPasswordAttack => vec![
                Step::new(StepType::WifiInterfaceSetup, "Configure Monitor Mode", true),
                Step::new(StepType::WifiNetworkScan, "Discover Networks", true),
                Step::new(StepType::WifiTargetSelection, "Select Target", false),
                Step::new(StepType::WifiHandshakeCapture, "Capture Handshake", true),
                Step::new(StepType::WifiDictionaryAttack, "Dictionary Attack", true),
                Step::new(StepType::WifiResultAnalysis, "Analyze Results", false),
            ],
        };

        Scenario::new(self.display_name(), steps)
    }
}

impl fmt::Display for BuiltinScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for BuiltinScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.tag() == tag)
            .ok_or_else(|| format!("Unknown built-in scenario: '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtins_are_non_empty() {
        for builtin in BuiltinScenario::ALL {
            let scenario = builtin.scenario();
            assert!(!scenario.is_empty(), "{} has no steps", builtin);
            assert_eq!(scenario.name, builtin.display_name());
        }
    }

    #[test]
    fn test_builtin_first_step_is_critical() {
        for builtin in BuiltinScenario::ALL {
            assert!(builtin.scenario().steps[0].critical);
        }
    }

    #[test]
    fn test_parse_builtin_tag() {
        let parsed: BuiltinScenario = "FULL_RED_TEAM".parse().unwrap();
        assert_eq!(parsed, BuiltinScenario::FullRedTeam);
        assert!("not_a_scenario".parse::<BuiltinScenario>().is_err());
    }

    #[test]
    fn test_network_reconnaissance_order() {
        let scenario = BuiltinScenario::NetworkReconnaissance.scenario();
        let types: Vec<StepType> = scenario.steps.iter().map(|s| s.step_type).collect();
        assert_eq!(
            types,
            vec![StepType::WifiScan, StepType::NetworkAnalysis, StepType::TargetSelection]
        );
    }
}
