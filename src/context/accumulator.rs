//! Run Context Accumulation
//!
//! Each run owns a [`WorkflowContext`]. After every step the
//! [`ContextAccumulator`] feeds the step's result through the extraction
//! rule for its stage, and before every step it fills gaps in the step's
//! parameters from what earlier steps discovered.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;
use serde_json::Value;

use super::rules::{rule_for, ExtractionRule, RULES};
use crate::workflow::{Credential, Parameters, Stage, Step, StepResult};

/// Context keys written by the extraction rules.
pub mod keys {
    pub const DISCOVERED_NETWORKS: &str = "discovered_networks";
    pub const WIFI_SCAN_DATA: &str = "wifi_scan_data";
    pub const DISCOVERED_TARGETS: &str = "discovered_targets";
    pub const OPEN_PORTS: &str = "open_ports";
    pub const NETWORK_ANALYSIS_DATA: &str = "network_analysis_data";
    pub const BRUTEFORCE_RESULT: &str = "bruteforce_result";
    pub const ATTACK_SUCCESSFUL: &str = "attack_successful";
    pub const KEYLOGGER_DEPLOYED: &str = "keylogger_deployed";
    pub const KEYLOGGER_STATUS: &str = "keylogger_status";
    pub const PERSISTENCE_ESTABLISHED: &str = "persistence_established";
}

/// Prefix for targets discovered as wireless networks.
pub const NETWORK_TARGET_PREFIX: &str = "wifi:";

/// Prefix for targets discovered as host addresses.
pub const ADDRESS_TARGET_PREFIX: &str = "ip:";

/// Address probed when only wireless networks are known.
pub const DEFAULT_GATEWAY: &str = "192.168.1.1";

/// Run-scoped facts, targets and credentials.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowContext {
    values: BTreeMap<String, Value>,
    discovered_targets: Vec<String>,
    harvested_credentials: Vec<Credential>,
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a fact, returning the value it replaced.
    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Adds a target if it is not already known. Returns true if added.
    pub fn add_discovered_target(&mut self, target: impl Into<String>) -> bool {
        let target = target.into();
        if self.discovered_targets.contains(&target) {
            return false;
        }
        self.discovered_targets.push(target);
        true
    }

    /// Targets in discovery order.
    pub fn discovered_targets(&self) -> &[String] {
        &self.discovered_targets
    }

    pub fn add_harvested_credential(&mut self, credential: Credential) {
        self.harvested_credentials.push(credential);
    }

    /// Credentials in harvest order.
    pub fn harvested_credentials(&self) -> &[Credential] {
        &self.harvested_credentials
    }

    /// First discovered host address, without its prefix.
    pub fn first_address(&self) -> Option<&str> {
        self.discovered_targets
            .iter()
            .find_map(|t| t.strip_prefix(ADDRESS_TARGET_PREFIX))
    }

    /// Open services recorded by analysis, as `port/proto` strings.
    pub fn open_ports(&self) -> Vec<&str> {
        match self.values.get(keys::OPEN_PORTS) {
            Some(Value::Array(ports)) => ports.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// True if discovery recorded at least one network.
    pub fn has_discovered_networks(&self) -> bool {
        matches!(self.values.get(keys::DISCOVERED_NETWORKS), Some(Value::Array(n)) if !n.is_empty())
    }
}

/// Applies extraction rules to results and context to parameters.
#[derive(Debug, Clone)]
pub struct ContextAccumulator {
    rules: &'static [ExtractionRule],
}

impl ContextAccumulator {
    pub fn new() -> Self {
        Self { rules: RULES }
    }

    /// Feeds one step's result into the context.
    ///
    /// Steps without a stage, and results the stage rule rejects, leave
    /// the context untouched.
    pub fn enhance(&self, context: &mut WorkflowContext, step: &Step, result: &StepResult) {
        let Some(stage) = step.step_type.stage() else {
            return;
        };
        let Some(rule) = rule_for(self.rules, stage) else {
            return;
        };
        let Some(extraction) = rule.extract(result) else {
            debug!("No context extracted from '{}'", step.name);
            return;
        };

        match stage {
            Stage::Discovery => {
                if extraction.networks.is_empty() {
                    return;
                }
                for network in &extraction.networks {
                    context.add_discovered_target(format!("{}{}", NETWORK_TARGET_PREFIX, network));
                }
                context.set_value(keys::DISCOVERED_NETWORKS, extraction.networks.clone());
                context.set_value(keys::WIFI_SCAN_DATA, extraction.source_text);
            }
            Stage::Analysis => {
                for address in &extraction.addresses {
                    context.add_discovered_target(format!("{}{}", ADDRESS_TARGET_PREFIX, address));
                }
                context.set_value(keys::DISCOVERED_TARGETS, extraction.addresses);
                context.set_value(keys::OPEN_PORTS, extraction.open_ports);
                context.set_value(keys::NETWORK_ANALYSIS_DATA, extraction.source_text);
            }
            Stage::CredentialAttack => {
                for credential in extraction.credentials {
                    debug!("Harvested credential {}", credential);
                    context.add_harvested_credential(credential);
                }
                context.set_value(keys::BRUTEFORCE_RESULT, extraction.source_text);
                context.set_value(keys::ATTACK_SUCCESSFUL, true);
            }
            Stage::Persistence => {
                context.set_value(keys::KEYLOGGER_DEPLOYED, result.success);
                context.set_value(keys::KEYLOGGER_STATUS, extraction.source_text);
                if result.success {
                    context.set_value(keys::PERSISTENCE_ESTABLISHED, true);
                }
            }
        }
    }

    /// Builds the effective parameters for a step.
    ///
    /// Starts from the declared parameters and only fills keys the step
    /// left out. Missing context leaves the parameters as declared.
    pub fn build_parameters(&self, step: &Step, context: &WorkflowContext) -> Parameters {
        let mut params = step.parameters.clone();

        match step.step_type.stage() {
            Some(Stage::Analysis) => {
                if context.has_discovered_networks() {
                    fill(&mut params, "target", DEFAULT_GATEWAY);
                }
            }
            Some(Stage::CredentialAttack) => {
                if let Some(address) = context.first_address() {
                    fill(&mut params, "target", address);
                }
                if let Some(protocol) = infer_protocol(&context.open_ports()) {
                    fill(&mut params, "protocol", protocol);
                }
            }
            Some(Stage::Persistence) => {
                if let Some(credential) = context.harvested_credentials().last() {
                    fill(&mut params, "username", credential.username.as_str());
                    fill(&mut params, "use_credentials", true);
                }
            }
            Some(Stage::Discovery) | None => {}
        }

        params
    }
}

impl Default for ContextAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

fn fill(params: &mut Parameters, key: &str, value: impl Into<Value>) {
    params.entry(key.to_string()).or_insert_with(|| value.into());
}

/// SSH wins over RDP when both are open.
fn infer_protocol(open_ports: &[&str]) -> Option<&'static str> {
    if open_ports.iter().any(|p| p.starts_with("22/")) {
        Some("SSH")
    } else if open_ports.iter().any(|p| p.starts_with("3389/")) {
        Some("RDP")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StepType;

    fn step(step_type: StepType) -> Step {
        Step::new(step_type, step_type.as_str(), false)
    }

    fn discovered(context: &mut WorkflowContext, acc: &ContextAccumulator) {
        let result = StepResult::success(StepType::WifiScan, "scan done")
            .with_output("Network: Lab\nNetwork: Guest\n");
        acc.enhance(context, &step(StepType::WifiScan), &result);
    }

    fn analysed(context: &mut WorkflowContext, acc: &ContextAccumulator) {
        let result = StepResult::success(StepType::NetworkAnalysis, "hosts up")
            .with_output("10.0.0.5\n10.0.0.9\n22/tcp open ssh\n3389/tcp open ms-wbt-server");
        acc.enhance(context, &step(StepType::NetworkAnalysis), &result);
    }

    #[test]
    fn test_discovery_records_networks() {
        let acc = ContextAccumulator::new();
        let mut context = WorkflowContext::new();
        discovered(&mut context, &acc);

        assert_eq!(context.discovered_targets(), &["wifi:Lab", "wifi:Guest"]);
        assert!(context.has_discovered_networks());
        assert!(context.value(keys::WIFI_SCAN_DATA).is_some());
    }

    #[test]
    fn test_discovery_failure_is_ignored() {
        let acc = ContextAccumulator::new();
        let mut context = WorkflowContext::new();
        let result = StepResult::failure(StepType::WifiScan, "no card").with_output("Network: X");
        acc.enhance(&mut context, &step(StepType::WifiScan), &result);

        assert!(context.discovered_targets().is_empty());
        assert!(context.values().is_empty());
    }

    #[test]
    fn test_targets_are_deduplicated() {
        let acc = ContextAccumulator::new();
        let mut context = WorkflowContext::new();
        discovered(&mut context, &acc);
        discovered(&mut context, &acc);

        assert_eq!(context.discovered_targets().len(), 2);
        assert_eq!(context.values().len(), 2);
    }

    #[test]
    fn test_analysis_records_addresses_and_ports() {
        let acc = ContextAccumulator::new();
        let mut context = WorkflowContext::new();
        analysed(&mut context, &acc);

        assert_eq!(context.first_address(), Some("10.0.0.5"));
        assert_eq!(context.open_ports(), vec!["22/tcp", "3389/tcp"]);
    }

    #[test]
    fn test_credentials_are_append_only() {
        let acc = ContextAccumulator::new();
        let mut context = WorkflowContext::new();
        let brute = step(StepType::SshBruteforce);

        let mut last_len = 0;
        for message in ["SUCCESS: admin:pass1", "no hits", "SUCCESS: root:toor"] {
            let result = StepResult::success(StepType::SshBruteforce, message);
            acc.enhance(&mut context, &brute, &result);
            assert!(context.harvested_credentials().len() >= last_len);
            last_len = context.harvested_credentials().len();
        }

        let users: Vec<_> = context
            .harvested_credentials()
            .iter()
            .map(|c| c.username.as_str())
            .collect();
        assert_eq!(users, vec!["admin", "root"]);
        assert_eq!(context.value(keys::ATTACK_SUCCESSFUL), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_persistence_records_failure() {
        let acc = ContextAccumulator::new();
        let mut context = WorkflowContext::new();
        let result = StepResult::failure(StepType::DeployKeylogger, "target unreachable");
        acc.enhance(&mut context, &step(StepType::DeployKeylogger), &result);

        assert_eq!(context.value(keys::KEYLOGGER_DEPLOYED), Some(&Value::Bool(false)));
        assert!(context.value(keys::PERSISTENCE_ESTABLISHED).is_none());
    }

    #[test]
    fn test_stageless_step_is_ignored() {
        let acc = ContextAccumulator::new();
        let mut context = WorkflowContext::new();
        let result = StepResult::success(StepType::Cleanup, "admin:secret").with_output("10.0.0.1");
        acc.enhance(&mut context, &step(StepType::Cleanup), &result);

        assert!(context.values().is_empty());
        assert!(context.harvested_credentials().is_empty());
    }

    #[test]
    fn test_build_parameters_without_context() {
        let acc = ContextAccumulator::new();
        let context = WorkflowContext::new();
        let declared = step(StepType::SshBruteforce).with_parameter("wordlist", "top100.txt");

        assert_eq!(acc.build_parameters(&declared, &context), declared.parameters);
    }

    #[test]
    fn test_build_parameters_fills_attack_target() {
        let acc = ContextAccumulator::new();
        let mut context = WorkflowContext::new();
        discovered(&mut context, &acc);
        analysed(&mut context, &acc);

        let params = acc.build_parameters(&step(StepType::SshBruteforce), &context);
        assert_eq!(params.get("target"), Some(&Value::from("10.0.0.5")));
        assert_eq!(params.get("protocol"), Some(&Value::from("SSH")));

        let analysis = acc.build_parameters(&step(StepType::NetworkAnalysis), &context);
        assert_eq!(analysis.get("target"), Some(&Value::from(DEFAULT_GATEWAY)));
    }

    #[test]
    fn test_build_parameters_declared_wins() {
        let acc = ContextAccumulator::new();
        let mut context = WorkflowContext::new();
        analysed(&mut context, &acc);

        let declared = step(StepType::Bruteforce).with_parameter("target", "172.16.0.1");
        let params = acc.build_parameters(&declared, &context);
        assert_eq!(params.get("target"), Some(&Value::from("172.16.0.1")));
    }

    #[test]
    fn test_build_parameters_uses_latest_credential() {
        let acc = ContextAccumulator::new();
        let mut context = WorkflowContext::new();
        context.add_harvested_credential(Credential::new("first", "a"));
        context.add_harvested_credential(Credential::new("latest", "b"));

        let params = acc.build_parameters(&step(StepType::DeployKeylogger), &context);
        assert_eq!(params.get("username"), Some(&Value::from("latest")));
        assert_eq!(params.get("use_credentials"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_infer_protocol() {
        assert_eq!(infer_protocol(&["3389/tcp"]), Some("RDP"));
        assert_eq!(infer_protocol(&["3389/tcp", "22/tcp"]), Some("SSH"));
        assert_eq!(infer_protocol(&["80/tcp"]), None);
    }
}
