//! Result Correlator
//!
//! Turns a run's ordered step results into findings, attack paths and a
//! risk assessment. Only step types that map to a [`Stage`] contribute.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};

use super::findings::{AttackPath, CorrelatedFindings, Finding};
use super::risk::{RiskAssessment, RiskCategory, RiskLevel};
use crate::context::rules::{
    extract_addresses, extract_credentials, extract_networks, extract_open_ports,
};
use crate::workflow::{Stage, StepResult, StepType};

/// Marker a credential attack puts in its message on a hit.
const CREDENTIAL_HIT_MARKER: &str = "SUCCESS";

/// Probability of a two-stage path; it is only reported once both stages succeeded.
const PATH_PROBABILITY: f64 = 1.0;

/// Probability given to the full chain when every stage succeeded.
const FULL_CHAIN_PROBABILITY: f64 = 0.95;

struct PathTemplate {
    name: &'static str,
    requires: &'static [Stage],
    stages: &'static [&'static str],
}

const PATHS: &[PathTemplate] = &[
    PathTemplate {
        name: "Network Reconnaissance",
        requires: &[Stage::Discovery, Stage::Analysis],
        stages: &["WiFi Discovery", "Network Scanning", "Target Identification"],
    },
    PathTemplate {
        name: "Credential Attack",
        requires: &[Stage::Analysis, Stage::CredentialAttack],
        stages: &["Service Discovery", "Brute Force Attack", "Access Gained"],
    },
    PathTemplate {
        name: "Post-Exploitation",
        requires: &[Stage::CredentialAttack, Stage::Persistence],
        stages: &["Initial Access", "Persistence Setup", "Data Collection"],
    },
];

const FULL_CHAIN: PathTemplate = PathTemplate {
    name: "Complete Attack Chain",
    requires: &[
        Stage::Discovery,
        Stage::Analysis,
        Stage::CredentialAttack,
        Stage::Persistence,
    ],
    stages: &["Reconnaissance", "Exploitation", "Post-Exploitation", "Persistence"],
};

/// Post-hoc analysis of a run's results.
#[derive(Debug, Clone, Default)]
pub struct ResultCorrelator;

impl ResultCorrelator {
    pub fn new() -> Self {
        Self
    }

    pub fn correlate(&self, results: &[StepResult]) -> CorrelatedFindings {
        info!("Correlating {} step results", results.len());

        let findings = extract_findings(results);
        let attack_paths = infer_attack_paths(results);
        let risk = assess_risk(results);

        debug!(
            "Correlation produced {} findings, {} attack paths, overall risk {}",
            findings.values().map(Vec::len).sum::<usize>(),
            attack_paths.len(),
            risk.overall
        );

        CorrelatedFindings {
            findings,
            attack_paths,
            risk,
        }
    }
}

fn findings_for(stage: Stage, result: &StepResult) -> Vec<Finding> {
    let data = result.raw_output.as_deref();

    match stage {
        Stage::Discovery => data
            .map(extract_networks)
            .unwrap_or_default()
            .into_iter()
            .map(Finding::WirelessNetwork)
            .collect(),
        Stage::Analysis => {
            let Some(data) = data else {
                return Vec::new();
            };
            extract_open_ports(data)
                .into_iter()
                .map(Finding::OpenPort)
                .chain(extract_addresses(data).into_iter().map(Finding::TargetAddress))
                .collect()
        }
        Stage::CredentialAttack => {
            if result.success && result.message.contains(CREDENTIAL_HIT_MARKER) {
                let username = extract_credentials(&result.message)
                    .into_iter()
                    .next()
                    .map(|c| c.username);
                vec![Finding::CredentialFound(username)]
            } else {
                vec![Finding::AttackStatus(result.message.clone())]
            }
        }
        Stage::Persistence => {
            if result.success {
                vec![Finding::PersistenceActive, Finding::DataCollectionEnabled]
            } else {
                vec![Finding::PersistenceFailed(result.message.clone())]
            }
        }
    }
}

fn extract_findings(results: &[StepResult]) -> BTreeMap<StepType, Vec<Finding>> {
    let mut findings: BTreeMap<_, Vec<Finding>> = BTreeMap::new();

    for result in results {
        let entry = findings.entry(result.label).or_default();
        if let Some(stage) = result.label.stage() {
            entry.extend(findings_for(stage, result));
        }
    }

    findings
}

fn successful_stages(results: &[StepResult]) -> BTreeSet<Stage> {
    results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| r.label.stage())
        .collect()
}

fn infer_attack_paths(results: &[StepResult]) -> Vec<AttackPath> {
    let succeeded = successful_stages(results);
    let mut paths = Vec::new();

    for template in PATHS {
        if template.requires.iter().all(|s| succeeded.contains(s)) {
            paths.push(AttackPath::new(template.name, template.stages, PATH_PROBABILITY));
        }
    }

    if FULL_CHAIN.requires.iter().all(|s| succeeded.contains(s)) {
        paths.push(AttackPath::new(
            FULL_CHAIN.name,
            FULL_CHAIN.stages,
            FULL_CHAIN_PROBABILITY,
        ));
    }

    paths
}

fn any_result<F>(results: &[StepResult], stage: Stage, predicate: F) -> bool
where
    F: Fn(&StepResult) -> bool,
{
    results
        .iter()
        .filter(|r| r.label.stage() == Some(stage))
        .any(predicate)
}

fn data_mentions_open(result: &StepResult) -> bool {
    result
        .raw_output
        .as_deref()
        .map_or(false, |data| data.contains("open"))
}

fn assess_risk(results: &[StepResult]) -> RiskAssessment {
    let mut by_category = BTreeMap::new();

    let open_wireless = any_result(results, Stage::Discovery, data_mentions_open);
    by_category.insert(
        RiskCategory::WirelessSecurity,
        if open_wireless { RiskLevel::High } else { RiskLevel::Medium },
    );

    let open_services = any_result(results, Stage::Analysis, data_mentions_open);
    by_category.insert(
        RiskCategory::NetworkSecurity,
        if open_services { RiskLevel::High } else { RiskLevel::Low },
    );

    let weak_credentials = any_result(results, Stage::CredentialAttack, |r| r.success);
    by_category.insert(
        RiskCategory::AccessControl,
        if weak_credentials { RiskLevel::Critical } else { RiskLevel::Medium },
    );

    let persistence = any_result(results, Stage::Persistence, |r| r.success);
    by_category.insert(
        RiskCategory::DataProtection,
        if persistence { RiskLevel::Critical } else { RiskLevel::Low },
    );

    RiskAssessment::from_categories(by_category)
}
