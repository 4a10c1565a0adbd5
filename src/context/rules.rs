//! Extraction Rules
//!
//! Pattern-based extraction of networks, addresses, open services and
//! credentials from tool output, and the per-stage rule table that says
//! which extractors apply to which stage.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::workflow::{Credential, Stage, StepResult};

static NETWORK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Network:\s*([^\n]+)").expect("valid network pattern"));

static ADDRESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("valid address pattern")
});

static OPEN_PORT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)/(tcp|udp)\s+open").expect("valid port pattern"));

static CREDENTIAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([a-zA-Z0-9_]+):([a-zA-Z0-9_!@#$%^&*]+)").expect("valid credential pattern")
});

/// Network names announced as `Network: <name>` lines.
pub fn extract_networks(text: &str) -> Vec<String> {
    NETWORK_PATTERN
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// IPv4-looking addresses.
pub fn extract_addresses(text: &str) -> Vec<String> {
    ADDRESS_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Open services in `port/proto open` form, returned as `port/proto`.
pub fn extract_open_ports(text: &str) -> Vec<String> {
    OPEN_PORT_PATTERN
        .captures_iter(text)
        .map(|c| format!("{}/{}", &c[1], &c[2]))
        .collect()
}

/// `user:secret` pairs.
pub fn extract_credentials(text: &str) -> Vec<Credential> {
    CREDENTIAL_PATTERN
        .captures_iter(text)
        .map(|c| Credential::new(&c[1], &c[2]))
        .collect()
}

/// Which part of a result a rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    /// The opaque raw output
    RawOutput,
    /// The human-readable message
    Message,
}

impl TextSource {
    fn read<'a>(&self, result: &'a StepResult) -> Option<&'a str> {
        match self {
            Self::RawOutput => result.raw_output.as_deref(),
            Self::Message => Some(result.message.as_str()),
        }
    }
}

/// Everything a rule pulled out of one result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub networks: Vec<String>,
    pub addresses: Vec<String>,
    pub open_ports: Vec<String>,
    pub credentials: Vec<Credential>,
    /// The text the rule read, kept as a fact
    pub source_text: String,
}

/// Extraction rule for one stage.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRule {
    pub stage: Stage,
    pub source: TextSource,
    /// Skip failed results entirely
    pub requires_success: bool,
}

impl ExtractionRule {
    /// Runs the rule against a result.
    ///
    /// Returns `None` when the rule does not apply: the result failed and
    /// the rule requires success, or the source text is absent.
    pub fn extract(&self, result: &StepResult) -> Option<Extraction> {
        if self.requires_success && !result.success {
            return None;
        }

        let text = self.source.read(result)?;
        let mut extraction = Extraction {
            source_text: text.to_string(),
            ..Extraction::default()
        };

        match self.stage {
            Stage::Discovery => extraction.networks = extract_networks(text),
            Stage::Analysis => {
                extraction.addresses = extract_addresses(text);
                extraction.open_ports = extract_open_ports(text);
            }
            Stage::CredentialAttack => extraction.credentials = extract_credentials(text),
            Stage::Persistence => {}
        }

        Some(extraction)
    }
}

/// The rule table, one entry per stage.
pub static RULES: &[ExtractionRule] = &[
    ExtractionRule {
        stage: Stage::Discovery,
        source: TextSource::RawOutput,
        requires_success: true,
    },
    ExtractionRule {
        stage: Stage::Analysis,
        source: TextSource::RawOutput,
        requires_success: true,
    },
    ExtractionRule {
        stage: Stage::CredentialAttack,
        source: TextSource::Message,
        requires_success: true,
    },
    ExtractionRule {
        stage: Stage::Persistence,
        source: TextSource::Message,
        requires_success: false,
    },
];

/// Looks up the rule for a stage in a table.
pub fn rule_for(rules: &[ExtractionRule], stage: Stage) -> Option<&ExtractionRule> {
    rules.iter().find(|r| r.stage == stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StepType;

    #[test]
    fn test_extract_networks() {
        let text = "Network: HomeLab\nSignal: -40\nNetwork:   Guest 5G  \n";
        assert_eq!(extract_networks(text), vec!["HomeLab", "Guest 5G"]);
    }

    #[test]
    fn test_extract_addresses() {
        let text = "Nmap scan report for 10.0.0.5\nhost 192.168.1.20 is up";
        assert_eq!(extract_addresses(text), vec!["10.0.0.5", "192.168.1.20"]);
        assert!(extract_addresses("version 1.2.3").is_empty());
    }

    #[test]
    fn test_extract_open_ports() {
        let text = "22/tcp   open  ssh\n80/tcp closed http\n161/udp open snmp";
        assert_eq!(extract_open_ports(text), vec!["22/tcp", "161/udp"]);
    }

    #[test]
    fn test_extract_credentials() {
        let creds = extract_credentials("SUCCESS: admin:password123 root:toor!");
        assert_eq!(creds.len(), 2);
        assert_eq!(creds[0].username, "admin");
        assert_eq!(creds[0].secret(), "password123");
        assert_eq!(creds[1].secret(), "toor!");
    }

    #[test]
    fn test_every_stage_has_a_rule() {
        for stage in [
            Stage::Discovery,
            Stage::Analysis,
            Stage::CredentialAttack,
            Stage::Persistence,
        ] {
            assert!(rule_for(RULES, stage).is_some(), "missing rule for {}", stage);
        }
    }

    #[test]
    fn test_rule_skips_failed_results() {
        let rule = rule_for(RULES, Stage::Discovery).unwrap();
        let failed = StepResult::failure(StepType::WifiScan, "denied").with_output("Network: X");
        assert!(rule.extract(&failed).is_none());
    }

    #[test]
    fn test_rule_requires_source_text() {
        let rule = rule_for(RULES, Stage::Analysis).unwrap();
        let no_output = StepResult::success(StepType::NetworkAnalysis, "done");
        assert!(rule.extract(&no_output).is_none());
    }

    #[test]
    fn test_persistence_rule_reads_failures() {
        let rule = rule_for(RULES, Stage::Persistence).unwrap();
        let failed = StepResult::failure(StepType::DeployKeylogger, "timeout");
        let extraction = rule.extract(&failed).unwrap();
        assert_eq!(extraction.source_text, "timeout");
    }

    #[test]
    fn test_analysis_rule_extracts_both() {
        let rule = rule_for(RULES, Stage::Analysis).unwrap();
        let result = StepResult::success(StepType::NetworkAnalysis, "ok")
            .with_output("10.0.0.5\n22/tcp open ssh\n3389/tcp open rdp");
        let extraction = rule.extract(&result).unwrap();
        assert_eq!(extraction.addresses, vec!["10.0.0.5"]);
        assert_eq!(extraction.open_ports, vec!["22/tcp", "3389/tcp"]);
    }
}
