//! Result Correlation
//!
//! Post-hoc analysis of a finished run: findings per step type, inferred
//! attack paths, and a risk rating per category plus overall.
//!
//! - [`correlator`]: The correlation pass
//! - [`findings`]: Finding, AttackPath, CorrelatedFindings
//! - [`risk`]: RiskLevel, RiskCategory, RiskAssessment

pub mod correlator;
pub mod findings;
pub mod risk;

pub use correlator::ResultCorrelator;
pub use findings::{AttackPath, CorrelatedFindings, Finding};
pub use risk::{overall_risk, RiskAssessment, RiskCategory, RiskLevel};
