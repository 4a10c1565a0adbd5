//! Risk Ratings
//!
//! Per-category ratings and their reduction to one overall rating.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Severity of a risk, ordered from least to most severe.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Fixed set of rated categories.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    WirelessSecurity,
    NetworkSecurity,
    AccessControl,
    DataProtection,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 4] = [
        RiskCategory::WirelessSecurity,
        RiskCategory::NetworkSecurity,
        RiskCategory::AccessControl,
        RiskCategory::DataProtection,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::WirelessSecurity => "WiFi Security",
            Self::NetworkSecurity => "Network Security",
            Self::AccessControl => "Access Control",
            Self::DataProtection => "Data Protection",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reduces category ratings to one overall rating.
///
/// Any CRITICAL wins; two or more HIGH give HIGH; a single HIGH gives
/// MEDIUM; anything else is LOW.
pub fn overall_risk<I>(levels: I) -> RiskLevel
where
    I: IntoIterator<Item = RiskLevel>,
{
    let mut high = 0;
    for level in levels {
        match level {
            RiskLevel::Critical => return RiskLevel::Critical,
            RiskLevel::High => high += 1,
            _ => {}
        }
    }

    match high {
        0 => RiskLevel::Low,
        1 => RiskLevel::Medium,
        _ => RiskLevel::High,
    }
}

/// Ratings per category plus the overall rating.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub by_category: BTreeMap<RiskCategory, RiskLevel>,
    pub overall: RiskLevel,
}

impl RiskAssessment {
    pub fn from_categories(by_category: BTreeMap<RiskCategory, RiskLevel>) -> Self {
        let overall = overall_risk(by_category.values().copied());
        Self {
            by_category,
            overall,
        }
    }

    pub fn level(&self, category: RiskCategory) -> Option<RiskLevel> {
        self.by_category.get(&category).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_level() -> impl Strategy<Value = RiskLevel> {
        prop_oneof![
            Just(RiskLevel::Low),
            Just(RiskLevel::Medium),
            Just(RiskLevel::High),
            Just(RiskLevel::Critical),
        ]
    }

    #[test]
    fn test_overall_precedence() {
        use RiskLevel::*;
        assert_eq!(overall_risk([Low, Low, Low, Low]), Low);
        assert_eq!(overall_risk([Medium, Medium, Low, Low]), Low);
        assert_eq!(overall_risk([High, Medium, Low, Low]), Medium);
        assert_eq!(overall_risk([High, High, Low, Medium]), High);
        assert_eq!(overall_risk([High, High, High, Critical]), Critical);
    }

    #[test]
    fn test_assessment_from_categories() {
        let by_category: BTreeMap<_, _> = RiskCategory::ALL
            .iter()
            .map(|c| (*c, RiskLevel::High))
            .collect();
        let assessment = RiskAssessment::from_categories(by_category);

        assert_eq!(assessment.overall, RiskLevel::High);
        assert_eq!(assessment.level(RiskCategory::AccessControl), Some(RiskLevel::High));
    }

    #[test]
    fn test_display() {
        assert_eq!(RiskLevel::Critical.to_string(), "CRITICAL");
        assert_eq!(RiskCategory::WirelessSecurity.to_string(), "WiFi Security");
    }

    proptest! {
        #[test]
        fn test_any_critical_is_critical(
            mut levels in prop::collection::vec(any_level(), 4),
            slot in 0usize..4,
        ) {
            levels[slot] = RiskLevel::Critical;
            prop_assert_eq!(overall_risk(levels), RiskLevel::Critical);
        }

        #[test]
        fn test_overall_ignores_order(levels in prop::collection::vec(any_level(), 4)) {
            let mut reversed = levels.clone();
            reversed.reverse();
            prop_assert_eq!(overall_risk(levels), overall_risk(reversed));
        }

        #[test]
        fn test_overall_never_exceeds_worst(levels in prop::collection::vec(any_level(), 4)) {
            let worst = levels.iter().copied().max().unwrap_or(RiskLevel::Low);
            prop_assert!(overall_risk(levels) <= worst);
        }
    }
}
