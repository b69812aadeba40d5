use crate::types::response::{RiskLabel, Severity};

/// Declared-severity-first derivation: prefer the CPIC record's own severity string
/// when it parses, else fall back to this risk_label-keyed table (spec.md §4.5 step 8).
pub fn severity_for_risk_label(risk_label: RiskLabel) -> Severity {
    match risk_label {
        RiskLabel::Toxic => Severity::Critical,
        RiskLabel::Ineffective => Severity::High,
        RiskLabel::Avoid => Severity::Critical,
        RiskLabel::UseAlternative => Severity::High,
        RiskLabel::AdjustDosage => Severity::Moderate,
        RiskLabel::StandardDosingRecommended => Severity::None,
        RiskLabel::Safe => Severity::None,
        RiskLabel::Unknown => Severity::Moderate,
        RiskLabel::NoSpecificCpicRecommendation => Severity::Moderate,
        RiskLabel::DrugNotSupported => Severity::None,
        RiskLabel::GeneDrugIntegrityError => Severity::None,
    }
}

pub fn parse_declared_severity(value: &str) -> Option<Severity> {
    match value.trim().to_ascii_lowercase().as_str() {
        "none" => Some(Severity::None),
        "low" => Some(Severity::Low),
        "moderate" => Some(Severity::Moderate),
        "high" => Some(Severity::High),
        "critical" => Some(Severity::Critical),
        "undetermined" => Some(Severity::Undetermined),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avoid_maps_to_critical() {
        assert_eq!(severity_for_risk_label(RiskLabel::Avoid), Severity::Critical);
    }

    #[test]
    fn standard_dosing_maps_to_none() {
        assert_eq!(
            severity_for_risk_label(RiskLabel::StandardDosingRecommended),
            Severity::None
        );
    }

    #[test]
    fn declared_severity_parses_case_insensitively() {
        assert_eq!(parse_declared_severity("HIGH"), Some(Severity::High));
        assert_eq!(parse_declared_severity("bogus"), None);
    }
}
