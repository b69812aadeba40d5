//! Deterministic CPIC-text -> canonical risk_label keyword tree (spec.md §4.5 step
//! 7). Pattern matching on structured fields only, never free-form NLP.

use crate::types::response::RiskLabel;

/// Maps a CPIC recommendation's summary + implication text, together with its
/// declared severity, to a canonical risk label. "standard starting dose"-style
/// keywords are ignored when the declared severity is high or critical, because in
/// those records the phrase is a dosing-calculation reference ("initiate at 20-50%
/// of standard starting dose"), not a recommendation to dose normally.
pub fn classify_risk_from_cpic_text(risk_text: &str, implication_text: &str, severity: &str) -> RiskLabel {
    let combined = format!("{risk_text} {implication_text}").to_ascii_lowercase();
    let severity_lower = severity.to_ascii_lowercase();

    if contains_any(&combined, &["avoid", "contraindicated", "do not use"]) {
        return RiskLabel::Avoid;
    }

    if contains_any(
        &combined,
        &["increased risk of toxicity", "life-threatening", "fatal", "severe toxicity"],
    ) {
        return RiskLabel::Toxic;
    }

    if contains_any(&combined, &["lack of efficacy", "ineffective", "no therapeutic effect"]) {
        return RiskLabel::Ineffective;
    }

    if contains_any(
        &combined,
        &[
            "alternative antiplatelet",
            "alternative therapy",
            "consider alternative",
            "use an alternative",
        ],
    ) {
        return RiskLabel::UseAlternative;
    }

    if contains_any(
        &combined,
        &[
            "reduce dose",
            "lower dose",
            "decreased dose",
            "dose reduction",
            "reduced starting dose",
            "20-50%",
            "25-50%",
        ],
    ) {
        return RiskLabel::AdjustDosage;
    }

    if !matches!(severity_lower.as_str(), "high" | "critical")
        && contains_any(
            &combined,
            &[
                "standard starting dose",
                "standard dose",
                "label recommended",
                "no change",
                "use standard",
                "no clinical intervention",
            ],
        )
    {
        return RiskLabel::StandardDosingRecommended;
    }

    match severity_lower.as_str() {
        "critical" => RiskLabel::UseAlternative,
        "high" | "moderate" => RiskLabel::AdjustDosage,
        "low" | "none" => RiskLabel::StandardDosingRecommended,
        _ => RiskLabel::Unknown,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avoid_keyword_wins_regardless_of_severity() {
        let label = classify_risk_from_cpic_text("Avoid codeine due to lack of efficacy", "", "high");
        assert_eq!(label, RiskLabel::Avoid);
    }

    #[test]
    fn standard_dose_reference_ignored_at_high_severity() {
        let label = classify_risk_from_cpic_text(
            "Initiate at 20-50% of standard starting dose",
            "",
            "high",
        );
        assert_eq!(label, RiskLabel::AdjustDosage);
    }

    #[test]
    fn standard_dose_phrase_honored_at_none_severity() {
        let label = classify_risk_from_cpic_text("Use standard dosing guidelines", "", "none");
        assert_eq!(label, RiskLabel::StandardDosingRecommended);
    }

    #[test]
    fn severity_fallback_used_when_no_keyword_matches() {
        let label = classify_risk_from_cpic_text("No specific notes", "", "critical");
        assert_eq!(label, RiskLabel::UseAlternative);
    }

    #[test]
    fn classification_is_pure_same_inputs_same_label() {
        let a = classify_risk_from_cpic_text("Consider alternative antiplatelet therapy", "", "high");
        let b = classify_risk_from_cpic_text("Consider alternative antiplatelet therapy", "", "high");
        assert_eq!(a, b);
    }
}
