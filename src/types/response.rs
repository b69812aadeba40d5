use serde::{Deserialize, Serialize};

use crate::types::confidence::{AutomationStatus, ConfidenceBreakdown};
use crate::types::variant::Variant;

/// Canonical risk labels. This is the full fixed set spec.md §3 enumerates; nothing
/// else is ever emitted. Note "Safe" is part of the set for deserialization
/// compatibility with older corpora but this crate's risk engine never produces it —
/// it always emits "Standard dosing recommended" instead (spec.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLabel {
    Toxic,
    Ineffective,
    Avoid,
    UseAlternative,
    AdjustDosage,
    StandardDosingRecommended,
    Safe,
    Unknown,
    NoSpecificCpicRecommendation,
    DrugNotSupported,
    GeneDrugIntegrityError,
}

impl RiskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Toxic => "Toxic",
            RiskLabel::Ineffective => "Ineffective",
            RiskLabel::Avoid => "Avoid",
            RiskLabel::UseAlternative => "Use Alternative",
            RiskLabel::AdjustDosage => "Adjust Dosage",
            RiskLabel::StandardDosingRecommended => "Standard dosing recommended",
            RiskLabel::Safe => "Safe",
            RiskLabel::Unknown => "Unknown",
            RiskLabel::NoSpecificCpicRecommendation => "No specific CPIC recommendation",
            RiskLabel::DrugNotSupported => "Drug not currently supported by CPIC guidelines",
            RiskLabel::GeneDrugIntegrityError => "Gene-drug integrity error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    None,
    Low,
    Moderate,
    High,
    Critical,
    Undetermined,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Undetermined => "undetermined",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneDrugConfirmation {
    pub gene: String,
    pub drug: String,
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_types: Vec<String>,
    pub association: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_pmids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceLevel {
    pub level: String,
    pub confidence_weight: f64,
    pub allows_automated_recommendation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalAnnotation {
    pub annotation_id: String,
    pub gene: String,
    pub drug: String,
    pub evidence_type: String,
    pub association: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pmids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_label: String,
    pub confidence_score: f64,
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_breakdown: Option<ConfidenceBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gene_drug_confirmation: Option<GeneDrugConfirmation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_level: Option<EvidenceLevel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clinical_annotations: Vec<ClinicalAnnotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation_status: Option<AutomationStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalRecommendation {
    pub text: String,
    pub implication: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PharmacogenomicProfile {
    pub primary_gene: String,
    pub diplotype: String,
    pub phenotype: String,
    pub detected_variants: Vec<Variant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variant_annotations: Vec<ClinicalAnnotation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub variants_parsed: usize,
    pub variants_rejected: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejection_reasons: Vec<String>,
    pub duplicates_removed: usize,
    pub chromosome_normalizations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genome_build_warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PgxResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub drug: String,
    pub gene: String,
    pub timestamp: String,
    pub risk_assessment: RiskAssessment,
    pub pharmacogenomic_profile: PharmacogenomicProfile,
    pub clinical_recommendation: ClinicalRecommendation,
    pub quality_metrics: QualityMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_label_only_emits_standard_dosing_not_safe() {
        assert_eq!(
            RiskLabel::StandardDosingRecommended.as_str(),
            "Standard dosing recommended"
        );
    }

    #[test]
    fn severity_strings_match_canonical_set() {
        assert_eq!(Severity::Critical.as_str(), "critical");
        assert_eq!(Severity::Undetermined.as_str(), "undetermined");
    }
}
