//! Risk Engine (C5): combines a resolved phenotype with drug knowledge into a
//! canonical risk label, severity, clinical recommendation, and automation status
//! (spec.md §4.5). Grounded on `risk_engine.py`'s `RiskEngine.evaluate_risk` and its
//! helper methods.

pub mod classify;
pub mod severity;

use tracing::{debug, warn};

use crate::collaborators::{FeedbackPriorStore, Population, PopulationFrequencyStore};
use crate::corpus::ReferenceCorpus;
use crate::error::{PgxError, PgxResult};
use crate::types::confidence::ConfidenceBreakdown;
use crate::types::diplotype::{is_terminal_diplotype, Phenotype};
use crate::types::response::{
    AutomationStatus, ClinicalAnnotation, ClinicalRecommendation, EvidenceLevel, GeneDrugConfirmation,
    RiskAssessment, RiskLabel, Severity,
};

use classify::classify_risk_from_cpic_text;
use severity::{parse_declared_severity, severity_for_risk_label};

/// Identity for every drug except "5-fluorouracil" -> "fluorouracil". Deliberately
/// does NOT map azathioprine to thioguanine even though both resolve to TPMT — they
/// are distinct active ingredients with distinct CPIC guidance.
const DRUG_ALIASES: &[(&str, &str)] = &[("5-fluorouracil", "fluorouracil")];

/// Canonical drug -> primary metabolizing gene, used to infer the request's gene
/// field when the caller omits it (spec.md §6).
const GENE_DRUG_MAP: &[(&str, &str)] = &[
    ("codeine", "CYP2D6"),
    ("clopidogrel", "CYP2C19"),
    ("warfarin", "CYP2C9"),
    ("simvastatin", "SLCO1B1"),
    ("azathioprine", "TPMT"),
    ("fluorouracil", "DPYD"),
    ("thioguanine", "TPMT"),
];

/// Lowercases, trims, and applies the drug alias table.
pub fn normalize_drug(drug: &str) -> String {
    let lowered = drug.trim().to_ascii_lowercase();
    DRUG_ALIASES
        .iter()
        .find(|(from, _)| *from == lowered)
        .map(|(_, to)| to.to_string())
        .unwrap_or(lowered)
}

/// Resolves a drug's primary metabolizing gene via the canonical map. The input is
/// normalized (alias-resolved) before lookup.
pub fn drug_primary_gene(drug: &str) -> Option<&'static str> {
    let normalized = normalize_drug(drug);
    GENE_DRUG_MAP
        .iter()
        .find(|(drug_name, _)| *drug_name == normalized)
        .map(|(_, gene)| *gene)
}

fn is_poor_like(phenotype: &Phenotype) -> bool {
    matches!(phenotype, Phenotype::PoorMetabolizer | Phenotype::PoorFunction)
}

fn is_intermediate_like(phenotype: &Phenotype) -> bool {
    matches!(phenotype, Phenotype::IntermediateMetabolizer | Phenotype::DecreasedFunction)
}

fn is_ultrarapid_like(phenotype: &Phenotype) -> bool {
    matches!(phenotype, Phenotype::UltrarapidMetabolizer | Phenotype::IncreasedFunction)
}

/// Drug-specific deterministic fallback table used only when no CPIC record exists
/// for (drug, phenotype). `poor` selects the poor/decreased-function branch.
fn phenotype_risk_for_drug(drug: &str, poor: bool, base_severity: Severity) -> (RiskLabel, Severity) {
    if drug == "warfarin" && poor {
        return (RiskLabel::AdjustDosage, Severity::High);
    }
    if drug == "clopidogrel" && poor {
        return (RiskLabel::UseAlternative, Severity::High);
    }
    (RiskLabel::AdjustDosage, base_severity)
}

fn generic_phenotype_recommendation(drug: &str, gene: &str, phenotype: &Phenotype, poor: bool) -> ClinicalRecommendation {
    if drug == "warfarin" {
        if poor {
            return ClinicalRecommendation {
                text: format!(
                    "Reduce {drug} dose significantly. {gene} poor metabolizer status leads to reduced \
                     metabolism and increased drug exposure. Consider alternative anticoagulant or reduce \
                     dose by at least 50%."
                ),
                implication: format!(
                    "Increased risk of bleeding due to reduced {gene} metabolism of warfarin."
                ),
                recommendation_url: Some("https://cpicpgx.org/guidelines/".to_string()),
            };
        }
        return ClinicalRecommendation {
            text: format!(
                "Consider reducing {drug} dose. {gene} intermediate metabolizer status may lead to \
                 moderately reduced metabolism."
            ),
            implication: format!(
                "Moderately increased risk of bleeding due to reduced {gene} metabolism of warfarin. Monitor \
                 INR closely."
            ),
            recommendation_url: Some("https://cpicpgx.org/guidelines/".to_string()),
        };
    }

    if drug == "clopidogrel" {
        if poor {
            return ClinicalRecommendation {
                text: format!(
                    "Use alternative antiplatelet therapy (e.g. prasugrel, ticagrelor). {gene} poor \
                     metabolizer status results in significantly reduced clopidogrel activation."
                ),
                implication: format!(
                    "Reduced platelet inhibition due to decreased {gene}-mediated activation of clopidogrel. \
                     High risk of adverse cardiovascular events."
                ),
                recommendation_url: Some("https://cpicpgx.org/guidelines/".to_string()),
            };
        }
        return ClinicalRecommendation {
            text: format!(
                "Consider alternative antiplatelet therapy or monitor closely. {gene} intermediate \
                 metabolizer status may reduce clopidogrel activation."
            ),
            implication: format!(
                "Moderately reduced platelet inhibition due to decreased {gene}-mediated activation of \
                 clopidogrel."
            ),
            recommendation_url: Some("https://cpicpgx.org/guidelines/".to_string()),
        };
    }

    if poor {
        ClinicalRecommendation {
            text: format!(
                "Exercise caution with {drug}. {gene} {} status may significantly alter drug metabolism. \
                 Consider dose adjustment or alternative.",
                phenotype.as_str()
            ),
            implication: format!("Altered {gene} metabolism may affect {drug} response"),
            recommendation_url: None,
        }
    } else {
        ClinicalRecommendation {
            text: format!(
                "Monitor closely with {drug}. {gene} {} status may moderately alter drug metabolism. \
                 Consider dose adjustment.",
                phenotype.as_str()
            ),
            implication: format!("Moderately altered {gene} metabolism may affect {drug} response"),
            recommendation_url: None,
        }
    }
}

fn severity_base_score(severity: Severity) -> f64 {
    match severity {
        Severity::None => 5.0,
        Severity::Low => 25.0,
        Severity::Moderate => 50.0,
        Severity::High => 70.0,
        Severity::Critical => 90.0,
        Severity::Undetermined => 40.0,
    }
}

/// Advisory 0-100 risk score: monotonic in severity for fixed confidence/feedback/
/// population inputs (spec.md §9's open question — the exact original weighting did
/// not survive distillation, so this crate documents its own formula instead of
/// guessing at one).
pub fn compute_risk_score(severity: Severity, confidence: f64, feedback_boost: f64, population_frequency: f64) -> f64 {
    let base = severity_base_score(severity);
    let confidence = confidence.clamp(0.0, 1.0);
    let damped = base + (50.0 - base) * (1.0 - confidence) * 0.15;
    let rarity_adjustment = (1.0 - population_frequency.clamp(0.0, 1.0)) * 5.0;
    let boosted = damped * feedback_boost.clamp(0.5, 2.0);
    (boosted + rarity_adjustment).clamp(0.0, 100.0)
}

pub fn risk_level_for_score(score: f64) -> &'static str {
    if score < 20.0 {
        "minimal"
    } else if score < 40.0 {
        "low"
    } else if score < 60.0 {
        "moderate"
    } else if score < 80.0 {
        "high"
    } else {
        "critical"
    }
}

fn diplotype_population_frequency(
    gene: &str,
    diplotype: &str,
    population: Population,
    store: &dyn PopulationFrequencyStore,
) -> f64 {
    let alleles: Vec<&str> = diplotype.split('/').collect();
    if alleles.len() != 2 {
        return 0.5;
    }
    match (
        store.allele_frequency(gene, alleles[0], population),
        store.allele_frequency(gene, alleles[1], population),
    ) {
        (Some(a), Some(b)) => (a * b).clamp(0.0, 1.0),
        _ => 0.5,
    }
}

fn unresolved_phenotype_breakdown(genotype_breakdown: &ConfidenceBreakdown, knowledge_confidence: f64) -> ConfidenceBreakdown {
    let mut breakdown = genotype_breakdown.clone();
    breakdown.knowledge_confidence = knowledge_confidence;
    breakdown.gene_drug_confirmed = true;
    breakdown.diplotype_determinism = 0.0;
    breakdown.allele_coverage = breakdown.allele_coverage.min(0.3);
    breakdown.cnv_evaluation = breakdown.cnv_evaluation.min(0.5);
    let mut field = breakdown.cpic_applicability;
    breakdown.apply_penalty(&mut field, 0.30, "guideline mapping blocked due to unresolved phenotype");
    breakdown.cpic_applicability = field;
    breakdown
}

fn automation_status_of(breakdown: &ConfidenceBreakdown) -> AutomationStatus {
    breakdown.automation_status()
}

fn unsupported_drug_response(drug: &str) -> (RiskAssessment, ClinicalRecommendation) {
    let risk = RiskAssessment {
        risk_label: RiskLabel::DrugNotSupported.as_str().to_string(),
        confidence_score: 0.0,
        severity: Severity::None.as_str().to_string(),
        confidence_breakdown: None,
        risk_score: None,
        risk_level: None,
        gene_drug_confirmation: None,
        evidence_level: None,
        clinical_annotations: Vec::new(),
        automation_status: Some(AutomationStatus {
            allowed: false,
            blocked_reasons: vec!["Evidence insufficient".to_string()],
        }),
    };
    let recommendation = ClinicalRecommendation {
        text: RiskLabel::DrugNotSupported.as_str().to_string(),
        implication: format!(
            "No annotation with evidence level 1A or 1B exists for {drug}, and no gene-drug confirmation \
             supports it"
        ),
        recommendation_url: None,
    };
    (risk, recommendation)
}

fn kb_unsupported_response(
    gene: &str,
    drug: &str,
    confirmation: &GeneDrugConfirmation,
) -> (RiskAssessment, ClinicalRecommendation) {
    let mut breakdown = ConfidenceBreakdown::default();
    breakdown.gene_drug_confirmed = false;
    breakdown.knowledge_confidence = 0.0;
    breakdown.diplotype_determinism = 0.0;
    breakdown.allele_coverage = 0.3;
    breakdown.cnv_evaluation = 0.5;
    breakdown
        .penalties_applied
        .push(format!("gene-drug pair ({gene}, {drug}) not found in evidence store"));
    let automation_status = automation_status_of(&breakdown);
    let final_confidence = breakdown.final_confidence();

    let risk = RiskAssessment {
        risk_label: "Unsupported in current knowledge base".to_string(),
        confidence_score: final_confidence,
        severity: Severity::Undetermined.as_str().to_string(),
        confidence_breakdown: Some(breakdown),
        risk_score: None,
        risk_level: None,
        gene_drug_confirmation: Some(confirmation.clone()),
        evidence_level: None,
        clinical_annotations: Vec::new(),
        automation_status: Some(automation_status),
    };
    let recommendation = ClinicalRecommendation {
        text: format!(
            "No gene-drug relationship found for {drug} and {gene}. Automated recommendation blocked. \
             Blocked gate: Gene-drug pair not confirmed."
        ),
        implication: format!("Gene-drug pair ({gene}, {drug}) absent from the evidence store"),
        recommendation_url: None,
    };
    (risk, recommendation)
}

#[allow(clippy::too_many_arguments)]
fn unresolved_phenotype_response(
    gene: &str,
    genotype_breakdown: &ConfidenceBreakdown,
    knowledge_confidence: f64,
    confirmation: Option<GeneDrugConfirmation>,
    evidence: Option<EvidenceLevel>,
    annotations: Vec<ClinicalAnnotation>,
) -> (RiskAssessment, ClinicalRecommendation) {
    let breakdown = unresolved_phenotype_breakdown(genotype_breakdown, knowledge_confidence);
    let automation_status = automation_status_of(&breakdown);
    let final_confidence = breakdown.final_confidence();

    let risk = RiskAssessment {
        risk_label: "Supported drug — insufficient genotype resolution for recommendation".to_string(),
        confidence_score: final_confidence,
        severity: Severity::Undetermined.as_str().to_string(),
        confidence_breakdown: Some(breakdown),
        risk_score: None,
        risk_level: None,
        gene_drug_confirmation: confirmation,
        evidence_level: evidence,
        clinical_annotations: annotations,
        automation_status: Some(automation_status),
    };
    let recommendation = ClinicalRecommendation {
        text: format!(
            "Phenotype could not be determined due to insufficient {gene} genetic coverage. Automated \
             CPIC-based dosing guidance is therefore blocked. Recommend comprehensive {gene} testing \
             including CNV assessment."
        ),
        implication: "Genetic data insufficient for phenotype determination — automation blocked".to_string(),
        recommendation_url: None,
    };
    (risk, recommendation)
}

/// Full Risk Engine algorithm (spec.md §4.5). The only hard `Err` this function
/// returns is [`PgxError::IntegrityViolation`] — every other insufficiency is an
/// `Ok` response with the relevant fields populated.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_risk(
    drug: &str,
    gene: &str,
    diplotype: &str,
    phenotype: &Phenotype,
    genotype_breakdown: &ConfidenceBreakdown,
    corpus: &ReferenceCorpus,
    feedback_store: &dyn FeedbackPriorStore,
    population_store: &dyn PopulationFrequencyStore,
    population: Population,
) -> PgxResult<(RiskAssessment, ClinicalRecommendation)> {
    // Step 1: drug resolution.
    let resolved_drug = normalize_drug(drug);
    debug!(drug = %resolved_drug, gene, "evaluating risk");

    // Step 2: support check.
    if !corpus.drug_supported(&resolved_drug) {
        return Ok(unsupported_drug_response(drug));
    }

    // Step 3: gene-drug integrity check.
    let confirmation = corpus.confirm_gene_drug(gene, &resolved_drug);
    if confirmation.confirmed {
        let confirmed_drug_normalized = confirmation.drug.trim().to_ascii_lowercase();
        if confirmed_drug_normalized != resolved_drug {
            return Err(PgxError::IntegrityViolation {
                gene: gene.to_string(),
                drug: resolved_drug,
                confirmed_drug: confirmation.drug,
            });
        }
    }

    // Step 4: automation pre-gate.
    if !confirmation.confirmed {
        return Ok(kb_unsupported_response(gene, &resolved_drug, &confirmation));
    }

    let evidence = corpus.evidence_level(gene, &resolved_drug);
    let knowledge_confidence = evidence.confidence_weight;
    let annotations = corpus.clinical_annotations(gene, &resolved_drug);

    // Step 5: unresolvable phenotype branch.
    if is_terminal_diplotype(diplotype) || phenotype.is_unresolved() {
        return Ok(unresolved_phenotype_response(
            gene,
            genotype_breakdown,
            knowledge_confidence,
            Some(confirmation),
            Some(evidence),
            annotations,
        ));
    }

    let feedback_boost = feedback_store.prior(gene, diplotype);
    let population_frequency = diplotype_population_frequency(gene, diplotype, population, population_store);

    // Step 6: CPIC lookup (+ step 7/8/9: classification, severity, breakdown assembly).
    let (risk_label, severity, text, implication, url, cpic_applicability, cpic_note) =
        match corpus.drug_recommendation(&resolved_drug, phenotype.as_str()) {
            Some(rec) => {
                let label = classify_risk_from_cpic_text(&rec.summary, &rec.implication, &rec.severity);
                let severity = parse_declared_severity(&rec.severity).unwrap_or_else(|| severity_for_risk_label(label));
                (
                    label,
                    severity,
                    rec.summary.clone(),
                    rec.implication.clone(),
                    rec.url.clone(),
                    1.0,
                    None,
                )
            }
            None => {
                let (label, severity, note) = if phenotype.is_normal_family() {
                    (RiskLabel::StandardDosingRecommended, Severity::None, "no specific CPIC rule for known normal phenotype")
                } else if is_poor_like(phenotype) || is_ultrarapid_like(phenotype) {
                    let (label, severity) = phenotype_risk_for_drug(&resolved_drug, is_poor_like(phenotype), Severity::High);
                    (label, severity, "no CPIC guideline file — using phenotype-driven risk classification")
                } else if is_intermediate_like(phenotype) {
                    (RiskLabel::AdjustDosage, Severity::Moderate, "no CPIC guideline file — using phenotype-driven risk classification")
                } else {
                    (RiskLabel::NoSpecificCpicRecommendation, Severity::Moderate, "no CPIC guideline file for this phenotype")
                };

                let recommendation = if phenotype.is_normal_family() {
                    ClinicalRecommendation {
                        text: format!("Use standard {resolved_drug} dosing guidelines"),
                        implication: "Normal drug metabolism expected".to_string(),
                        recommendation_url: None,
                    }
                } else {
                    generic_phenotype_recommendation(&resolved_drug, gene, phenotype, is_poor_like(phenotype))
                };

                (
                    label,
                    severity,
                    recommendation.text,
                    recommendation.implication,
                    recommendation.recommendation_url,
                    0.80,
                    Some(note),
                )
            }
        };

    let mut breakdown = genotype_breakdown.clone();
    breakdown.knowledge_confidence = knowledge_confidence;
    breakdown.gene_drug_confirmed = true;
    breakdown.cpic_applicability = cpic_applicability;
    if let Some(note) = cpic_note {
        breakdown.penalties_applied.push(note.to_string());
    }

    // Step 10: runtime safety invariant. Normal-family phenotype paired with
    // critical severity halts assembly and downgrades to the unresolvable response.
    if phenotype.is_normal_family() && matches!(severity, Severity::Critical) {
        warn!(
            gene,
            drug = %resolved_drug,
            "invariant violation: normal phenotype paired with critical severity, downgrading response"
        );
        return Ok(unresolved_phenotype_response(
            gene,
            genotype_breakdown,
            knowledge_confidence,
            Some(confirmation),
            Some(evidence),
            annotations,
        ));
    }

    let automation_status = automation_status_of(&breakdown);
    let final_confidence = breakdown.final_confidence();
    let risk_score = compute_risk_score(severity, final_confidence, feedback_boost, population_frequency);
    let risk_level = risk_level_for_score(risk_score);

    let risk = RiskAssessment {
        risk_label: risk_label.as_str().to_string(),
        confidence_score: final_confidence,
        severity: severity.as_str().to_string(),
        confidence_breakdown: Some(breakdown),
        risk_score: Some(risk_score),
        risk_level: Some(risk_level.to_string()),
        gene_drug_confirmation: Some(confirmation),
        evidence_level: Some(evidence),
        clinical_annotations: annotations,
        automation_status: Some(automation_status.clone()),
    };

    // Step 11: structured recommendation, blocked-gate text takes priority.
    let recommendation = if !automation_status.allowed {
        let blocked_text = automation_status.blocked_reasons.join("; ");
        ClinicalRecommendation {
            text: format!(
                "Automated CPIC-based dosing guidance for {resolved_drug} ({gene}) is blocked. Blocked \
                 gates: {blocked_text}. Exercise clinical judgment and consider comprehensive \
                 pharmacogenomic testing."
            ),
            implication: format!("Automation blocked: {blocked_text}"),
            recommendation_url: None,
        }
    } else {
        ClinicalRecommendation {
            text,
            implication,
            recommendation_url: url,
        }
    };

    Ok((risk, recommendation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{NullFeedbackPriorStore, NullPopulationFrequencyStore};
    use crate::config::PgxConfig;

    fn corpus() -> ReferenceCorpus {
        ReferenceCorpus::seeded(&PgxConfig::default())
    }

    fn confident_breakdown() -> ConfidenceBreakdown {
        let mut breakdown = ConfidenceBreakdown::default();
        breakdown.diplotype_determinism = 1.0;
        breakdown
    }

    #[test]
    fn fluorouracil_alias_resolves_without_renaming_active_ingredient() {
        assert_eq!(normalize_drug("5-Fluorouracil"), "fluorouracil");
        assert_eq!(normalize_drug("Azathioprine"), "azathioprine");
    }

    #[test]
    fn drug_primary_gene_infers_codeine_to_cyp2d6() {
        assert_eq!(drug_primary_gene("codeine"), Some("CYP2D6"));
        assert_eq!(drug_primary_gene("5-fluorouracil"), Some("DPYD"));
    }

    #[test]
    fn unsupported_drug_returns_zero_confidence_blocked_response() {
        let (risk, _rec) = evaluate_risk(
            "notarealdrug",
            "CYP2D6",
            "*1/*1",
            &Phenotype::NormalMetabolizer,
            &confident_breakdown(),
            &corpus(),
            &NullFeedbackPriorStore,
            &NullPopulationFrequencyStore,
            Population::Global,
        )
        .unwrap();
        assert_eq!(risk.risk_label, "Drug not currently supported by CPIC guidelines");
        assert_eq!(risk.confidence_score, 0.0);
        assert!(risk.confidence_breakdown.is_none());
    }

    #[test]
    fn wildtype_codeine_recommends_standard_dosing() {
        let (risk, _rec) = evaluate_risk(
            "codeine",
            "CYP2D6",
            "*1/*1",
            &Phenotype::NormalMetabolizer,
            &confident_breakdown(),
            &corpus(),
            &NullFeedbackPriorStore,
            &NullPopulationFrequencyStore,
            Population::Global,
        )
        .unwrap();
        assert_eq!(risk.risk_label, "Standard dosing recommended");
        assert_eq!(risk.severity, "none");
    }

    #[test]
    fn poor_metabolizer_codeine_is_avoid_or_use_alternative() {
        let (risk, _rec) = evaluate_risk(
            "codeine",
            "CYP2D6",
            "*4/*4",
            &Phenotype::PoorMetabolizer,
            &confident_breakdown(),
            &corpus(),
            &NullFeedbackPriorStore,
            &NullPopulationFrequencyStore,
            Population::Global,
        )
        .unwrap();
        assert!(matches!(risk.risk_label.as_str(), "Avoid" | "Use Alternative"));
        assert!(matches!(risk.severity.as_str(), "high" | "critical"));
    }

    #[test]
    fn indeterminate_phenotype_blocks_automation_with_capped_confidence() {
        let (risk, rec) = evaluate_risk(
            "codeine",
            "CYP2D6",
            "Indeterminate",
            &Phenotype::Indeterminate,
            &ConfidenceBreakdown::default(),
            &corpus(),
            &NullFeedbackPriorStore,
            &NullPopulationFrequencyStore,
            Population::Global,
        )
        .unwrap();
        assert_eq!(risk.risk_label, "Supported drug — insufficient genotype resolution for recommendation");
        assert_eq!(risk.severity, "undetermined");
        assert!(risk.confidence_score <= 0.50);
        let automation = risk.automation_status.unwrap();
        assert!(!automation.allowed);
        assert!(rec.implication.contains("blocked"));
    }

    #[test]
    fn case_differences_in_stored_drug_name_do_not_trigger_a_false_integrity_violation() {
        let custom_corpus = ReferenceCorpus::builder()
            .gene(crate::types::gene::Gene::new("CYP2D6", Default::default(), false))
            .relationship("X1", "CYP2D6", "Codeine", "Dosing Guideline", "associated", "1A", &[])
            .build();
        let result = evaluate_risk(
            "codeine",
            "CYP2D6",
            "*1/*1",
            &Phenotype::NormalMetabolizer,
            &confident_breakdown(),
            &custom_corpus,
            &NullFeedbackPriorStore,
            &NullPopulationFrequencyStore,
            Population::Global,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn drug_not_supported_in_knowledge_base_blocks_with_gene_drug_gate() {
        let custom_corpus = ReferenceCorpus::builder()
            .relationship("X1", "CYP2D6", "codeine", "Dosing Guideline", "associated", "1A", &[])
            .build();
        let (risk, _rec) = evaluate_risk(
            "codeine",
            "CYP2C19",
            "*1/*1",
            &Phenotype::NormalMetabolizer,
            &confident_breakdown(),
            &custom_corpus,
            &NullFeedbackPriorStore,
            &NullPopulationFrequencyStore,
            Population::Global,
        )
        .unwrap();
        assert_eq!(risk.risk_label, "Unsupported in current knowledge base");
        let automation = risk.automation_status.unwrap();
        assert!(!automation.allowed);
        assert!(automation.blocked_reasons.contains(&"Gene-drug pair not confirmed".to_string()));
    }
}
