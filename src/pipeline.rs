//! Pipeline Orchestrator (C6): the single entrypoint wiring normalization,
//! diplotype resolution, and risk evaluation into one response envelope
//! (spec.md §6).

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::collaborators::{FeedbackPriorStore, Population, PopulationFrequencyStore};
use crate::config::PgxConfig;
use crate::corpus::ReferenceCorpus;
use crate::error::{PgxError, PgxResult};
use crate::normalize::normalize_variants;
use crate::resolver::resolve_diplotype;
use crate::risk::{drug_primary_gene, evaluate_risk};
use crate::types::response::{PgxResponse, PharmacogenomicProfile, QualityMetrics};
use crate::types::variant::Variant;

/// A single evaluation request. `gene` is optional — when absent it is inferred
/// from `drug` via the canonical drug -> gene map (spec.md §6); if neither is
/// available the request proceeds with an unresolvable gene, which surfaces as a
/// knowledge-base gap rather than a hard error.
#[derive(Debug, Clone)]
pub struct PgxRequest {
    pub patient_id: Option<String>,
    pub drug: String,
    pub gene: Option<String>,
    pub variants: Vec<Variant>,
    /// `None` means no coverage data was supplied at all; `Some(&[])` means the
    /// caller explicitly reported zero covered positions.
    pub covered_positions: Option<Vec<u64>>,
    pub genome_build: String,
    pub population: Population,
}

impl PgxRequest {
    pub fn new(drug: impl Into<String>, variants: Vec<Variant>) -> Self {
        PgxRequest {
            patient_id: None,
            drug: drug.into(),
            gene: None,
            variants,
            covered_positions: None,
            genome_build: "GRCh38".to_string(),
            population: Population::default(),
        }
    }
}

fn resolve_gene(request: &PgxRequest) -> String {
    request
        .gene
        .clone()
        .or_else(|| drug_primary_gene(&request.drug).map(str::to_string))
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// Runs the full deterministic decision pipeline for one request: normalize ->
/// resolve diplotype -> evaluate risk -> assemble envelope. Propagates only the
/// two hard-failure variants of [`PgxError`]; every other insufficiency is
/// reflected in the response body.
pub fn evaluate(
    request: &PgxRequest,
    corpus: &ReferenceCorpus,
    config: &PgxConfig,
    feedback_store: &dyn FeedbackPriorStore,
    population_store: &dyn PopulationFrequencyStore,
) -> PgxResult<PgxResponse> {
    let gene = resolve_gene(request);
    debug!(drug = %request.drug, gene = %gene, "evaluating pgx request");

    let normalization = normalize_variants(
        &request.variants,
        &gene,
        &request.genome_build,
        &config.quality_thresholds,
    );

    let diplotype_result = resolve_diplotype(
        &gene,
        &normalization.clean_variants,
        &normalization.quality_results,
        corpus,
        config,
        request.covered_positions.as_deref(),
        request.population,
        population_store,
    );

    let (risk_assessment, clinical_recommendation) = evaluate_risk(
        &request.drug,
        &gene,
        &diplotype_result.diplotype,
        &diplotype_result.phenotype,
        &diplotype_result.confidence_breakdown,
        corpus,
        feedback_store,
        population_store,
        request.population,
    )?;

    let mut rejection_reasons: Vec<String> = normalization
        .rejected
        .iter()
        .flat_map(|r| r.reasons.clone())
        .collect();
    rejection_reasons.sort();
    rejection_reasons.dedup();

    let quality_metrics = QualityMetrics {
        variants_parsed: request.variants.len(),
        variants_rejected: normalization.rejected.len(),
        rejection_reasons,
        duplicates_removed: normalization.duplicates_removed,
        chromosome_normalizations: normalization.chromosome_normalizations,
        genome_build_warning: normalization.build_validation.warning.clone(),
    };

    let pharmacogenomic_profile = PharmacogenomicProfile {
        primary_gene: gene.clone(),
        diplotype: diplotype_result.diplotype.clone(),
        phenotype: diplotype_result.phenotype.as_str().to_string(),
        detected_variants: normalization.clean_variants,
        variant_annotations: risk_assessment.clinical_annotations.clone(),
    };

    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).map_err(|error| {
        PgxError::InvariantViolation {
            reason: format!("failed to format response timestamp: {error}"),
        }
    })?;

    Ok(PgxResponse {
        patient_id: request.patient_id.clone(),
        drug: request.drug.clone(),
        gene,
        timestamp,
        risk_assessment,
        pharmacogenomic_profile,
        clinical_recommendation,
        quality_metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{NullFeedbackPriorStore, NullPopulationFrequencyStore};
    use crate::types::variant::{FilterStatus, Zygosity};

    fn corpus() -> ReferenceCorpus {
        ReferenceCorpus::seeded(&PgxConfig::default())
    }

    fn run(request: &PgxRequest) -> PgxResponse {
        evaluate(
            request,
            &corpus(),
            &PgxConfig::default(),
            &NullFeedbackPriorStore,
            &NullPopulationFrequencyStore,
        )
        .expect("pipeline evaluation should not hard-error")
    }

    fn hom_alt_variant(pos: u64, reference: &str, alt: &str) -> Variant {
        Variant {
            chrom: "22".to_string(),
            pos,
            rsid: None,
            reference: reference.to_string(),
            alt: alt.to_string(),
            zygosity: Zygosity::HomAlt,
            quality: 99.0,
            filter: FilterStatus::Pass,
            allele_depth: Some((0, 40)),
            star_allele: None,
            phased: false,
            phase_set: None,
        }
    }

    fn het_variant(pos: u64, reference: &str, alt: &str, phased: bool) -> Variant {
        Variant {
            zygosity: Zygosity::Het,
            phased,
            ..hom_alt_variant(pos, reference, alt)
        }
    }

    #[test]
    fn wildtype_codeine_is_normal_metabolizer_with_standard_dosing() {
        let mut request = PgxRequest::new("codeine", Vec::new());
        request.gene = Some("CYP2D6".to_string());
        let response = run(&request);
        assert_eq!(response.pharmacogenomic_profile.diplotype, "*1/*1");
        assert_eq!(response.pharmacogenomic_profile.phenotype, "NM");
        assert_eq!(response.risk_assessment.risk_label, "Standard dosing recommended");
        assert!(response.risk_assessment.automation_status.as_ref().unwrap().allowed);
    }

    #[test]
    fn homozygous_cyp2d6_star4_codeine_is_poor_metabolizer_and_avoided() {
        let mut request = PgxRequest::new("codeine", vec![hom_alt_variant(42126611, "C", "G")]);
        request.gene = Some("CYP2D6".to_string());
        request.covered_positions = Some(vec![42126611, 42127941, 42130692]);
        let response = run(&request);
        assert_eq!(response.pharmacogenomic_profile.diplotype, "*4/*4");
        assert_eq!(response.pharmacogenomic_profile.phenotype, "PM");
        assert_eq!(response.risk_assessment.risk_label, "Avoid");
    }

    #[test]
    fn unphased_cyp2c19_compound_het_clopidogrel_resolves_with_automation_allowed() {
        let mut request = PgxRequest::new(
            "clopidogrel",
            vec![
                het_variant(94775367, "A", "G", false),
                het_variant(94781859, "G", "A", false),
                het_variant(94842866, "C", "T", false),
            ],
        );
        request.gene = Some("CYP2C19".to_string());
        request.covered_positions = Some(vec![94775367, 94781859, 94842866]);
        let response = run(&request);
        assert_eq!(response.pharmacogenomic_profile.diplotype, "*2/*17");
        assert_eq!(response.pharmacogenomic_profile.phenotype, "IM");
        assert_eq!(response.risk_assessment.risk_label, "Use Alternative");
    }

    #[test]
    fn unsupported_drug_yields_blocked_response_without_hard_error() {
        let request = PgxRequest::new("not-a-real-drug", Vec::new());
        let response = run(&request);
        assert_eq!(
            response.risk_assessment.risk_label,
            "Drug not currently supported by CPIC guidelines"
        );
        assert!(!response.risk_assessment.automation_status.unwrap().allowed);
    }

    #[test]
    fn novel_variant_produces_unresolved_diplotype_with_blocked_automation() {
        let mut request = PgxRequest::new("codeine", vec![hom_alt_variant(99999999, "A", "T")]);
        request.gene = Some("CYP2D6".to_string());
        let response = run(&request);
        assert_eq!(response.pharmacogenomic_profile.diplotype, "Indeterminate");
        assert_eq!(
            response.risk_assessment.risk_label,
            "Supported drug — insufficient genotype resolution for recommendation"
        );
        assert!(!response.risk_assessment.automation_status.unwrap().allowed);
    }

    #[test]
    fn gene_drug_mismatch_for_a_confirmed_but_wrong_gene_is_a_knowledge_base_gap() {
        let mut request = PgxRequest::new("codeine", Vec::new());
        request.gene = Some("TPMT".to_string());
        let response = run(&request);
        assert_eq!(response.risk_assessment.risk_label, "Unsupported in current knowledge base");
    }

    #[test]
    fn timestamp_is_rfc3339_formatted() {
        let request = PgxRequest::new("codeine", Vec::new());
        let response = run(&request);
        assert!(response.timestamp.contains('T'));
        assert!(response.timestamp.contains('Z') || response.timestamp.contains('+'));
    }
}
