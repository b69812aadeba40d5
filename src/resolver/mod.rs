//! Diplotype Resolver (C3): produces (diplotype, phenotype, confidence breakdown,
//! indeterminate reason) from a clean variant set and a gene (spec.md §4.3).

use crate::collaborators::{Population, PopulationFrequencyStore};
use crate::config::{PgxConfig, PhaseAssumption};
use crate::corpus::ReferenceCorpus;
use crate::normalize::VariantQualityResult;
use crate::types::confidence::ConfidenceBreakdown;
use crate::types::diplotype::{canonicalize_diplotype, make_diplotype, IndeterminateReason, Phenotype};
use crate::types::variant::{Variant, Zygosity};

/// Genes whose phenotype is expressed as transporter "Function" states rather than
/// metabolizer PM/IM/NM/RM/UM states. Not part of spec.md's `Gene` shape (§3) —
/// kept as a small lookup here rather than widening `Gene`, since it is a classifier
/// needed only by activity-score binning.
const TRANSPORTER_GENES: &[&str] = &["SLCO1B1"];

fn is_transporter_gene(gene: &str) -> bool {
    TRANSPORTER_GENES.contains(&gene)
}

#[derive(Debug, Clone)]
pub struct DiplotypeResult {
    pub gene: String,
    pub diplotype: String,
    pub phenotype: Phenotype,
    /// Scalar confidence assigned during diplotype selection (spec.md §4.3 steps
    /// 4-6), distinct from `confidence_breakdown`'s derived `final`.
    pub confidence: f64,
    pub is_indeterminate: bool,
    pub indeterminate_reason: IndeterminateReason,
    pub notes: Option<String>,
    pub phased: bool,
    pub confidence_breakdown: ConfidenceBreakdown,
}

#[derive(Debug, Clone)]
struct Candidate {
    allele: String,
    score: f64,
    completeness: f64,
}

fn score_candidates(clean_variants: &[Variant], corpus: &ReferenceCorpus, gene: &str) -> Vec<Candidate> {
    let Some(allele_definitions) = corpus.allele_definitions(gene) else {
        return Vec::new();
    };

    let mut candidates = Vec::new();
    for (allele, defining_keys) in allele_definitions {
        if defining_keys.is_empty() {
            continue;
        }
        let mut observed = 0usize;
        let mut raw_score = 0.0;
        for key in defining_keys {
            if let Some(variant) = clean_variants.iter().find(|v| &v.variant_key() == key) {
                observed += 1;
                raw_score += match variant.zygosity {
                    Zygosity::HomAlt => 2.0,
                    Zygosity::Het => 1.0,
                    _ => 0.0,
                };
            }
        }
        if observed == 0 {
            continue;
        }
        let completeness = observed as f64 / defining_keys.len() as f64;
        let score = if completeness >= 1.0 {
            raw_score
        } else {
            raw_score * completeness * 0.7
        };
        if score > 0.0 {
            candidates.push(Candidate {
                allele: allele.clone(),
                score,
                completeness,
            });
        }
    }

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.allele.cmp(&b.allele))
    });
    candidates
}

/// Hardy-Weinberg-style estimate of the probability that two distinct observed
/// alleles sit in trans (different parental haplotypes) rather than cis, weighted
/// by population frequency when available. Falls back to the configured default
/// phase assumption when no frequency data is available for either allele.
fn estimate_trans_probability(freq_a: Option<f64>, freq_b: Option<f64>, default: PhaseAssumption) -> f64 {
    match (freq_a, freq_b) {
        (Some(fa), Some(fb)) if fa > 0.0 && fb > 0.0 => {
            let trans_weight = 2.0 * fa * fb;
            let cis_weight = fa.min(fb).powi(2);
            trans_weight / (trans_weight + cis_weight)
        }
        _ => match default {
            PhaseAssumption::Trans => 1.0,
            PhaseAssumption::Cis => 0.0,
        },
    }
}

fn activity_score_phenotype(total: f64, gene: &str, config: &PgxConfig) -> Phenotype {
    let cutoffs = &config.activity_scores;
    let metabolizer = if total <= 0.0 {
        Phenotype::PoorMetabolizer
    } else if total <= cutoffs.poor_metabolizer_max {
        Phenotype::PoorMetabolizer
    } else if total <= cutoffs.intermediate_metabolizer_max {
        Phenotype::IntermediateMetabolizer
    } else if total <= cutoffs.normal_metabolizer_max {
        Phenotype::NormalMetabolizer
    } else {
        Phenotype::UltrarapidMetabolizer
    };

    if !is_transporter_gene(gene) {
        return metabolizer;
    }

    match metabolizer {
        Phenotype::PoorMetabolizer => Phenotype::PoorFunction,
        Phenotype::IntermediateMetabolizer => Phenotype::DecreasedFunction,
        Phenotype::NormalMetabolizer => Phenotype::NormalFunction,
        _ => Phenotype::IncreasedFunction,
    }
}

fn unresolved_breakdown(variant_quality: f64, cpic_penalty: bool) -> ConfidenceBreakdown {
    let mut breakdown = ConfidenceBreakdown::default();
    breakdown.variant_quality = variant_quality;
    breakdown.allele_coverage = 0.3;
    breakdown.cnv_evaluation = 0.5;
    breakdown.diplotype_determinism = 0.0;
    if cpic_penalty {
        let mut field = breakdown.cpic_applicability;
        breakdown.apply_penalty(&mut field, 0.30, "indeterminate phenotype");
        breakdown.cpic_applicability = field;
    }
    breakdown
}

fn variant_quality_score(quality_results: &[VariantQualityResult], breakdown: &mut ConfidenceBreakdown) {
    for qc in quality_results {
        if !qc.quality_adequate {
            let mut field = breakdown.variant_quality;
            breakdown.apply_penalty(&mut field, 0.15, "variant below minimum QUAL threshold");
            breakdown.variant_quality = field;
        }
        if !qc.depth_adequate {
            let mut field = breakdown.variant_quality;
            breakdown.apply_penalty(&mut field, 0.10, "variant below minimum allele-depth ratio");
            breakdown.variant_quality = field;
        }
    }
}

/// Resolves a diplotype call for `gene` from a clean, quality-tagged variant set.
///
/// `covered_positions` is `None` when the caller supplied no coverage data at all,
/// and `Some(slice)` (possibly empty) when it did.
#[allow(clippy::too_many_arguments)]
pub fn resolve_diplotype(
    gene: &str,
    clean_variants: &[Variant],
    quality_results: &[VariantQualityResult],
    corpus: &ReferenceCorpus,
    config: &PgxConfig,
    covered_positions: Option<&[u64]>,
    population: Population,
    population_store: &dyn PopulationFrequencyStore,
) -> DiplotypeResult {
    // Step 1: gene support gate.
    if !corpus.is_gene_supported(gene) {
        return DiplotypeResult {
            gene: gene.to_string(),
            diplotype: crate::types::diplotype::UNKNOWN.to_string(),
            phenotype: Phenotype::Unknown,
            confidence: 0.0,
            is_indeterminate: true,
            indeterminate_reason: IndeterminateReason::UnsupportedGene,
            notes: Some("gene not present in reference corpus".to_string()),
            phased: false,
            confidence_breakdown: unresolved_breakdown(1.0, false),
        };
    }

    // Step 2: empty-variant path.
    if clean_variants.is_empty() {
        let phenotype = corpus
            .diplotype_phenotype(gene, crate::types::diplotype::WILDTYPE)
            .cloned()
            .unwrap_or(Phenotype::NormalMetabolizer);
        let mut breakdown = ConfidenceBreakdown::default();
        breakdown.diplotype_determinism = 1.0;
        return DiplotypeResult {
            gene: gene.to_string(),
            diplotype: crate::types::diplotype::WILDTYPE.to_string(),
            phenotype,
            confidence: 1.0,
            is_indeterminate: false,
            indeterminate_reason: IndeterminateReason::None,
            notes: None,
            phased: false,
            confidence_breakdown: breakdown,
        };
    }

    // Step 3: candidate scoring.
    let candidates = score_candidates(clean_variants, corpus, gene);

    let thresholds = &config.diplotype_resolution;
    let all_hom_alt = clean_variants.iter().all(|v| v.zygosity == Zygosity::HomAlt);

    let (diplotype, confidence, phased, notes, is_partial_match, is_unphased_compound_het) = if candidates
        .is_empty()
    {
        (crate::types::diplotype::INDETERMINATE.to_string(), 0.0, false, None, false, false)
    } else if all_hom_alt && candidates.len() == 1 {
        (
            make_diplotype(&candidates[0].allele, &candidates[0].allele),
            0.95,
            false,
            None,
            candidates[0].completeness < 1.0,
            false,
        )
    } else if candidates.len() == 1 {
        let candidate = &candidates[0];
        if candidate.score >= thresholds.homozygous_threshold {
            (
                make_diplotype(&candidate.allele, &candidate.allele),
                0.90,
                false,
                None,
                candidate.completeness < 1.0,
                false,
            )
        } else {
            (
                make_diplotype("*1", &candidate.allele),
                0.85,
                false,
                None,
                candidate.completeness < 1.0,
                false,
            )
        }
    } else if candidates[0].score >= thresholds.compound_het_min && candidates[1].score >= thresholds.compound_het_min {
        let allele_a = &candidates[0].allele;
        let allele_b = &candidates[1].allele;
        let diplotype = make_diplotype(allele_a, allele_b);
        let any_phased = clean_variants.iter().any(|v| v.phased);
        let partial = candidates[0].completeness < 1.0 || candidates[1].completeness < 1.0;

        if any_phased {
            (diplotype, 0.90, true, Some("phased".to_string()), partial, false)
        } else {
            let freq_a = population_store.allele_frequency(gene, allele_a, population);
            let freq_b = population_store.allele_frequency(gene, allele_b, population);
            let trans_probability =
                estimate_trans_probability(freq_a, freq_b, thresholds.default_phase_assumption);
            let base = ((candidates[0].score + candidates[1].score) / 4.0).min(0.8)
                * config.confidence_penalties.unphased_heterozygote;
            let confidence = if trans_probability > 0.5 {
                (base * 1.05).min(0.9)
            } else {
                base.min(0.9)
            };
            (diplotype, confidence, false, None, partial, true)
        }
    } else {
        (make_diplotype("*1", &candidates[0].allele), 0.80, false, None, true, false)
    };

    // Step 5: phenotype mapping.
    let phenotype = if crate::types::diplotype::is_terminal_diplotype(&diplotype) {
        Phenotype::Indeterminate
    } else {
        corpus.diplotype_phenotype(gene, &diplotype).cloned().unwrap_or_else(|| {
            let allele_names = canonicalize_diplotype(&diplotype);
            let scores: f64 = allele_names
                .split('/')
                .map(|a| corpus.activity_score(gene, a))
                .sum();
            activity_score_phenotype(scores, gene, config)
        })
    };

    // Confidence breakdown assembly.
    let mut breakdown = ConfidenceBreakdown::default();
    variant_quality_score(quality_results, &mut breakdown);

    if candidates.is_empty() {
        breakdown.allele_coverage = 0.3;
        breakdown.cnv_evaluation = 0.5;
        breakdown.diplotype_determinism = 0.0;
    } else {
        breakdown.diplotype_determinism = 1.0;

        if is_partial_match {
            let mut field = breakdown.allele_coverage;
            breakdown.apply_penalty(&mut field, 0.20, "incomplete allele definition match");
            breakdown.allele_coverage = field;
        }

        match covered_positions {
            None => {
                let mut field = breakdown.allele_coverage;
                breakdown.apply_penalty(&mut field, 0.15, "no coverage data supplied");
                breakdown.allele_coverage = field;
            }
            Some(covered) => {
                let key_positions = corpus.key_positions(gene);
                let missing = key_positions.iter().filter(|p| !covered.contains(p)).count().min(10);
                if missing > 0 {
                    let penalty = 0.05 * missing as f64;
                    let mut field = breakdown.allele_coverage;
                    breakdown.apply_penalty(&mut field, penalty, format!("{missing} missing key position(s)"));
                    breakdown.allele_coverage = field;
                }
            }
        }

        if gene_is_cnv_required(corpus, gene) {
            let mut field = breakdown.cnv_evaluation;
            breakdown.apply_penalty(&mut field, 0.20, "CNV-required gene without CNV evaluation");
            breakdown.cnv_evaluation = field;
        }

        if is_unphased_compound_het {
            let mut field = breakdown.phase_resolution;
            breakdown.apply_penalty(&mut field, 0.10, "unphased compound heterozygote");
            breakdown.phase_resolution = field;
        }
    }

    if phenotype.is_unresolved() {
        let mut field = breakdown.cpic_applicability;
        breakdown.apply_penalty(&mut field, 0.30, "indeterminate phenotype");
        breakdown.cpic_applicability = field;
    }

    // Step 6 already folded into coverage handling above. Step 7: indeterminate
    // classification, in priority order.
    let has_coverage_issue = match covered_positions {
        None => true,
        Some(covered) => {
            let key_positions = corpus.key_positions(gene);
            key_positions.iter().filter(|p| !covered.contains(p)).count() > 2
        }
    };

    let mut reason = if candidates.is_empty() {
        IndeterminateReason::NovelVariants
    } else {
        IndeterminateReason::None
    };

    if has_coverage_issue {
        reason = reason.most_specific(IndeterminateReason::NoCoverage);
    }
    if is_partial_match {
        reason = reason.most_specific(IndeterminateReason::PartialMatch);
    }
    if confidence < 0.5 {
        reason = reason.most_specific(IndeterminateReason::LowQuality);
    }

    let is_indeterminate = crate::types::diplotype::is_terminal_diplotype(&diplotype) || phenotype.is_unresolved();

    DiplotypeResult {
        gene: gene.to_string(),
        diplotype,
        phenotype,
        confidence,
        is_indeterminate,
        indeterminate_reason: reason,
        notes,
        phased,
        confidence_breakdown: breakdown,
    }
}

fn gene_is_cnv_required(corpus: &ReferenceCorpus, gene: &str) -> bool {
    corpus.gene(gene).map(|g| g.cnv_required).unwrap_or(false)
}
