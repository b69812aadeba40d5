use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Assumed phase when no population-frequency evidence or direct phasing is
/// available for a compound heterozygote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseAssumption {
    Trans,
    Cis,
}

impl Default for PhaseAssumption {
    fn default() -> Self {
        PhaseAssumption::Trans
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidencePenalties {
    pub missing_key_position: f64,
    pub unphased_heterozygote: f64,
    pub partial_allele_match: f64,
    pub indeterminate_call: f64,
    pub rare_unknown_allele: f64,
    pub no_coverage_data: f64,
}

impl Default for ConfidencePenalties {
    fn default() -> Self {
        ConfidencePenalties {
            missing_key_position: 0.8,
            unphased_heterozygote: 0.9,
            partial_allele_match: 0.7,
            indeterminate_call: 0.5,
            rare_unknown_allele: 0.7,
            no_coverage_data: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiplotypeResolutionConfig {
    pub homozygous_threshold: f64,
    pub heterozygous_threshold: f64,
    pub compound_het_min: f64,
    pub require_complete_match: bool,
    pub completeness_threshold: f64,
    pub default_phase_assumption: PhaseAssumption,
}

impl Default for DiplotypeResolutionConfig {
    fn default() -> Self {
        DiplotypeResolutionConfig {
            homozygous_threshold: 2.0,
            heterozygous_threshold: 1.0,
            compound_het_min: 1.0,
            require_complete_match: false,
            completeness_threshold: 0.8,
            default_phase_assumption: PhaseAssumption::Trans,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityScoreConfig {
    pub poor_metabolizer_max: f64,
    pub intermediate_metabolizer_max: f64,
    pub normal_metabolizer_max: f64,
    /// gene -> allele -> activity score. Alleles absent from this table default to
    /// 1.0 (conservative wildtype assumption) wherever they are looked up.
    pub gene_specific_scores: HashMap<String, HashMap<String, f64>>,
}

impl Default for ActivityScoreConfig {
    fn default() -> Self {
        let mut gene_specific_scores = HashMap::new();

        let mut cyp2d6 = HashMap::new();
        cyp2d6.insert("*1".to_string(), 1.0);
        cyp2d6.insert("*2".to_string(), 1.0);
        cyp2d6.insert("*4".to_string(), 0.0);
        cyp2d6.insert("*5".to_string(), 0.0);
        cyp2d6.insert("*6".to_string(), 0.0);
        cyp2d6.insert("*9".to_string(), 0.5);
        cyp2d6.insert("*10".to_string(), 0.25);
        cyp2d6.insert("*17".to_string(), 0.5);
        cyp2d6.insert("*29".to_string(), 0.5);
        cyp2d6.insert("*41".to_string(), 0.5);
        cyp2d6.insert("*1x2".to_string(), 2.0);
        cyp2d6.insert("*2x2".to_string(), 2.0);
        gene_specific_scores.insert("CYP2D6".to_string(), cyp2d6);

        let mut cyp2c19 = HashMap::new();
        cyp2c19.insert("*1".to_string(), 1.0);
        cyp2c19.insert("*2".to_string(), 0.0);
        cyp2c19.insert("*3".to_string(), 0.0);
        cyp2c19.insert("*17".to_string(), 1.5);
        gene_specific_scores.insert("CYP2C19".to_string(), cyp2c19);

        let mut cyp2c9 = HashMap::new();
        cyp2c9.insert("*1".to_string(), 1.0);
        cyp2c9.insert("*2".to_string(), 0.5);
        cyp2c9.insert("*3".to_string(), 0.0);
        gene_specific_scores.insert("CYP2C9".to_string(), cyp2c9);

        let mut tpmt = HashMap::new();
        tpmt.insert("*1".to_string(), 1.0);
        tpmt.insert("*2".to_string(), 0.0);
        tpmt.insert("*3A".to_string(), 0.0);
        tpmt.insert("*3C".to_string(), 0.0);
        gene_specific_scores.insert("TPMT".to_string(), tpmt);

        ActivityScoreConfig {
            poor_metabolizer_max: 0.5,
            intermediate_metabolizer_max: 1.5,
            normal_metabolizer_max: 2.5,
            gene_specific_scores,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub min_quality: f64,
    pub min_allele_depth_ratio: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        QualityThresholds {
            min_quality: 20.0,
            min_allele_depth_ratio: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackPriorBounds {
    pub min_prior: f64,
    pub max_prior: f64,
}

impl Default for FeedbackPriorBounds {
    fn default() -> Self {
        FeedbackPriorBounds {
            min_prior: 0.80,
            max_prior: 1.50,
        }
    }
}

/// Root configuration for the decision engine. Constructed in-process only; loading
/// or persisting config from a file is a caller concern outside this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PgxConfig {
    pub confidence_penalties: ConfidencePenalties,
    pub diplotype_resolution: DiplotypeResolutionConfig,
    pub activity_scores: ActivityScoreConfig,
    pub quality_thresholds: QualityThresholds,
    pub feedback_prior_bounds: FeedbackPriorBounds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_enumerated_values() {
        let config = PgxConfig::default();
        assert_eq!(config.confidence_penalties.missing_key_position, 0.8);
        assert_eq!(config.diplotype_resolution.homozygous_threshold, 2.0);
        assert_eq!(config.quality_thresholds.min_quality, 20.0);
        assert_eq!(config.feedback_prior_bounds.max_prior, 1.50);
    }

    #[test]
    fn unknown_allele_is_absent_from_activity_table() {
        let config = PgxConfig::default();
        let cyp2d6 = config.activity_scores.gene_specific_scores.get("CYP2D6").unwrap();
        assert!(!cyp2d6.contains_key("*99"));
    }
}
