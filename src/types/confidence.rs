use serde::{Deserialize, Serialize};

/// Six independent confidence components (each starts at 1.0 and is only ever
/// decremented by an explicit penalty), the genome-build validity signal the
/// derived `genotype_confidence` formula (spec §4.4) draws on, and the two
/// orthogonal external-evidence inputs. `final` is never set directly — it is
/// always recomputed from the other fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub variant_quality: f64,
    pub allele_coverage: f64,
    pub phase_resolution: f64,
    pub cnv_evaluation: f64,
    pub diplotype_determinism: f64,
    pub cpic_applicability: f64,
    pub genome_build_validity: f64,
    pub knowledge_confidence: f64,
    pub gene_drug_confirmed: bool,
    pub penalties_applied: Vec<String>,
}

impl Default for ConfidenceBreakdown {
    fn default() -> Self {
        ConfidenceBreakdown {
            variant_quality: 1.0,
            allele_coverage: 1.0,
            phase_resolution: 1.0,
            cnv_evaluation: 1.0,
            diplotype_determinism: 1.0,
            cpic_applicability: 1.0,
            genome_build_validity: 1.0,
            knowledge_confidence: 0.5,
            gene_drug_confirmed: false,
            penalties_applied: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gate {
    PhenotypeResolved,
    EvidenceSufficient,
    GenotypeQualityAdequate,
    GeneDrugConfirmed,
}

impl Gate {
    fn blocked_reason(self) -> &'static str {
        match self {
            Gate::PhenotypeResolved => "Phenotype unresolved",
            Gate::EvidenceSufficient => "Evidence insufficient",
            Gate::GenotypeQualityAdequate => "Genotype quality too low",
            Gate::GeneDrugConfirmed => "Gene-drug pair not confirmed",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationStatus {
    pub allowed: bool,
    pub blocked_reasons: Vec<String>,
}

impl ConfidenceBreakdown {
    pub fn apply_penalty(&mut self, field: &mut f64, amount: f64, reason: impl Into<String>) {
        *field = (*field - amount).max(0.0);
        self.penalties_applied.push(reason.into());
    }

    /// Weighted mean, deliberately not a min(), so a single weak component cannot
    /// collapse the whole layer (spec §4.4).
    pub fn genotype_confidence(&self) -> f64 {
        0.35 * self.allele_coverage
            + 0.25 * self.cnv_evaluation
            + 0.25 * self.variant_quality
            + 0.15 * self.genome_build_validity
    }

    /// Zero whenever diplotype_determinism is zero.
    pub fn phenotype_confidence(&self) -> f64 {
        self.genotype_confidence() * self.diplotype_determinism
    }

    /// Classification stays informative even when phenotype resolution failed,
    /// because external knowledge (CPIC/PharmGKB evidence) retains value on its own.
    pub fn classification_confidence(&self) -> f64 {
        let phenotype_confidence = self.phenotype_confidence();
        let resolved_but_unknown_term = 1.0 - phenotype_confidence;
        0.6 * phenotype_confidence.max(resolved_but_unknown_term) + 0.4 * self.knowledge_confidence
    }

    fn phenotype_cap(&self) -> f64 {
        if self.phenotype_confidence() == 0.0 {
            0.50
        } else {
            1.0
        }
    }

    fn automation_cap(&self) -> f64 {
        if self.automation_status().allowed {
            1.0
        } else {
            0.70
        }
    }

    /// Pure function of the component scores; never set directly.
    pub fn final_confidence(&self) -> f64 {
        self.classification_confidence()
            .min(self.phenotype_cap())
            .min(self.automation_cap())
            .clamp(0.0, 1.0)
    }

    fn failed_gates(&self) -> Vec<Gate> {
        let mut failed = Vec::new();
        if self.phenotype_confidence() <= 0.0 {
            failed.push(Gate::PhenotypeResolved);
        }
        if self.knowledge_confidence < 0.80 {
            failed.push(Gate::EvidenceSufficient);
        }
        if self.genotype_confidence() < 0.50 {
            failed.push(Gate::GenotypeQualityAdequate);
        }
        if !self.gene_drug_confirmed {
            failed.push(Gate::GeneDrugConfirmed);
        }
        failed
    }

    pub fn automation_status(&self) -> AutomationStatus {
        let failed = self.failed_gates();
        AutomationStatus {
            allowed: failed.is_empty(),
            blocked_reasons: failed.into_iter().map(|g| g.blocked_reason().to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_breakdown_blocks_on_unresolved_phenotype_and_low_evidence() {
        let breakdown = ConfidenceBreakdown::default();
        let status = breakdown.automation_status();
        assert!(!status.allowed);
        assert!(status.blocked_reasons.contains(&"Phenotype unresolved".to_string()));
    }

    #[test]
    fn zero_determinism_caps_final_at_half() {
        let mut breakdown = ConfidenceBreakdown::default();
        breakdown.diplotype_determinism = 0.0;
        breakdown.knowledge_confidence = 1.0;
        breakdown.gene_drug_confirmed = true;
        assert_eq!(breakdown.phenotype_confidence(), 0.0);
        assert!(breakdown.final_confidence() <= 0.50);
    }

    #[test]
    fn blocked_automation_caps_final_at_0_70() {
        let mut breakdown = ConfidenceBreakdown::default();
        breakdown.diplotype_determinism = 1.0;
        breakdown.knowledge_confidence = 1.0;
        breakdown.gene_drug_confirmed = false;
        assert!(breakdown.final_confidence() <= 0.70);
    }

    #[test]
    fn fully_confident_breakdown_allows_automation() {
        let mut breakdown = ConfidenceBreakdown::default();
        breakdown.knowledge_confidence = 1.0;
        breakdown.gene_drug_confirmed = true;
        let status = breakdown.automation_status();
        assert!(status.allowed);
        assert!(status.blocked_reasons.is_empty());
    }

    #[test]
    fn final_is_always_within_unit_interval() {
        let breakdown = ConfidenceBreakdown::default();
        let final_score = breakdown.final_confidence();
        assert!((0.0..=1.0).contains(&final_score));
    }
}
