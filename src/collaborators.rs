//! Interfaces for functionality the core treats as an external boundary: feedback
//! learning, population genetics, and variant ingestion. The core ships only the
//! null/in-memory defaults; real implementations live in the embedding application.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Population {
    Global,
    Eur,
    Afr,
    Eas,
    Sas,
    Amr,
}

impl Default for Population {
    fn default() -> Self {
        Population::Global
    }
}

/// Maps (gene, diplotype) to a multiplicative confidence/risk-score factor. Absent
/// (the default) is equivalent to a factor of 1.0. Applied only to the numeric risk
/// score, never to automation gate decisions.
pub trait FeedbackPriorStore {
    fn prior(&self, gene: &str, diplotype: &str) -> f64;
}

pub struct NullFeedbackPriorStore;

impl FeedbackPriorStore for NullFeedbackPriorStore {
    fn prior(&self, _gene: &str, _diplotype: &str) -> f64 {
        1.0
    }
}

/// Supplies population allele frequencies the resolver uses to estimate trans vs
/// cis phase probability for unphased compound heterozygotes.
pub trait PopulationFrequencyStore {
    fn allele_frequency(&self, gene: &str, allele: &str, population: Population) -> Option<f64>;
}

pub struct NullPopulationFrequencyStore;

impl PopulationFrequencyStore for NullPopulationFrequencyStore {
    fn allele_frequency(&self, _gene: &str, _allele: &str, _population: Population) -> Option<f64> {
        None
    }
}

/// Decouples the pipeline from how variants are produced. The core ships only an
/// in-memory implementation; VCF parsing is an external collaborator's job.
pub trait VariantSource {
    fn variants(&self) -> Vec<crate::types::variant::Variant>;
}

pub struct InMemoryVariantSource {
    variants: Vec<crate::types::variant::Variant>,
}

impl InMemoryVariantSource {
    pub fn new(variants: Vec<crate::types::variant::Variant>) -> Self {
        InMemoryVariantSource { variants }
    }
}

impl VariantSource for InMemoryVariantSource {
    fn variants(&self) -> Vec<crate::types::variant::Variant> {
        self.variants.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_feedback_prior_is_neutral() {
        let store = NullFeedbackPriorStore;
        assert_eq!(store.prior("CYP2D6", "*1/*4"), 1.0);
    }

    #[test]
    fn null_population_store_returns_none() {
        let store = NullPopulationFrequencyStore;
        assert_eq!(
            store.allele_frequency("CYP2D6", "*4", Population::Eur),
            None
        );
    }

    #[test]
    fn in_memory_variant_source_round_trips() {
        let source = InMemoryVariantSource::new(Vec::new());
        assert!(source.variants().is_empty());
    }
}
