use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Zygosity {
    HomRef,
    Het,
    HomAlt,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterStatus {
    Pass,
    Other(String),
    Absent,
}

impl FilterStatus {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => FilterStatus::Absent,
            Some("PASS") | Some(".") => FilterStatus::Pass,
            Some(other) => FilterStatus::Other(other.to_string()),
        }
    }

    pub fn passes(&self) -> bool {
        matches!(self, FilterStatus::Pass | FilterStatus::Absent)
    }
}

/// A single observed variant. Constructed once by the caller's variant source and
/// never mutated after construction; the normalizer (C2) produces new `Variant`
/// values rather than editing these in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub chrom: String,
    pub pos: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsid: Option<String>,
    pub reference: String,
    pub alt: String,
    pub zygosity: Zygosity,
    pub quality: f64,
    pub filter: FilterStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allele_depth: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub star_allele: Option<String>,
    pub phased: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_set: Option<String>,
}

impl Variant {
    /// Identity key: (chrom, pos, ref, alt). Used for deduplication and for
    /// matching against allele-defining variant keys in the corpus.
    pub fn identity_key(&self) -> String {
        format!("{}:{}:{}:{}", self.chrom, self.pos, self.reference, self.alt)
    }

    /// Allele-defining key used by the corpus (pos:ref:alt) — position alone is
    /// sufficient to disambiguate within a single gene's coordinate space.
    pub fn variant_key(&self) -> String {
        format!("{}:{}:{}", self.pos, self.reference, self.alt)
    }

    pub fn allele_depth_ratio(&self) -> Option<f64> {
        self.allele_depth.and_then(|(ref_depth, alt_depth)| {
            let total = ref_depth + alt_depth;
            if total == 0 {
                None
            } else {
                Some(alt_depth as f64 / total as f64)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_variant() -> Variant {
        Variant {
            chrom: "22".to_string(),
            pos: 42126611,
            rsid: None,
            reference: "C".to_string(),
            alt: "G".to_string(),
            zygosity: Zygosity::HomAlt,
            quality: 99.0,
            filter: FilterStatus::Pass,
            allele_depth: Some((0, 40)),
            star_allele: None,
            phased: false,
            phase_set: None,
        }
    }

    #[test]
    fn variant_key_omits_chromosome() {
        let variant = sample_variant();
        assert_eq!(variant.variant_key(), "42126611:C:G");
        assert_eq!(variant.identity_key(), "22:42126611:C:G");
    }

    #[test]
    fn allele_depth_ratio_computes_alt_fraction() {
        let variant = sample_variant();
        assert_eq!(variant.allele_depth_ratio(), Some(1.0));
    }

    #[test]
    fn filter_status_treats_dot_and_absent_as_passing() {
        assert!(FilterStatus::from_raw(Some(".")).passes());
        assert!(FilterStatus::from_raw(None).passes());
        assert!(!FilterStatus::from_raw(Some("q20")).passes());
    }
}
