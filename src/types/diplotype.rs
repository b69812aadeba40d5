use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn leading_digits_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\*(\d+)").expect("valid regex"))
}

/// Sort key used to canonicalize a diplotype's allele pair: "*1" sorts first, then
/// numbered star alleles by numeric value, then anything else lexically.
fn allele_sort_key(allele: &str) -> (u8, u64, String) {
    if allele == "*1" {
        return (0, 0, String::new());
    }
    if let Some(caps) = leading_digits_regex().captures(allele) {
        if let Ok(n) = caps[1].parse::<u64>() {
            return (1, n, String::new());
        }
    }
    (2, 0, allele.to_string())
}

/// Canonicalizes a diplotype string so that the numerically-lower allele always
/// appears first: canonical("*2/*1") == canonical("*1/*2") == "*1/*2". Idempotent.
pub fn canonicalize_diplotype(diplotype: &str) -> String {
    let mut alleles: Vec<&str> = diplotype.split('/').map(str::trim).collect();
    alleles.sort_by_key(|a| allele_sort_key(a));
    alleles.join("/")
}

pub fn make_diplotype(allele_a: &str, allele_b: &str) -> String {
    canonicalize_diplotype(&format!("{allele_a}/{allele_b}"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phenotype {
    PoorMetabolizer,
    IntermediateMetabolizer,
    NormalMetabolizer,
    RapidMetabolizer,
    UltrarapidMetabolizer,
    PoorFunction,
    DecreasedFunction,
    NormalFunction,
    IncreasedFunction,
    Indeterminate,
    Unknown,
}

impl Phenotype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phenotype::PoorMetabolizer => "PM",
            Phenotype::IntermediateMetabolizer => "IM",
            Phenotype::NormalMetabolizer => "NM",
            Phenotype::RapidMetabolizer => "RM",
            Phenotype::UltrarapidMetabolizer => "UM",
            Phenotype::PoorFunction => "Poor Function",
            Phenotype::DecreasedFunction => "Decreased Function",
            Phenotype::NormalFunction => "Normal Function",
            Phenotype::IncreasedFunction => "Increased Function",
            Phenotype::Indeterminate => "Indeterminate",
            Phenotype::Unknown => "Unknown",
        }
    }

    /// True for the phenotypes the "normal-phenotype implies non-critical severity"
    /// invariant (spec.md §3) applies to.
    pub fn is_normal_family(&self) -> bool {
        matches!(self, Phenotype::NormalMetabolizer | Phenotype::NormalFunction)
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Phenotype::Indeterminate | Phenotype::Unknown)
    }

    pub fn from_str_loose(value: &str) -> Phenotype {
        match value {
            "PM" => Phenotype::PoorMetabolizer,
            "IM" => Phenotype::IntermediateMetabolizer,
            "NM" => Phenotype::NormalMetabolizer,
            "RM" => Phenotype::RapidMetabolizer,
            "UM" => Phenotype::UltrarapidMetabolizer,
            "Poor Function" => Phenotype::PoorFunction,
            "Decreased Function" => Phenotype::DecreasedFunction,
            "Normal Function" => Phenotype::NormalFunction,
            "Increased Function" => Phenotype::IncreasedFunction,
            "Indeterminate" => Phenotype::Indeterminate,
            _ => Phenotype::Unknown,
        }
    }
}

/// Specific reason a diplotype call is not a confident one. Variants carry an
/// implicit priority (declaration order) used when more than one condition applies:
/// UnsupportedGene > NovelVariants > NoCoverage > Ambiguous > PartialMatch >
/// LowQuality > None.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndeterminateReason {
    UnsupportedGene,
    NovelVariants,
    NoCoverage,
    Ambiguous,
    PartialMatch,
    LowQuality,
    None,
}

impl IndeterminateReason {
    fn priority(self) -> u8 {
        match self {
            IndeterminateReason::UnsupportedGene => 0,
            IndeterminateReason::NovelVariants => 1,
            IndeterminateReason::NoCoverage => 2,
            IndeterminateReason::Ambiguous => 3,
            IndeterminateReason::PartialMatch => 4,
            IndeterminateReason::LowQuality => 5,
            IndeterminateReason::None => 6,
        }
    }

    /// Returns whichever of `self`/`other` is more specific per the fixed priority
    /// order. Ties keep `self`.
    pub fn most_specific(self, other: IndeterminateReason) -> IndeterminateReason {
        if other.priority() < self.priority() {
            other
        } else {
            self
        }
    }
}

pub const UNRESOLVED: &str = "Unresolved";
pub const INDETERMINATE: &str = "Indeterminate";
pub const UNKNOWN: &str = "Unknown";
pub const WILDTYPE: &str = "*1/*1";

pub fn is_terminal_diplotype(diplotype: &str) -> bool {
    matches!(diplotype, UNRESOLVED | INDETERMINATE | UNKNOWN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_is_order_insensitive() {
        assert_eq!(canonicalize_diplotype("*2/*1"), "*1/*2");
        assert_eq!(canonicalize_diplotype("*1/*2"), "*1/*2");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let once = canonicalize_diplotype("*10/*4");
        let twice = canonicalize_diplotype(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "*4/*10");
    }

    #[test]
    fn star_one_always_sorts_first() {
        assert_eq!(canonicalize_diplotype("*41/*1"), "*1/*41");
    }

    #[test]
    fn indeterminate_reason_prefers_more_specific() {
        let combined = IndeterminateReason::LowQuality.most_specific(IndeterminateReason::NoCoverage);
        assert_eq!(combined, IndeterminateReason::NoCoverage);
    }

    #[test]
    fn normal_family_detects_both_metabolizer_and_function_phenotypes() {
        assert!(Phenotype::NormalMetabolizer.is_normal_family());
        assert!(Phenotype::NormalFunction.is_normal_family());
        assert!(!Phenotype::PoorMetabolizer.is_normal_family());
    }
}
