use std::collections::HashSet;

/// A pharmacogene tracked by the reference corpus.
#[derive(Debug, Clone)]
pub struct Gene {
    pub symbol: String,
    pub key_positions: HashSet<u64>,
    pub cnv_required: bool,
}

impl Gene {
    pub fn new(symbol: impl Into<String>, key_positions: HashSet<u64>, cnv_required: bool) -> Self {
        Gene {
            symbol: symbol.into(),
            key_positions,
            cnv_required,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyp2d6_is_cnv_required_by_construction() {
        let gene = Gene::new("CYP2D6", HashSet::from([42126611, 42127941]), true);
        assert!(gene.cnv_required);
        assert_eq!(gene.key_positions.len(), 2);
    }
}
