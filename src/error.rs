use thiserror::Error;

/// Error taxonomy for the decision engine.
///
/// Only [`PgxError::IntegrityViolation`] and [`PgxError::InvariantViolation`] halt
/// assembly of a response; every other recoverable insufficiency (unsupported drug,
/// unresolved phenotype, missing CPIC rule) is represented as an `Ok` response with
/// the relevant fields populated rather than as an error.
#[derive(Debug, Error)]
pub enum PgxError {
    #[error("drug '{drug}' is not currently supported by CPIC guidelines")]
    UnsupportedDrug { drug: String },

    #[error("unresolved phenotype for gene {gene}: diplotype={diplotype} phenotype={phenotype}")]
    UnresolvedPhenotype {
        gene: String,
        diplotype: String,
        phenotype: String,
    },

    #[error(
        "gene-drug integrity error: corpus confirmed drug '{confirmed_drug}' for gene {gene}, expected '{drug}'"
    )]
    IntegrityViolation {
        gene: String,
        drug: String,
        confirmed_drug: String,
    },

    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

pub type PgxResult<T> = Result<T, PgxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_violation_message_names_both_drugs() {
        let err = PgxError::IntegrityViolation {
            gene: "CYP2D6".into(),
            drug: "codeine".into(),
            confirmed_drug: "tramadol".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("codeine"));
        assert!(msg.contains("tramadol"));
    }
}
