//! Reference Corpus (C1): an immutable, precompiled knowledge bundle providing
//! constant-time lookups over allele definitions, diplotype/phenotype maps,
//! activity scores, and PharmGKB-style gene-drug evidence. Built once via
//! [`ReferenceCorpus::seeded`] or [`ReferenceCorpus::builder`] and shared by
//! reference for the lifetime of the process (spec.md §5).

use std::collections::{HashMap, HashSet};

use crate::config::PgxConfig;
use crate::types::diplotype::Phenotype;
use crate::types::gene::Gene;
use crate::types::response::{ClinicalAnnotation, EvidenceLevel, GeneDrugConfirmation};

#[derive(Debug, Clone)]
pub struct DrugRecommendation {
    pub summary: String,
    pub implication: String,
    pub url: Option<String>,
    pub severity: String,
}

#[derive(Debug, Clone)]
struct RelationshipRow {
    annotation_id: String,
    gene: String,
    drug: String,
    evidence_type: String,
    association: String,
    level: String,
    pmids: Vec<String>,
}

fn level_rank(level: &str) -> u8 {
    match level {
        "1A" => 1,
        "1B" => 2,
        "2A" => 3,
        "2B" => 4,
        "3" => 5,
        "4" => 6,
        _ => 99,
    }
}

fn evidence_weight(level: &str) -> f64 {
    match level {
        "1A" | "1B" => 1.00,
        "2A" => 0.85,
        "2B" => 0.80,
        "3" => 0.65,
        "4" => 0.50,
        _ => 0.50,
    }
}

fn allows_automated_recommendation(level: &str) -> bool {
    matches!(level, "1A" | "1B" | "2A" | "2B")
}

fn normalize_name(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

pub struct ReferenceCorpus {
    genes: HashMap<String, Gene>,
    allele_definitions: HashMap<String, HashMap<String, HashSet<String>>>,
    diplotype_phenotype: HashMap<String, HashMap<String, Phenotype>>,
    activity_scores: HashMap<String, HashMap<String, f64>>,
    drug_recommendations: HashMap<(String, String), DrugRecommendation>,
    relationships: Vec<RelationshipRow>,
}

impl ReferenceCorpus {
    pub fn builder() -> ReferenceCorpusBuilder {
        ReferenceCorpusBuilder::default()
    }

    pub fn gene(&self, gene: &str) -> Option<&Gene> {
        self.genes.get(gene)
    }

    pub fn is_gene_supported(&self, gene: &str) -> bool {
        self.genes.contains_key(gene)
    }

    pub fn allele_definitions(&self, gene: &str) -> Option<&HashMap<String, HashSet<String>>> {
        self.allele_definitions.get(gene)
    }

    pub fn variant_to_alleles(&self, gene: &str) -> HashMap<String, HashSet<String>> {
        let mut map: HashMap<String, HashSet<String>> = HashMap::new();
        if let Some(alleles) = self.allele_definitions.get(gene) {
            for (allele, keys) in alleles {
                for key in keys {
                    map.entry(key.clone()).or_default().insert(allele.clone());
                }
            }
        }
        map
    }

    /// Tries both the diplotype string as given and its canonicalized form.
    pub fn diplotype_phenotype(&self, gene: &str, diplotype: &str) -> Option<&Phenotype> {
        let table = self.diplotype_phenotype.get(gene)?;
        table
            .get(diplotype)
            .or_else(|| table.get(&crate::types::diplotype::canonicalize_diplotype(diplotype)))
    }

    /// Unknown alleles default to 1.0 (conservative wildtype assumption).
    pub fn activity_score(&self, gene: &str, allele: &str) -> f64 {
        self.activity_scores
            .get(gene)
            .and_then(|table| table.get(allele))
            .copied()
            .unwrap_or(1.0)
    }

    pub fn key_positions(&self, gene: &str) -> HashSet<u64> {
        self.genes
            .get(gene)
            .map(|g| g.key_positions.clone())
            .unwrap_or_default()
    }

    pub fn drug_recommendation(&self, drug: &str, phenotype: &str) -> Option<&DrugRecommendation> {
        self.drug_recommendations
            .get(&(normalize_name(drug), phenotype.to_string()))
    }

    /// True iff the evidence store contains at least one row, for any gene, whose
    /// evidence level is 1A or 1B and which references this drug.
    pub fn drug_supported(&self, drug: &str) -> bool {
        let drug = normalize_name(drug);
        self.relationships
            .iter()
            .any(|row| normalize_name(&row.drug) == drug && matches!(row.level.as_str(), "1A" | "1B"))
    }

    fn rows_for(&self, gene: &str, drug: &str) -> Vec<&RelationshipRow> {
        let drug = normalize_name(drug);
        self.relationships
            .iter()
            .filter(|row| row.gene == gene && normalize_name(&row.drug) == drug)
            .collect()
    }

    fn strongest_level<'a>(rows: impl Iterator<Item = &'a RelationshipRow>) -> Option<String> {
        rows.map(|r| r.level.clone()).min_by_key(|l| level_rank(l))
    }

    pub fn evidence_level(&self, gene: &str, drug: &str) -> EvidenceLevel {
        let rows = self.rows_for(gene, drug);
        match Self::strongest_level(rows.into_iter()) {
            Some(level) => EvidenceLevel {
                allows_automated_recommendation: allows_automated_recommendation(&level),
                confidence_weight: evidence_weight(&level),
                level,
            },
            None => EvidenceLevel {
                level: "none".to_string(),
                confidence_weight: 0.50,
                allows_automated_recommendation: false,
            },
        }
    }

    /// Deterministic association classification (spec.md §4.1), evaluated in order.
    fn classify_association(&self, gene: &str, drug: &str) -> String {
        let rows = self.rows_for(gene, drug);
        if rows.is_empty() {
            return "unconfirmed".to_string();
        }

        let associations: HashSet<String> = rows.iter().map(|r| r.association.clone()).collect();
        if associations.contains("associated") && associations.contains("not associated") {
            return "conflicting".to_string();
        }

        let level = Self::strongest_level(rows.iter().copied()).unwrap_or_else(|| "none".to_string());
        let evidence_types: HashSet<String> = rows.iter().map(|r| r.evidence_type.clone()).collect();

        if matches!(level.as_str(), "1A" | "1B") && evidence_types.iter().any(|t| t.contains("Guideline")) {
            return "established".to_string();
        }
        if matches!(level.as_str(), "2A" | "2B") {
            return "moderate".to_string();
        }
        if level == "3" && evidence_types.len() >= 3 {
            return "emerging".to_string();
        }
        "limited".to_string()
    }

    pub fn confirm_gene_drug(&self, gene: &str, drug: &str) -> GeneDrugConfirmation {
        let rows = self.rows_for(gene, drug);
        if rows.is_empty() {
            return GeneDrugConfirmation {
                gene: gene.to_string(),
                drug: drug.to_string(),
                confirmed: false,
                evidence_types: Vec::new(),
                association: "not found".to_string(),
                source_pmids: Vec::new(),
            };
        }

        let mut evidence_types: Vec<String> = rows.iter().map(|r| r.evidence_type.clone()).collect();
        evidence_types.sort();
        evidence_types.dedup();

        let mut pmids: Vec<String> = rows.iter().flat_map(|r| r.pmids.clone()).collect();
        pmids.sort();
        pmids.dedup();
        pmids.truncate(20);

        GeneDrugConfirmation {
            gene: gene.to_string(),
            drug: rows[0].drug.clone(),
            confirmed: true,
            evidence_types,
            association: self.classify_association(gene, drug),
            source_pmids: pmids,
        }
    }

    /// Deduplicated on (annotation_id, evidence_type), harmonized per spec.md §4.1.1.
    pub fn clinical_annotations(&self, gene: &str, drug: &str) -> Vec<ClinicalAnnotation> {
        let rows = self.rows_for(gene, drug);
        let top = self.classify_association(gene, drug);

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut annotations = Vec::new();
        for row in rows {
            let key = (row.annotation_id.clone(), row.evidence_type.clone());
            if !seen.insert(key) {
                continue;
            }
            let mut pmids = row.pmids.clone();
            pmids.sort();
            pmids.dedup();
            pmids.truncate(10);
            annotations.push(ClinicalAnnotation {
                annotation_id: row.annotation_id.clone(),
                gene: row.gene.clone(),
                drug: row.drug.clone(),
                evidence_type: row.evidence_type.clone(),
                association: row.association.clone(),
                pmids,
            });
        }

        harmonize_annotation_associations(annotations, &top)
    }
}

/// When the top-level classification is established/moderate/emerging/limited,
/// rewrites each nested annotation's association so none contradicts the parent:
/// "associated"/"ambiguous" -> "supporting"; "not associated" preserved;
/// anything else with a non-empty evidence_type -> "supporting". For "conflicting"
/// or "unconfirmed" tops, raw values are returned unchanged. Builds new records
/// rather than mutating the input; idempotent (harmonize(harmonize(x,t),t) == harmonize(x,t)).
pub fn harmonize_annotation_associations(
    annotations: Vec<ClinicalAnnotation>,
    top_level_association: &str,
) -> Vec<ClinicalAnnotation> {
    const HARMONIZED_TOPS: [&str; 4] = ["established", "moderate", "emerging", "limited"];
    if !HARMONIZED_TOPS.contains(&top_level_association) {
        return annotations;
    }

    annotations
        .into_iter()
        .map(|annotation| {
            let association = match annotation.association.as_str() {
                "associated" | "ambiguous" => "supporting".to_string(),
                "not associated" => annotation.association.clone(),
                _ if !annotation.evidence_type.is_empty() => "supporting".to_string(),
                _ => annotation.association.clone(),
            };
            ClinicalAnnotation {
                association,
                ..annotation
            }
        })
        .collect()
}

#[derive(Default)]
pub struct ReferenceCorpusBuilder {
    genes: HashMap<String, Gene>,
    allele_definitions: HashMap<String, HashMap<String, HashSet<String>>>,
    diplotype_phenotype: HashMap<String, HashMap<String, Phenotype>>,
    activity_scores: HashMap<String, HashMap<String, f64>>,
    drug_recommendations: HashMap<(String, String), DrugRecommendation>,
    relationships: Vec<RelationshipRow>,
}

impl ReferenceCorpusBuilder {
    pub fn gene(mut self, gene: Gene) -> Self {
        self.genes.insert(gene.symbol.clone(), gene);
        self
    }

    pub fn allele(mut self, gene: &str, allele: &str, defining_keys: &[&str]) -> Self {
        self.allele_definitions
            .entry(gene.to_string())
            .or_default()
            .insert(allele.to_string(), defining_keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn diplotype_phenotype(mut self, gene: &str, diplotype: &str, phenotype: Phenotype) -> Self {
        self.diplotype_phenotype
            .entry(gene.to_string())
            .or_default()
            .insert(diplotype.to_string(), phenotype);
        self
    }

    pub fn activity_score(mut self, gene: &str, allele: &str, score: f64) -> Self {
        self.activity_scores
            .entry(gene.to_string())
            .or_default()
            .insert(allele.to_string(), score);
        self
    }

    pub fn drug_recommendation(
        mut self,
        drug: &str,
        phenotype: &str,
        recommendation: DrugRecommendation,
    ) -> Self {
        self.drug_recommendations
            .insert((normalize_name(drug), phenotype.to_string()), recommendation);
        self
    }

    pub fn relationship(
        mut self,
        annotation_id: &str,
        gene: &str,
        drug: &str,
        evidence_type: &str,
        association: &str,
        level: &str,
        pmids: &[&str],
    ) -> Self {
        self.relationships.push(RelationshipRow {
            annotation_id: annotation_id.to_string(),
            gene: gene.to_string(),
            drug: drug.to_string(),
            evidence_type: evidence_type.to_string(),
            association: association.to_string(),
            level: level.to_string(),
            pmids: pmids.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> ReferenceCorpus {
        ReferenceCorpus {
            genes: self.genes,
            allele_definitions: self.allele_definitions,
            diplotype_phenotype: self.diplotype_phenotype,
            activity_scores: self.activity_scores,
            drug_recommendations: self.drug_recommendations,
            relationships: self.relationships,
        }
    }
}

impl ReferenceCorpus {
    /// A corpus covering the genes/drugs exercised by spec.md §8's end-to-end
    /// scenarios: CYP2D6/codeine, CYP2C19/clopidogrel, CYP2C9/warfarin,
    /// SLCO1B1/simvastatin, TPMT/azathioprine & thioguanine, DPYD/fluorouracil.
    /// A documented starting point, not a claim of clinical completeness — full
    /// CPIC/PharmGKB datasets are built via [`ReferenceCorpus::builder`].
    pub fn seeded(config: &PgxConfig) -> ReferenceCorpus {
        let mut builder = ReferenceCorpus::builder()
            .gene(Gene::new(
                "CYP2D6",
                HashSet::from([42126611, 42127941, 42130692]),
                true,
            ))
            .gene(Gene::new(
                "CYP2C19",
                HashSet::from([94775367, 94781859, 94842866]),
                false,
            ))
            .gene(Gene::new("CYP2C9", HashSet::from([96702047]), false))
            .gene(Gene::new("TPMT", HashSet::from([18143955]), false))
            .gene(Gene::new("SLCO1B1", HashSet::from([21331549]), false))
            .gene(Gene::new("DPYD", HashSet::from([97915614]), false))
            // CYP2D6
            .allele("CYP2D6", "*4", &["42126611:C:G"])
            .allele("CYP2D6", "*9", &["42127941:A:ACT"])
            .allele("CYP2D6", "*10", &["42130692:C:T"])
            .diplotype_phenotype("CYP2D6", "*1/*1", Phenotype::NormalMetabolizer)
            .diplotype_phenotype("CYP2D6", "*1/*4", Phenotype::IntermediateMetabolizer)
            .diplotype_phenotype("CYP2D6", "*4/*4", Phenotype::PoorMetabolizer)
            .diplotype_phenotype("CYP2D6", "*1x2/*1", Phenotype::UltrarapidMetabolizer)
            // CYP2C19
            .allele("CYP2C19", "*2", &["94781859:G:A", "94775367:A:G", "94842866:C:T"])
            .allele("CYP2C19", "*17", &["94842866:C:T"])
            .diplotype_phenotype("CYP2C19", "*1/*1", Phenotype::NormalMetabolizer)
            .diplotype_phenotype("CYP2C19", "*1/*2", Phenotype::IntermediateMetabolizer)
            .diplotype_phenotype("CYP2C19", "*2/*2", Phenotype::PoorMetabolizer)
            .diplotype_phenotype("CYP2C19", "*1/*17", Phenotype::RapidMetabolizer)
            .diplotype_phenotype("CYP2C19", "*17/*17", Phenotype::UltrarapidMetabolizer)
            // CYP2C9
            .allele("CYP2C9", "*2", &["96702047:C:T"])
            .allele("CYP2C9", "*3", &["96702047:A:C"])
            .diplotype_phenotype("CYP2C9", "*1/*1", Phenotype::NormalMetabolizer)
            .diplotype_phenotype("CYP2C9", "*1/*3", Phenotype::IntermediateMetabolizer)
            .diplotype_phenotype("CYP2C9", "*3/*3", Phenotype::PoorMetabolizer)
            // TPMT
            .allele("TPMT", "*3A", &["18143955:G:A"])
            .diplotype_phenotype("TPMT", "*1/*1", Phenotype::NormalMetabolizer)
            .diplotype_phenotype("TPMT", "*1/*3A", Phenotype::IntermediateMetabolizer)
            .diplotype_phenotype("TPMT", "*3A/*3A", Phenotype::PoorMetabolizer)
            // SLCO1B1 (transporter gene, Function phenotypes)
            .allele("SLCO1B1", "*5", &["21331549:T:C"])
            .diplotype_phenotype("SLCO1B1", "*1/*1", Phenotype::NormalFunction)
            .diplotype_phenotype("SLCO1B1", "*1/*5", Phenotype::DecreasedFunction)
            .diplotype_phenotype("SLCO1B1", "*5/*5", Phenotype::PoorFunction)
            // DPYD
            .allele("DPYD", "*2A", &["97915614:G:A"])
            .diplotype_phenotype("DPYD", "*1/*1", Phenotype::NormalMetabolizer)
            .diplotype_phenotype("DPYD", "*1/*2A", Phenotype::IntermediateMetabolizer)
            .diplotype_phenotype("DPYD", "*2A/*2A", Phenotype::PoorMetabolizer);

        for (gene, table) in &config.activity_scores.gene_specific_scores {
            for (allele, score) in table {
                builder = builder.activity_score(gene, allele, *score);
            }
        }

        builder
            .drug_recommendation(
                "codeine",
                "PM",
                DrugRecommendation {
                    summary: "Avoid codeine due to lack of efficacy".to_string(),
                    implication: "Greatly reduced morphine formation; risk of insufficient analgesia".to_string(),
                    url: Some("https://cpicpgx.org/guidelines/guideline-for-codeine-and-cyp2d6/".to_string()),
                    severity: "high".to_string(),
                },
            )
            .drug_recommendation(
                "codeine",
                "UM",
                DrugRecommendation {
                    summary: "Avoid codeine due to potential for toxicity".to_string(),
                    implication: "Increased morphine formation leading to higher risk of toxicity".to_string(),
                    url: Some("https://cpicpgx.org/guidelines/guideline-for-codeine-and-cyp2d6/".to_string()),
                    severity: "critical".to_string(),
                },
            )
            .drug_recommendation(
                "codeine",
                "NM",
                DrugRecommendation {
                    summary: "Standard dosing recommended".to_string(),
                    implication: "Normal morphine formation from codeine".to_string(),
                    url: Some("https://cpicpgx.org/guidelines/guideline-for-codeine-and-cyp2d6/".to_string()),
                    severity: "none".to_string(),
                },
            )
            .drug_recommendation(
                "clopidogrel",
                "IM",
                DrugRecommendation {
                    summary: "Consider alternative antiplatelet therapy or adjust dosage".to_string(),
                    implication: "Reduced formation of clopidogrel active metabolite".to_string(),
                    url: Some("https://cpicpgx.org/guidelines/guideline-for-clopidogrel-and-cyp2c19/".to_string()),
                    severity: "moderate".to_string(),
                },
            )
            .drug_recommendation(
                "clopidogrel",
                "PM",
                DrugRecommendation {
                    summary: "Use alternative antiplatelet therapy".to_string(),
                    implication: "Significantly reduced platelet inhibition; increased risk of adverse cardiovascular events".to_string(),
                    url: Some("https://cpicpgx.org/guidelines/guideline-for-clopidogrel-and-cyp2c19/".to_string()),
                    severity: "high".to_string(),
                },
            )
            .drug_recommendation(
                "clopidogrel",
                "NM",
                DrugRecommendation {
                    summary: "Standard dosing recommended".to_string(),
                    implication: "Normal formation of clopidogrel active metabolite".to_string(),
                    url: Some("https://cpicpgx.org/guidelines/guideline-for-clopidogrel-and-cyp2c19/".to_string()),
                    severity: "none".to_string(),
                },
            )
            .relationship(
                "PA166104949",
                "CYP2D6",
                "codeine",
                "Dosing Guideline",
                "associated",
                "1A",
                &["19769432", "24458010"],
            )
            .relationship(
                "PA166104950",
                "CYP2D6",
                "codeine",
                "Label annotation",
                "associated",
                "1A",
                &["24458010"],
            )
            .relationship(
                "PA166161537",
                "CYP2C19",
                "clopidogrel",
                "Dosing Guideline",
                "associated",
                "1A",
                &["23698643"],
            )
            .relationship(
                "PA166104960",
                "CYP2C9",
                "warfarin",
                "Dosing Guideline",
                "associated",
                "1A",
                &["28198005"],
            )
            .relationship(
                "PA166105005",
                "SLCO1B1",
                "simvastatin",
                "Dosing Guideline",
                "associated",
                "1A",
                &["24918167"],
            )
            .relationship(
                "PA166105016",
                "TPMT",
                "azathioprine",
                "Dosing Guideline",
                "associated",
                "1A",
                &["21270794"],
            )
            .relationship(
                "PA166105017",
                "TPMT",
                "thioguanine",
                "Dosing Guideline",
                "associated",
                "1A",
                &["21270794"],
            )
            .relationship(
                "PA166105020",
                "DPYD",
                "fluorouracil",
                "Dosing Guideline",
                "associated",
                "1A",
                &["23988873"],
            )
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> ReferenceCorpus {
        ReferenceCorpus::seeded(&PgxConfig::default())
    }

    #[test]
    fn unsupported_gene_is_not_listed() {
        let corpus = corpus();
        assert!(!corpus.is_gene_supported("FAKE_GENE"));
        assert!(corpus.is_gene_supported("CYP2D6"));
    }

    #[test]
    fn unknown_allele_defaults_activity_score_to_one() {
        let corpus = corpus();
        assert_eq!(corpus.activity_score("CYP2D6", "*99"), 1.0);
        assert_eq!(corpus.activity_score("CYP2D6", "*4"), 0.0);
    }

    #[test]
    fn diplotype_phenotype_tries_canonical_form() {
        let corpus = corpus();
        assert_eq!(
            corpus.diplotype_phenotype("CYP2D6", "*4/*1"),
            corpus.diplotype_phenotype("CYP2D6", "*1/*4")
        );
    }

    #[test]
    fn drug_supported_is_true_for_1a_evidence() {
        let corpus = corpus();
        assert!(corpus.drug_supported("codeine"));
        assert!(!corpus.drug_supported("notarealdrug"));
    }

    #[test]
    fn confirm_gene_drug_reports_not_found_for_unknown_pair() {
        let corpus = corpus();
        let confirmation = corpus.confirm_gene_drug("CYP2D6", "aspirin");
        assert!(!confirmation.confirmed);
        assert_eq!(confirmation.association, "not found");
    }

    #[test]
    fn association_classification_is_established_for_guideline_1a() {
        let corpus = corpus();
        let confirmation = corpus.confirm_gene_drug("CYP2D6", "codeine");
        assert!(confirmation.confirmed);
        assert_eq!(confirmation.association, "established");
    }

    #[test]
    fn harmonization_is_a_fixpoint() {
        let annotations = vec![ClinicalAnnotation {
            annotation_id: "A1".to_string(),
            gene: "CYP2D6".to_string(),
            drug: "codeine".to_string(),
            evidence_type: "Dosing Guideline".to_string(),
            association: "associated".to_string(),
            pmids: vec![],
        }];
        let once = harmonize_annotation_associations(annotations.clone(), "established");
        let twice = harmonize_annotation_associations(once.clone(), "established");
        assert_eq!(once[0].association, twice[0].association);
        assert_eq!(once[0].association, "supporting");
    }

    #[test]
    fn harmonization_preserves_not_associated() {
        let annotations = vec![ClinicalAnnotation {
            annotation_id: "A2".to_string(),
            gene: "CYP2D6".to_string(),
            drug: "codeine".to_string(),
            evidence_type: "Label annotation".to_string(),
            association: "not associated".to_string(),
            pmids: vec![],
        }];
        let harmonized = harmonize_annotation_associations(annotations, "established");
        assert_eq!(harmonized[0].association, "not associated");
    }

    #[test]
    fn harmonization_skips_conflicting_and_unconfirmed_tops() {
        let annotations = vec![ClinicalAnnotation {
            annotation_id: "A3".to_string(),
            gene: "CYP2D6".to_string(),
            drug: "codeine".to_string(),
            evidence_type: "Dosing Guideline".to_string(),
            association: "associated".to_string(),
            pmids: vec![],
        }];
        let harmonized = harmonize_annotation_associations(annotations.clone(), "conflicting");
        assert_eq!(harmonized[0].association, "associated");
        let harmonized = harmonize_annotation_associations(annotations, "unconfirmed");
        assert_eq!(harmonized[0].association, "associated");
    }
}
