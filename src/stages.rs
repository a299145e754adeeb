use crate::domain::StageKind;
use crate::pipeline::EnrichSpec;
use crate::record::Column;

pub const SCIENTIFIC_NAME: &str = "Scientific Name";
pub const SMILES: &str = "SMILES";
pub const PDB_LINK: &str = "pdb_link";
pub const QUERIES: &str = "queries";
pub const PROTEIN_CODE: &str = "protein_code";
pub const TITLE: &str = "title";
pub const FASTA_PATH: &str = "fasta_path";

/// Compound fields read from a KNApSAcK detail page, in output order.
pub const KNAPSACK_FIELDS: [&str; 8] = [
    "Metabolite Name",
    "Formula",
    "Mw",
    "CAS RN",
    "C_ID",
    "InChIKey",
    "InChICode",
    SMILES,
];

/// Per-hit fields of a BindingDB similarity search.
pub const BINDING_FIELDS: [&str; 5] = [
    "target_name",
    "species",
    "bdb_id",
    "ligand_smiles",
    PDB_LINK,
];

impl StageKind {
    /// Field the stage looks up by. `None` for the pure expansion stage.
    pub fn key_field(self) -> Option<&'static str> {
        match self {
            StageKind::Knapsack => Some(SCIENTIFIC_NAME),
            StageKind::Bindingdb => Some(SMILES),
            StageKind::Explode => None,
            StageKind::PdbQuery => Some(PDB_LINK),
            StageKind::Structures => Some(QUERIES),
            StageKind::Titles | StageKind::Fasta => Some(PROTEIN_CODE),
        }
    }

    pub fn new_fields(self) -> Vec<Column> {
        match self {
            StageKind::Knapsack => KNAPSACK_FIELDS.into_iter().map(Column::multi).collect(),
            StageKind::Bindingdb => BINDING_FIELDS.into_iter().map(Column::multi).collect(),
            StageKind::Explode => Vec::new(),
            StageKind::PdbQuery => vec![Column::scalar(QUERIES)],
            StageKind::Structures => vec![Column::multi(PROTEIN_CODE)],
            StageKind::Titles => vec![Column::scalar(TITLE)],
            StageKind::Fasta => vec![Column::scalar(FASTA_PATH)],
        }
    }

    pub fn enrich_spec(self) -> Option<EnrichSpec> {
        let key_field = self.key_field()?;
        Some(EnrichSpec {
            stage: self.as_str().to_string(),
            key_field: key_field.to_string(),
            new_fields: self.new_fields(),
        })
    }

    /// Columns read as joined lists from this stage's input file.
    pub fn input_multi_fields(self) -> &'static [&'static str] {
        match self {
            StageKind::Explode => &BINDING_FIELDS,
            _ => &[],
        }
    }

    /// Columns expanded into one row per value once the stage has run.
    /// BindingDB output stays joined until the explicit `explode` stage.
    pub fn expand_fields(self) -> &'static [&'static str] {
        match self {
            StageKind::Knapsack => &KNAPSACK_FIELDS,
            StageKind::Explode => &BINDING_FIELDS,
            StageKind::Structures => &[PROTEIN_CODE],
            _ => &[],
        }
    }

    pub fn default_output_name(self) -> String {
        format!("{:02}_{}.csv", self.ordinal(), self.as_str())
    }

    pub fn default_errors_name(self) -> String {
        format!("{:02}_{}-errors.csv", self.ordinal(), self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_enrichment_stage_has_a_key() {
        for kind in StageKind::ALL {
            assert_eq!(kind.enrich_spec().is_some(), kind != StageKind::Explode);
        }
    }

    #[test]
    fn default_names_follow_run_order() {
        assert_eq!(StageKind::Knapsack.default_output_name(), "01_knapsack.csv");
        assert_eq!(
            StageKind::PdbQuery.default_errors_name(),
            "04_pdb-query-errors.csv"
        );
    }
}
