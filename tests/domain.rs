use assert_matches::assert_matches;

use kira_phytobind::domain::{CompoundId, ProteinId, StageKind};
use kira_phytobind::error::KiraError;
use kira_phytobind::stages::{BINDING_FIELDS, KNAPSACK_FIELDS};

#[test]
fn parse_protein_id_valid() {
    let id: ProteinId = "1hsg".parse().unwrap();
    assert_eq!(id.as_str(), "1HSG");
}

#[test]
fn parse_protein_id_invalid() {
    let err = "XYZ".parse::<ProteinId>().unwrap_err();
    assert_matches!(err, KiraError::InvalidProteinId(_));
}

#[test]
fn parse_compound_id() {
    let id: CompoundId = " C00005373 ".parse().unwrap();
    assert_eq!(id.to_string(), "C00005373");
}

#[test]
fn parse_stage_kind() {
    assert_eq!("pdb_query".parse::<StageKind>().unwrap(), StageKind::PdbQuery);
    assert_matches!("docking".parse::<StageKind>(), Err(KiraError::InvalidStage(_)));
}

#[test]
fn stage_fields() {
    assert_eq!(StageKind::Knapsack.key_field(), Some("Scientific Name"));
    assert_eq!(StageKind::Knapsack.new_fields().len(), KNAPSACK_FIELDS.len());
    assert!(StageKind::Bindingdb.expand_fields().is_empty());
    assert_eq!(StageKind::Explode.expand_fields(), &BINDING_FIELDS);
    assert_eq!(StageKind::Structures.expand_fields(), &["protein_code"]);
    assert_eq!(StageKind::Fasta.default_output_name(), "07_fasta.csv");
}
