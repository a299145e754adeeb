use std::fs;
use std::path::PathBuf;

use assert_matches::assert_matches;

use kira_phytobind::config::{Config, ConfigLoader, StageEntry, StageEntryObject};
use kira_phytobind::domain::StageKind;
use kira_phytobind::error::KiraError;

#[test]
fn parse_config_shorthand_and_detailed() {
    let config = Config {
        input: Some("plants.csv".to_string()),
        work_dir: Some("out".to_string()),
        stages: vec![
            StageEntry::Shorthand("knapsack".to_string()),
            StageEntry::Detailed(StageEntryObject {
                stage: "bindingdb".to_string(),
                input: None,
                output: Some("targets.csv".to_string()),
                errors: Some("targets-errors.csv".to_string()),
            }),
            StageEntry::Shorthand("explode".to_string()),
        ],
        ..Config::default()
    };

    let resolved = ConfigLoader::resolve_config(config).unwrap();
    let kinds: Vec<StageKind> = resolved.stages.iter().map(|stage| stage.kind).collect();
    assert_eq!(
        kinds,
        vec![StageKind::Knapsack, StageKind::Bindingdb, StageKind::Explode]
    );
    assert_eq!(resolved.stages[0].output, PathBuf::from("out/01_knapsack.csv"));
    assert_eq!(
        resolved.stages[0].errors,
        PathBuf::from("out/errors/01_knapsack-errors.csv")
    );
    assert_eq!(resolved.stages[1].input, resolved.stages[0].output);
    assert_eq!(resolved.stages[1].output, PathBuf::from("targets.csv"));
    assert_eq!(resolved.stages[2].input, PathBuf::from("targets.csv"));
}

#[test]
fn resolve_from_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-pb.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "input": "plants.csv",
            "no_match_label": "No Match",
            "bindingdb": { "similarity": 0.85 },
            "no_cache": true,
            "stages": ["knapsack", {"stage": "bindingdb", "output": "bdb.csv"}]
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(resolved.stages.len(), 2);
    assert_eq!(resolved.no_match_label, "No Match");
    assert_eq!(resolved.similarity, 0.85);
    assert!(!resolved.use_cache);
}

#[test]
fn missing_explicit_config_is_a_read_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap_err();
    assert_matches!(err, KiraError::ConfigRead(_));
    assert!(err.is_configuration());
}

#[test]
fn malformed_config_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-pb.json");
    fs::write(&path, r#"{"stages": [42]}"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve(Some(path.to_str().unwrap())),
        Err(KiraError::ConfigParse(_))
    );
}
