use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::bindingdb::DEFAULT_SIMILARITY;
use crate::domain::StageKind;
use crate::error::KiraError;
use crate::table::DEFAULT_NO_MATCH_LABEL;

pub const CONFIG_FILE: &str = "kira-pb.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    /// Plant list fed to the first stage.
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub work_dir: Option<String>,
    #[serde(default)]
    pub no_match_label: Option<String>,
    #[serde(default)]
    pub bindingdb: Option<BindingDbSettings>,
    #[serde(default)]
    pub store_dir: Option<String>,
    #[serde(default)]
    pub no_cache: bool,
    #[serde(default)]
    pub stages: Vec<StageEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BindingDbSettings {
    #[serde(default)]
    pub similarity: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StageEntry {
    Shorthand(String),
    Detailed(StageEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StageEntryObject {
    pub stage: String,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub errors: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageRequest {
    pub kind: StageKind,
    pub input: PathBuf,
    pub output: PathBuf,
    pub errors: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub stages: Vec<StageRequest>,
    pub no_match_label: String,
    pub similarity: f64,
    pub store_dir: Option<PathBuf>,
    pub use_cache: bool,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            stages: Vec::new(),
            no_match_label: DEFAULT_NO_MATCH_LABEL.to_string(),
            similarity: DEFAULT_SIMILARITY,
            store_dir: None,
            use_cache: true,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(KiraError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    /// Chains the stages: each input defaults to the previous output, and
    /// file names default to `<work_dir>/NN_<stage>.csv`.
    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let work_dir = PathBuf::from(config.work_dir.as_deref().unwrap_or("data"));

        let entries = if config.stages.is_empty() {
            StageKind::ALL
                .iter()
                .map(|kind| StageEntry::Shorthand(kind.to_string()))
                .collect()
        } else {
            config.stages
        };

        let mut previous_output = config.input.map(PathBuf::from);
        let mut stages = Vec::with_capacity(entries.len());
        for entry in entries {
            let object = match entry {
                StageEntry::Shorthand(stage) => StageEntryObject {
                    stage,
                    input: None,
                    output: None,
                    errors: None,
                },
                StageEntry::Detailed(object) => object,
            };
            let kind: StageKind = object.stage.parse()?;
            let input = object
                .input
                .map(PathBuf::from)
                .or_else(|| previous_output.take())
                .ok_or_else(|| {
                    KiraError::ConfigParse(format!("stage {kind} has no input table"))
                })?;
            let output = object
                .output
                .map(PathBuf::from)
                .unwrap_or_else(|| work_dir.join(kind.default_output_name()));
            let errors = object
                .errors
                .map(PathBuf::from)
                .unwrap_or_else(|| work_dir.join("errors").join(kind.default_errors_name()));

            previous_output = Some(output.clone());
            stages.push(StageRequest {
                kind,
                input,
                output,
                errors,
            });
        }

        Ok(ResolvedConfig {
            schema_version,
            stages,
            no_match_label: config
                .no_match_label
                .unwrap_or_else(|| DEFAULT_NO_MATCH_LABEL.to_string()),
            similarity: config
                .bindingdb
                .and_then(|settings| settings.similarity)
                .unwrap_or(DEFAULT_SIMILARITY),
            store_dir: config.store_dir.map(PathBuf::from),
            use_cache: !config.no_cache,
        })
    }
}
