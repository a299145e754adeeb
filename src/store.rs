use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::ProteinId;
use crate::error::KiraError;

/// Project-local store (`.kira-pb/`) backed by a shared cache
/// (`~/.cache/kira-phytobind/`).
#[derive(Debug, Clone)]
pub struct Store {
    project_root: Utf8PathBuf,
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, KiraError> {
        let cwd = std::env::current_dir().map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let project_root = Utf8PathBuf::from_path_buf(cwd.join(".kira-pb"))
            .map_err(|_| KiraError::Filesystem("invalid project path".to_string()))?;
        Ok(Self {
            project_root,
            cache_root: default_cache_root()?,
        })
    }

    pub fn with_project_root(project_root: Utf8PathBuf) -> Result<Self, KiraError> {
        Ok(Self {
            project_root,
            cache_root: default_cache_root()?,
        })
    }

    pub fn new_with_paths(project_root: Utf8PathBuf, cache_root: Utf8PathBuf) -> Self {
        Self {
            project_root,
            cache_root,
        }
    }

    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn project_fasta_path(&self, id: &ProteinId) -> Utf8PathBuf {
        self.project_root.join("fasta").join(format!("{id}.fasta"))
    }

    pub fn cache_fasta_path(&self, id: &ProteinId) -> Utf8PathBuf {
        self.cache_root.join("fasta").join(format!("{id}.fasta"))
    }

    pub fn project_metadata_path(&self, dataset_type: &str, id: &str) -> Utf8PathBuf {
        self.project_root
            .join("metadata")
            .join(dataset_type)
            .join(format!("{id}.json"))
    }

    pub fn write_metadata(path: &Utf8Path, metadata: &Metadata) -> Result<(), KiraError> {
        let content = serde_json::to_vec_pretty(metadata)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Self::write_bytes_atomic(path, &content)
    }

    pub fn read_metadata(path: &Utf8Path) -> Result<Metadata, KiraError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        serde_json::from_str(&content).map_err(|err| KiraError::Filesystem(err.to_string()))
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), KiraError> {
        let parent = path
            .parent()
            .ok_or_else(|| KiraError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("kira-pb-file")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), content).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn copy_file_atomic(source: &Utf8Path, dest: &Utf8Path) -> Result<(), KiraError> {
        let content =
            fs::read(source.as_std_path()).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Self::write_bytes_atomic(dest, &content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub source: String,
    pub dataset_type: String,
    pub id: String,
    pub format: Option<String>,
    pub downloaded_at: String,
    pub tool: String,
    pub resolved_path: String,
}

impl Metadata {
    pub fn new(source: &str, dataset_type: &str, id: &str, format: &str, path: &Utf8Path) -> Self {
        Self {
            source: source.to_string(),
            dataset_type: dataset_type.to_string(),
            id: id.to_string(),
            format: Some(format.to_string()),
            downloaded_at: chrono::Utc::now().to_rfc3339(),
            tool: format!("kira-pb/{}", env!("CARGO_PKG_VERSION")),
            resolved_path: path.to_string(),
        }
    }
}

fn default_cache_root() -> Result<Utf8PathBuf, KiraError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("kira-phytobind")).ok()
        })
        .ok_or_else(|| KiraError::Filesystem("unable to resolve cache directory".to_string()))
}
