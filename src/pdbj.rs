use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use tracing::debug;

use crate::domain::ProteinId;
use crate::error::KiraError;
use crate::http::{build_client, handle_status, send_with_retries};
use crate::pipeline::{Fields, Lookup, SourceAdapter};
use crate::record::Cell;
use crate::stages::FASTA_PATH;
use crate::store::{Metadata, Store};

pub trait PdbjClient: Send + Sync {
    /// FASTA text for an entry, `Ok(None)` when PDBj has none.
    fn fetch_fasta(&self, id: &ProteinId) -> Result<Option<String>, KiraError>;
}

#[derive(Clone)]
pub struct PdbjHttpClient {
    client: Client,
}

impl PdbjHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        let client = build_client(Duration::from_secs(60), KiraError::PdbjHttp)?;
        Ok(Self { client })
    }

    pub fn fasta_url(id: &ProteinId) -> String {
        format!(
            "https://pdbj.org/rest/newweb/fetch/file?cat=pdb&type=fasta&id={}",
            id.as_str()
        )
    }
}

impl PdbjClient for PdbjHttpClient {
    fn fetch_fasta(&self, id: &ProteinId) -> Result<Option<String>, KiraError> {
        let url = Self::fasta_url(id);
        let response = send_with_retries(|| self.client.get(&url), KiraError::PdbjHttp)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = handle_status(response, "PDBj request failed", |status, message| {
            KiraError::PdbjStatus { status, message }
        })?;
        let text = response
            .text()
            .map_err(|err| KiraError::PdbjHttp(err.to_string()))?;
        Ok((!text.trim().is_empty()).then_some(text))
    }
}

/// `protein_code` -> `fasta_path`. Files land in the project store; the
/// shared cache is consulted before downloading.
pub struct FastaSource<P: PdbjClient> {
    pdbj: P,
    store: Store,
    use_cache: bool,
}

impl<P: PdbjClient> FastaSource<P> {
    pub fn new(pdbj: P, store: Store, use_cache: bool) -> Self {
        Self {
            pdbj,
            store,
            use_cache,
        }
    }

    fn found(path: &camino::Utf8Path) -> Lookup {
        Lookup::Found(Fields::from([(
            FASTA_PATH.to_string(),
            Cell::text(path.as_str()),
        )]))
    }
}

impl<P: PdbjClient> SourceAdapter for FastaSource<P> {
    fn name(&self) -> &str {
        "pdbj-fasta"
    }

    fn lookup(&self, key: &str) -> Result<Lookup, KiraError> {
        let id: ProteinId = key.parse()?;
        let project_path = self.store.project_fasta_path(&id);
        let cache_path = self.store.cache_fasta_path(&id);

        if project_path.as_std_path().exists() {
            debug!(id = id.as_str(), "fasta already in project store");
            return Ok(Self::found(&project_path));
        }
        if self.use_cache && cache_path.as_std_path().exists() {
            debug!(id = id.as_str(), "fasta from shared cache");
            Store::copy_file_atomic(&cache_path, &project_path)?;
            return Ok(Self::found(&project_path));
        }

        let Some(fasta) = self.pdbj.fetch_fasta(&id)? else {
            return Ok(Lookup::NotFound);
        };
        Store::write_bytes_atomic(&project_path, fasta.as_bytes())?;
        Store::write_metadata(
            &self.store.project_metadata_path("fasta", id.as_str()),
            &Metadata::new("pdbj", "fasta", id.as_str(), "fasta", &project_path),
        )?;
        if self.use_cache {
            Store::copy_file_atomic(&project_path, &cache_path)?;
        }
        Ok(Self::found(&project_path))
    }
}
