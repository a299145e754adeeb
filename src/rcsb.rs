use std::time::Duration;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use serde_json::{Value, json};

use crate::domain::ProteinId;
use crate::error::KiraError;
use crate::http::{build_client, handle_status, send_with_retries};
use crate::pipeline::{Fields, Lookup, SourceAdapter};
use crate::record::Cell;
use crate::stages::{PROTEIN_CODE, QUERIES, TITLE};

const SEARCH_URL: &str = "https://search.rcsb.org/rcsbsearch/v2/query";
const MAX_SEARCH_ROWS: usize = 100;

pub trait RcsbClient: Send + Sync {
    /// Entry title, `Ok(None)` when the entry does not exist or has none.
    fn fetch_title(&self, id: &ProteinId) -> Result<Option<String>, KiraError>;
    /// Entry ids matching a search term, in relevance order.
    fn search_entries(&self, query: &str) -> Result<Vec<String>, KiraError>;
}

#[derive(Clone)]
pub struct RcsbHttpClient {
    client: Client,
}

impl RcsbHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        let client = build_client(Duration::from_secs(30), KiraError::RcsbHttp)?;
        Ok(Self { client })
    }

    fn metadata_url(id: &ProteinId) -> String {
        format!("https://data.rcsb.org/rest/v1/core/entry/{}", id.as_str())
    }
}

impl RcsbClient for RcsbHttpClient {
    fn fetch_title(&self, id: &ProteinId) -> Result<Option<String>, KiraError> {
        let url = Self::metadata_url(id);
        let response = send_with_retries(|| self.client.get(&url), KiraError::RcsbHttp)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = handle_status(response, "RCSB request failed", rcsb_status)?;
        let raw_json: Value = response
            .json()
            .map_err(|err| KiraError::RcsbHttp(err.to_string()))?;
        Ok(parse_entry_title(&raw_json))
    }

    fn search_entries(&self, query: &str) -> Result<Vec<String>, KiraError> {
        let body = search_request(query)?;
        let response = send_with_retries(
            || self.client.post(SEARCH_URL).json(&body),
            KiraError::RcsbHttp,
        )?;
        // The search service answers an empty result set with 204.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        let response = handle_status(response, "RCSB search failed", rcsb_status)?;
        let raw_json: Value = response
            .json()
            .map_err(|err| KiraError::RcsbHttp(err.to_string()))?;
        Ok(parse_search_ids(&raw_json))
    }
}

fn rcsb_status(status: u16, message: String) -> KiraError {
    KiraError::RcsbStatus { status, message }
}

/// Builds a search request. A query that already is a JSON search request
/// (as carried in `request=` links) is sent as is, with entry results.
pub fn search_request(query: &str) -> Result<Value, KiraError> {
    let trimmed = query.trim();
    if trimmed.starts_with('{') {
        let mut request: Value = serde_json::from_str(trimmed)
            .map_err(|err| KiraError::InvalidLink(format!("search request: {err}")))?;
        if let Some(object) = request.as_object_mut() {
            object.insert("return_type".to_string(), json!("entry"));
        }
        return Ok(request);
    }
    Ok(json!({
        "query": {
            "type": "terminal",
            "service": "full_text",
            "parameters": { "value": trimmed }
        },
        "return_type": "entry",
        "request_options": {
            "paginate": { "start": 0, "rows": MAX_SEARCH_ROWS }
        }
    }))
}

/// `struct.title` of an entry document.
pub fn parse_entry_title(raw: &Value) -> Option<String> {
    raw.get("struct")
        .and_then(|value| value.get("title"))
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(|title| title.to_string())
}

pub fn parse_search_ids(raw: &Value) -> Vec<String> {
    raw.get("result_set")
        .and_then(|value| value.as_array())
        .map(|results| {
            results
                .iter()
                .filter_map(|item| item.get("identifier").and_then(|id| id.as_str()))
                .map(|id| id.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Extracts the search term from an RCSB link. Entry pages
/// (`/structure/<ID>`) yield the entry id itself.
pub fn query_from_link(link: &str) -> Result<Option<String>, KiraError> {
    let url = Url::parse(link.trim()).map_err(|_| KiraError::InvalidLink(link.to_string()))?;
    for wanted in ["q", "query", "request"] {
        if let Some((_, value)) = url.query_pairs().find(|(name, _)| name == wanted) {
            let value = value.trim();
            if !value.is_empty() {
                return Ok(Some(value.to_string()));
            }
        }
    }
    let mut segments = url.path_segments().into_iter().flatten();
    while let Some(segment) = segments.next() {
        if segment == "structure" {
            return Ok(segments
                .next()
                .filter(|id| !id.is_empty())
                .map(|id| id.to_string()));
        }
    }
    Ok(None)
}

/// `pdb_link` -> `queries`. Parsed locally, no request is made.
pub struct LinkQuerySource;

impl SourceAdapter for LinkQuerySource {
    fn name(&self) -> &str {
        "pdb-query"
    }

    fn lookup(&self, key: &str) -> Result<Lookup, KiraError> {
        if key == crate::bindingdb::MISSING {
            return Ok(Lookup::NotFound);
        }
        Ok(match query_from_link(key)? {
            Some(query) => Lookup::Found(Fields::from([(QUERIES.to_string(), Cell::Text(query))])),
            None => Lookup::NotFound,
        })
    }
}

/// `queries` -> `protein_code`, one list entry per matching PDB entry.
pub struct StructureSource<R: RcsbClient> {
    rcsb: R,
}

impl<R: RcsbClient> StructureSource<R> {
    pub fn new(rcsb: R) -> Self {
        Self { rcsb }
    }
}

impl<R: RcsbClient> SourceAdapter for StructureSource<R> {
    fn name(&self) -> &str {
        "rcsb-search"
    }

    fn lookup(&self, key: &str) -> Result<Lookup, KiraError> {
        let ids = self.rcsb.search_entries(key)?;
        if ids.is_empty() {
            return Ok(Lookup::NotFound);
        }
        Ok(Lookup::Found(Fields::from([(
            PROTEIN_CODE.to_string(),
            Cell::List(ids),
        )])))
    }
}

/// `protein_code` -> `title`.
pub struct TitleSource<R: RcsbClient> {
    rcsb: R,
}

impl<R: RcsbClient> TitleSource<R> {
    pub fn new(rcsb: R) -> Self {
        Self { rcsb }
    }
}

impl<R: RcsbClient> SourceAdapter for TitleSource<R> {
    fn name(&self) -> &str {
        "rcsb-entry"
    }

    fn lookup(&self, key: &str) -> Result<Lookup, KiraError> {
        let id: ProteinId = key.parse()?;
        Ok(match self.rcsb.fetch_title(&id)? {
            Some(title) => Lookup::Found(Fields::from([(TITLE.to_string(), Cell::Text(title))])),
            None => Lookup::NotFound,
        })
    }
}
