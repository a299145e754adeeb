use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::KiraError;
use crate::http::{build_client, handle_status, send_with_retries};
use crate::pipeline::{Fields, Lookup, SourceAdapter};
use crate::record::Cell;
use crate::stages::BINDING_FIELDS;

const SEARCH_URL: &str = "https://www.bindingdb.org/rwd/bind/searchby_smiles.jsp";
const NO_MATCHES: &str = "No Similarity Matches";
const SERVER_ERROR: &str = "Error: java.lang.NullPointerException";
/// Placeholder for a hit attribute the result page does not show.
pub const MISSING: &str = "NaN";

pub const DEFAULT_SIMILARITY: f64 = 0.8;

/// First single-quoted argument of an `onclick` handler.
static QUOTED_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([^']*)'").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingHit {
    pub target_name: String,
    pub species: String,
    pub bdb_id: String,
    pub ligand_smiles: String,
    pub pdb_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPage {
    NoMatches,
    ServerError,
    Hits(Vec<BindingHit>),
}

#[derive(Clone)]
pub struct BindingDbHttpClient {
    client: Client,
    similarity: f64,
}

impl BindingDbHttpClient {
    pub fn new(similarity: f64) -> Result<Self, KiraError> {
        let client = build_client(Duration::from_secs(60), KiraError::BindingDbHttp)?;
        Ok(Self { client, similarity })
    }

    fn search(&self, smiles: &str) -> Result<String, KiraError> {
        let similarity = self.similarity.to_string();
        let params = [
            ("submit", "Search"),
            ("startPg", "0"),
            ("Increment", "50"),
            ("SearchType", "3"),
            ("smilesStr", smiles),
            ("Similarity", similarity.as_str()),
        ];
        let response = send_with_retries(
            || self.client.get(SEARCH_URL).query(&params),
            KiraError::BindingDbHttp,
        )?;
        let response = handle_status(response, "BindingDB request failed", |status, message| {
            KiraError::BindingDbStatus { status, message }
        })?;
        response
            .text()
            .map_err(|err| KiraError::BindingDbHttp(err.to_string()))
    }
}

impl SourceAdapter for BindingDbHttpClient {
    fn name(&self) -> &str {
        "bindingdb"
    }

    fn lookup(&self, key: &str) -> Result<Lookup, KiraError> {
        let html = self.search(key)?;
        match parse_search_page(&html) {
            SearchPage::NoMatches => Ok(Lookup::NotFound),
            SearchPage::ServerError => Err(KiraError::BindingDbServer),
            SearchPage::Hits(hits) if hits.is_empty() => {
                debug!(smiles = key, "bindingdb page without hit rows");
                Ok(Lookup::NotFound)
            }
            SearchPage::Hits(hits) => Ok(Lookup::Found(hit_fields(&hits))),
        }
    }
}

pub fn parse_search_page(html: &str) -> SearchPage {
    let document = Html::parse_document(html);
    let body_text: String = document
        .select(&selector("body"))
        .next()
        .map(|body| body.text().collect())
        .unwrap_or_default();
    if body_text.contains(NO_MATCHES) {
        return SearchPage::NoMatches;
    }
    if body_text.contains(SERVER_ERROR) {
        return SearchPage::ServerError;
    }

    let rows = selector(".index_table > div");
    let target = selector("span.header + a.big");
    let species = selector("span.header + a.big + span + span");
    let bdb_id = selector("span.header + a + a.big");
    let smiles_button = selector("span.header + a + a.big + button");
    let pdb_link = selector("span.header + a[href^='https://www.rcsb.org']");

    let hits = document
        .select(&rows)
        .map(|row| BindingHit {
            target_name: first_text(&row, &target),
            species: first_text(&row, &species),
            bdb_id: first_text(&row, &bdb_id),
            ligand_smiles: row
                .select(&smiles_button)
                .next()
                .and_then(|button| button.value().attr("onclick"))
                .and_then(|onclick| QUOTED_ARG.captures(onclick))
                .and_then(|captures| captures.get(1))
                .map_or(MISSING, |smiles| smiles.as_str())
                .to_string(),
            pdb_link: row
                .select(&pdb_link)
                .next()
                .and_then(|link| link.value().attr("href"))
                .unwrap_or(MISSING)
                .to_string(),
        })
        .collect();
    SearchPage::Hits(hits)
}

/// One aligned list per binding field, hit order preserved.
pub fn hit_fields(hits: &[BindingHit]) -> Fields {
    let columns: [Vec<&str>; 5] = [
        hits.iter().map(|hit| hit.target_name.as_str()).collect(),
        hits.iter().map(|hit| hit.species.as_str()).collect(),
        hits.iter().map(|hit| hit.bdb_id.as_str()).collect(),
        hits.iter().map(|hit| hit.ligand_smiles.as_str()).collect(),
        hits.iter().map(|hit| hit.pdb_link.as_str()).collect(),
    ];
    BINDING_FIELDS
        .iter()
        .zip(columns)
        .map(|(field, values)| (field.to_string(), Cell::list(values)))
        .collect()
}

fn first_text(row: &ElementRef<'_>, selector: &Selector) -> String {
    row.select(selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_else(|| MISSING.to_string())
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static CSS selector")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS: &str = r#"<html><body><div class="index_table">
        <div>
          <span class="header">Target</span><a class="big" href="/t/1">HIV-1 protease</a><span>from</span><span>Human immunodeficiency virus 1</span>
        </div>
        <div>
          <span class="header">Ligand</span><a href="/l">view</a><a class="big">BDBM50001</a><button onclick="showSmiles('CC(=O)Oc1ccccc1C(=O)O')">SMILES</button>
        </div>
        <div>
          <span class="header">PDB</span><a href="https://www.rcsb.org/search?q=4HVP">4HVP</a>
        </div>
        </div></body></html>"#;

    #[test]
    fn no_matches_page() {
        let html = "<html><body><h3>No Similarity Matches</h3></body></html>";
        assert_eq!(parse_search_page(html), SearchPage::NoMatches);
    }

    #[test]
    fn server_error_page() {
        let html = "<html><body>Error: java.lang.NullPointerException</body></html>";
        assert_eq!(parse_search_page(html), SearchPage::ServerError);
    }

    #[test]
    fn hit_rows_with_missing_parts() {
        let SearchPage::Hits(hits) = parse_search_page(RESULTS) else {
            panic!("expected hits");
        };
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].target_name, "HIV-1 protease");
        assert_eq!(hits[0].species, "Human immunodeficiency virus 1");
        assert_eq!(hits[0].bdb_id, MISSING);
        assert_eq!(hits[1].bdb_id, "BDBM50001");
        assert_eq!(hits[1].ligand_smiles, "CC(=O)Oc1ccccc1C(=O)O");
        assert_eq!(hits[2].pdb_link, "https://www.rcsb.org/search?q=4HVP");
        assert_eq!(hits[2].target_name, MISSING);
    }

    #[test]
    fn fields_are_aligned_lists() {
        let SearchPage::Hits(hits) = parse_search_page(RESULTS) else {
            panic!("expected hits");
        };
        let fields = hit_fields(&hits);
        assert_eq!(fields.len(), 5);
        assert_eq!(
            fields["pdb_link"],
            Cell::list([MISSING, MISSING, "https://www.rcsb.org/search?q=4HVP"])
        );
    }
}
