use std::time::Duration;

use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::debug;

use crate::domain::CompoundId;
use crate::error::KiraError;
use crate::http::{build_client, handle_status, send_with_retries};
use crate::pipeline::{Fields, Lookup, SourceAdapter};
use crate::record::Cell;
use crate::stages::KNAPSACK_FIELDS;

const SEARCH_URL: &str = "http://www.knapsackfamily.com/knapsack_core/result.php";
const DETAIL_URL: &str = "http://www.knapsackfamily.com/knapsack_core/information.php";

/// One metabolite as listed on a KNApSAcK detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KnapsackCompound {
    pub name: Option<String>,
    pub formula: Option<String>,
    pub mw: Option<String>,
    pub cas_rn: Option<String>,
    pub c_id: Option<String>,
    pub inchikey: Option<String>,
    pub inchicode: Option<String>,
    pub smiles: Option<String>,
}

impl KnapsackCompound {
    /// Values in [`KNAPSACK_FIELDS`] order.
    fn values(&self) -> [Option<&str>; 8] {
        [
            self.name.as_deref(),
            self.formula.as_deref(),
            self.mw.as_deref(),
            self.cas_rn.as_deref(),
            self.c_id.as_deref(),
            self.inchikey.as_deref(),
            self.inchicode.as_deref(),
            self.smiles.as_deref(),
        ]
    }
}

#[derive(Clone)]
pub struct KnapsackHttpClient {
    client: Client,
}

impl KnapsackHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        let client = build_client(Duration::from_secs(30), KiraError::KnapsackHttp)?;
        Ok(Self { client })
    }

    fn get_text(&self, url: &str, params: &[(&str, &str)]) -> Result<String, KiraError> {
        let response = send_with_retries(
            || self.client.get(url).query(params),
            KiraError::KnapsackHttp,
        )?;
        let response = handle_status(response, "KNApSAcK request failed", |status, message| {
            KiraError::KnapsackStatus { status, message }
        })?;
        response
            .text()
            .map_err(|err| KiraError::KnapsackHttp(err.to_string()))
    }
}

impl SourceAdapter for KnapsackHttpClient {
    fn name(&self) -> &str {
        "knapsack"
    }

    fn lookup(&self, key: &str) -> Result<Lookup, KiraError> {
        let search = self.get_text(SEARCH_URL, &[("sname", "all"), ("word", key)])?;
        let ids = parse_search_page(&search);
        debug!(organism = key, compounds = ids.len(), "knapsack search");
        if ids.is_empty() {
            return Ok(Lookup::NotFound);
        }

        let mut compounds = Vec::with_capacity(ids.len());
        for id in &ids {
            let detail = self.get_text(DETAIL_URL, &[("word", id.as_str())])?;
            compounds.push(parse_detail_page(&detail));
        }
        Ok(Lookup::Found(compound_fields(&compounds)))
    }
}

/// Compound ids linked from a search result page: anchors whose text starts
/// with `C`, id taken from the end of the link.
pub fn parse_search_page(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let anchors = selector("a[href]");
    document
        .select(&anchors)
        .filter(|anchor| text_of(anchor).starts_with('C'))
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| href.rsplit('=').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_detail_page(html: &str) -> KnapsackCompound {
    let document = Html::parse_document(html);
    let rows = selector("tr");
    let header = selector("th");
    let cell = selector("td");

    let mut compound = KnapsackCompound::default();
    for row in document.select(&rows) {
        let (Some(th), Some(td)) = (row.select(&header).next(), row.select(&cell).next()) else {
            continue;
        };
        let value = Some(text_of(&td));
        match text_of(&th).as_str() {
            "Name" => compound.name = value,
            "Formula" => compound.formula = value,
            "Mw" => compound.mw = value,
            "CAS RN" => compound.cas_rn = value,
            "C_ID" => compound.c_id = value.map(normalize_compound_id),
            "InChIKey" => compound.inchikey = value,
            "InChICode" => compound.inchicode = value,
            "SMILES" => compound.smiles = value,
            _ => {}
        }
    }
    compound
}

/// Aligned lists, one position per compound. A value missing on a detail
/// page keeps its position as an empty string.
pub fn compound_fields(compounds: &[KnapsackCompound]) -> Fields {
    KNAPSACK_FIELDS
        .iter()
        .enumerate()
        .map(|(position, field)| {
            let values = compounds
                .iter()
                .map(|compound| compound.values()[position].unwrap_or_default().to_string());
            (field.to_string(), Cell::list(values))
        })
        .collect()
}

fn normalize_compound_id(raw: String) -> String {
    match raw.parse::<CompoundId>() {
        Ok(id) => id.as_str().to_string(),
        Err(_) => raw.replace(',', ""),
    }
}

fn text_of(element: &ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static CSS selector")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH: &str = r#"<html><body><table>
        <tr><td><a href="information.php?word=C00001234">C00001234</a></td><td>Quercetin</td></tr>
        <tr><td><a href="information.php?word=C00005678">C00005678</a></td><td>Kaempferol</td></tr>
        <tr><td><a href="index.php">Home</a></td></tr>
        </table></body></html>"#;

    const DETAIL: &str = r#"<html><body><table>
        <tr><th class="inf">Name</th><td>Quercetin</td></tr>
        <tr><th>Formula</th><td>C15H10O7</td></tr>
        <tr><th>Mw</th><td>302.0427</td></tr>
        <tr><th>C_ID</th><td>C00,005,373</td></tr>
        <tr><th>SMILES</th><td> O=c1c(O)c(-c2ccc(O)c(O)c2)oc2cc(O)cc(O)c12 </td></tr>
        <tr><th>Organism</th><td>Allium cepa</td></tr>
        </table></body></html>"#;

    #[test]
    fn search_page_ids() {
        assert_eq!(parse_search_page(SEARCH), vec!["C00001234", "C00005678"]);
    }

    #[test]
    fn detail_page_fields() {
        let compound = parse_detail_page(DETAIL);
        assert_eq!(compound.name.as_deref(), Some("Quercetin"));
        assert_eq!(compound.c_id.as_deref(), Some("C00005373"));
        assert_eq!(
            compound.smiles.as_deref(),
            Some("O=c1c(O)c(-c2ccc(O)c(O)c2)oc2cc(O)cc(O)c12")
        );
        assert_eq!(compound.cas_rn, None);
    }

    #[test]
    fn fields_stay_aligned_per_compound() {
        let first = parse_detail_page(DETAIL);
        let second = KnapsackCompound {
            name: Some("Kaempferol".to_string()),
            cas_rn: Some("520-18-3".to_string()),
            ..KnapsackCompound::default()
        };
        let fields = compound_fields(&[first, second]);
        assert_eq!(fields["Metabolite Name"], Cell::list(["Quercetin", "Kaempferol"]));
        assert_eq!(fields["CAS RN"], Cell::list(["", "520-18-3"]));
        assert_eq!(fields.len(), KNAPSACK_FIELDS.len());
    }
}
