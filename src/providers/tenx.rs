use std::time::Duration;

use serde_json::Value;

use crate::curated;
use crate::domain::{DatasetRecord, RecordDraft, SourceTag};
use crate::error::MinerError;
use crate::html::{HtmlCard, scan_cards};
use crate::http::{HttpClient, HttpResponse};
use crate::normalize::stable_id;
use crate::payload::{collection_items, field, first_text, haystack, key, prefixed, text_or_empty};
use crate::providers::CATALOG_REQUEST_DELAY;
use crate::source::{FetchParams, SourceFetcher, first_success};

pub const BASE_URL: &str = "https://www.10xgenomics.com";
pub const DATASETS_PAGE_URL: &str = "https://www.10xgenomics.com/datasets?query=&page=1&configure%5BhitsPerPage%5D=500&configure%5BgetRankingInfo%5D=true&refinementList%5Bspecies%5D=&refinementList%5Bproduct.name%5D%5B0%5D=Spatial%20Gene%20Expression";
pub const DATASETS_JSON_URL: &str = "https://cf.10xgenomics.com/supp/spatial-exp/spatial_datasets.json";

const PLATFORM: &str = "10x Genomics Visium";
const EXPERIMENT_TYPE: &str = "Spatial Gene Expression";
const SAMPLE_COUNT: &str = "1";
const ID_PREFIX: &str = "10x";

/// 10x Genomics public dataset catalog.
pub struct TenxFetcher<H: HttpClient> {
    http: H,
    endpoints: Vec<String>,
    request_delay: Duration,
}

impl<H: HttpClient> TenxFetcher<H> {
    pub fn new(http: H) -> Self {
        Self {
            http,
            endpoints: vec![DATASETS_PAGE_URL.to_string(), DATASETS_JSON_URL.to_string()],
            request_delay: CATALOG_REQUEST_DELAY,
        }
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    fn fetch_endpoint(&self, url: &str) -> Result<Vec<DatasetRecord>, MinerError> {
        let response = self.http.get_success(url, &[])?;
        Ok(parse_catalog_response(url, &response))
    }
}

impl<H: HttpClient> SourceFetcher for TenxFetcher<H> {
    fn source(&self) -> SourceTag {
        SourceTag::TenxGenomics
    }

    fn fetch_live(&self, _params: &FetchParams) -> Result<Vec<DatasetRecord>, MinerError> {
        first_success(self.source(), &self.endpoints, self.request_delay, |url| {
            self.fetch_endpoint(url)
        })
    }

    fn curated(&self) -> Result<Vec<DatasetRecord>, MinerError> {
        curated::load(SourceTag::TenxGenomics)
    }
}

/// JSON when the URL or content type says so, falling back to HTML cards
/// when the JSON is unreadable or holds no spatial datasets.
pub fn parse_catalog_response(url: &str, response: &HttpResponse) -> Vec<DatasetRecord> {
    if url.ends_with(".json") || response.is_json() {
        if let Ok(payload) = response.json() {
            let records = parse_json_datasets(&payload);
            if !records.is_empty() {
                return records;
            }
        }
    }
    parse_html_datasets(&response.text())
}

pub fn parse_json_datasets(payload: &Value) -> Vec<DatasetRecord> {
    collection_items(payload, &["datasets", "hits", "results"])
        .into_iter()
        .filter(|item| {
            field(item, "product")
                .map(|product| haystack(product).contains("spatial"))
                .unwrap_or(false)
        })
        .filter_map(record_from_json)
        .collect()
}

fn record_from_json(item: &Value) -> Option<DatasetRecord> {
    let title = text_or_empty(item, &[key("title"), key("name")]);
    let download_link = text_or_empty(item, &[key("url"), key("link")]);
    let accession = first_text(item, &[key("id"), prefixed("name", "10x-")])
        .unwrap_or_else(|| stable_id(ID_PREFIX, &[&title, &download_link]));
    RecordDraft {
        platform: PLATFORM.to_string(),
        accession,
        title,
        public_date: text_or_empty(item, &[key("date"), key("publicationDate")]),
        experiment_type: EXPERIMENT_TYPE.to_string(),
        organism: text_or_empty(item, &[key("species"), key("organism")]),
        tissue_summary: text_or_empty(item, &[key("description"), key("summary")]),
        sample_count: SAMPLE_COUNT.to_string(),
        publication: String::new(),
        download_link,
        extra: Vec::new(),
    }
    .finish(SourceTag::TenxGenomics)
}

pub fn parse_html_datasets(html: &str) -> Vec<DatasetRecord> {
    scan_cards(html)
        .into_iter()
        .filter(is_spatial_card)
        .filter_map(|card| record_from_card(&card))
        .collect()
}

fn is_spatial_card(card: &HtmlCard) -> bool {
    let text = card.text.to_lowercase();
    text.contains("spatial") || text.contains("visium")
}

fn record_from_card(card: &HtmlCard) -> Option<DatasetRecord> {
    RecordDraft {
        platform: PLATFORM.to_string(),
        accession: stable_id(ID_PREFIX, &[&card.title]),
        title: card.title.clone(),
        public_date: String::new(),
        experiment_type: EXPERIMENT_TYPE.to_string(),
        organism: infer_organism(&card.text).to_string(),
        tissue_summary: card.description.clone(),
        sample_count: SAMPLE_COUNT.to_string(),
        publication: String::new(),
        download_link: card.href.as_deref().map(absolute_link).unwrap_or_default(),
        extra: Vec::new(),
    }
    .finish(SourceTag::TenxGenomics)
}

pub fn infer_organism(text: &str) -> &'static str {
    let text = text.to_lowercase();
    if text.contains("human") {
        "Homo sapiens"
    } else if text.contains("mouse") {
        "Mus musculus"
    } else {
        "Unknown"
    }
}

pub fn absolute_link(href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{BASE_URL}{href}")
    } else {
        format!("{BASE_URL}/{href}")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_items_need_a_spatial_product() {
        let payload = json!({"hits": [
            {"id": "a", "title": "Human Heart", "product": {"name": "Spatial Gene Expression"}},
            {"id": "b", "title": "PBMC 10k", "product": {"name": "Single Cell Gene Expression"}},
            {"id": "c", "title": "No product"}
        ]});
        let records = parse_json_datasets(&payload);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].accession(), "a");
        assert_eq!(records[0].platform(), PLATFORM);
    }

    #[test]
    fn json_accession_falls_back_to_name_then_hash() {
        let payload = json!([
            {"name": "mouse-kidney", "product": "spatial"},
            {"title": "Untitled Visium", "product": "Spatial", "url": "https://x"}
        ]);
        let records = parse_json_datasets(&payload);
        assert_eq!(records[0].accession(), "10x-mouse-kidney");
        assert_eq!(records[0].title(), "mouse-kidney");
        assert_eq!(
            records[1].accession(),
            stable_id(ID_PREFIX, &["Untitled Visium", "https://x"])
        );
    }

    #[test]
    fn non_json_answer_is_scanned_as_html() {
        let response = HttpResponse {
            status: 200,
            body: br#"<div class="dataset-card"><a class="title" href="/datasets/mouse-brain">Mouse Brain Visium</a></div>"#.to_vec(),
            content_type: Some("text/html".to_string()),
        };
        let records = parse_catalog_response(DATASETS_PAGE_URL, &response);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].organism(), "Mus musculus");
        assert_eq!(
            records[0].download_link(),
            "https://www.10xgenomics.com/datasets/mouse-brain"
        );
    }

    #[test]
    fn grid_wrappers_do_not_shadow_their_cards() {
        let html = r#"<div class="datasets-grid">
            <div class="dataset-card"><h3 class="title">Brain Section Visium</h3><p>adult mouse</p></div>
            <div class="dataset-card"><h3 class="title">Tonsil Visium</h3><p>human donor</p></div>
        </div>"#;
        let records = parse_html_datasets(html);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title(), "Brain Section Visium");
        assert_eq!(records[0].organism(), "Mus musculus");
        assert_eq!(records[1].organism(), "Homo sapiens");
    }

    #[test]
    fn organism_inference() {
        assert_eq!(infer_organism("Human Lymph Node"), "Homo sapiens");
        assert_eq!(infer_organism("Adult MOUSE brain"), "Mus musculus");
        assert_eq!(infer_organism("Zebrafish"), "Unknown");
    }

    #[test]
    fn links_resolve_against_the_site() {
        assert_eq!(absolute_link("https://a.b/c"), "https://a.b/c");
        assert_eq!(absolute_link("datasets/x"), "https://www.10xgenomics.com/datasets/x");
    }
}
