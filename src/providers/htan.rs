use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::curated;
use crate::domain::{DatasetRecord, RecordDraft, SourceTag};
use crate::error::MinerError;
use crate::html::{HtmlCard, scan_cards};
use crate::http::HttpClient;
use crate::normalize::{extract_identifier, stable_id};
use crate::payload::{collection_items, constant, first_text, key, text_or_empty};
use crate::providers::CATALOG_REQUEST_DELAY;
use crate::source::{FetchParams, SourceFetcher, first_success};

pub const API_URL: &str = "https://htan-api-production.herokuapp.com/api/v1";
pub const SYNAPSE_URL: &str = "https://www.synapse.org/rest/datasets/htan";
pub const PORTAL_URL: &str = "https://data.humantumoratlas.org";

const ORGANISM: &str = "Homo sapiens";
const DEFAULT_TITLE: &str = "HTAN Dataset";
const DEFAULT_SAMPLES: &str = "Multiple";
const DEFAULT_EXPERIMENT_TYPE: &str = "Spatial Transcriptomics";
const ID_PREFIX: &str = "HTAN";

/// Human Tumor Atlas Network catalog. Every record is human.
pub struct HtanFetcher<H: HttpClient> {
    http: H,
    endpoints: Vec<String>,
    portal_url: String,
    request_delay: Duration,
}

impl<H: HttpClient> HtanFetcher<H> {
    pub fn new(http: H) -> Self {
        Self {
            http,
            endpoints: vec![
                format!("{API_URL}/files"),
                format!("{API_URL}/datasets"),
                SYNAPSE_URL.to_string(),
            ],
            portal_url: PORTAL_URL.to_string(),
            request_delay: CATALOG_REQUEST_DELAY,
        }
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    fn fetch_endpoint(&self, url: &str) -> Result<Vec<DatasetRecord>, MinerError> {
        let payload = self.http.get_success(url, &[])?.json()?;
        Ok(parse_api_datasets(&payload))
    }

    /// The portal renders client-side, so this rarely finds anything.
    fn scan_portal(&self) -> Result<Vec<DatasetRecord>, MinerError> {
        let response = self.http.get_success(&self.portal_url, &[])?;
        let records = scan_cards(&response.text())
            .into_iter()
            .filter_map(|card| record_from_card(&card, &self.portal_url))
            .collect::<Vec<_>>();
        debug!(count = records.len(), "scanned HTAN portal");
        Ok(records)
    }
}

impl<H: HttpClient> SourceFetcher for HtanFetcher<H> {
    fn source(&self) -> SourceTag {
        SourceTag::Htan
    }

    fn fetch_live(&self, _params: &FetchParams) -> Result<Vec<DatasetRecord>, MinerError> {
        match first_success(self.source(), &self.endpoints, self.request_delay, |url| {
            self.fetch_endpoint(url)
        }) {
            Ok(records) => Ok(records),
            Err(err) => {
                warn!(error = %err, "HTAN API unavailable, scanning data portal");
                self.scan_portal()
            }
        }
    }

    fn curated(&self) -> Result<Vec<DatasetRecord>, MinerError> {
        curated::load(SourceTag::Htan)
    }
}

pub fn parse_api_datasets(payload: &Value) -> Vec<DatasetRecord> {
    collection_items(payload, &["files", "datasets", "data"])
        .into_iter()
        .filter_map(record_from_item)
        .collect()
}

fn assay_of(item: &Value) -> String {
    text_or_empty(item, &[key("assayName"), key("assay")])
}

pub fn is_spatial_assay(assay: &str) -> bool {
    let assay = assay.to_lowercase();
    assay.contains("spatial") || assay.contains("imaging")
}

pub fn platform_for_assay(assay: &str) -> &'static str {
    let assay = assay.to_lowercase();
    if assay.contains("slide-seq") {
        "HTAN - Slide-seq"
    } else if assay.contains("merfish") {
        "HTAN - MERFISH"
    } else {
        "HTAN - Visium"
    }
}

fn record_from_item(item: &Value) -> Option<DatasetRecord> {
    let assay = assay_of(item);
    if !is_spatial_assay(&assay) {
        return None;
    }
    let title = text_or_empty(
        item,
        &[
            key("description"),
            key("name"),
            key("HTANParentDataFileID"),
            constant(DEFAULT_TITLE),
        ],
    );
    let accession = first_text(item, &[key("HTANDataFileID"), key("id")])
        .unwrap_or_else(|| stable_id(ID_PREFIX, &[&title, &assay]));
    let experiment_type = if assay.trim().is_empty() {
        DEFAULT_EXPERIMENT_TYPE.to_string()
    } else {
        assay.clone()
    };
    let extra = first_text(item, &[key("fileFormat"), key("Component")])
        .map(|format| vec![("File Format".to_string(), format)])
        .unwrap_or_default();

    RecordDraft {
        platform: platform_for_assay(&assay).to_string(),
        accession,
        title,
        public_date: text_or_empty(item, &[key("releaseDate")]),
        experiment_type,
        organism: ORGANISM.to_string(),
        tissue_summary: text_or_empty(item, &[key("TissueorOrganofOrigin"), key("tissue")]),
        sample_count: text_or_empty(item, &[key("numberOfSamples"), constant(DEFAULT_SAMPLES)]),
        publication: extract_identifier(&text_or_empty(item, &[key("publicationLink")])),
        download_link: text_or_empty(item, &[key("downloadUrl"), constant(PORTAL_URL)]),
        extra,
    }
    .finish(SourceTag::Htan)
}

fn record_from_card(card: &HtmlCard, portal_url: &str) -> Option<DatasetRecord> {
    if !is_spatial_assay(&card.text) {
        return None;
    }
    let download_link = match card.href.as_deref() {
        Some(href) if href.starts_with("http") => href.to_string(),
        Some(href) => format!("{}/{}", portal_url.trim_end_matches('/'), href.trim_start_matches('/')),
        None => portal_url.to_string(),
    };
    RecordDraft {
        platform: platform_for_assay(&card.text).to_string(),
        accession: stable_id(ID_PREFIX, &[&card.title]),
        title: card.title.clone(),
        experiment_type: DEFAULT_EXPERIMENT_TYPE.to_string(),
        organism: ORGANISM.to_string(),
        tissue_summary: card.description.clone(),
        sample_count: DEFAULT_SAMPLES.to_string(),
        download_link,
        ..RecordDraft::default()
    }
    .finish(SourceTag::Htan)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn only_spatial_or_imaging_assays_are_kept() {
        let payload = json!({"files": [
            {"HTANDataFileID": "HTA1_1", "assayName": "10x Visium Spatial Transcriptomics", "description": "Breast"},
            {"HTANDataFileID": "HTA1_2", "assayName": "scRNA-seq", "description": "Blood"},
            {"HTANDataFileID": "HTA1_3", "assay": "MERFISH imaging", "name": "Lung"}
        ]});
        let records = parse_api_datasets(&payload);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].platform(), "HTAN - Visium");
        assert_eq!(records[1].platform(), "HTAN - MERFISH");
        assert_eq!(records[1].title(), "Lung");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let payload = json!({"data": {"assay": "Slide-seq spatial"}});
        let records = parse_api_datasets(&payload);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.title(), DEFAULT_TITLE);
        assert_eq!(record.platform(), "HTAN - Slide-seq");
        assert_eq!(record.sample_count(), "Multiple");
        assert_eq!(record.organism(), "Homo sapiens");
        assert_eq!(record.download_link(), PORTAL_URL);
        assert!(record.accession().starts_with("HTAN-"));
    }

    #[test]
    fn publication_link_is_reduced_to_its_id() {
        let payload = json!([{
            "assayName": "Spatial",
            "description": "Colon",
            "publicationLink": "https://pubmed.ncbi.nlm.nih.gov/34914614/",
            "numberOfSamples": 8,
            "fileFormat": "h5ad"
        }]);
        let record = &parse_api_datasets(&payload)[0];
        assert_eq!(record.publication(), "34914614");
        assert_eq!(record.sample_count(), "8");
        assert_eq!(record.extra(), &[("File Format".to_string(), "h5ad".to_string())]);
    }
}
