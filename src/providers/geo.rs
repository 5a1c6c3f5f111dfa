use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::curated;
use crate::domain::{DatasetRecord, RecordDraft, SourceTag};
use crate::error::MinerError;
use crate::html::{attribute, decode_entities};
use crate::http::{HttpClient, HttpResponse};
use crate::normalize::{clean_text, extract_identifier, map_platform_code};
use crate::payload::{field, flatten_texts, key, list_entries, scalar_text, text_or_empty};
use crate::source::{FetchParams, SourceFetcher};

pub const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
pub const ESUMMARY_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esummary.fcgi";
pub const ACCESSION_URL: &str = "https://www.ncbi.nlm.nih.gov/geo/query/acc.cgi?acc=";

pub const DEFAULT_QUERY: &str = r#"(("spatial transcriptomics"[All Fields] OR "Visium"[All Fields] OR "Slide-seq"[All Fields]) AND "gse"[Filter])"#;
pub const DEFAULT_MAX_RESULTS: usize = 1000;
pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(400);

const TOOL: &str = "st-miner";
const DEFAULT_EXPERIMENT_TYPE: &str = "Spatial Transcriptomics";

static SEARCH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Id>\s*(\d+)\s*</Id>").expect("id pattern is valid"));

static DOCSUM_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(/?)(DocSum|Item)\b([^>]*)>").expect("docsum pattern is valid")
});

#[derive(Debug, Clone)]
pub struct GeoSettings {
    pub query: String,
    pub max_results: usize,
    pub chunk_size: usize,
    pub request_delay: Duration,
    pub email: Option<String>,
    pub api_key: Option<String>,
}

impl Default for GeoSettings {
    fn default() -> Self {
        Self {
            query: DEFAULT_QUERY.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_delay: DEFAULT_REQUEST_DELAY,
            email: None,
            api_key: None,
        }
    }
}

/// NCBI GEO through E-utilities `esearch` + `esummary` (`db=gds`).
pub struct GeoFetcher<H: HttpClient> {
    http: H,
    settings: GeoSettings,
}

impl<H: HttpClient> GeoFetcher<H> {
    pub fn new(http: H, settings: GeoSettings) -> Self {
        Self { http, settings }
    }

    pub fn settings(&self) -> &GeoSettings {
        &self.settings
    }

    /// GEO uids matching `query`, at most `max_results` of them.
    pub fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, MinerError> {
        let retmax = max_results.to_string();
        let mut params = vec![
            ("db", "gds"),
            ("term", query),
            ("retmax", retmax.as_str()),
            ("usehistory", "y"),
            ("retmode", "json"),
        ];
        self.identify(&mut params);

        info!(query = %clip_query(query), max_results, "searching NCBI GEO");
        let response = self.http.get_success(ESEARCH_URL, &params);
        self.pause();
        let ids = parse_search_ids(&response?)?;
        info!(count = ids.len(), "NCBI GEO search finished");
        Ok(ids)
    }

    /// Summaries for `ids`, requested in chunks. A failed chunk is logged
    /// and skipped.
    pub fn summaries(&self, ids: &[String]) -> Vec<DatasetRecord> {
        let chunk_size = self.settings.chunk_size.max(1);
        let total = ids.len().div_ceil(chunk_size);
        let mut records = Vec::new();
        for (index, chunk) in ids.chunks(chunk_size).enumerate() {
            debug!(chunk = index + 1, total, "fetching GEO summaries");
            match self.summary_chunk(chunk) {
                Ok(parsed) => records.extend(parsed),
                Err(err) => warn!(chunk = index + 1, total, error = %err, "skipping GEO summary chunk"),
            }
            self.pause();
        }
        info!(count = records.len(), "parsed NCBI GEO summaries");
        records
    }

    fn summary_chunk(&self, chunk: &[String]) -> Result<Vec<DatasetRecord>, MinerError> {
        let id = chunk.join(",");
        let mut params = vec![("db", "gds"), ("id", id.as_str()), ("retmode", "json")];
        self.identify(&mut params);
        let response = self.http.get_success(ESUMMARY_URL, &params)?;
        Ok(parse_summary_items(&response)?
            .iter()
            .filter_map(record_from_docsum)
            .collect())
    }

    fn identify<'a>(&'a self, params: &mut Vec<(&'a str, &'a str)>) {
        params.push(("tool", TOOL));
        if let Some(email) = self.settings.email.as_deref().filter(|v| !v.trim().is_empty()) {
            params.push(("email", email));
        }
        if let Some(api_key) = self.settings.api_key.as_deref().filter(|v| !v.trim().is_empty()) {
            params.push(("api_key", api_key));
        }
    }

    fn pause(&self) {
        if !self.settings.request_delay.is_zero() {
            thread::sleep(self.settings.request_delay);
        }
    }
}

impl<H: HttpClient> SourceFetcher for GeoFetcher<H> {
    fn source(&self) -> SourceTag {
        SourceTag::NcbiGeo
    }

    fn fetch_live(&self, params: &FetchParams) -> Result<Vec<DatasetRecord>, MinerError> {
        let query = params.query.as_deref().unwrap_or(&self.settings.query);
        let max_results = params.max_results.unwrap_or(self.settings.max_results);
        let ids = self.search(query, max_results)?;
        if ids.is_empty() {
            warn!("no results found in NCBI GEO");
            return Ok(Vec::new());
        }
        Ok(self.summaries(&ids))
    }

    fn curated(&self) -> Result<Vec<DatasetRecord>, MinerError> {
        curated::load(SourceTag::NcbiGeo)
    }
}

fn clip_query(query: &str) -> String {
    query.chars().take(100).collect()
}

fn is_xml(response: &HttpResponse) -> bool {
    response.text().trim_start().starts_with('<')
}

/// Ids from an `esearch` answer: `esearchresult.idlist` in JSON or `<Id>`
/// elements in XML.
pub fn parse_search_ids(response: &HttpResponse) -> Result<Vec<String>, MinerError> {
    if is_xml(response) {
        return Ok(SEARCH_ID
            .captures_iter(&response.text())
            .map(|caps| caps[1].to_string())
            .collect());
    }
    let payload = response.json()?;
    let result = field(&payload, "esearchresult")
        .ok_or_else(|| MinerError::Payload("esearch answer without esearchresult".to_string()))?;
    if let Some(message) = field(result, "ERROR").and_then(scalar_text) {
        return Err(MinerError::Payload(message));
    }
    Ok(list_entries(result, "idlist")
        .into_iter()
        .filter_map(scalar_text)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

/// Per-study objects from an `esummary` answer. JSON answers list them
/// under `result` keyed by `result.uids`; XML `DocSum`s are converted to
/// the same shape.
pub fn parse_summary_items(response: &HttpResponse) -> Result<Vec<Value>, MinerError> {
    if is_xml(response) {
        return Ok(docsums_from_xml(&response.text()));
    }
    let payload = response.json()?;
    let result = field(&payload, "result")
        .ok_or_else(|| MinerError::Payload("esummary answer without result".to_string()))?;
    Ok(list_entries(result, "uids")
        .into_iter()
        .filter_map(scalar_text)
        .filter_map(|uid| field(result, &uid).cloned())
        .filter(Value::is_object)
        .collect())
}

struct XmlFrame {
    name: Option<String>,
    kind: String,
    content_start: usize,
    children: Vec<(String, Value)>,
}

impl XmlFrame {
    fn into_value(self, content: &str) -> Value {
        match self.kind.as_str() {
            "List" => Value::Array(self.children.into_iter().map(|(_, value)| value).collect()),
            "Structure" | "DocSum" => {
                let mut map = Map::new();
                for (name, value) in self.children {
                    map.entry(name).or_insert(value);
                }
                Value::Object(map)
            }
            _ => Value::String(decode_entities(content.trim())),
        }
    }
}

/// Converts `eSummaryResult` XML into one object per `DocSum`. `Item`s of
/// type `List` become arrays, `Structure`s become objects and everything
/// else becomes text.
pub fn docsums_from_xml(xml: &str) -> Vec<Value> {
    let mut stack: Vec<XmlFrame> = Vec::new();
    let mut docs = Vec::new();
    for caps in DOCSUM_TAG.captures_iter(xml) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let is_docsum = &caps[2] == "DocSum";
        let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or_default();

        if &caps[1] != "/" {
            let frame = XmlFrame {
                name: if is_docsum { None } else { attribute(attrs, "Name") },
                kind: if is_docsum {
                    "DocSum".to_string()
                } else {
                    attribute(attrs, "Type").unwrap_or_default()
                },
                content_start: whole.end(),
                children: Vec::new(),
            };
            if attrs.trim_end().ends_with('/') {
                finish_frame(frame, "", &mut stack, &mut docs);
            } else {
                stack.push(frame);
            }
            continue;
        }

        let matches_top = stack
            .last()
            .map(|frame| (frame.kind == "DocSum") == is_docsum)
            .unwrap_or(false);
        if !matches_top {
            continue;
        }
        if let Some(frame) = stack.pop() {
            let content = &xml[frame.content_start..whole.start()];
            finish_frame(frame, content, &mut stack, &mut docs);
        }
    }
    docs
}

fn finish_frame(frame: XmlFrame, content: &str, stack: &mut [XmlFrame], docs: &mut Vec<Value>) {
    let is_docsum = frame.kind == "DocSum";
    let name = frame.name.clone().unwrap_or_default();
    let value = frame.into_value(content);
    if is_docsum {
        docs.push(value);
    } else if let Some(parent) = stack.last_mut() {
        parent.children.push((name, value));
    }
}

/// Builds a record from one summary object; objects without a title are
/// dropped.
pub fn record_from_docsum(item: &Value) -> Option<DatasetRecord> {
    let accession = text_or_empty(item, &[key("Accession")]);
    let download_link = if accession.trim().is_empty() {
        String::new()
    } else {
        format!("{ACCESSION_URL}{}", accession.trim())
    };
    RecordDraft {
        platform: map_platform_code(&text_or_empty(item, &[key("GPL")])),
        accession,
        title: text_or_empty(item, &[key("title")]),
        public_date: text_or_empty(item, &[key("PDAT")]),
        experiment_type: experiment_type(item),
        organism: text_or_empty(item, &[key("taxon")]),
        tissue_summary: text_or_empty(item, &[key("summary")]),
        sample_count: text_or_empty(item, &[key("n_samples")]),
        publication: publication(item),
        download_link,
        extra: Vec::new(),
    }
    .finish(SourceTag::NcbiGeo)
}

/// Joins the distinct experiment-type signals of a summary.
pub fn experiment_type(item: &Value) -> String {
    let mut types: Vec<String> = Vec::new();
    let mut push = |value: String| {
        let value = clean_text(&value);
        if !value.is_empty() && !types.contains(&value) {
            types.push(value);
        }
    };

    if let Some(gds_type) = field(item, "gdsType").and_then(scalar_text) {
        if clean_text(&gds_type) != "Other" {
            push(gds_type);
        }
    }
    if let Some(ptech_type) = field(item, "ptechType").and_then(scalar_text) {
        push(ptech_type);
    }
    if let Some(entry_type) = field(item, "entryType").and_then(scalar_text) {
        if !matches!(clean_text(&entry_type).as_str(), "GSE" | "GDS") {
            push(entry_type);
        }
    }
    for entry in list_entries(item, "ExpType") {
        if let Some(value) = scalar_text(entry) {
            push(value);
        }
    }

    if types.is_empty() {
        DEFAULT_EXPERIMENT_TYPE.to_string()
    } else {
        types.join(", ")
    }
}

/// PubMed id of a summary: `PubMedIds` first, then pubmed `Relations`,
/// then any `ExtRelations` entry.
pub fn publication(item: &Value) -> String {
    let direct = list_entries(item, "PubMedIds")
        .into_iter()
        .filter_map(scalar_text)
        .map(|id| id.trim().to_string())
        .find(|id| !id.is_empty() && id.chars().all(|ch| ch.is_ascii_digit()));
    if let Some(id) = direct {
        return id;
    }

    let relation = list_entries(item, "Relations")
        .into_iter()
        .map(entry_text)
        .filter(|text| text.to_lowercase().contains("pubmed"))
        .map(|text| extract_identifier(&text))
        .find(|id| !id.is_empty());
    if let Some(id) = relation {
        return id;
    }

    list_entries(item, "ExtRelations")
        .into_iter()
        .map(entry_text)
        .map(|text| extract_identifier(&text))
        .find(|id| !id.is_empty())
        .unwrap_or_default()
}

fn entry_text(entry: &Value) -> String {
    flatten_texts(entry).join(" ")
}
