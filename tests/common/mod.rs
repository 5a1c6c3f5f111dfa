#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use st_catalog_miner::domain::{DatasetRecord, RecordDraft, SourceTag};
use st_catalog_miner::error::MinerError;
use st_catalog_miner::http::{HttpClient, HttpResponse};

pub const GEO_ESEARCH_JSON: &str = include_str!("../fixtures/geo_esearch.json");
pub const GEO_ESUMMARY_JSON: &str = include_str!("../fixtures/geo_esummary.json");
pub const GEO_ESUMMARY_XML: &str = include_str!("../fixtures/geo_esummary.xml");
pub const TENX_HTML: &str = include_str!("../fixtures/tenx_datasets.html");
pub const TENX_JSON: &str = include_str!("../fixtures/tenx_datasets.json");
pub const HTAN_FILES_JSON: &str = include_str!("../fixtures/htan_files.json");

type Handler =
    dyn Fn(&str, &[(&str, &str)]) -> Result<HttpResponse, MinerError> + Send + Sync;

/// HTTP stub answering from a closure and recording every requested URL.
#[derive(Clone)]
pub struct StubHttp {
    handler: Arc<Handler>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StubHttp {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &[(&str, &str)]) -> Result<HttpResponse, MinerError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every request fails at the transport level.
    pub fn offline() -> Self {
        Self::new(|url, _| Err(MinerError::Http(format!("connection refused: {url}"))))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl HttpClient for StubHttp {
    fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse, MinerError> {
        self.calls.lock().unwrap().push(url.to_string());
        (self.handler)(url, params)
    }
}

pub fn param<'a>(params: &[(&str, &'a str)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| *value)
}

pub fn json(body: &str) -> Result<HttpResponse, MinerError> {
    ok(body, "application/json; charset=UTF-8")
}

pub fn html(body: &str) -> Result<HttpResponse, MinerError> {
    ok(body, "text/html; charset=utf-8")
}

pub fn xml(body: &str) -> Result<HttpResponse, MinerError> {
    ok(body, "text/xml; charset=UTF-8")
}

pub fn status(code: u16) -> Result<HttpResponse, MinerError> {
    Ok(HttpResponse {
        status: code,
        body: b"unavailable".to_vec(),
        content_type: Some("text/plain".to_string()),
    })
}

fn ok(body: &str, content_type: &str) -> Result<HttpResponse, MinerError> {
    Ok(HttpResponse {
        status: 200,
        body: body.as_bytes().to_vec(),
        content_type: Some(content_type.to_string()),
    })
}

pub fn record(title: &str, organism: &str, source: SourceTag) -> DatasetRecord {
    RecordDraft {
        title: title.to_string(),
        accession: format!("ACC-{title}"),
        organism: organism.to_string(),
        ..RecordDraft::default()
    }
    .finish(source)
    .unwrap()
}
