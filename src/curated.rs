//! Curated fallback datasets embedded in the binary.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use crate::domain::{DatasetRecord, RecordDraft, SourceTag};
use crate::error::MinerError;

const GEO_DOCUMENT: &str = include_str!("../data/curated/geo.json");
const TENX_DOCUMENT: &str = include_str!("../data/curated/tenx.json");
const HTAN_DOCUMENT: &str = include_str!("../data/curated/htan.json");

#[derive(Debug, Deserialize)]
pub struct CuratedDocument {
    pub source: SourceTag,
    pub last_updated: NaiveDate,
    #[serde(default)]
    pub records: Vec<RecordDraft>,
}

pub fn document_text(source: SourceTag) -> &'static str {
    match source {
        SourceTag::NcbiGeo => GEO_DOCUMENT,
        SourceTag::TenxGenomics => TENX_DOCUMENT,
        SourceTag::Htan => HTAN_DOCUMENT,
    }
}

pub fn parse_document(source: SourceTag, text: &str) -> Result<CuratedDocument, MinerError> {
    let document: CuratedDocument =
        serde_json::from_str(text).map_err(|err| MinerError::Curated {
            source_label: source.label().to_string(),
            message: err.to_string(),
        })?;
    if document.source != source {
        return Err(MinerError::Curated {
            source_label: source.label().to_string(),
            message: format!("document belongs to {}", document.source),
        });
    }
    Ok(document)
}

/// Curated records for `source`, tagged and normalized like live ones.
pub fn load(source: SourceTag) -> Result<Vec<DatasetRecord>, MinerError> {
    let document = parse_document(source, document_text(source))?;
    let age_days = (Utc::now().date_naive() - document.last_updated).num_days();
    info!(
        source = %source,
        last_updated = %document.last_updated,
        age_days,
        records = document.records.len(),
        "loaded curated datasets"
    );
    Ok(document
        .records
        .into_iter()
        .filter_map(|draft| draft.finish(source))
        .collect())
}
