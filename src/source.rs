use std::collections::HashSet;
use std::fmt;
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::domain::{DatasetRecord, SourceTag};
use crate::error::MinerError;

/// Per-run parameters handed to a fetcher. Catalog fetchers ignore both.
#[derive(Debug, Clone, Default)]
pub struct FetchParams {
    pub query: Option<String>,
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    NoLiveRecords,
    LiveFailed(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NoLiveRecords => write!(f, "live retrieval returned no records"),
            FallbackReason::LiveFailed(message) => write!(f, "live retrieval failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Live(Vec<DatasetRecord>),
    Fallback {
        records: Vec<DatasetRecord>,
        reason: FallbackReason,
    },
}

impl FetchOutcome {
    pub fn records(&self) -> &[DatasetRecord] {
        match self {
            FetchOutcome::Live(records) => records,
            FetchOutcome::Fallback { records, .. } => records,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, FetchOutcome::Live(_))
    }

    pub fn into_records(self) -> Vec<DatasetRecord> {
        match self {
            FetchOutcome::Live(records) => records,
            FetchOutcome::Fallback { records, .. } => records,
        }
    }
}

pub trait SourceFetcher {
    fn source(&self) -> SourceTag;

    fn fetch_live(&self, params: &FetchParams) -> Result<Vec<DatasetRecord>, MinerError>;

    fn curated(&self) -> Result<Vec<DatasetRecord>, MinerError>;

    /// Live records (deduplicated by title) when there are any, curated
    /// records otherwise. Every record comes back tagged with
    /// [`SourceFetcher::source`]; nothing here returns an error.
    fn fetch(&self, params: &FetchParams) -> FetchOutcome {
        let source = self.source();
        let reason = match self.fetch_live(params) {
            Ok(records) if !records.is_empty() => {
                let records = tag(dedup_by_title(records), source);
                info!(source = %source, count = records.len(), "live retrieval succeeded");
                return FetchOutcome::Live(records);
            }
            Ok(_) => FallbackReason::NoLiveRecords,
            Err(err) => FallbackReason::LiveFailed(err.to_string()),
        };

        warn!(source = %source, %reason, "using curated datasets");
        let records = match self.curated() {
            Ok(records) => tag(records, source),
            Err(err) => {
                error!(source = %source, error = %err, "curated datasets unavailable");
                Vec::new()
            }
        };
        FetchOutcome::Fallback { records, reason }
    }
}

fn tag(records: Vec<DatasetRecord>, source: SourceTag) -> Vec<DatasetRecord> {
    records
        .into_iter()
        .map(|record| record.with_source(source))
        .collect()
}

/// Keeps the first record for every title, preserving order.
pub fn dedup_by_title(records: Vec<DatasetRecord>) -> Vec<DatasetRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.title().to_string()))
        .collect()
}

/// Tries `candidates` in order and returns the first non-empty result.
///
/// `delay` is slept after every unsuccessful attempt that has a successor.
/// When no candidate succeeds the last error is returned.
pub fn first_success<T, F>(
    source: SourceTag,
    candidates: &[String],
    delay: Duration,
    mut attempt: F,
) -> Result<Vec<T>, MinerError>
where
    F: FnMut(&str) -> Result<Vec<T>, MinerError>,
{
    let mut last_error = None;
    for (index, candidate) in candidates.iter().enumerate() {
        match attempt(candidate) {
            Ok(items) if !items.is_empty() => {
                info!(source = %source, endpoint = %candidate, count = items.len(), "endpoint answered");
                return Ok(items);
            }
            Ok(_) => {
                warn!(source = %source, endpoint = %candidate, "endpoint yielded no records");
            }
            Err(err) => {
                warn!(source = %source, endpoint = %candidate, error = %err, "endpoint failed");
                last_error = Some(err);
            }
        }
        if index + 1 < candidates.len() && !delay.is_zero() {
            thread::sleep(delay);
        }
    }
    Err(last_error.unwrap_or_else(|| {
        MinerError::Payload(format!("no records at any of {} endpoints", candidates.len()))
    }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::RecordDraft;

    fn record(title: &str, accession: &str) -> DatasetRecord {
        RecordDraft {
            title: title.to_string(),
            accession: accession.to_string(),
            ..RecordDraft::default()
        }
        .finish(SourceTag::Htan)
        .unwrap()
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let records = vec![record("A", "1"), record("B", "2"), record("A", "3")];
        let deduped = dedup_by_title(records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].accession(), "1");
        assert_eq!(deduped[1].title(), "B");
    }

    #[test]
    fn first_success_stops_at_first_non_empty() {
        let candidates = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut tried = Vec::new();
        let result = first_success(SourceTag::Htan, &candidates, Duration::ZERO, |url| {
            tried.push(url.to_string());
            match url {
                "a" => Err(MinerError::Http("down".to_string())),
                _ => Ok(vec![url.to_string()]),
            }
        })
        .unwrap();
        assert_eq!(result, vec!["b".to_string()]);
        assert_eq!(tried, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn first_success_reports_last_error() {
        let candidates = vec!["a".to_string(), "b".to_string()];
        let err = first_success::<String, _>(SourceTag::Htan, &candidates, Duration::ZERO, |url| {
            Err(MinerError::Http(url.to_string()))
        })
        .unwrap_err();
        assert_matches!(err, MinerError::Http(ref url) if url == "b");
    }

    #[test]
    fn first_success_all_empty_is_an_error() {
        let candidates = vec!["a".to_string()];
        let err = first_success::<String, _>(SourceTag::Htan, &candidates, Duration::ZERO, |_| {
            Ok(Vec::new())
        })
        .unwrap_err();
        assert_matches!(err, MinerError::Payload(_));
    }
}
