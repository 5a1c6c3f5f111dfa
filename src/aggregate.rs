use serde::Serialize;
use tracing::info;

use crate::domain::{DatasetRecord, SourceTag};
use crate::source::{FetchOutcome, FetchParams, SourceFetcher};

/// One fetcher selected for a run, with its per-run parameters.
pub struct SelectedSource<'a> {
    pub fetcher: &'a dyn SourceFetcher,
    pub params: FetchParams,
}

impl<'a> SelectedSource<'a> {
    pub fn new(fetcher: &'a dyn SourceFetcher, params: FetchParams) -> Self {
        Self { fetcher, params }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Live,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceContribution {
    pub source: SourceTag,
    pub origin: Origin,
    pub count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub records: Vec<DatasetRecord>,
    pub contributions: Vec<SourceContribution>,
}

/// Runs the selected fetchers one after another and concatenates their
/// records in selection order. Records are never deduplicated across
/// sources.
#[derive(Debug, Default)]
pub struct Aggregator;

impl Aggregator {
    pub fn run(&self, selected: &[SelectedSource<'_>]) -> Vec<DatasetRecord> {
        self.run_with_report(selected).records
    }

    pub fn run_with_report(&self, selected: &[SelectedSource<'_>]) -> Aggregation {
        let mut aggregation = Aggregation::default();
        for entry in selected {
            let source = entry.fetcher.source();
            info!(source = %source, "fetching datasets");
            let outcome = entry.fetcher.fetch(&entry.params);
            let origin = match outcome {
                FetchOutcome::Live(_) => Origin::Live,
                FetchOutcome::Fallback { .. } => Origin::Fallback,
            };
            let records = outcome.into_records();
            info!(source = %source, count = records.len(), ?origin, "source finished");
            aggregation.contributions.push(SourceContribution {
                source,
                origin,
                count: records.len(),
            });
            aggregation.records.extend(records);
        }
        info!(total = aggregation.records.len(), "aggregation finished");
        aggregation
    }
}
