use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::info;

use crate::aggregate::{Aggregator, SelectedSource, SourceContribution};
use crate::config::ResolvedConfig;
use crate::domain::{DatasetRecord, OrganismClass, OrganizeBy, SourceTag};
use crate::error::MinerError;
use crate::http::HttpClient;
use crate::providers::{GeoFetcher, HtanFetcher, TenxFetcher};
use crate::report::{ReportBuilder, SummaryRow, count_by, organisms};
use crate::source::{FetchParams, SourceFetcher};
use crate::workbook::SheetWriter;

const TOP_ORGANISMS: usize = 5;

/// Source selection flags as given on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceFlags {
    pub only_ncbi: bool,
    pub only_10x: bool,
    pub only_htan: bool,
    pub include_ncbi: bool,
    pub include_10x: bool,
    pub include_htan: bool,
}

impl SourceFlags {
    /// Selected sources in fetch order. No flag selects everything; an
    /// `only` flag (checked GEO, 10x, HTAN) overrides every `include`.
    pub fn selection(&self) -> Vec<SourceTag> {
        let only = [
            (self.only_ncbi, SourceTag::NcbiGeo),
            (self.only_10x, SourceTag::TenxGenomics),
            (self.only_htan, SourceTag::Htan),
        ];
        if let Some((_, source)) = only.iter().find(|(flag, _)| *flag) {
            return vec![*source];
        }
        let included: Vec<SourceTag> = [
            (self.include_ncbi, SourceTag::NcbiGeo),
            (self.include_10x, SourceTag::TenxGenomics),
            (self.include_htan, SourceTag::Htan),
        ]
        .into_iter()
        .filter(|(flag, _)| *flag)
        .map(|(_, source)| source)
        .collect();
        if included.is_empty() {
            SourceTag::ALL.to_vec()
        } else {
            included
        }
    }
}

/// Command-line values that win over the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub query: Option<String>,
    pub max_results: Option<usize>,
    pub email: Option<String>,
    pub output: Option<Utf8PathBuf>,
    pub organize_by: Option<OrganizeBy>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    pub sources: Vec<SourceTag>,
    pub query: String,
    pub max_results: usize,
    #[serde(skip)]
    pub email: Option<String>,
    pub organize_by: OrganizeBy,
    pub output: Utf8PathBuf,
}

impl RunPlan {
    pub fn new(config: &ResolvedConfig, flags: SourceFlags, overrides: RunOverrides) -> Self {
        Self {
            sources: flags.selection(),
            query: overrides.query.unwrap_or_else(|| config.geo.query.clone()),
            max_results: overrides.max_results.unwrap_or(config.geo.max_results),
            email: overrides.email.or_else(|| config.geo.email.clone()),
            organize_by: overrides.organize_by.unwrap_or(config.organize_by),
            output: overrides.output.unwrap_or_else(|| config.output.clone()),
        }
    }

    pub fn includes(&self, source: SourceTag) -> bool {
        self.sources.contains(&source)
    }

    fn params_for(&self, source: SourceTag) -> FetchParams {
        match source {
            SourceTag::NcbiGeo => FetchParams {
                query: Some(self.query.clone()),
                max_results: Some(self.max_results),
            },
            SourceTag::TenxGenomics | SourceTag::Htan => FetchParams::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub output: String,
    pub total: usize,
    pub contributions: Vec<SourceContribution>,
    pub by_source: Vec<(String, usize)>,
    pub human: usize,
    pub other: usize,
    pub top_organisms: Vec<(String, usize)>,
    pub summary: Vec<SummaryRow>,
    pub sheets: Vec<String>,
}

pub struct App<H: HttpClient + Clone> {
    http: H,
    config: ResolvedConfig,
}

impl<H: HttpClient + Clone> App<H> {
    pub fn new(http: H, config: ResolvedConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn run(&self, plan: &RunPlan, writer: &mut dyn SheetWriter) -> Result<RunResult, MinerError> {
        let mut geo_settings = self.config.geo.clone();
        geo_settings.email = plan.email.clone();
        let geo = GeoFetcher::new(self.http.clone(), geo_settings);
        let tenx = TenxFetcher::new(self.http.clone())
            .with_request_delay(self.config.catalog_request_delay);
        let htan = HtanFetcher::new(self.http.clone())
            .with_request_delay(self.config.catalog_request_delay);

        let selected: Vec<SelectedSource<'_>> = plan
            .sources
            .iter()
            .map(|source| {
                let fetcher: &dyn SourceFetcher = match source {
                    SourceTag::NcbiGeo => &geo,
                    SourceTag::TenxGenomics => &tenx,
                    SourceTag::Htan => &htan,
                };
                SelectedSource::new(fetcher, plan.params_for(*source))
            })
            .collect();

        collect_and_export(&selected, plan.organize_by, &plan.output, writer)
    }
}

/// Aggregates `selected`, writes the report and summarizes the run. An
/// empty aggregation is [`MinerError::NoDatasets`] and nothing is written.
pub fn collect_and_export(
    selected: &[SelectedSource<'_>],
    organize_by: OrganizeBy,
    output: &Utf8Path,
    writer: &mut dyn SheetWriter,
) -> Result<RunResult, MinerError> {
    let aggregation = Aggregator.run_with_report(selected);
    if aggregation.records.is_empty() {
        return Err(MinerError::NoDatasets);
    }
    let report = ReportBuilder.export(&aggregation.records, organize_by, writer)?;
    let output = absolute_display(output);
    info!(output = %output, "catalog written");

    let records = &aggregation.records;
    let human = count_class(records, OrganismClass::Human);
    Ok(RunResult {
        output,
        total: records.len(),
        contributions: aggregation.contributions.clone(),
        by_source: owned_counts(count_by(records.iter().map(|r| r.source().label()))),
        human,
        other: records.len() - human,
        top_organisms: owned_counts(count_by(organisms(records)))
            .into_iter()
            .take(TOP_ORGANISMS)
            .collect(),
        summary: report.summary.clone(),
        sheets: report.sheets.iter().map(|sheet| sheet.name.clone()).collect(),
    })
}

fn count_class(records: &[DatasetRecord], class: OrganismClass) -> usize {
    records
        .iter()
        .filter(|record| record.organism_class() == class)
        .count()
}

fn owned_counts(counts: Vec<(&str, usize)>) -> Vec<(String, usize)> {
    counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect()
}

fn absolute_display(path: &Utf8Path) -> String {
    std::path::absolute(path.as_std_path())
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| path.to_string())
}
