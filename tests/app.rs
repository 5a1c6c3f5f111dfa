mod common;

use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use st_catalog_miner::aggregate::{Aggregator, Origin, SelectedSource};
use st_catalog_miner::app::{App, RunOverrides, RunPlan, SourceFlags, collect_and_export};
use st_catalog_miner::config::ResolvedConfig;
use st_catalog_miner::domain::{DatasetRecord, OrganizeBy, SourceTag};
use st_catalog_miner::error::MinerError;
use st_catalog_miner::providers::GeoSettings;
use st_catalog_miner::report::{CellValue, ReportBuilder, SUMMARY_SHEET};
use st_catalog_miner::source::{FetchParams, SourceFetcher};
use st_catalog_miner::workbook::{MemorySheetWriter, XlsxSheetWriter};

use common::{StubHttp, record};

struct Canned {
    source: SourceTag,
    live: Vec<DatasetRecord>,
    curated: Vec<DatasetRecord>,
}

impl SourceFetcher for Canned {
    fn source(&self) -> SourceTag {
        self.source
    }

    fn fetch_live(&self, _params: &FetchParams) -> Result<Vec<DatasetRecord>, MinerError> {
        if self.live.is_empty() {
            Err(MinerError::Http("unreachable".to_string()))
        } else {
            Ok(self.live.clone())
        }
    }

    fn curated(&self) -> Result<Vec<DatasetRecord>, MinerError> {
        Ok(self.curated.clone())
    }
}

fn offline_config(output: Utf8PathBuf) -> ResolvedConfig {
    ResolvedConfig {
        geo: GeoSettings {
            request_delay: Duration::ZERO,
            ..GeoSettings::default()
        },
        catalog_request_delay: Duration::ZERO,
        output,
        ..ResolvedConfig::default()
    }
}

#[test]
fn live_and_fallback_sources_are_combined() {
    let geo = Canned {
        source: SourceTag::NcbiGeo,
        live: vec![
            record("Human PDAC", "Homo sapiens", SourceTag::NcbiGeo),
            record("Mouse hippocampus", "Mus musculus", SourceTag::NcbiGeo),
        ],
        curated: Vec::new(),
    };
    let htan = Canned {
        source: SourceTag::Htan,
        live: Vec::new(),
        curated: vec![record("Colon polyp", "Homo sapiens", SourceTag::Htan)],
    };
    let selected = [
        SelectedSource::new(&geo, FetchParams::default()),
        SelectedSource::new(&htan, FetchParams::default()),
    ];

    let mut writer = MemorySheetWriter::default();
    let result = collect_and_export(
        &selected,
        OrganizeBy::Both,
        Utf8PathBuf::from("catalog.xlsx").as_path(),
        &mut writer,
    )
    .unwrap();

    assert_eq!(result.total, 3);
    assert_eq!(result.human, 2);
    assert_eq!(result.other, 1);
    assert_eq!(result.contributions.len(), 2);
    assert_eq!(result.contributions[0].origin, Origin::Live);
    assert_eq!(result.contributions[1].origin, Origin::Fallback);
    assert_eq!(result.contributions[1].count, 1);
    assert_eq!(
        result.by_source,
        vec![("NCBI GEO".to_string(), 2), ("HTAN".to_string(), 1)]
    );
    assert_eq!(result.top_organisms[0], ("Homo sapiens".to_string(), 2));
    assert_eq!(
        result.sheets,
        vec![SUMMARY_SHEET, "Human - NCBI GEO", "Human - HTAN", "Other - NCBI GEO"]
    );
    assert!(result.output.ends_with("catalog.xlsx"));
    assert!(writer.closed);
    assert_eq!(writer.sheets.len(), 4);
}

#[test]
fn aggregated_records_split_by_organism() {
    let geo = Canned {
        source: SourceTag::NcbiGeo,
        live: vec![record("A", "Homo sapiens", SourceTag::NcbiGeo)],
        curated: Vec::new(),
    };
    let tenx = Canned {
        source: SourceTag::TenxGenomics,
        live: vec![record("B", "Mus musculus", SourceTag::TenxGenomics)],
        curated: Vec::new(),
    };
    let selected = [
        SelectedSource::new(&geo, FetchParams::default()),
        SelectedSource::new(&tenx, FetchParams::default()),
    ];

    let records = Aggregator.run(&selected);
    let titles: Vec<_> = records.iter().map(|r| r.title()).collect();
    assert_eq!(titles, vec!["A", "B"]);

    let report = ReportBuilder.build(&records, OrganizeBy::Organism);
    assert_eq!(
        report.sheet_names(),
        vec![SUMMARY_SHEET, "Human", "Other Organisms"]
    );
    let sheet_titles = |name: &str| -> Vec<String> {
        report
            .sheet(name)
            .unwrap()
            .column("Title")
            .into_iter()
            .filter_map(CellValue::as_text)
            .map(str::to_string)
            .collect()
    };
    assert_eq!(sheet_titles("Human"), vec!["A"]);
    assert_eq!(sheet_titles("Other Organisms"), vec!["B"]);
}

#[test]
fn nothing_collected_is_an_error() {
    let empty = Canned {
        source: SourceTag::NcbiGeo,
        live: Vec::new(),
        curated: Vec::new(),
    };
    let selected = [SelectedSource::new(&empty, FetchParams::default())];
    let mut writer = MemorySheetWriter::default();
    let err = collect_and_export(
        &selected,
        OrganizeBy::None,
        Utf8PathBuf::from("catalog.xlsx").as_path(),
        &mut writer,
    )
    .unwrap_err();
    assert_matches!(err, MinerError::NoDatasets);
    assert!(writer.sheets.is_empty());
    assert!(!writer.closed);
}

#[test]
fn offline_run_writes_curated_catalog() {
    let temp = tempfile::tempdir().unwrap();
    let output = Utf8PathBuf::from_path_buf(temp.path().join("catalog.xlsx")).unwrap();
    let config = offline_config(output.clone());
    let plan = RunPlan::new(&config, SourceFlags::default(), RunOverrides::default());
    assert_eq!(plan.sources, SourceTag::ALL.to_vec());

    let app = App::new(StubHttp::offline(), config);
    let mut writer = XlsxSheetWriter::new(plan.output.clone());
    let result = app.run(&plan, &mut writer).unwrap();

    assert_eq!(result.total, 28);
    assert_eq!(
        result.by_source,
        vec![("10x Genomics".to_string(), 16), ("HTAN".to_string(), 12)]
    );
    assert!(
        result
            .contributions
            .iter()
            .all(|contribution| contribution.origin == Origin::Fallback)
    );
    assert_eq!(result.contributions[0].source, SourceTag::NcbiGeo);
    assert_eq!(result.contributions[0].count, 0);
    assert_eq!(result.sheets[0], SUMMARY_SHEET);

    let bytes = fs::read(output.as_std_path()).unwrap();
    assert!(bytes.starts_with(b"PK"));
}

#[test]
fn only_flag_limits_the_run() {
    let temp = tempfile::tempdir().unwrap();
    let output = Utf8PathBuf::from_path_buf(temp.path().join("htan.xlsx")).unwrap();
    let config = offline_config(output);
    let plan = RunPlan::new(
        &config,
        SourceFlags {
            only_htan: true,
            include_10x: true,
            ..SourceFlags::default()
        },
        RunOverrides {
            organize_by: Some(OrganizeBy::None),
            ..RunOverrides::default()
        },
    );

    let http = StubHttp::offline();
    let app = App::new(http.clone(), config);
    let mut writer = MemorySheetWriter::default();
    let result = app.run(&plan, &mut writer).unwrap();

    assert_eq!(result.total, 12);
    assert_eq!(result.sheets, vec![SUMMARY_SHEET, "All Datasets"]);
    assert!(http.calls().iter().all(|url| !url.contains("10xgenomics")));
}
