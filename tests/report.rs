mod common;

use st_catalog_miner::domain::{DatasetRecord, OrganizeBy, RecordDraft, SourceTag};
use st_catalog_miner::report::{
    ALL_DATASETS_SHEET, CellValue, ReportBuilder, SERIAL_COLUMN, SUMMARY_SHEET, SummaryRow,
};
use st_catalog_miner::workbook::MemorySheetWriter;

use common::record;

fn catalog() -> Vec<DatasetRecord> {
    vec![
        record("Human PDAC", "Homo sapiens", SourceTag::NcbiGeo),
        record("Mouse hippocampus", "Mus musculus", SourceTag::NcbiGeo),
        record("Human breast", "Human", SourceTag::TenxGenomics),
        record("Mouse brain", "Mus musculus", SourceTag::TenxGenomics),
        record("Colon polyp", "Homo sapiens", SourceTag::Htan),
        record("Zebrafish fin", "", SourceTag::NcbiGeo),
    ]
}

fn summary_value(rows: &[SummaryRow], metric: &str) -> Option<u64> {
    rows.iter().find(|row| row.metric == metric).map(|row| row.value)
}

#[test]
fn flat_report_numbers_every_record() {
    let records = catalog();
    let report = ReportBuilder.build(&records, OrganizeBy::None);
    assert_eq!(report.sheet_names(), vec![SUMMARY_SHEET, ALL_DATASETS_SHEET]);

    let all = report.sheet(ALL_DATASETS_SHEET).unwrap();
    assert_eq!(all.rows.len(), records.len());
    let serials: Vec<_> = all
        .column(SERIAL_COLUMN)
        .into_iter()
        .filter_map(CellValue::as_integer)
        .collect();
    assert_eq!(serials, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(all.columns[0], SERIAL_COLUMN);
    assert_eq!(all.columns.last().map(String::as_str), Some("Source"));
}

#[test]
fn summary_counts_sources_and_organisms() {
    let report = ReportBuilder.build(&catalog(), OrganizeBy::None);
    let summary = &report.summary;
    assert_eq!(summary[0].metric, "Total Datasets");
    assert_eq!(summary[0].value, 6);
    assert_eq!(summary_value(summary, "  NCBI GEO"), Some(3));
    assert_eq!(summary_value(summary, "  10x Genomics"), Some(2));
    assert_eq!(summary_value(summary, "  HTAN"), Some(1));
    assert_eq!(summary_value(summary, "Human Datasets"), Some(3));
    assert_eq!(summary_value(summary, "Other Organisms"), Some(3));
    assert_eq!(summary_value(summary, "Unique Organisms"), Some(3));

    let sheet = report.sheet(SUMMARY_SHEET).unwrap();
    assert_eq!(sheet.columns, vec!["Metric", "Value"]);
    assert_eq!(sheet.rows.len(), summary.len());
}

#[test]
fn both_mode_splits_by_organism_then_source() {
    let report = ReportBuilder.build(&catalog(), OrganizeBy::Both);
    assert_eq!(
        report.sheet_names(),
        vec![
            SUMMARY_SHEET,
            "Human - NCBI GEO",
            "Human - 10x Genomics",
            "Human - HTAN",
            "Other - NCBI GEO",
            "Other - 10x Genomics",
        ]
    );
    let other_geo = report.sheet("Other - NCBI GEO").unwrap();
    let titles: Vec<_> = other_geo
        .column("Title")
        .into_iter()
        .filter_map(CellValue::as_text)
        .collect();
    assert_eq!(titles, vec!["Mouse hippocampus", "Zebrafish fin"]);
    let serials: Vec<_> = other_geo
        .column(SERIAL_COLUMN)
        .into_iter()
        .filter_map(CellValue::as_integer)
        .collect();
    assert_eq!(serials, vec![1, 2]);
}

#[test]
fn both_mode_skips_empty_groups() {
    let records = vec![
        record("Human PDAC", "Homo sapiens", SourceTag::NcbiGeo),
        record("Colon polyp", "Homo sapiens", SourceTag::Htan),
    ];
    let report = ReportBuilder.build(&records, OrganizeBy::Both);
    assert_eq!(
        report.sheet_names(),
        vec![SUMMARY_SHEET, "Human - NCBI GEO", "Human - HTAN"]
    );
}

#[test]
fn platform_mode_keeps_first_seen_source_order() {
    let mut records = catalog();
    records.rotate_left(4);
    let report = ReportBuilder.build(&records, OrganizeBy::Platform);
    assert_eq!(
        report.sheet_names(),
        vec![SUMMARY_SHEET, "HTAN", "NCBI GEO", "10x Genomics"]
    );
    assert_eq!(report.sheet("NCBI GEO").unwrap().rows.len(), 3);
}

#[test]
fn organism_mode_has_two_sheets_at_most() {
    let report = ReportBuilder.build(&catalog(), OrganizeBy::Organism);
    assert_eq!(
        report.sheet_names(),
        vec![SUMMARY_SHEET, "Human", "Other Organisms"]
    );
    assert_eq!(report.sheet("Human").unwrap().rows.len(), 3);

    let humans_only = vec![record("Human PDAC", "Homo sapiens", SourceTag::NcbiGeo)];
    let report = ReportBuilder.build(&humans_only, OrganizeBy::Organism);
    assert_eq!(report.sheet_names(), vec![SUMMARY_SHEET, "Human"]);
}

#[test]
fn extra_attributes_become_trailing_columns() {
    let mut records = catalog();
    records.push(
        RecordDraft {
            title: "Spatial colon atlas".to_string(),
            organism: "Homo sapiens".to_string(),
            extra: vec![("File Format".to_string(), "h5ad".to_string())],
            ..RecordDraft::default()
        }
        .finish(SourceTag::Htan)
        .unwrap(),
    );
    let report = ReportBuilder.build(&records, OrganizeBy::None);
    let all = report.sheet(ALL_DATASETS_SHEET).unwrap();
    assert_eq!(all.columns.last().map(String::as_str), Some("File Format"));
    let formats: Vec<_> = all
        .column("File Format")
        .into_iter()
        .filter_map(CellValue::as_text)
        .collect();
    assert_eq!(formats, vec!["", "", "", "", "", "", "h5ad"]);
}

#[test]
fn extra_named_like_a_record_column_is_kept() {
    let records = vec![
        RecordDraft {
            title: "Spatial colon atlas".to_string(),
            extra: vec![("Title".to_string(), "Colon atlas, section 2".to_string())],
            ..RecordDraft::default()
        }
        .finish(SourceTag::Htan)
        .unwrap(),
    ];
    let report = ReportBuilder.build(&records, OrganizeBy::None);
    let all = report.sheet(ALL_DATASETS_SHEET).unwrap();
    assert_eq!(all.columns.last().map(String::as_str), Some("Title (extra)"));
    assert_eq!(
        all.column("Title").first().and_then(|cell| cell.as_text()),
        Some("Spatial colon atlas")
    );
    assert_eq!(
        all.column("Title (extra)").first().and_then(|cell| cell.as_text()),
        Some("Colon atlas, section 2")
    );
}

#[test]
fn export_writes_every_sheet_then_closes() {
    let mut writer = MemorySheetWriter::default();
    let report = ReportBuilder
        .export(&catalog(), OrganizeBy::Platform, &mut writer)
        .unwrap();
    assert!(writer.closed);
    assert_eq!(writer.sheets, report.sheets);
    assert_eq!(writer.sheets[0].name, SUMMARY_SHEET);
}
