//! Sheet layout of the exported catalog.
//!
//! The builder turns the aggregated records into named sheets according to
//! an [`OrganizeBy`] mode. Serial numbers are assigned per sheet while the
//! rows are laid out; records themselves never carry one.

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{DatasetRecord, OrganismClass, OrganizeBy, SourceTag};
use crate::error::MinerError;
use crate::workbook::SheetWriter;

pub const SUMMARY_SHEET: &str = "Summary";
pub const ALL_DATASETS_SHEET: &str = "All Datasets";
pub const MAX_SHEET_NAME_CHARS: usize = 31;

pub const SERIAL_COLUMN: &str = "S.No.";
pub const RECORD_COLUMNS: [&str; 11] = [
    "Platform",
    "Accession",
    "Public Date",
    "Experiment Type",
    "Title",
    "Organism",
    "Summary (for Tissue)",
    "Samples",
    "Publication",
    "Download Link",
    "Source",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Integer(u64),
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text),
            CellValue::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<u64> {
        match self {
            CellValue::Integer(value) => Some(*value),
            CellValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|candidate| candidate == column)
    }

    /// Cells of `column`, top to bottom.
    pub fn column(&self, column: &str) -> Vec<&CellValue> {
        match self.column_index(column) {
            Some(index) => self.rows.iter().filter_map(|row| row.get(index)).collect(),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub metric: String,
    pub value: u64,
}

impl SummaryRow {
    fn new(metric: impl Into<String>, value: usize) -> Self {
        Self {
            metric: metric.into(),
            value: value as u64,
        }
    }
}

/// Sheets in write order. The first one is always the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub summary: Vec<SummaryRow>,
    pub sheets: Vec<Sheet>,
}

impl Report {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str()).collect()
    }
}

#[derive(Debug, Default)]
pub struct ReportBuilder;

impl ReportBuilder {
    pub fn build(&self, records: &[DatasetRecord], organize_by: OrganizeBy) -> Report {
        let columns = columns_for(records);
        let summary = summarize(records);
        let mut sheets = vec![summary_sheet(&summary)];

        match organize_by {
            OrganizeBy::None => {
                let all: Vec<&DatasetRecord> = records.iter().collect();
                sheets.push(record_sheet(ALL_DATASETS_SHEET, &columns, &all));
            }
            OrganizeBy::Platform => {
                for (source, group) in group_by_source(records.iter()) {
                    sheets.push(record_sheet(&sanitize_sheet_name(source.label()), &columns, &group));
                }
            }
            OrganizeBy::Organism => {
                for class in [OrganismClass::Human, OrganismClass::Other] {
                    let group = of_class(records, class);
                    if !group.is_empty() {
                        sheets.push(record_sheet(class.sheet_name(), &columns, &group));
                    }
                }
            }
            OrganizeBy::Both => {
                for class in [OrganismClass::Human, OrganismClass::Other] {
                    let class_records = of_class(records, class);
                    for (source, group) in group_by_source(class_records.into_iter()) {
                        let name = format!("{} - {}", class.label(), source.label());
                        sheets.push(record_sheet(&sanitize_sheet_name(&name), &columns, &group));
                    }
                }
            }
        }

        Report { summary, sheets }
    }

    /// Builds the report and hands every sheet to `writer`, then closes it.
    pub fn export(
        &self,
        records: &[DatasetRecord],
        organize_by: OrganizeBy,
        writer: &mut dyn SheetWriter,
    ) -> Result<Report, MinerError> {
        let report = self.build(records, organize_by);
        info!(
            records = records.len(),
            sheets = report.sheets.len(),
            organize_by = %organize_by,
            "exporting catalog"
        );
        for sheet in &report.sheets {
            writer.write_sheet(sheet)?;
        }
        writer.close()?;
        Ok(report)
    }
}

/// Drops `[ ] * ?`, turns `/ \ :` into `-` and truncates to 31 characters.
pub fn sanitize_sheet_name(name: &str) -> String {
    name.chars()
        .filter(|ch| !matches!(ch, '[' | ']' | '*' | '?'))
        .map(|ch| if matches!(ch, '/' | '\\' | ':') { '-' } else { ch })
        .take(MAX_SHEET_NAME_CHARS)
        .collect()
}

pub fn summarize(records: &[DatasetRecord]) -> Vec<SummaryRow> {
    let mut rows = vec![SummaryRow::new("Total Datasets", records.len())];
    for (source, count) in count_by(records.iter().map(|record| record.source().label())) {
        rows.push(SummaryRow::new(format!("  {source}"), count));
    }
    let human = records
        .iter()
        .filter(|record| record.organism_class() == OrganismClass::Human)
        .count();
    rows.push(SummaryRow::new("Human Datasets", human));
    rows.push(SummaryRow::new("Other Organisms", records.len() - human));
    rows.push(SummaryRow::new(
        "Unique Organisms",
        count_by(organisms(records)).len(),
    ));
    rows
}

/// Non-empty organism values of `records`.
pub fn organisms(records: &[DatasetRecord]) -> impl Iterator<Item = &str> {
    records
        .iter()
        .map(|record| record.organism())
        .filter(|organism| !organism.is_empty())
}

/// Occurrence counts, most frequent first. Ties keep first-seen order.
pub fn count_by<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut counts: Vec<(&'a str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

fn columns_for(records: &[DatasetRecord]) -> Vec<String> {
    let mut columns: Vec<String> = std::iter::once(SERIAL_COLUMN)
        .chain(RECORD_COLUMNS)
        .map(str::to_string)
        .collect();
    for (name, _) in records.iter().flat_map(|record| record.extra()) {
        let column = extra_column(name);
        if !columns.contains(&column) {
            if column != *name {
                warn!(field = %name, column = %column, "extra field shadows a record column");
            }
            columns.push(column);
        }
    }
    columns
}

fn is_record_column(name: &str) -> bool {
    name == SERIAL_COLUMN || RECORD_COLUMNS.contains(&name)
}

/// Column an extra field is written under. Names taken by the record
/// columns get an ` (extra)` suffix.
pub fn extra_column(name: &str) -> String {
    if is_record_column(name) {
        format!("{name} (extra)")
    } else {
        name.to_string()
    }
}

fn summary_sheet(summary: &[SummaryRow]) -> Sheet {
    Sheet {
        name: SUMMARY_SHEET.to_string(),
        columns: vec!["Metric".to_string(), "Value".to_string()],
        rows: summary
            .iter()
            .map(|row| vec![CellValue::Text(row.metric.clone()), CellValue::Integer(row.value)])
            .collect(),
    }
}

fn record_sheet(name: &str, columns: &[String], records: &[&DatasetRecord]) -> Sheet {
    let rows = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            columns
                .iter()
                .map(|column| cell(record, column, index + 1))
                .collect()
        })
        .collect();
    Sheet {
        name: name.to_string(),
        columns: columns.to_vec(),
        rows,
    }
}

fn cell(record: &DatasetRecord, column: &str, serial: usize) -> CellValue {
    let text = match column {
        SERIAL_COLUMN => return CellValue::Integer(serial as u64),
        "Platform" => record.platform(),
        "Accession" => record.accession(),
        "Public Date" => record.public_date(),
        "Experiment Type" => record.experiment_type(),
        "Title" => record.title(),
        "Organism" => record.organism(),
        "Summary (for Tissue)" => record.tissue_summary(),
        "Samples" => record.sample_count(),
        "Publication" => record.publication(),
        "Download Link" => record.download_link(),
        "Source" => record.source().label(),
        extra => record
            .extra()
            .iter()
            .find(|(name, _)| extra_column(name) == extra)
            .map(|(_, value)| value.as_str())
            .unwrap_or_default(),
    };
    CellValue::Text(text.to_string())
}

fn of_class(records: &[DatasetRecord], class: OrganismClass) -> Vec<&DatasetRecord> {
    records
        .iter()
        .filter(|record| record.organism_class() == class)
        .collect()
}

fn group_by_source<'a>(
    records: impl Iterator<Item = &'a DatasetRecord>,
) -> Vec<(SourceTag, Vec<&'a DatasetRecord>)> {
    let mut groups: Vec<(SourceTag, Vec<&'a DatasetRecord>)> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|(source, _)| *source == record.source()) {
            Some((_, group)) => group.push(record),
            None => groups.push((record.source(), vec![record])),
        }
    }
    groups
}
