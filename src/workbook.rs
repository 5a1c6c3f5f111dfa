use std::collections::HashSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tracing::{debug, warn};

use crate::error::MinerError;
use crate::report::{CellValue, Sheet};

/// Longest text Excel keeps in one cell.
const MAX_CELL_CHARS: usize = 32_767;

/// Sink for report sheets. Sheets are written in call order; `close`
/// finalizes the output.
pub trait SheetWriter {
    fn write_sheet(&mut self, sheet: &Sheet) -> Result<(), MinerError>;
    fn close(&mut self) -> Result<(), MinerError>;
}

/// Collects sheets in memory.
#[derive(Debug, Default)]
pub struct MemorySheetWriter {
    pub sheets: Vec<Sheet>,
    pub closed: bool,
}

impl SheetWriter for MemorySheetWriter {
    fn write_sheet(&mut self, sheet: &Sheet) -> Result<(), MinerError> {
        self.sheets.push(sheet.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), MinerError> {
        self.closed = true;
        Ok(())
    }
}

/// Writes an `.xlsx` workbook. The file only appears on `close`, written to
/// a temporary file next to the destination and then renamed over it.
pub struct XlsxSheetWriter {
    path: Utf8PathBuf,
    workbook: Workbook,
    header: Format,
    names: HashSet<String>,
}

impl XlsxSheetWriter {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            workbook: Workbook::new(),
            header: Format::new().set_bold(),
            names: HashSet::new(),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn add_sheet(&mut self, sheet: &Sheet) -> Result<(), XlsxError> {
        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;
        for (col, column) in sheet.columns.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, column, &self.header)?;
        }
        for (index, row) in sheet.rows.iter().enumerate() {
            let row_number = index as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    CellValue::Integer(value) => {
                        worksheet.write_number(row_number, col as u16, *value as f64)?;
                    }
                    CellValue::Text(text) if text.is_empty() => {}
                    CellValue::Text(text) => {
                        worksheet.write_string(row_number, col as u16, clip_cell(text))?;
                    }
                }
            }
        }
        worksheet.set_freeze_panes(1, 0)?;
        worksheet.autofit();
        Ok(())
    }
}

impl SheetWriter for XlsxSheetWriter {
    fn write_sheet(&mut self, sheet: &Sheet) -> Result<(), MinerError> {
        if !self.names.insert(sheet.name.to_lowercase()) {
            warn!(sheet = %sheet.name, "duplicate sheet name, keeping the first sheet");
            return Ok(());
        }
        debug!(sheet = %sheet.name, rows = sheet.rows.len(), "writing sheet");
        self.add_sheet(sheet)
            .map_err(|err| MinerError::Workbook(format!("sheet {}: {err}", sheet.name)))
    }

    fn close(&mut self) -> Result<(), MinerError> {
        let buffer = self
            .workbook
            .save_to_buffer()
            .map_err(|err| MinerError::Workbook(err.to_string()))?;
        write_atomic(&self.path, &buffer)
    }
}

fn clip_cell(text: &str) -> &str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

pub fn write_atomic(dest: &Utf8Path, bytes: &[u8]) -> Result<(), MinerError> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| MinerError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix("st-miner-")
        .suffix(".xlsx")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| MinerError::Filesystem(err.to_string()))?;
    fs::write(temp.path(), bytes).map_err(|err| MinerError::Filesystem(err.to_string()))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| MinerError::Filesystem(err.to_string()))?;
    Ok(())
}
