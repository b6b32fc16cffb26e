//! Spreadsheet export with rust_xlsxwriter.

use super::{export_file_name, ResultExporter};
use crate::db::{Row, Value};
use crate::error::{HubError, Result};
use crate::session::EXPORTS_DIR;
use async_trait::async_trait;
use indexmap::IndexSet;
use rust_xlsxwriter::{Workbook, Worksheet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SHEET_NAME: &str = "Results";

/// Largest integer a spreadsheet cell holds exactly.
const MAX_EXACT_INTEGER: i64 = 1 << 53;

/// Longest string a spreadsheet cell accepts, in characters.
const MAX_CELL_CHARS: usize = 32_767;

/// Writes each result set as a single-sheet `.xlsx` workbook in
/// `<session>/exports/`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxExporter;

impl XlsxExporter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResultExporter for XlsxExporter {
    async fn export(
        &self,
        rows: &[Row],
        statement_index: usize,
        backend_name: &str,
        session_folder: &Path,
    ) -> Result<PathBuf> {
        let exports_dir = session_folder.join(EXPORTS_DIR);
        tokio::fs::create_dir_all(&exports_dir).await.map_err(|e| {
            HubError::export(format!(
                "Failed to create {}: {e}",
                exports_dir.display()
            ))
        })?;

        let path = exports_dir.join(export_file_name(backend_name, statement_index, "xlsx"));
        let buffer = build_workbook(rows)?;
        tokio::fs::write(&path, buffer)
            .await
            .map_err(|e| HubError::export(format!("Failed to write {}: {e}", path.display())))?;

        debug!(path = %path.display(), rows = rows.len(), "wrote spreadsheet");
        Ok(path)
    }
}

/// Builds an xlsx workbook for `rows` and returns the file bytes.
///
/// The header row is the union of column names in first-seen order. A row
/// missing a column leaves that cell empty, as does SQL NULL.
pub fn build_workbook(rows: &[Row]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME).map_err(xlsx_error)?;

    let headers: IndexSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    for (col, header) in headers.iter().enumerate() {
        sheet
            .write_string(0, column_index(col)?, *header)
            .map_err(xlsx_error)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let excel_row = row_index(index + 1)?;
        for (col, header) in headers.iter().enumerate() {
            if let Some(value) = row.get(*header) {
                write_cell(sheet, excel_row, column_index(col)?, value)?;
            }
        }
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<()> {
    let written = match value {
        Value::Null => return Ok(()),
        Value::Bool(b) => sheet.write_boolean(row, col, *b),
        Value::Int(i) if i.unsigned_abs() <= MAX_EXACT_INTEGER as u64 => {
            sheet.write_number(row, col, *i as f64)
        }
        Value::Float(f) if f.is_finite() => sheet.write_number(row, col, *f),
        Value::Bytes(bytes) => sheet.write_string(row, col, &fit_cell(hex(bytes), row, col)),
        other => sheet.write_string(row, col, &fit_cell(other.to_display_string(), row, col)),
    };
    written.map(|_| ()).map_err(xlsx_error)
}

/// Cuts `text` down to what one cell can hold.
fn fit_cell(mut text: String, row: u32, col: u16) -> String {
    if let Some((cut, _)) = text.char_indices().nth(MAX_CELL_CHARS) {
        warn!(row, col, "truncating cell value to {MAX_CELL_CHARS} characters");
        text.truncate(cut);
    }
    text
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn row_index(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| HubError::export("Too many rows for a spreadsheet"))
}

fn column_index(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| HubError::export("Too many columns for a spreadsheet"))
}

fn xlsx_error(error: rust_xlsxwriter::XlsxError) -> HubError {
    HubError::export(format!("Failed to build spreadsheet: {error}"))
}
