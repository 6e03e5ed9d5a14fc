//! Spreadsheet export of fetched rows
//!
//! Any `Serialize` row type is flattened to a JSON object per row. The first
//! sheet row holds the headers in a single bold, filled, centred style; data
//! starts on row 2. Writing happens on the blocking pool.

use crate::config::ExportConfig;
use crate::error::{Error, Result};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

type Row = Map<String, Value>;

const HEADER_FILL: u32 = 0x3c98f2;
const HEADER_FONT_SIZE: f64 = 10.0;

/// Writes row sets to `.xlsx` files
#[derive(Clone, Debug)]
pub struct SheetWriter {
    config: ExportConfig,
}

impl SheetWriter {
    /// Create a writer with the given export settings
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Configured output file
    pub fn default_path(&self) -> &Path {
        &self.config.path
    }

    /// Write `rows` to `path`, replacing any existing file
    ///
    /// Returns `Ok(false)` without touching the file system when `rows` is empty.
    pub async fn write<T: Serialize>(&self, rows: &[T], path: &Path) -> Result<bool> {
        if rows.is_empty() {
            tracing::debug!(path = %path.display(), "No rows to export, skipping spreadsheet");
            return Ok(false);
        }

        let rows = to_rows(rows)?;
        let headers = resolve_headers(&self.config.headers, &rows);
        let config = self.config.clone();
        let path: PathBuf = path.to_path_buf();

        let row_count = rows.len();
        let written = path.clone();
        tokio::task::spawn_blocking(move || write_workbook(&config, &headers, &rows, &path))
            .await
            .map_err(|e| Error::Other(format!("spreadsheet task failed: {}", e)))??;

        tracing::info!(path = %written.display(), rows = row_count, "Spreadsheet written");
        Ok(true)
    }
}

fn to_rows<T: Serialize>(rows: &[T]) -> Result<Vec<Row>> {
    rows.iter()
        .map(|row| match serde_json::to_value(row)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Spreadsheet(format!(
                "rows must serialize to objects, got {}",
                json_kind(&other)
            ))),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Configured headers, or the keys of the first row when none are configured
fn resolve_headers(configured: &[String], rows: &[Row]) -> Vec<String> {
    if !configured.is_empty() {
        return configured.to_vec();
    }
    rows.first()
        .map(|first| first.keys().cloned().collect())
        .unwrap_or_default()
}

/// Spreadsheet column name for a zero-based index (`0 -> A`, `26 -> AA`)
pub fn column_name(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_size(HEADER_FONT_SIZE)
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::Black)
}

fn write_workbook(config: &ExportConfig, headers: &[String], rows: &[Row], path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed existing spreadsheet"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(&config.sheet_name)?;

    let style = header_format();
    for (col, header) in headers.iter().enumerate() {
        let col = column_index(col)?;
        sheet.write_string_with_format(0, col, header.as_str(), &style)?;
        sheet.set_column_width(col, config.column_width)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let sheet_row = u32::try_from(i + 1)
            .map_err(|_| Error::Spreadsheet(format!("too many rows: {}", rows.len())))?;
        for (col, header) in headers.iter().enumerate() {
            let col = column_index(col)?;
            match row.get(header) {
                None | Some(Value::Null) => {}
                Some(Value::Bool(b)) => {
                    sheet.write_boolean(sheet_row, col, *b)?;
                }
                Some(Value::Number(n)) => match n.as_f64() {
                    Some(f) => {
                        sheet.write_number(sheet_row, col, f)?;
                    }
                    None => {
                        sheet.write_string(sheet_row, col, n.to_string())?;
                    }
                },
                Some(Value::String(s)) => {
                    sheet.write_string(sheet_row, col, s.as_str())?;
                }
                Some(nested) => {
                    sheet.write_string(sheet_row, col, nested.to_string())?;
                }
            }
        }
    }

    tracing::debug!(
        sheet = %config.sheet_name,
        range = %format!("A1:{}{}", column_name(headers.len().saturating_sub(1)), rows.len() + 1),
        "Populated worksheet"
    );

    workbook.save(path)?;
    Ok(())
}

fn column_index(col: usize) -> Result<u16> {
    u16::try_from(col).map_err(|_| Error::Spreadsheet(format!("too many columns: {}", col + 1)))
}
