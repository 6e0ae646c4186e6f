//! Spreadsheet export of an inventory.
//!
//! The workbook has a single `Videos` sheet: one header row, then one row per record in
//! inventory order. Absent values are left as empty cells, `duration_seconds` is written as a
//! number, and the `note` field is not exported.

use crate::record::VideoRecord;
use eyre::Context;
use rust_xlsxwriter::{Workbook, XlsxError};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const SHEET_NAME: &str = "Videos";

pub const COLUMNS: [&str; 7] = [
    "id",
    "title",
    "publishedAt",
    "duration",
    "duration_seconds",
    "type",
    "privacy",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Cell::Empty,
            Some(Value::String(s)) => Cell::Text(s.clone()),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(n) => Cell::Number(n),
                None => Cell::Text(n.to_string()),
            },
            Some(other) => Cell::Text(other.to_string()),
        }
    }
}

pub type Row = Vec<Cell>;

/// Turns an inventory JSON document into spreadsheet rows (without the header).
///
/// The document has to be an array of video objects; anything else is rejected.
pub fn rows_from_json(json: &str) -> eyre::Result<Vec<Row>> {
    let data: Value = serde_json::from_str(json).context("parse inventory JSON")?;
    rows_from_value(data)
}

pub fn rows_from_records(records: &[VideoRecord]) -> eyre::Result<Vec<Row>> {
    let data = serde_json::to_value(records).context("serialize video records")?;
    rows_from_value(data)
}

fn rows_from_value(data: Value) -> eyre::Result<Vec<Row>> {
    let Value::Array(videos) = data else {
        eyre::bail!("inventory JSON must be an array of videos");
    };
    Ok(videos
        .iter()
        .map(|video| {
            COLUMNS
                .iter()
                .map(|column| Cell::from_json(video.get(*column)))
                .collect()
        })
        .collect())
}

/// Lays out the header and `rows` on a fresh `Videos` sheet.
pub fn build_workbook(rows: &[Row]) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in (0u16..).zip(COLUMNS) {
        worksheet.write_string(0, col, header)?;
    }
    for (row, cells) in (1u32..).zip(rows) {
        for (col, cell) in (0u16..).zip(cells) {
            match cell {
                Cell::Empty => {}
                Cell::Text(text) => {
                    worksheet.write_string(row, col, text.as_str())?;
                }
                Cell::Number(n) => {
                    worksheet.write_number(row, col, *n)?;
                }
            }
        }
    }
    Ok(workbook)
}

/// Writes `rows` as an `.xlsx` file at `path`, creating parent directories as needed.
pub fn write_workbook(path: &Path, rows: &[Row]) -> eyre::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output directory {}", parent.display()))?;
    }
    let mut workbook = build_workbook(rows).context("lay out workbook")?;
    workbook
        .save(path)
        .with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "wrote spreadsheet");
    Ok(())
}

/// Converts an inventory JSON file into a spreadsheet. Returns the number of video rows.
pub async fn export_file(input: &Path, output: &Path) -> eyre::Result<usize> {
    let json = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("read {}", input.display()))?;
    let rows = rows_from_json(&json).with_context(|| format!("convert {}", input.display()))?;
    save_in_background(output.to_path_buf(), rows).await
}

/// Writes an in-memory inventory as a spreadsheet.
pub async fn export_records(output: &Path, records: &[VideoRecord]) -> eyre::Result<usize> {
    let rows = rows_from_records(records)?;
    save_in_background(output.to_path_buf(), rows).await
}

async fn save_in_background(output: PathBuf, rows: Vec<Row>) -> eyre::Result<usize> {
    tokio::task::spawn_blocking(move || -> eyre::Result<usize> {
        write_workbook(&output, &rows)?;
        Ok(rows.len())
    })
    .await
    .context("spreadsheet writer task")?
}
