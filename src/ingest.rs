use std::io::Read;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::error::UploadError;
use crate::models::RawActivityRow;
use crate::schema::PointSchema;

const MAX_REPORTED_HEADERS: usize = 10;

/// A decoded sheet: the header row plus every non-blank data row.
#[derive(Debug, Clone, Default)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
}

#[derive(Debug, Clone)]
pub struct SheetRow {
    pub line: usize,
    pub cells: Vec<String>,
}

impl SheetRow {
    fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(|c| c.trim()).unwrap_or("")
    }
}

pub fn read_sheet(path: &Path) -> anyhow::Result<SheetTable> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    parse_sheet(file).with_context(|| format!("failed to decode {}", path.display()))
}

pub fn parse_sheet<R: Read>(input: R) -> anyhow::Result<SheetTable> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        rows.push(SheetRow {
            line,
            cells: record.iter().map(str::to_string).collect(),
        });
    }

    debug!(rows = rows.len(), "decoded sheet");
    Ok(SheetTable { headers, rows })
}

/// Positions of the four identity columns; `None` when a header is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityColumns {
    pub student_name: Option<usize>,
    pub house: Option<usize>,
    pub campus: Option<usize>,
    pub email: Option<usize>,
}

/// Resolved positions for every column the scorer reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub student_name: usize,
    pub house: usize,
    pub campus: usize,
    pub email: usize,
    /// Parallel to `PointSchema::categories`.
    pub categories: Vec<usize>,
}

fn find_header(headers: &[String], target: &str) -> Option<usize> {
    let target = target.trim();
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(target))
}

pub fn detect_columns(headers: &[String], schema: &PointSchema) -> IdentityColumns {
    IdentityColumns {
        student_name: find_header(headers, &schema.identity.student_name),
        house: find_header(headers, &schema.identity.house),
        campus: find_header(headers, &schema.identity.campus),
        email: find_header(headers, &schema.identity.email),
    }
}

/// Checks that every required header exists and resolves the layout.
///
/// Fails with at most the first ten missing header names, identity
/// headers first.
pub fn resolve_columns(
    headers: &[String],
    schema: &PointSchema,
) -> Result<ColumnLayout, UploadError> {
    let missing: Vec<String> = schema
        .required_headers()
        .into_iter()
        .filter(|header| find_header(headers, header).is_none())
        .take(MAX_REPORTED_HEADERS)
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(UploadError::MissingHeaders(missing));
    }

    let identity = detect_columns(headers, schema);
    let categories = schema
        .categories
        .iter()
        .filter_map(|c| find_header(headers, &c.header))
        .collect();

    match identity {
        IdentityColumns {
            student_name: Some(student_name),
            house: Some(house),
            campus: Some(campus),
            email: Some(email),
        } => Ok(ColumnLayout {
            student_name,
            house,
            campus,
            email,
            categories,
        }),
        _ => Err(UploadError::MissingHeaders(
            schema
                .identity_headers()
                .iter()
                .map(|h| h.to_string())
                .collect(),
        )),
    }
}

/// Cell value as points; blank or non-numeric cells count as zero.
pub fn parse_points(cell: &str) -> f64 {
    match cell.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

pub fn activity_rows(table: &SheetTable, layout: &ColumnLayout) -> Vec<RawActivityRow> {
    table
        .rows
        .iter()
        .map(|row| RawActivityRow {
            line: row.line,
            student_name: row.cell(layout.student_name).to_string(),
            email: row.cell(layout.email).to_string(),
            house: row.cell(layout.house).to_string(),
            campus: row.cell(layout.campus).to_string(),
            points: layout
                .categories
                .iter()
                .map(|&index| parse_points(row.cell(index)))
                .collect(),
        })
        .collect()
}
