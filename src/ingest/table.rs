use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::ingest::RowIssue;

/// Header-keyed view over one sheet row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// 1-based line of the record in the source text
    pub line: usize,
    /// (normalized header, trimmed value) in column order
    pub fields: Vec<(String, String)>,
}

impl Row {
    pub fn new(line: usize, fields: Vec<(String, String)>) -> Self {
        Self { line, fields }
    }

    /// Value of the column whose normalized header equals `name`, if non-empty.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = normalize_header(name);
        self.fields
            .iter()
            .find(|(header, _)| *header == name)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, value)| value.is_empty())
    }
}

/// Parsed sheet: header row plus data rows
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub issues: Vec<RowIssue>,
}

/// Lower-case, trim, drop a leading BOM and collapse inner whitespace.
pub fn normalize_header(name: &str) -> String {
    name.trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn reader(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes())
}

fn record_line(record: &StringRecord, fallback: usize) -> usize {
    record
        .position()
        .map(|pos| pos.line() as usize)
        .unwrap_or(fallback)
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

/// Parse CSV text whose first non-blank record is the header.
///
/// Rows shorter than the header are padded with empty values and extra
/// trailing values are ignored. Records the reader cannot decode are
/// reported as issues and skipped.
pub fn parse_table(text: &str) -> Result<Table, SyncError> {
    let mut table = Table::default();
    let mut header_seen = false;

    for (idx, result) in reader(text).records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line() as usize).unwrap_or(idx + 1);
                warn!("Skipping unreadable CSV record at line {}: {}", line, e);
                table.issues.push(RowIssue::new(line, format!("CSV parse error: {e}")));
                continue;
            }
        };

        if is_blank(&record) {
            continue;
        }

        if !header_seen {
            table.headers = record
                .iter()
                .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
                .collect();
            header_seen = true;
            continue;
        }

        let line = record_line(&record, idx + 1);
        let fields = table
            .headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = record.get(i).unwrap_or("").trim().to_string();
                (normalize_header(header), value)
            })
            .collect();
        table.rows.push(Row::new(line, fields));
    }

    if !header_seen {
        return Err(SyncError::EmptySheet);
    }

    debug!(
        "Parsed {} rows, columns: {:?}",
        table.rows.len(),
        table.headers
    );
    Ok(table)
}

/// Parse CSV text into positional records, skipping blank lines.
///
/// Lines made only of separators are kept: fixed-layout sheets count them.
pub fn parse_records(text: &str) -> Result<Vec<Vec<String>>, SyncError> {
    let mut records = Vec::new();
    for result in reader(text).records() {
        let record = result?;
        if record.len() <= 1 && is_blank(&record) {
            continue;
        }
        records.push(record.iter().map(|f| f.trim().to_string()).collect());
    }
    Ok(records)
}
