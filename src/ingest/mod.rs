/// Row ingestion: tabular string records to `SensorSeries`.
///
/// File discovery and file formats belong to the caller; this layer takes
/// a header plus string rows (as read from a QC export or a lidar export)
/// and applies timestamp normalization and missing-value handling.
///
/// Submodules:
/// - `mast`: met-mast QC exports (`Timestamp`, `Moyenne`, R-codes, event flag).
/// - `lidar`: lidar exports (one value column per quantity and height).

pub mod lidar;
pub mod mast;

use crate::model::{AnalysisError, ChannelId, ReadingValue, SensorSeries};

// ---------------------------------------------------------------------------
// Raw tables
// ---------------------------------------------------------------------------

/// A header and its string records, as handed over by a loader.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        RawTable { columns, rows }
    }

    /// Convenience constructor from string slices.
    pub fn from_rows(columns: &[&str], rows: &[&[&str]]) -> Self {
        RawTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.trim() == name)
    }

    /// Index of `name`, or `MissingChannel` naming the channel that needed it.
    pub fn require_column(&self, name: &str, channel: &ChannelId) -> Result<usize, AnalysisError> {
        self.column_index(name).ok_or_else(|| AnalysisError::MissingChannel {
            channel: channel.to_string(),
            context: format!("table columns (no '{}')", name),
        })
    }
}

/// Cell `idx` of `row`; short rows read as empty cells.
pub(crate) fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.as_str()).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Ingest results
// ---------------------------------------------------------------------------

/// A parsed series plus the number of rows dropped for unparseable timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub series: SensorSeries,
    pub dropped_rows: usize,
}

// ---------------------------------------------------------------------------
// Field parsing
// ---------------------------------------------------------------------------

/// Parses a value cell.
///
/// Configured sentinels, empty cells and non-finite numbers become
/// `ReadingValue::Missing`; non-numeric text is kept as categorical.
pub fn parse_value(raw: &str, sentinels: &[String]) -> ReadingValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() || sentinels.iter().any(|s| s == trimmed) {
        return ReadingValue::Missing;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => ReadingValue::Numeric(v),
        Ok(_) => ReadingValue::Missing,
        Err(_) => ReadingValue::Categorical(trimmed.to_string()),
    }
}

/// Parses a 0/1 indicator cell. Anything else reads as "not reported".
pub fn parse_indicator(raw: &str) -> Option<u8> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v == 1.0 => Some(1),
        Ok(v) if v == 0.0 => Some(0),
        _ => None,
    }
}
