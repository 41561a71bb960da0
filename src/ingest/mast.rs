//! Met-mast QC export ingestion.
//!
//! A QC export row carries the logger timestamp (`"01-Sep-2015 00:10..."`),
//! the interval mean (`Moyenne`), and one 0/1 column per QC code plus the
//! independent event column. Indicator columns the export does not carry
//! are simply not captured; the QC filter treats them as "not raised".

use serde::{Deserialize, Serialize};

use super::{IngestOutcome, RawTable, cell, parse_indicator, parse_value};
use crate::logging::{self, Source};
use crate::model::{AnalysisError, ChannelId, SensorReading, SensorSeries};
use crate::timestamps;

/// Column names of a QC export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MastColumns {
    pub timestamp: String,
    pub value: String,
}

impl Default for MastColumns {
    fn default() -> Self {
        MastColumns {
            timestamp: "Timestamp".to_string(),
            value: "Moyenne".to_string(),
        }
    }
}

/// Builds the series for one mast sensor.
///
/// `indicator_codes` lists the flag columns to capture (reject codes and
/// the event column). Rows whose timestamp cannot be parsed are dropped
/// and counted; a missing timestamp or value column fails the channel.
pub fn ingest_mast_table(
    table: &RawTable,
    channel: &ChannelId,
    columns: &MastColumns,
    indicator_codes: &[String],
    sentinels: &[String],
) -> Result<IngestOutcome, AnalysisError> {
    let ts_idx = table.require_column(&columns.timestamp, channel)?;
    let value_idx = table.require_column(&columns.value, channel)?;

    let mut present = Vec::with_capacity(indicator_codes.len());
    for code in indicator_codes {
        match table.column_index(code) {
            Some(idx) => present.push((code.as_str(), idx)),
            None => logging::debug(
                Source::MetMast,
                Some(channel.as_str()),
                &format!("no '{}' column, treated as never raised", code),
            ),
        }
    }

    let mut readings = Vec::with_capacity(table.len());
    let mut dropped_rows = 0;

    for row in table.rows() {
        let raw_ts = cell(row, ts_idx);
        let timestamp = match timestamps::normalize(raw_ts) {
            Ok(ts) => ts,
            Err(e) => {
                logging::debug(Source::MetMast, Some(channel.as_str()), &e.to_string());
                dropped_rows += 1;
                continue;
            }
        };

        let mut reading = SensorReading::new(timestamp, parse_value(cell(row, value_idx), sentinels));
        for (code, idx) in &present {
            if let Some(flag) = parse_indicator(cell(row, *idx)) {
                reading.indicators.insert((*code).to_string(), flag);
            }
        }
        readings.push(reading);
    }

    Ok(IngestOutcome {
        series: SensorSeries::new(channel.clone(), readings),
        dropped_rows,
    })
}
