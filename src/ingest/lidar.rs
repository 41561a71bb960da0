//! Lidar export ingestion.
//!
//! One export row holds every quantity at every height for one interval,
//! so a single table yields several channels. Timestamps are parsed once
//! per table and shared by every channel built from it.

use super::{IngestOutcome, RawTable, cell, parse_value};
use crate::channels::ChannelDescriptor;
use crate::logging::{self, Source};
use crate::model::{AnalysisError, MinuteStamp, SensorReading, SensorSeries};
use crate::timestamps;

/// Default timestamp column of the lidar export.
pub const LIDAR_TIMESTAMP_COLUMN: &str = "TimeStamp";

/// Builds one series per descriptor from a lidar export.
///
/// Fails with `MissingChannel` if the timestamp column or any requested
/// quantity column is absent. Rows with malformed timestamps are dropped
/// from every channel and counted on each outcome.
pub fn ingest_lidar_channels(
    table: &RawTable,
    timestamp_column: &str,
    descriptors: &[ChannelDescriptor],
    sentinels: &[String],
) -> Result<Vec<IngestOutcome>, AnalysisError> {
    let mut value_columns = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let name = descriptor
            .kind
            .lidar_column(descriptor.height_m)
            .ok_or_else(|| AnalysisError::MissingChannel {
                channel: descriptor.id.to_string(),
                context: "lidar export layout".to_string(),
            })?;
        value_columns.push(table.require_column(&name, &descriptor.id)?);
    }

    let ts_idx = match descriptors.first() {
        Some(first) => table.require_column(timestamp_column, &first.id)?,
        None => return Ok(Vec::new()),
    };

    let stamps: Vec<Option<MinuteStamp>> = table
        .rows()
        .iter()
        .map(|row| match timestamps::normalize(cell(row, ts_idx)) {
            Ok(ts) => Some(ts),
            Err(e) => {
                logging::debug(Source::Lidar, None, &e.to_string());
                None
            }
        })
        .collect();
    let dropped_rows = stamps.iter().filter(|s| s.is_none()).count();

    let outcomes = descriptors
        .iter()
        .zip(value_columns)
        .map(|(descriptor, value_idx)| {
            let readings = table
                .rows()
                .iter()
                .zip(&stamps)
                .filter_map(|(row, stamp)| {
                    stamp.map(|ts| SensorReading::new(ts, parse_value(cell(row, value_idx), sentinels)))
                })
                .collect();
            IngestOutcome {
                series: SensorSeries::new(descriptor.id.clone(), readings),
                dropped_rows,
            }
        })
        .collect();

    Ok(outcomes)
}

/// Single-channel form of `ingest_lidar_channels`.
pub fn ingest_lidar_column(
    table: &RawTable,
    timestamp_column: &str,
    descriptor: &ChannelDescriptor,
    sentinels: &[String],
) -> Result<IngestOutcome, AnalysisError> {
    let mut outcomes =
        ingest_lidar_channels(table, timestamp_column, std::slice::from_ref(descriptor), sentinels)?;
    outcomes
        .pop()
        .ok_or_else(|| AnalysisError::EmptyInput(descriptor.id.to_string()))
}
