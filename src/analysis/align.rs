//! Timestamp alignment of sensor series.
//!
//! One driving series defines the candidate rows; joined series contribute
//! a slot each. Inner joins keep only timestamps present in every series,
//! left joins keep every driving timestamp and leave absent slots empty.
//! Output is always in ascending timestamp order.
//!
//! Duplicate timestamps inside a series are an error unless a collapse
//! policy is configured. Indexes are read-only after construction, so one
//! driving index can be shared by several alignments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{AnalysisError, ChannelId, MinuteStamp, MonthBucket, SensorReading, SensorSeries};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    /// Timestamp must exist in the driving series and every joined series.
    #[default]
    Inner,
    /// Every driving timestamp; joined slots may be absent.
    Left,
}

/// What to do when one series repeats a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    FirstWins,
    LastWins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlignOptions {
    pub join: JoinMode,
    pub duplicates: DuplicatePolicy,
}

// ---------------------------------------------------------------------------
// Timestamp index
// ---------------------------------------------------------------------------

/// Timestamp to reading lookup for one series.
#[derive(Debug, Clone)]
pub struct TimestampIndex<'a> {
    series: &'a SensorSeries,
    positions: BTreeMap<MinuteStamp, usize>,
}

impl<'a> TimestampIndex<'a> {
    pub fn build(series: &'a SensorSeries, policy: DuplicatePolicy) -> Result<Self, AnalysisError> {
        let mut positions = BTreeMap::new();
        for (pos, reading) in series.iter().enumerate() {
            match positions.get(&reading.timestamp) {
                None => {
                    positions.insert(reading.timestamp, pos);
                }
                Some(_) => match policy {
                    DuplicatePolicy::Reject => {
                        return Err(AnalysisError::DuplicateTimestamp {
                            channel: series.channel().to_string(),
                            timestamp: reading.timestamp,
                        });
                    }
                    DuplicatePolicy::FirstWins => {}
                    DuplicatePolicy::LastWins => {
                        positions.insert(reading.timestamp, pos);
                    }
                },
            }
        }
        Ok(TimestampIndex { series, positions })
    }

    pub fn channel(&self) -> &'a ChannelId {
        self.series.channel()
    }

    pub fn get(&self, timestamp: &MinuteStamp) -> Option<&'a SensorReading> {
        let series = self.series;
        self.positions
            .get(timestamp)
            .and_then(|&pos| series.readings().get(pos))
    }

    pub fn contains(&self, timestamp: &MinuteStamp) -> bool {
        self.positions.contains_key(timestamp)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Distinct timestamps in ascending order.
    pub fn timestamps(&self) -> impl Iterator<Item = MinuteStamp> + '_ {
        self.positions.keys().copied()
    }
}

// ---------------------------------------------------------------------------
// Aligned output
// ---------------------------------------------------------------------------

/// One output row: slot 0 is the driving channel, then each joined channel
/// in the order given. `None` marks a channel with no reading here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedRecord<'a> {
    pub timestamp: MinuteStamp,
    pub month: MonthBucket,
    pub slots: Vec<Option<&'a SensorReading>>,
}

impl<'a> AlignedRecord<'a> {
    pub fn reading(&self, position: usize) -> Option<&'a SensorReading> {
        self.slots.get(position).copied().flatten()
    }

    pub fn numeric(&self, position: usize) -> Option<f64> {
        self.reading(position).and_then(|r| r.value.as_f64())
    }
}

/// Rows produced by one alignment request. Borrows the series it was built
/// from and cannot outlive them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedTable<'a> {
    channels: Vec<ChannelId>,
    records: Vec<AlignedRecord<'a>>,
}

impl<'a> AlignedTable<'a> {
    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn records(&self) -> &[AlignedRecord<'a>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Slot position of `channel`.
    pub fn position(&self, channel: &ChannelId) -> Result<usize, AnalysisError> {
        self.channels
            .iter()
            .position(|c| c == channel)
            .ok_or_else(|| AnalysisError::MissingChannel {
                channel: channel.to_string(),
                context: "aligned table".to_string(),
            })
    }

    pub fn timestamps(&self) -> Vec<MinuteStamp> {
        self.records.iter().map(|r| r.timestamp).collect()
    }
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Aligns `joined` series against `driving`.
pub fn align<'a>(
    driving: &'a SensorSeries,
    joined: &[&'a SensorSeries],
    options: AlignOptions,
) -> Result<AlignedTable<'a>, AnalysisError> {
    let driving_index = TimestampIndex::build(driving, options.duplicates)?;
    let joined_indexes = joined
        .iter()
        .map(|s| TimestampIndex::build(s, options.duplicates))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(align_indexed(&driving_index, &joined_indexes, options.join))
}

/// Aligns prebuilt indexes. Lets a caller build the driving index once and
/// reuse it for several joined sets.
pub fn align_indexed<'a>(
    driving: &TimestampIndex<'a>,
    joined: &[TimestampIndex<'a>],
    join: JoinMode,
) -> AlignedTable<'a> {
    let mut channels = Vec::with_capacity(joined.len() + 1);
    channels.push(driving.channel().clone());
    channels.extend(joined.iter().map(|idx| idx.channel().clone()));

    let records = driving
        .timestamps()
        .filter_map(|ts| {
            let mut slots = Vec::with_capacity(joined.len() + 1);
            slots.push(driving.get(&ts));
            for idx in joined {
                let reading = idx.get(&ts);
                if reading.is_none() && join == JoinMode::Inner {
                    return None;
                }
                slots.push(reading);
            }
            Some(AlignedRecord {
                timestamp: ts,
                month: ts.month(),
                slots,
            })
        })
        .collect();

    AlignedTable { channels, records }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReadingValue;
    use chrono::NaiveDate;

    fn ts(minute: u32) -> MinuteStamp {
        MinuteStamp::from_naive(
            NaiveDate::from_ymd_opt(2015, 9, 1)
                .unwrap()
                .and_hms_opt(0, minute, 0)
                .unwrap(),
        )
    }

    fn series(id: &str, points: &[(u32, f64)]) -> SensorSeries {
        SensorSeries::new(
            ChannelId::new(id),
            points
                .iter()
                .map(|&(m, v)| SensorReading::new(ts(m), ReadingValue::Numeric(v)))
                .collect(),
        )
    }

    #[test]
    fn test_inner_join_keeps_intersection() {
        let driving = series("lidar", &[(10, 1.0), (20, 2.0), (30, 3.0)]);
        let joined = series("temp", &[(20, -1.0), (30, -2.0), (40, -3.0)]);

        let table = align(&driving, &[&joined], AlignOptions::default()).unwrap();
        assert_eq!(table.timestamps(), vec![ts(20), ts(30)]);
        assert_eq!(table.records()[0].numeric(1), Some(-1.0));
    }

    #[test]
    fn test_left_join_keeps_driving_timestamps() {
        let driving = series("lidar", &[(10, 1.0), (20, 2.0), (30, 3.0)]);
        let joined = series("temp", &[(20, -1.0), (30, -2.0), (40, -3.0)]);
        let options = AlignOptions {
            join: JoinMode::Left,
            ..AlignOptions::default()
        };

        let table = align(&driving, &[&joined], options).unwrap();
        assert_eq!(table.timestamps(), vec![ts(10), ts(20), ts(30)]);
        assert!(table.records()[0].reading(1).is_none(), "t1 has no joined reading");
    }

    #[test]
    fn test_output_is_sorted_regardless_of_input_order() {
        let driving = series("lidar", &[(30, 3.0), (10, 1.0), (20, 2.0)]);
        let joined = series("temp", &[(20, 0.0), (10, 0.0), (30, 0.0)]);
        let table = align(&driving, &[&joined], AlignOptions::default()).unwrap();
        assert_eq!(table.timestamps(), vec![ts(10), ts(20), ts(30)]);
    }

    #[test]
    fn test_duplicate_timestamp_fails_by_default() {
        let driving = series("lidar", &[(10, 1.0), (20, 2.0)]);
        let joined = series("temp", &[(10, 5.0), (10, 6.0)]);
        let result = align(&driving, &[&joined], AlignOptions::default());
        assert_eq!(
            result.unwrap_err(),
            AnalysisError::DuplicateTimestamp {
                channel: "temp".into(),
                timestamp: ts(10),
            }
        );
    }

    #[test]
    fn test_duplicate_policies_pick_explicit_row() {
        let driving = series("lidar", &[(10, 1.0)]);
        let joined = series("temp", &[(10, 5.0), (10, 6.0)]);

        let first = AlignOptions {
            duplicates: DuplicatePolicy::FirstWins,
            ..AlignOptions::default()
        };
        let last = AlignOptions {
            duplicates: DuplicatePolicy::LastWins,
            ..AlignOptions::default()
        };
        assert_eq!(align(&driving, &[&joined], first).unwrap().records()[0].numeric(1), Some(5.0));
        assert_eq!(align(&driving, &[&joined], last).unwrap().records()[0].numeric(1), Some(6.0));
    }

    #[test]
    fn test_multiple_joined_series_intersect() {
        let driving = series("temp", &[(10, 1.0), (20, 2.0), (30, 3.0)]);
        let humidity = series("rh", &[(10, 95.0), (20, 96.0)]);
        let pressure = series("baro", &[(20, 970.0), (30, 971.0)]);
        let table = align(&driving, &[&humidity, &pressure], AlignOptions::default()).unwrap();

        assert_eq!(table.timestamps(), vec![ts(20)]);
        assert_eq!(table.position(&ChannelId::new("baro")).unwrap(), 2);
    }

    #[test]
    fn test_unknown_channel_position_is_missing_channel() {
        let driving = series("temp", &[(10, 1.0)]);
        let table = align(&driving, &[], AlignOptions::default()).unwrap();
        assert!(matches!(
            table.position(&ChannelId::new("rh")),
            Err(AnalysisError::MissingChannel { .. })
        ));
    }

    #[test]
    fn test_shared_driving_index_serves_several_alignments() {
        let driving = series("lidar", &[(10, 1.0), (20, 2.0)]);
        let mmv1 = series("mmv1_temp", &[(10, 4.0)]);
        let mmv2 = series("mmv2_temp", &[(20, 7.0)]);
        let index = TimestampIndex::build(&driving, DuplicatePolicy::Reject).unwrap();

        let a = align_indexed(&index, &[TimestampIndex::build(&mmv1, DuplicatePolicy::Reject).unwrap()], JoinMode::Inner);
        let b = align_indexed(&index, &[TimestampIndex::build(&mmv2, DuplicatePolicy::Reject).unwrap()], JoinMode::Inner);
        assert_eq!(a.timestamps(), vec![ts(10)]);
        assert_eq!(b.timestamps(), vec![ts(20)]);
    }

    #[test]
    fn test_empty_driving_series_yields_empty_table() {
        let driving = series("lidar", &[]);
        let joined = series("temp", &[(10, 1.0)]);
        let table = align(&driving, &[&joined], AlignOptions::default()).unwrap();
        assert!(table.is_empty());
    }
}
