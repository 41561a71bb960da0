//! Composite threshold indicators versus a ground-truth event flag.
//!
//! A composite indicator is the logical AND of per-channel threshold
//! predicates (e.g. humidity > 90, -5 < temperature < 5, pressure < 980 as
//! an icing proxy). It is evaluated per aligned record and set next to an
//! independently measured event flag (`INFO01`, ice detected by double
//! anemometry) so the active periods of both can be inspected together.
//!
//! Nothing here computes a correlation coefficient: the outputs are the
//! per-record series, the active intervals of each signal, and a
//! co-occurrence tally.

use serde::{Deserialize, Serialize};

use super::align::AlignedTable;
use crate::model::{AnalysisError, ChannelId, MinuteStamp, MonthBucket};

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl Comparison {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::GreaterThan => value > threshold,
            Comparison::GreaterOrEqual => value >= threshold,
            Comparison::LessThan => value < threshold,
            Comparison::LessOrEqual => value <= threshold,
        }
    }
}

/// `channel <comparison> threshold`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdPredicate {
    pub channel: ChannelId,
    pub comparison: Comparison,
    pub threshold: f64,
}

impl ThresholdPredicate {
    pub fn new(channel: ChannelId, comparison: Comparison, threshold: f64) -> Self {
        ThresholdPredicate {
            channel,
            comparison,
            threshold,
        }
    }
}

/// Threshold values of the icing proxy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcingThresholds {
    pub humidity_above_pct: f64,
    pub temperature_above_c: f64,
    pub temperature_below_c: f64,
    pub pressure_below_hpa: f64,
}

impl Default for IcingThresholds {
    fn default() -> Self {
        IcingThresholds {
            humidity_above_pct: 90.0,
            temperature_above_c: -5.0,
            temperature_below_c: 5.0,
            pressure_below_hpa: 980.0,
        }
    }
}

/// Named AND of threshold predicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositePredicate {
    pub name: String,
    pub predicates: Vec<ThresholdPredicate>,
}

impl CompositePredicate {
    pub fn new(name: impl Into<String>, predicates: Vec<ThresholdPredicate>) -> Self {
        CompositePredicate {
            name: name.into(),
            predicates,
        }
    }

    /// Humid, near-freezing, low-pressure conditions.
    pub fn icing_proxy(
        humidity: &ChannelId,
        temperature: &ChannelId,
        pressure: &ChannelId,
        thresholds: &IcingThresholds,
    ) -> Self {
        CompositePredicate::new(
            "icing_proxy",
            vec![
                ThresholdPredicate::new(humidity.clone(), Comparison::GreaterThan, thresholds.humidity_above_pct),
                ThresholdPredicate::new(temperature.clone(), Comparison::GreaterThan, thresholds.temperature_above_c),
                ThresholdPredicate::new(temperature.clone(), Comparison::LessThan, thresholds.temperature_below_c),
                ThresholdPredicate::new(pressure.clone(), Comparison::LessThan, thresholds.pressure_below_hpa),
            ],
        )
    }

    /// Lidar data availability under `threshold_pct`.
    pub fn low_availability(availability: &ChannelId, threshold_pct: f64) -> Self {
        CompositePredicate::new(
            "low_availability",
            vec![ThresholdPredicate::new(
                availability.clone(),
                Comparison::LessThan,
                threshold_pct,
            )],
        )
    }
}

// ---------------------------------------------------------------------------
// Event flag
// ---------------------------------------------------------------------------

/// Where the ground-truth flag lives: an indicator column on one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSource {
    pub channel: ChannelId,
    pub indicator: String,
}

/// Ground-truth state at one record. `NotDetected` (flag is 0) and
/// `Missing` (no reading, or the row lacks the flag) are kept apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Detected,
    NotDetected,
    Missing,
}

impl EventState {
    pub fn from_flag(flag: Option<u8>) -> Self {
        match flag {
            Some(1) => EventState::Detected,
            Some(0) => EventState::NotDetected,
            _ => EventState::Missing,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Composite and event state at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorPoint {
    pub timestamp: MinuteStamp,
    pub month: MonthBucket,
    /// AND of all predicates. A predicate over a missing value is false.
    pub composite: bool,
    /// Whether every predicate channel had a numeric reading.
    pub inputs_complete: bool,
    pub event: EventState,
}

/// Evaluates `composite` and reads the event flag for every record.
///
/// Fails with `MissingChannel` when a predicate or the event channel is
/// not part of the table, or when a non-empty table never carries the
/// event indicator at all.
pub fn evaluate(
    table: &AlignedTable<'_>,
    composite: &CompositePredicate,
    event: &EventSource,
) -> Result<Vec<IndicatorPoint>, AnalysisError> {
    if composite.predicates.is_empty() {
        return Err(AnalysisError::EmptyPredicate(composite.name.clone()));
    }

    let positions = composite
        .predicates
        .iter()
        .map(|p| table.position(&p.channel))
        .collect::<Result<Vec<_>, _>>()?;
    let event_pos = table.position(&event.channel)?;

    let carries_flag = table.records().iter().any(|r| {
        r.reading(event_pos)
            .is_some_and(|reading| reading.indicator(&event.indicator).is_some())
    });
    if !table.is_empty() && !carries_flag {
        return Err(AnalysisError::MissingChannel {
            channel: event.channel.to_string(),
            context: format!("event indicator '{}'", event.indicator),
        });
    }

    let points = table
        .records()
        .iter()
        .map(|record| {
            let mut composite_active = true;
            let mut inputs_complete = true;
            for (predicate, &pos) in composite.predicates.iter().zip(&positions) {
                match record.numeric(pos) {
                    Some(v) => composite_active &= predicate.comparison.holds(v, predicate.threshold),
                    None => {
                        inputs_complete = false;
                        composite_active = false;
                    }
                }
            }
            let flag = record
                .reading(event_pos)
                .and_then(|r| r.indicator(&event.indicator));

            IndicatorPoint {
                timestamp: record.timestamp,
                month: record.month,
                composite: composite_active,
                inputs_complete,
                event: EventState::from_flag(flag),
            }
        })
        .collect();

    Ok(points)
}

/// A raw channel value next to the event state at the same timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueEventPoint {
    pub timestamp: MinuteStamp,
    pub month: MonthBucket,
    /// `None` when the channel had no numeric reading.
    pub value: Option<f64>,
    pub event: EventState,
}

/// Pairs `value_channel` with the event flag for every record of `table`.
///
/// Records lacking the flag are reported as `Missing`; unlike `evaluate`,
/// a table that never carries the flag is not an error here.
pub fn values_against_event(
    table: &AlignedTable<'_>,
    value_channel: &ChannelId,
    event: &EventSource,
) -> Result<Vec<ValueEventPoint>, AnalysisError> {
    let value_pos = table.position(value_channel)?;
    let event_pos = table.position(&event.channel)?;

    Ok(table
        .records()
        .iter()
        .map(|record| ValueEventPoint {
            timestamp: record.timestamp,
            month: record.month,
            value: record.numeric(value_pos),
            event: EventState::from_flag(
                record
                    .reading(event_pos)
                    .and_then(|r| r.indicator(&event.indicator)),
            ),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Inspection helpers
// ---------------------------------------------------------------------------

/// A maximal run of consecutive records where a signal is active.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interval {
    pub start: MinuteStamp,
    pub end: MinuteStamp,
    pub records: usize,
}

/// Runs of consecutive points for which `active` holds.
pub fn active_intervals<F>(points: &[IndicatorPoint], active: F) -> Vec<Interval>
where
    F: Fn(&IndicatorPoint) -> bool,
{
    let mut intervals = Vec::new();
    let mut current: Option<Interval> = None;

    for point in points {
        if active(point) {
            match current.as_mut() {
                Some(run) => {
                    run.end = point.timestamp;
                    run.records += 1;
                }
                None => {
                    current = Some(Interval {
                        start: point.timestamp,
                        end: point.timestamp,
                        records: 1,
                    })
                }
            }
        } else if let Some(run) = current.take() {
            intervals.push(run);
        }
    }
    intervals.extend(current);
    intervals
}

/// Record counts for each combination of composite and event state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoOccurrence {
    pub both: usize,
    pub composite_only: usize,
    pub event_only: usize,
    pub neither: usize,
    /// Records with no event reading; excluded from the four counts above.
    pub event_missing: usize,
}

pub fn co_occurrence(points: &[IndicatorPoint]) -> CoOccurrence {
    let mut tally = CoOccurrence::default();
    for point in points {
        match (point.composite, point.event) {
            (_, EventState::Missing) => tally.event_missing += 1,
            (true, EventState::Detected) => tally.both += 1,
            (true, EventState::NotDetected) => tally.composite_only += 1,
            (false, EventState::Detected) => tally.event_only += 1,
            (false, EventState::NotDetected) => tally.neither += 1,
        }
    }
    tally
}

/// Everything needed to inspect one composite against the event flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorReport {
    pub name: String,
    pub points: Vec<IndicatorPoint>,
    pub composite_intervals: Vec<Interval>,
    pub event_intervals: Vec<Interval>,
    pub summary: CoOccurrence,
}

pub fn inspect(
    table: &AlignedTable<'_>,
    composite: &CompositePredicate,
    event: &EventSource,
) -> Result<IndicatorReport, AnalysisError> {
    let points = evaluate(table, composite, event)?;
    Ok(IndicatorReport {
        name: composite.name.clone(),
        composite_intervals: active_intervals(&points, |p| p.composite),
        event_intervals: active_intervals(&points, |p| p.event == EventState::Detected),
        summary: co_occurrence(&points),
        points,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::align::{align, AlignOptions};
    use crate::model::{ReadingValue, SensorReading, SensorSeries};
    use chrono::NaiveDate;

    fn ts(minute: u32) -> MinuteStamp {
        MinuteStamp::from_naive(
            NaiveDate::from_ymd_opt(2015, 11, 20)
                .unwrap()
                .and_hms_opt(3, minute, 0)
                .unwrap(),
        )
    }

    fn plain(id: &str, values: &[Option<f64>]) -> SensorSeries {
        SensorSeries::new(
            ChannelId::new(id),
            values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let value = v.map(ReadingValue::Numeric).unwrap_or(ReadingValue::Missing);
                    SensorReading::new(ts(i as u32 * 10), value)
                })
                .collect(),
        )
    }

    fn with_event(id: &str, values: &[f64], flags: &[Option<u8>]) -> SensorSeries {
        SensorSeries::new(
            ChannelId::new(id),
            values
                .iter()
                .zip(flags)
                .enumerate()
                .map(|(i, (v, flag))| {
                    let r = SensorReading::new(ts(i as u32 * 10), ReadingValue::Numeric(*v));
                    match flag {
                        Some(f) => r.with_indicator("INFO01", *f),
                        None => r,
                    }
                })
                .collect(),
        )
    }

    fn event() -> EventSource {
        EventSource {
            channel: ChannelId::new("temp"),
            indicator: "INFO01".into(),
        }
    }

    fn icing() -> CompositePredicate {
        CompositePredicate::icing_proxy(
            &ChannelId::new("rh"),
            &ChannelId::new("temp"),
            &ChannelId::new("baro"),
            &IcingThresholds::default(),
        )
    }

    #[test]
    fn test_comparison_operators_are_strict_where_named() {
        assert!(Comparison::GreaterThan.holds(90.1, 90.0));
        assert!(!Comparison::GreaterThan.holds(90.0, 90.0));
        assert!(Comparison::GreaterOrEqual.holds(90.0, 90.0));
        assert!(!Comparison::LessThan.holds(980.0, 980.0));
        assert!(Comparison::LessOrEqual.holds(980.0, 980.0));
    }

    #[test]
    fn test_icing_composite_requires_all_conditions() {
        let temp = with_event("temp", &[0.0, 0.0, 6.0, -1.0], &[Some(1), Some(0), Some(0), None]);
        let rh = plain("rh", &[Some(95.0), Some(80.0), Some(95.0), Some(99.0)]);
        let baro = plain("baro", &[Some(970.0), Some(970.0), Some(970.0), None]);
        let table = align(&temp, &[&rh, &baro], AlignOptions::default()).unwrap();

        let points = evaluate(&table, &icing(), &event()).unwrap();
        let composite: Vec<bool> = points.iter().map(|p| p.composite).collect();
        assert_eq!(composite, vec![true, false, false, false]);
        assert!(!points[3].inputs_complete, "pressure is missing at the last record");
        assert_eq!(points[0].event, EventState::Detected);
        assert_eq!(points[1].event, EventState::NotDetected);
        assert_eq!(points[3].event, EventState::Missing, "no flag is not the same as flag = 0");
    }

    #[test]
    fn test_missing_event_column_is_structural_error() {
        let temp = with_event("temp", &[0.0, 1.0], &[None, None]);
        let rh = plain("rh", &[Some(95.0), Some(95.0)]);
        let baro = plain("baro", &[Some(970.0), Some(970.0)]);
        let table = align(&temp, &[&rh, &baro], AlignOptions::default()).unwrap();
        assert!(matches!(
            evaluate(&table, &icing(), &event()),
            Err(AnalysisError::MissingChannel { .. })
        ));
    }

    #[test]
    fn test_predicate_on_absent_channel_fails() {
        let temp = with_event("temp", &[0.0], &[Some(0)]);
        let table = align(&temp, &[], AlignOptions::default()).unwrap();
        assert!(matches!(
            evaluate(&table, &icing(), &event()),
            Err(AnalysisError::MissingChannel { .. })
        ));
    }

    #[test]
    fn test_empty_composite_is_rejected() {
        let temp = with_event("temp", &[0.0], &[Some(0)]);
        let table = align(&temp, &[], AlignOptions::default()).unwrap();
        let empty = CompositePredicate::new("nothing", Vec::new());
        assert_eq!(
            evaluate(&table, &empty, &event()).unwrap_err(),
            AnalysisError::EmptyPredicate("nothing".into())
        );
    }

    #[test]
    fn test_low_availability_single_channel_indicator() {
        let temp = with_event("temp", &[0.0, 0.0, 0.0], &[Some(1), Some(1), Some(0)]);
        let avail = plain("avail", &[Some(5.0), Some(20.0), Some(100.0)]);
        let table = align(&temp, &[&avail], AlignOptions::default()).unwrap();
        let predicate = CompositePredicate::low_availability(&ChannelId::new("avail"), 20.0);

        let report = inspect(&table, &predicate, &event()).unwrap();
        let composite: Vec<bool> = report.points.iter().map(|p| p.composite).collect();
        assert_eq!(composite, vec![true, false, false], "20% is not below 20%");
        assert_eq!(report.summary.both, 1);
        assert_eq!(report.summary.event_only, 1);
        assert_eq!(report.summary.neither, 1);
    }

    #[test]
    fn test_values_against_event_keeps_unmatched_rows() {
        use crate::analysis::align::{DuplicatePolicy, JoinMode};

        let wiper = plain("wiper", &[Some(3.0), None, Some(5.0)]);
        let temp = with_event("temp", &[0.0, 0.0], &[Some(1), Some(0)]);
        let table = align(
            &wiper,
            &[&temp],
            AlignOptions {
                join: JoinMode::Left,
                duplicates: DuplicatePolicy::Reject,
            },
        )
        .unwrap();

        let points = values_against_event(&table, &ChannelId::new("wiper"), &event()).unwrap();
        let pairs: Vec<(Option<f64>, EventState)> = points.iter().map(|p| (p.value, p.event)).collect();
        assert_eq!(
            pairs,
            vec![
                (Some(3.0), EventState::Detected),
                (None, EventState::NotDetected),
                (Some(5.0), EventState::Missing),
            ]
        );
    }

    #[test]
    fn test_active_intervals_split_on_inactive_records() {
        let temp = with_event(
            "temp",
            &[0.0; 6],
            &[Some(1), Some(1), Some(0), Some(1), Some(0), Some(1)],
        );
        let table = align(&temp, &[], AlignOptions::default()).unwrap();
        let predicate = CompositePredicate::new(
            "freezing",
            vec![ThresholdPredicate::new(ChannelId::new("temp"), Comparison::LessOrEqual, 0.0)],
        );
        let report = inspect(&table, &predicate, &event()).unwrap();

        assert_eq!(report.composite_intervals.len(), 1);
        assert_eq!(report.composite_intervals[0].records, 6);
        let event_runs: Vec<usize> = report.event_intervals.iter().map(|i| i.records).collect();
        assert_eq!(event_runs, vec![2, 1, 1]);
        assert_eq!(report.event_intervals[0].start, ts(0));
        assert_eq!(report.event_intervals[0].end, ts(10));
    }
}
