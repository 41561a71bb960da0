/// Core data types for the lidar / met-mast comparison service.
///
/// This module defines the shared domain model imported by all other
/// modules: canonical timestamps, month buckets, sensor readings and
/// series, and the crate error type. It holds no I/O.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Time keys
// ---------------------------------------------------------------------------

/// A canonical instant at minute resolution.
///
/// Seconds and sub-second parts are always zero, so two sources that log
/// the same ten-minute interval with different second fields still join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MinuteStamp(NaiveDateTime);

impl MinuteStamp {
    /// Truncates `datetime` to the start of its minute.
    pub fn from_naive(datetime: NaiveDateTime) -> Self {
        let truncated = datetime
            .date()
            .and_hms_opt(datetime.hour(), datetime.minute(), 0)
            .unwrap_or(datetime);
        MinuteStamp(truncated)
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Calendar-month bucket of this instant.
    pub fn month(&self) -> MonthBucket {
        MonthBucket(self.0.month() as u8)
    }
}

impl fmt::Display for MinuteStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M"))
    }
}

/// Two-character calendar month key, "01" through "12".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthBucket(u8);

impl MonthBucket {
    /// Parses a two-character month code such as `"09"`.
    pub fn from_code(code: &str) -> Option<Self> {
        if code.len() != 2 {
            return None;
        }
        match code.parse::<u8>() {
            Ok(m) if (1..=12).contains(&m) => Some(MonthBucket(m)),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for MonthBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl Serialize for MonthBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// Stable identifier of one sensor channel, e.g. `"mmv1_TempUnHt80m"` or
/// `"lidar_80m_wind_speed"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        ChannelId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The raw value of a reading after sentinel handling.
///
/// `Missing` is the explicit "instrument reported nothing usable" state;
/// it never takes part in arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReadingValue {
    Numeric(f64),
    Categorical(String),
    Missing,
}

impl ReadingValue {
    /// Numeric view of the value. Categorical and missing values yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ReadingValue::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether the instrument reported a usable value.
    pub fn is_available(&self) -> bool {
        !matches!(self, ReadingValue::Missing)
    }
}

/// One timestamped measurement from one channel.
///
/// `indicators` holds every 0/1 flag column captured at ingestion (QC
/// reject codes and event columns such as `INFO01`). A code absent from
/// the map was not reported by the source for this row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub timestamp: MinuteStamp,
    pub month: MonthBucket,
    pub value: ReadingValue,
    pub indicators: BTreeMap<String, u8>,
}

impl SensorReading {
    pub fn new(timestamp: MinuteStamp, value: ReadingValue) -> Self {
        SensorReading {
            timestamp,
            month: timestamp.month(),
            value,
            indicators: BTreeMap::new(),
        }
    }

    pub fn with_indicator(mut self, code: impl Into<String>, flag: u8) -> Self {
        self.indicators.insert(code.into(), flag);
        self
    }

    pub fn indicator(&self, code: &str) -> Option<u8> {
        self.indicators.get(code).copied()
    }

    /// True when the indicator is present and equal to 1.
    pub fn is_raised(&self, code: &str) -> bool {
        self.indicator(code) == Some(1)
    }

    pub fn is_available(&self) -> bool {
        self.value.is_available()
    }
}

/// An ordered collection of readings for one channel.
///
/// Every pipeline stage returns a new series; none mutates its input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSeries {
    channel: ChannelId,
    readings: Vec<SensorReading>,
}

impl SensorSeries {
    pub fn new(channel: ChannelId, readings: Vec<SensorReading>) -> Self {
        SensorSeries { channel, readings }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn readings(&self) -> &[SensorReading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SensorReading> {
        self.readings.iter()
    }

    /// A new series holding only the readings whose month is in `months`.
    pub fn for_months(&self, months: &[MonthBucket]) -> SensorSeries {
        SensorSeries {
            channel: self.channel.clone(),
            readings: self
                .readings
                .iter()
                .filter(|r| months.contains(&r.month))
                .cloned()
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while building or analysing sensor series.
///
/// `MalformedTimestamp` is recovered per row by the ingest layer; the
/// structural variants propagate to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// A timestamp string matched none of the recognised formats.
    #[error("malformed timestamp: '{0}'")]
    MalformedTimestamp(String),

    /// A requested channel or column is absent.
    #[error("channel '{channel}' not found in {context}")]
    MissingChannel { channel: String, context: String },

    /// A join key occurs more than once and no collapse policy is configured.
    #[error("duplicate timestamp {timestamp} in channel '{channel}'")]
    DuplicateTimestamp { channel: String, timestamp: MinuteStamp },

    /// A series has no rows left to analyse.
    #[error("channel '{0}' has no rows")]
    EmptyInput(String),

    #[error("invalid bin spec: {0}")]
    InvalidBinSpec(String),

    #[error("composite predicate '{0}' has no conditions")]
    EmptyPredicate(String),

    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
