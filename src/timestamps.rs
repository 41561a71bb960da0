/// Timestamp normalization for heterogeneous sensor sources.
///
/// Met-mast QC exports stamp rows as `"01-Sep-2015 00:10"` (sometimes with
/// trailing data after the time of day); lidar exports use ISO-like strings
/// or the `"09/01/2015 00:10"` form. Everything is reduced to a
/// `MinuteStamp` so the two sources can be joined.
///
/// Strings carrying a UTC offset keep their wall-clock time. The mast and
/// lidar loggers both record local naive time, so converting to UTC would
/// shift one source against the other.

use chrono::{DateTime, NaiveDateTime};

use crate::model::{AnalysisError, MinuteStamp, MonthBucket};

/// Met-mast pattern, applied after `-` is replaced by a space.
const MAST_PATTERN: &str = "%d %b %Y %H:%M";

/// Length of `"DD-Mon-YYYY HH:MM"`; anything after it is discarded.
const MAST_PREFIX_LEN: usize = 17;

/// Patterns tried against the whole trimmed string, in order.
const FULL_PATTERNS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Parses `raw` into a canonical minute-resolution instant.
///
/// Returns `AnalysisError::MalformedTimestamp` when no pattern matches.
pub fn normalize(raw: &str) -> Result<MinuteStamp, AnalysisError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AnalysisError::MalformedTimestamp(raw.to_string()));
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(MinuteStamp::from_naive(with_offset.naive_local()));
    }

    for pattern in FULL_PATTERNS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Ok(MinuteStamp::from_naive(dt));
        }
    }

    parse_mast_format(trimmed)
        .map(MinuteStamp::from_naive)
        .ok_or_else(|| AnalysisError::MalformedTimestamp(raw.to_string()))
}

/// Accepts an already-parsed value, truncating it to the minute.
pub fn normalize_datetime(datetime: NaiveDateTime) -> MinuteStamp {
    MinuteStamp::from_naive(datetime)
}

/// Month bucket of a raw timestamp string.
pub fn month_bucket(raw: &str) -> Result<MonthBucket, AnalysisError> {
    normalize(raw).map(|stamp| stamp.month())
}

fn parse_mast_format(trimmed: &str) -> Option<NaiveDateTime> {
    let prefix = match trimmed.char_indices().nth(MAST_PREFIX_LEN) {
        Some((cut, _)) => &trimmed[..cut],
        None => trimmed,
    };
    let spaced = prefix.replace('-', " ");
    NaiveDateTime::parse_from_str(spaced.trim(), MAST_PATTERN).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
