/// Quality-control filtering of met-mast series.
///
/// The mast operator's QC pass marks each row with 0/1 reject codes (R101
/// "no data", R104 "under maintenance", ...). A row is dropped when any
/// configured code is raised. A code the row does not carry counts as not
/// raised: a shared barometer, for instance, reports a narrower code set
/// than the anemometers.
///
/// The reject mask is computed once per call and the same mask decides
/// which rows are kept.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{AnalysisError, SensorReading, SensorSeries};

/// Reject codes of the reference deployment.
pub const REFERENCE_REJECT_CODES: &[&str] = &[
    "R101", "R103", "R104", "R105", "R201", "R202", "R203", "R204", "R205", "R206",
];

// ---------------------------------------------------------------------------
// Reject code set
// ---------------------------------------------------------------------------

/// Ordered, duplicate-free set of reject codes, fixed at configuration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectCodeSet {
    codes: Vec<String>,
}

impl RejectCodeSet {
    pub fn new<I, S>(codes: I) -> Result<Self, AnalysisError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen: Vec<String> = Vec::new();
        for code in codes {
            let code = code.into();
            let trimmed = code.trim();
            if trimmed.is_empty() {
                return Err(AnalysisError::Config("empty reject code".to_string()));
            }
            if seen.iter().any(|c| c == trimmed) {
                return Err(AnalysisError::Config(format!(
                    "reject code '{}' listed twice",
                    trimmed
                )));
            }
            seen.push(trimmed.to_string());
        }
        Ok(RejectCodeSet { codes: seen })
    }

    /// The ten codes used by the reference deployment.
    pub fn reference() -> Self {
        RejectCodeSet {
            codes: REFERENCE_REJECT_CODES.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Logical OR over every configured code.
    pub fn is_rejected(&self, reading: &SensorReading) -> bool {
        self.codes.iter().any(|code| reading.is_raised(code))
    }
}

impl Default for RejectCodeSet {
    fn default() -> Self {
        Self::reference()
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Result of one QC pass.
#[derive(Debug, Clone, PartialEq)]
pub struct QcOutcome {
    /// Readings that passed, in their original order.
    pub series: SensorSeries,
    pub rejected: usize,
}

/// Per-row reject decision for `series`.
pub fn reject_mask(series: &SensorSeries, codes: &RejectCodeSet) -> Vec<bool> {
    series.iter().map(|r| codes.is_rejected(r)).collect()
}

/// Removes rejected readings, returning a new series.
pub fn apply(series: &SensorSeries, codes: &RejectCodeSet) -> QcOutcome {
    let mask = reject_mask(series, codes);
    let rejected = mask.iter().filter(|&&r| r).count();
    let kept = series
        .iter()
        .zip(&mask)
        .filter(|(_, rejected)| !**rejected)
        .map(|(reading, _)| reading.clone())
        .collect();

    QcOutcome {
        series: SensorSeries::new(series.channel().clone(), kept),
        rejected,
    }
}

/// How many rows raise each configured code. A row raising several codes
/// counts once per code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeTally {
    pub code: String,
    pub raised: usize,
}

pub fn tally_codes(series: &SensorSeries, codes: &RejectCodeSet) -> Vec<CodeTally> {
    let mut counts: BTreeMap<&str, usize> = codes.codes().iter().map(|c| (c.as_str(), 0)).collect();
    for reading in series.iter() {
        for code in codes.codes() {
            if reading.is_raised(code) {
                *counts.entry(code.as_str()).or_default() += 1;
            }
        }
    }
    codes
        .codes()
        .iter()
        .map(|code| CodeTally {
            code: code.clone(),
            raised: counts.get(code.as_str()).copied().unwrap_or(0),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
