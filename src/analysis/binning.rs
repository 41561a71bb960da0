//! Fixed-width value binning with per-bin statistics.
//!
//! Bins are half-open on the left: a sample `v` belongs to `(l, l + width]`
//! iff `l < v <= l + width`. A value sitting exactly on a lower edge
//! therefore lands in the previous bin, which is the convention of the
//! meteorological availability tables this reproduces.
//!
//! Lower edges run from `start` in steps of `width` while `l < stop`; the
//! last bin may reach past `stop`. Empty bins are never reported.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::align::AlignedTable;
use super::availability::availability_pct;
use crate::model::{AnalysisError, ChannelId};

// ---------------------------------------------------------------------------
// Bin specification
// ---------------------------------------------------------------------------

/// Upper limit on the number of bins a spec may describe.
pub const MAX_BIN_COUNT: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinSpec {
    pub width: f64,
    pub start: f64,
    pub stop: f64,
}

impl BinSpec {
    pub fn new(width: f64, start: f64, stop: f64) -> Result<Self, AnalysisError> {
        let spec = BinSpec { width, start, stop };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err(AnalysisError::InvalidBinSpec(format!(
                "width must be positive, got {}",
                self.width
            )));
        }
        if !self.start.is_finite() || !self.stop.is_finite() || self.start >= self.stop {
            return Err(AnalysisError::InvalidBinSpec(format!(
                "domain [{}, {}) is empty",
                self.start, self.stop
            )));
        }
        let raw_count = ((self.stop - self.start) / self.width).ceil();
        if !raw_count.is_finite() || raw_count > MAX_BIN_COUNT as f64 {
            return Err(AnalysisError::InvalidBinSpec(format!(
                "width {} over [{}, {}) gives more than {} bins",
                self.width, self.start, self.stop, MAX_BIN_COUNT
            )));
        }
        Ok(())
    }

    /// Number of bins covering `[start, stop)`.
    pub fn bin_count(&self) -> usize {
        let raw = ((self.stop - self.start) / self.width).ceil();
        if !raw.is_finite() || raw <= 0.0 {
            return 0;
        }
        let mut n = raw.min(MAX_BIN_COUNT as f64) as usize;
        // Guard against the ceiling landing one past due to rounding.
        while n > 0 && self.lower_edge(n - 1) >= self.stop {
            n -= 1;
        }
        n
    }

    /// Lower edge of bin `index`. Computed from `start` rather than by
    /// accumulation so edges stay exact for integer widths.
    pub fn lower_edge(&self, index: usize) -> f64 {
        self.start + index as f64 * self.width
    }

    /// Index of the bin holding `value`, if any.
    pub fn bin_index(&self, value: f64) -> Option<usize> {
        if !value.is_finite() {
            return None;
        }
        let count = self.bin_count();
        let position = (value - self.start) / self.width;
        // Out of range samples never reach the integer cast.
        if !(position > -1.0 && position <= count as f64 + 1.0) {
            return None;
        }
        let count = count as i64;
        let guess = position.ceil() as i64 - 1;
        (guess - 1..=guess + 1)
            .filter(|&i| i >= 0 && i < count)
            .map(|i| i as usize)
            .find(|&i| {
                let lower = self.lower_edge(i);
                lower < value && value <= lower + self.width
            })
    }
}

// ---------------------------------------------------------------------------
// Samples and rows
// ---------------------------------------------------------------------------

/// One binned value and the target channel's reading at the same instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinSample {
    pub value: f64,
    /// `None` when the target channel had no usable reading.
    pub target: Option<f64>,
}

/// Statistics for one non-empty bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinRow {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub mean: f64,
    /// Sample (n-1) standard deviation; `None` for a single-sample bin.
    pub stdev: Option<f64>,
    pub availability_pct: f64,
    /// Mean of the usable target readings; `None` if there were none.
    pub target_mean: Option<f64>,
}

#[derive(Debug, Default)]
struct Accumulator {
    values: Vec<f64>,
    target_sum: f64,
    target_count: usize,
}

/// Bins `samples` and computes per-bin statistics. Samples outside every
/// bin are ignored; an empty input yields an empty table.
pub fn aggregate(samples: &[BinSample], spec: &BinSpec) -> Result<Vec<BinRow>, AnalysisError> {
    spec.validate()?;
    let mut bins: BTreeMap<usize, Accumulator> = BTreeMap::new();

    for sample in samples {
        if let Some(idx) = spec.bin_index(sample.value) {
            let acc = bins.entry(idx).or_default();
            acc.values.push(sample.value);
            if let Some(t) = sample.target {
                acc.target_sum += t;
                acc.target_count += 1;
            }
        }
    }

    let rows = bins
        .into_iter()
        .filter_map(|(idx, acc)| {
            let count = acc.values.len();
            let availability = availability_pct(acc.target_count, count)?;
            let mean = mean(&acc.values)?;
            let lower = spec.lower_edge(idx);
            Some(BinRow {
                lower,
                upper: lower + spec.width,
                count,
                mean,
                stdev: sample_stdev(&acc.values, mean),
                availability_pct: availability,
                target_mean: (acc.target_count > 0)
                    .then(|| acc.target_sum / acc.target_count as f64),
            })
        })
        .collect();

    Ok(rows)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sample_stdev(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Collects samples from an aligned table: the binned value comes from
/// `binned`, availability from `target`. Records where the binned channel
/// has no numeric reading are skipped.
pub fn samples_from_table(
    table: &AlignedTable<'_>,
    binned: &ChannelId,
    target: &ChannelId,
) -> Result<Vec<BinSample>, AnalysisError> {
    let value_pos = table.position(binned)?;
    let target_pos = table.position(target)?;

    Ok(table
        .records()
        .iter()
        .filter_map(|record| {
            record.numeric(value_pos).map(|value| BinSample {
                value,
                target: record.numeric(target_pos),
            })
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
