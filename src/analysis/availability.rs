//! Availability ratios.
//!
//! Availability is the share of samples for which a channel reported a
//! usable value, as a percentage. Every ratio goes through
//! `availability_pct`, which refuses a zero denominator.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{MonthBucket, SensorSeries};

/// `100 * usable / total`, or `None` when there are no samples.
pub fn availability_pct(usable: usize, total: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(100.0 * usable as f64 / total as f64)
}

/// Availability of one channel over one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyAvailability {
    pub month: MonthBucket,
    pub total: usize,
    pub available: usize,
    pub availability_pct: f64,
}

/// Per-month availability of `series`, in month order. Months without
/// rows are not reported.
pub fn monthly_availability(series: &SensorSeries) -> Vec<MonthlyAvailability> {
    let mut counts: BTreeMap<MonthBucket, (usize, usize)> = BTreeMap::new();
    for reading in series.iter() {
        let entry = counts.entry(reading.month).or_default();
        entry.0 += 1;
        if reading.is_available() {
            entry.1 += 1;
        }
    }

    counts
        .into_iter()
        .filter_map(|(month, (total, available))| {
            availability_pct(available, total).map(|pct| MonthlyAvailability {
                month,
                total,
                available,
                availability_pct: pct,
            })
        })
        .collect()
}
