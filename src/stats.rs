//! Descriptive statistics
//!
//! Summaries are only computed over non-empty value sets; empty input yields
//! an explicit empty summary, never NaN.

use crate::types::{ClockTime, HoursSummary, StatSummary};

/// Summarize clock-time values (minutes since midnight)
pub fn summarize(values: &[ClockTime]) -> StatSummary {
    if values.is_empty() {
        return StatSummary::default();
    }

    let mut minutes: Vec<f64> = values.iter().map(|v| f64::from(v.minutes())).collect();
    minutes.sort_by(f64::total_cmp);

    StatSummary {
        mean: mean(&minutes),
        median: median_of_sorted(&minutes),
        earliest: values.iter().min().copied(),
        latest: values.iter().max().copied(),
        count: values.len(),
    }
}

/// Summarize hour values
pub fn summarize_hours(values: &[f64]) -> HoursSummary {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    HoursSummary {
        sum: values.iter().sum(),
        mean: mean(values),
        median: median_of_sorted(&sorted),
        count: values.len(),
    }
}

/// Arithmetic mean; `None` on empty input
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median of ascending values; even counts average the middle pair
fn median_of_sorted(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Round to the given number of decimals
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
