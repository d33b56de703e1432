//! Trend comparison
//!
//! Compares a recent-window value against a baseline-window value. Differences
//! within the threshold (in minutes) read as stable so that day-to-day jitter
//! does not show up as a trend.

use crate::types::{Trend, TrendDirection, TrendReport, WindowMetrics};

/// Compare two clock-time values given in minutes since midnight
pub fn compare_clock(recent: Option<f64>, baseline: Option<f64>, threshold_minutes: u32) -> Trend {
    let (Some(recent), Some(baseline)) = (recent, baseline) else {
        return Trend::stable();
    };
    if recent == 0.0 || baseline == 0.0 {
        return Trend::stable();
    }

    let difference = recent - baseline;
    Trend {
        direction: classify(difference, threshold_minutes),
        difference,
        percentage_change: None,
    }
}

/// Compare two hour values; the threshold still applies in minutes
pub fn compare_hours(recent: f64, baseline: f64, threshold_minutes: u32) -> Trend {
    if recent == 0.0 || baseline == 0.0 || !recent.is_finite() || !baseline.is_finite() {
        return Trend::stable();
    }

    let difference = recent - baseline;
    let direction = classify(difference * 60.0, threshold_minutes);
    let percentage_change = match direction {
        TrendDirection::Stable => None,
        _ => Some(difference / baseline * 100.0),
    };

    Trend {
        direction,
        difference,
        percentage_change,
    }
}

fn classify(difference_minutes: f64, threshold_minutes: u32) -> TrendDirection {
    if difference_minutes.abs() <= f64::from(threshold_minutes) {
        TrendDirection::Stable
    } else if difference_minutes > 0.0 {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    }
}

/// Trend comparator over whole windows
pub struct TrendComparator;

impl TrendComparator {
    /// Compare a recent window against a baseline window
    pub fn compare(recent: &WindowMetrics, baseline: &WindowMetrics, threshold_minutes: u32) -> TrendReport {
        TrendReport {
            recent_window: recent.window_days,
            baseline_window: baseline.window_days,
            threshold_minutes,
            billable_hours_per_day: compare_hours(
                recent.billable_hours.per_day_average,
                baseline.billable_hours.per_day_average,
                threshold_minutes,
            ),
            away_from_home_hours_per_day: compare_hours(
                recent.away_from_home_hours.per_day_average,
                baseline.away_from_home_hours.per_day_average,
                threshold_minutes,
            ),
            back_home_mean: compare_clock(recent.back_home.mean, baseline.back_home.mean, threshold_minutes),
            home_office_end_mean: compare_clock(
                recent.home_office_end.mean,
                baseline.home_office_end.mean,
                threshold_minutes,
            ),
        }
    }
}
