//! Metric aggregation
//!
//! Each working day is reduced to a [`DailyKpi`] once; windows and buckets are
//! then aggregates over those records.

use log::debug;

use crate::classifier::DayClassifier;
use crate::config::EngineConfig;
use crate::selector::{WorkingDay, WorkingDaySelector, WorkingDayWindow};
use crate::stats::{round_to, summarize};
use crate::types::{
    ClockTime, DailyKpi, DateRange, HoursMetric, LateWorkFrequency, NormalizedEntry, WindowMetrics,
};

/// Aggregator for per-day and per-window metrics
pub struct MetricAggregator;

impl MetricAggregator {
    /// Per-day KPI records, oldest day first
    pub fn daily_kpis(entries: &[NormalizedEntry], config: &EngineConfig) -> Vec<DailyKpi> {
        WorkingDaySelector::group_by_day(entries)
            .iter()
            .map(|day| Self::daily_kpi(day, config))
            .collect()
    }

    /// Reduce one working day to its KPI record
    pub fn daily_kpi(day: &WorkingDay<'_>, config: &EngineConfig) -> DailyKpi {
        let billable_seconds = day
            .entries
            .iter()
            .filter(|e| e.billable)
            .map(|e| e.duration_seconds)
            .sum();

        let away_seconds = day
            .entries
            .iter()
            .filter(|e| !e.is_home_office())
            .map(|e| e.duration_seconds)
            .sum();

        let late_work = day
            .entries
            .iter()
            .any(|e| is_late(e, config.late_hour));

        DailyKpi {
            date: day.date,
            billable_seconds,
            away_seconds,
            back_home: DayClassifier::back_home(day, config.back_home_policy),
            home_office_end: DayClassifier::home_office_end(day),
            late_work,
            total_entries: day.entries.len(),
        }
    }

    /// Metrics over the KPI records whose dates fall in `window`
    pub fn window(kpis: &[DailyKpi], window: &WorkingDayWindow, window_days: usize) -> WindowMetrics {
        let selected: Vec<&DailyKpi> = kpis.iter().filter(|k| window.contains(&k.date)).collect();
        let mut metrics = Self::aggregate(&selected);
        metrics.window_days = window_days;
        metrics.date_range = window.date_range;

        debug!(
            "window {window_days}WD: {} working days, {} entries, {:.2}h billable",
            metrics.working_days_analyzed, metrics.total_entries, metrics.billable_hours.total
        );
        metrics
    }

    /// Aggregate an arbitrary set of KPI records.
    ///
    /// `window_days` is left at 0; callers that aggregate a requested window
    /// set it, as [`MetricAggregator::window`] does.
    pub fn aggregate(kpis: &[&DailyKpi]) -> WindowMetrics {
        let back_home: Vec<ClockTime> = kpis.iter().filter_map(|k| k.back_home).collect();
        let home_office_end: Vec<ClockTime> = kpis.iter().filter_map(|k| k.home_office_end).collect();

        let date_range = match (
            kpis.iter().map(|k| k.date).min(),
            kpis.iter().map(|k| k.date).max(),
        ) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };

        WindowMetrics {
            window_days: 0,
            working_days_analyzed: kpis.len(),
            date_range,
            total_entries: kpis.iter().map(|k| k.total_entries).sum(),
            billable_hours: hours_metric(kpis.iter().map(|k| k.billable_seconds)),
            away_from_home_hours: hours_metric(kpis.iter().map(|k| k.away_seconds)),
            back_home: summarize(&back_home),
            home_office_end: summarize(&home_office_end),
            late_work: late_work_frequency(kpis),
        }
    }
}

/// Whether an entry starts or ends at or after `late_hour` local time
pub fn is_late(entry: &NormalizedEntry, late_hour: u32) -> bool {
    entry.start_clock().hour() >= late_hour || entry.stop_clock().hour() >= late_hour
}

/// Total hours and the average over days that contributed
fn hours_metric(per_day_seconds: impl Iterator<Item = i64>) -> HoursMetric {
    let mut total_seconds = 0i64;
    let mut contributing_days = 0usize;
    for seconds in per_day_seconds {
        if seconds > 0 {
            total_seconds += seconds;
            contributing_days += 1;
        }
    }

    let total = total_seconds as f64 / 3600.0;
    let per_day_average = if contributing_days > 0 {
        total / contributing_days as f64
    } else {
        0.0
    };

    HoursMetric {
        total,
        per_day_average,
        contributing_days,
    }
}

/// Share of days with late activity
pub(crate) fn late_work_frequency(kpis: &[&DailyKpi]) -> LateWorkFrequency {
    let total_days = kpis.len();
    let late_days = kpis.iter().filter(|k| k.late_work).count();
    let percentage = if total_days > 0 {
        round_to(late_days as f64 / total_days as f64 * 100.0, 1)
    } else {
        0.0
    };

    LateWorkFrequency {
        late_days,
        total_days,
        percentage,
    }
}
