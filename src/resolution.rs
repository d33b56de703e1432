//! Multi-resolution aggregation
//!
//! Groups per-day KPI records into calendar buckets (day, ISO week, month)
//! and derives trailing running means over the bucket sequence.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use log::debug;

use crate::aggregator::late_work_frequency;
use crate::stats::{mean, summarize, summarize_hours};
use crate::types::{
    AggregationMode, BatchMetadata, BucketHours, BucketMetrics, BucketSeries, ClockTime, DailyKpi,
    DateRange, Resolution, RunningMeanSeries,
};

/// Bucket key of a date at the given resolution
pub fn bucket_key(date: NaiveDate, resolution: Resolution) -> String {
    match resolution {
        Resolution::Daily => date.format("%Y-%m-%d").to_string(),
        Resolution::Weekly => {
            let week = date.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        Resolution::Monthly => date.format("%Y-%m").to_string(),
    }
}

/// Aggregator producing bucketed series
pub struct MultiResolutionAggregator;

impl MultiResolutionAggregator {
    /// Full bucketed series with running means
    pub fn series(
        kpis: &[DailyKpi],
        resolution: Resolution,
        mode: AggregationMode,
        running_windows: &[usize],
        metadata: BatchMetadata,
    ) -> BucketSeries {
        let buckets = Self::buckets(kpis, resolution, mode);
        let running_means = running_windows
            .iter()
            .filter(|&&window| window > 0)
            .map(|&window| running_means(&buckets, window))
            .collect();

        BucketSeries {
            resolution,
            mode,
            metadata,
            buckets,
            running_means,
        }
    }

    /// Buckets ordered oldest first
    pub fn buckets(kpis: &[DailyKpi], resolution: Resolution, mode: AggregationMode) -> Vec<BucketMetrics> {
        let mut grouped: BTreeMap<String, Vec<&DailyKpi>> = BTreeMap::new();
        for kpi in kpis {
            grouped.entry(bucket_key(kpi.date, resolution)).or_default().push(kpi);
        }

        debug!("{} days grouped into {} {resolution:?} buckets", kpis.len(), grouped.len());

        grouped
            .into_iter()
            .filter_map(|(key, days)| bucket(key, &days, mode))
            .collect()
    }
}

fn bucket(key: String, days: &[&DailyKpi], mode: AggregationMode) -> Option<BucketMetrics> {
    let start = days.iter().map(|k| k.date).min()?;
    let end = days.iter().map(|k| k.date).max()?;

    let back_home: Vec<ClockTime> = days.iter().filter_map(|k| k.back_home).collect();
    let home_office_end: Vec<ClockTime> = days.iter().filter_map(|k| k.home_office_end).collect();

    Some(BucketMetrics {
        key,
        date_range: DateRange { start, end },
        working_days: days.len(),
        total_entries: days.iter().map(|k| k.total_entries).sum(),
        billable_hours: bucket_hours(days.iter().map(|k| k.billable_hours()), mode),
        away_from_home_hours: bucket_hours(days.iter().map(|k| k.away_hours()), mode),
        back_home: summarize(&back_home),
        home_office_end: summarize(&home_office_end),
        late_work: late_work_frequency(days),
    })
}

/// Only days with a non-zero value enter the summary
fn bucket_hours(per_day: impl Iterator<Item = f64>, mode: AggregationMode) -> BucketHours {
    let values: Vec<f64> = per_day.filter(|&h| h > 0.0).collect();
    let summary = summarize_hours(&values);
    let value = match mode {
        AggregationMode::Sum => Some(summary.sum),
        AggregationMode::Mean => summary.mean,
    };
    BucketHours { value, summary }
}

fn running_means(buckets: &[BucketMetrics], window: usize) -> RunningMeanSeries {
    RunningMeanSeries {
        window,
        billable_hours: trailing_mean(buckets.iter().map(|b| b.billable_hours.value), window),
        away_from_home_hours: trailing_mean(buckets.iter().map(|b| b.away_from_home_hours.value), window),
        back_home_minutes: trailing_mean(buckets.iter().map(|b| b.back_home.mean), window),
        home_office_end_minutes: trailing_mean(buckets.iter().map(|b| b.home_office_end.mean), window),
    }
}

/// Mean of the non-null values among the trailing `window` points
fn trailing_mean(series: impl Iterator<Item = Option<f64>>, window: usize) -> Vec<Option<f64>> {
    let points: Vec<Option<f64>> = series.collect();
    (0..points.len())
        .map(|i| {
            let from = (i + 1).saturating_sub(window);
            let present: Vec<f64> = points[from..=i].iter().flatten().copied().collect();
            mean(&present)
        })
        .collect()
}
