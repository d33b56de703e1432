//! Pipeline orchestration
//!
//! This module provides the public API for worktrace.
//! It runs the stages from a raw entry batch to window metrics, trends and
//! bucketed series: normalization → working-day selection → per-day
//! classification → aggregation → trend comparison.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use serde_json::Value;

use crate::aggregator::MetricAggregator;
use crate::config::EngineConfig;
use crate::encoder::ReportEncoder;
use crate::error::MetricsError;
use crate::normalizer::EntryNormalizer;
use crate::resolution::MultiResolutionAggregator;
use crate::selector::WorkingDaySelector;
use crate::trend::TrendComparator;
use crate::types::{
    entries_from_values, window_label, AggregationMode, BucketSeries, DailyKpi, EngineInput,
    MetricsResult, NormalizationReport, NormalizedEntry, Resolution, TrendReport, WindowMetrics,
};

/// Parse an entry batch.
///
/// Accepts either a batch object (`{"raw_entries": [...], ...metadata}`) or a
/// bare array of entries. A malformed entry never fails the batch: missing or
/// null fields are left for the normalizer to drop and count, and elements
/// that are not entry objects are skipped.
pub fn parse_batch(json: &str) -> Result<EngineInput, MetricsError> {
    let value: Value = serde_json::from_str(json)?;
    match value {
        Value::Array(values) => Ok(EngineInput::from_entries(entries_from_values(values))),
        Value::Object(_) => {
            serde_json::from_value(value).map_err(|e| MetricsError::ParseError(e.to_string()))
        }
        _ => Err(MetricsError::ParseError(
            "expected an entry batch object or an array of entries".to_string(),
        )),
    }
}

/// Compute window metrics and trends for an entry batch with default settings.
///
/// # Arguments
/// * `raw_json` - Entry batch JSON, object or bare array
///
/// # Returns
/// A report envelope around a [`MetricsResult`], as pretty JSON
///
/// # Example
/// ```ignore
/// let report = entries_to_metrics(batch_json)?;
/// ```
pub fn entries_to_metrics(raw_json: String) -> Result<String, MetricsError> {
    let input = parse_batch(&raw_json)?;
    let result = MetricsEngine::default().analyze(&input);
    ReportEncoder::new().encode_to_json(result)
}

/// Like [`entries_to_metrics`] with an explicit JSON engine configuration
pub fn entries_to_metrics_with_config(raw_json: String, config_json: String) -> Result<String, MetricsError> {
    let engine = MetricsEngine::new(EngineConfig::from_json(&config_json)?)?;
    let input = parse_batch(&raw_json)?;
    ReportEncoder::new().encode_to_json(engine.analyze(&input))
}

/// Compute a bucketed series for an entry batch with default settings.
///
/// # Arguments
/// * `raw_json` - Entry batch JSON, object or bare array
/// * `resolution` - Bucket granularity
/// * `mode` - Headline roll-up of hour metrics
pub fn entries_to_buckets(
    raw_json: String,
    resolution: Resolution,
    mode: AggregationMode,
) -> Result<String, MetricsError> {
    let input = parse_batch(&raw_json)?;
    let series = MetricsEngine::default().buckets(&input, resolution, mode);
    ReportEncoder::new().encode_to_json(series)
}

/// Configured metrics engine.
///
/// Holds only immutable configuration; every call is a pure function of its
/// input.
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    config: EngineConfig,
}

impl MetricsEngine {
    /// Create an engine after validating the configuration
    pub fn new(config: EngineConfig) -> Result<Self, MetricsError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stage 1: parse timestamps and drop invalid entries
    pub fn normalize(&self, input: &EngineInput) -> (Vec<NormalizedEntry>, NormalizationReport) {
        EntryNormalizer::normalize_with_report(&input.entries, &self.config.zone)
    }

    /// Distinct working days, most recent first
    pub fn working_days(&self, entries: &[NormalizedEntry]) -> Vec<NaiveDate> {
        WorkingDaySelector::working_days(entries)
    }

    /// Per-day KPI records, oldest first
    pub fn daily_kpis(&self, entries: &[NormalizedEntry]) -> Vec<DailyKpi> {
        MetricAggregator::daily_kpis(entries, &self.config)
    }

    /// Metrics over the most recent `window_days` working days
    pub fn window(&self, entries: &[NormalizedEntry], window_days: usize) -> WindowMetrics {
        let kpis = self.daily_kpis(entries);
        let window = WorkingDaySelector::select(entries, window_days);
        MetricAggregator::window(&kpis, &window, window_days)
    }

    /// Every configured window plus trends
    pub fn analyze(&self, input: &EngineInput) -> MetricsResult {
        let (entries, normalization) = self.normalize(input);
        let kpis = self.daily_kpis(&entries);
        let dates = self.working_days(&entries);

        let mut windows = BTreeMap::new();
        for window_days in self.config.all_windows() {
            if self.config.require_full_windows && dates.len() < window_days {
                debug!(
                    "skipping {}: only {} working days available",
                    window_label(window_days),
                    dates.len()
                );
                continue;
            }
            let window = WorkingDaySelector::select_from_dates(&dates, window_days);
            windows.insert(
                window_label(window_days),
                MetricAggregator::window(&kpis, &window, window_days),
            );
        }

        let trends = self.trends(&windows);

        MetricsResult {
            metadata: input.metadata.clone(),
            normalization,
            windows,
            trends,
        }
    }

    /// Recent-vs-baseline comparison; `None` when either window is missing
    pub fn trends(&self, windows: &BTreeMap<String, WindowMetrics>) -> Option<TrendReport> {
        let recent = windows.get(&window_label(self.config.recent_window))?;
        let baseline = windows.get(&window_label(self.config.baseline_window))?;
        Some(TrendComparator::compare(
            recent,
            baseline,
            self.config.trend_threshold_minutes,
        ))
    }

    /// Bucketed series at a resolution and aggregation mode
    pub fn buckets(&self, input: &EngineInput, resolution: Resolution, mode: AggregationMode) -> BucketSeries {
        let (entries, _) = self.normalize(input);
        let kpis = self.daily_kpis(&entries);
        MultiResolutionAggregator::series(
            &kpis,
            resolution,
            mode,
            &self.config.running_mean_windows,
            input.metadata.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZonePolicy;
    use crate::test_support::{date, raw_entry};
    use crate::types::TrendDirection;
    use pretty_assertions::assert_eq;

    fn sample_batch_json() -> &'static str {
        r#"{
            "fetched_at": "2024-05-07T06:00:00",
            "workspace_name": "Acme",
            "raw_entries": [
                {"id": 1, "start": "2024-05-06T08:00:00Z", "stop": "2024-05-06T09:00:00Z",
                 "duration": 3600, "billable": false, "tags": ["Commuting"]},
                {"id": 2, "start": "2024-05-06T09:15:00Z", "stop": "2024-05-06T17:30:00Z",
                 "duration": 29700, "billable": true, "tags": ["HomeOffice"]},
                {"id": 3, "start": "2024-05-06T18:00:00Z", "stop": "2024-05-06T18:45:00Z",
                 "duration": 2700, "billable": false, "tags": ["Commuting"]},
                {"id": 4, "start": "2024-05-07T09:00:00Z", "stop": null,
                 "duration": -1715072400, "tags": ["HomeOffice"]}
            ]
        }"#
    }

    #[test]
    fn test_parse_batch_object_and_array() {
        let input = parse_batch(sample_batch_json()).unwrap();
        assert_eq!(input.entries.len(), 4);
        assert_eq!(input.metadata.workspace_name.as_deref(), Some("Acme"));

        let bare = parse_batch(r#"[{"start": "2024-05-06T08:00:00Z", "stop": "2024-05-06T09:00:00Z", "duration": 3600}]"#)
            .unwrap();
        assert_eq!(bare.entries.len(), 1);
        assert!(bare.metadata.workspace_name.is_none());
    }

    #[test]
    fn test_parse_batch_errors() {
        assert!(matches!(parse_batch("not json"), Err(MetricsError::JsonError(_))));
        assert!(matches!(parse_batch("42"), Err(MetricsError::ParseError(_))));
        assert!(matches!(parse_batch(r#"{"workspace_name": "x"}"#), Err(MetricsError::ParseError(_))));
    }

    #[test]
    fn test_malformed_entries_do_not_fail_the_batch() {
        let entries = r#"[
            {"start": "2024-05-06T09:00:00Z", "stop": "2024-05-06T17:00:00Z",
             "duration": 28800, "billable": true, "tags": ["HomeOffice"]},
            {"stop": "2024-05-07T10:00:00Z", "duration": 3600},
            {"start": null, "stop": "2024-05-07T10:00:00Z", "duration": 3600},
            {"start": "2024-05-07T09:00:00Z", "stop": "2024-05-07T10:00:00Z", "duration": null},
            {"start": "2024-05-08T18:00:00Z", "stop": "2024-05-08T18:30:00Z",
             "duration": 1800, "billable": null, "tags": null},
            42,
            {"start": 5, "stop": "2024-05-09T10:00:00Z", "duration": 3600}
        ]"#;
        let wrapped = format!(r#"{{"workspace_name": "Acme", "raw_entries": {entries}}}"#);

        for json in [entries.to_string(), wrapped] {
            let input = parse_batch(&json).unwrap();
            assert_eq!(input.entries.len(), 5);

            let result = MetricsEngine::default().analyze(&input);
            assert_eq!(result.normalization.total, 5);
            assert_eq!(result.normalization.kept, 2);
            assert_eq!(result.normalization.dropped_unparseable_start, 2);
            assert_eq!(result.normalization.dropped_non_positive_duration, 1);

            let window = &result.windows["7WD"];
            assert_eq!(window.working_days_analyzed, 2);
            assert_eq!(window.billable_hours.total, 8.0);
            assert_eq!(window.home_office_end.count, 1);
            assert_eq!(window.home_office_end.mean, Some(1020.0));
        }
    }

    #[test]
    fn test_analyze_commute_day() {
        let input = parse_batch(sample_batch_json()).unwrap();
        let result = MetricsEngine::default().analyze(&input);

        assert_eq!(result.normalization.total, 4);
        assert_eq!(result.normalization.kept, 3);
        assert_eq!(result.normalization.dropped_missing_stop, 1);

        let window = &result.windows["7WD"];
        assert_eq!(window.working_days_analyzed, 1);
        assert_eq!(window.billable_hours.total, 8.25);
        assert_eq!(window.back_home.mean, Some(1125.0));
        assert_eq!(window.home_office_end.count, 0);

        let keys: Vec<&str> = result.windows.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["10WD", "30WD", "5WD", "7WD"]);
    }

    #[test]
    fn test_pure_home_office_day() {
        let input = EngineInput::from_entries(vec![raw_entry(
            date(2024, 5, 6),
            (9, 0),
            (17, 0),
            &["HomeOffice"],
            true,
        )]);
        let result = MetricsEngine::default().analyze(&input);
        let window = &result.windows["7WD"];

        assert_eq!(window.back_home.count, 0);
        assert_eq!(window.home_office_end.count, 1);
        assert_eq!(window.home_office_end.mean, Some(1020.0));
    }

    #[test]
    fn test_empty_batch() {
        let result = MetricsEngine::default().analyze(&EngineInput::default());

        assert_eq!(result.windows.len(), 4);
        for metrics in result.windows.values() {
            assert_eq!(metrics.working_days_analyzed, 0);
            assert_eq!(metrics.total_entries, 0);
            assert_eq!(metrics.billable_hours.total, 0.0);
            assert_eq!(metrics.away_from_home_hours.total, 0.0);
            assert_eq!(metrics.back_home.count, 0);
            assert_eq!(metrics.home_office_end.count, 0);
        }

        let trends = result.trends.unwrap();
        assert_eq!(trends.billable_hours_per_day.direction, TrendDirection::Stable);
        assert_eq!(trends.billable_hours_per_day.difference, 0.0);
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let input = parse_batch(sample_batch_json()).unwrap();
        let engine = MetricsEngine::default();

        let first = serde_json::to_string(&engine.analyze(&input)).unwrap();
        let second = serde_json::to_string(&engine.analyze(&input)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_small_billable_drop_is_stable() {
        // Three older days at 6h40m, seven recent days at 6h
        let mut entries = Vec::new();
        for day in 1..=3 {
            entries.push(raw_entry(date(2024, 5, day), (9, 0), (15, 40), &[], true));
        }
        for day in 4..=10 {
            entries.push(raw_entry(date(2024, 5, day), (9, 0), (15, 0), &[], true));
        }
        let result = MetricsEngine::default().analyze(&EngineInput::from_entries(entries));

        assert_eq!(result.windows["7WD"].billable_hours.per_day_average, 6.0);
        assert!((result.windows["30WD"].billable_hours.per_day_average - 6.2).abs() < 1e-9);
        assert_eq!(result.windows["30WD"].working_days_analyzed, 10);

        let trends = result.trends.unwrap();
        assert_eq!(trends.recent_window, 7);
        assert_eq!(trends.baseline_window, 30);
        assert_eq!(trends.billable_hours_per_day.direction, TrendDirection::Stable);
        assert!(trends.billable_hours_per_day.percentage_change.is_none());
    }

    #[test]
    fn test_require_full_windows() {
        let entries = (1..=6)
            .map(|day| raw_entry(date(2024, 5, day), (9, 0), (17, 0), &[], true))
            .collect();
        let config = EngineConfig {
            require_full_windows: true,
            ..Default::default()
        };
        let result = MetricsEngine::new(config)
            .unwrap()
            .analyze(&EngineInput::from_entries(entries));

        let keys: Vec<&str> = result.windows.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["5WD"]);
        assert!(result.trends.is_none());
    }

    #[test]
    fn test_named_zone_shifts_working_day() {
        // 23:30 UTC on May 6 is 01:30 on May 7 in Zurich (CEST)
        let input = EngineInput::from_entries(vec![raw_entry(
            date(2024, 5, 6),
            (22, 30),
            (23, 30),
            &["Commuting"],
            false,
        )]);
        let engine = MetricsEngine::new(
            EngineConfig::default().with_zone("Europe/Zurich".parse::<ZonePolicy>().unwrap()),
        )
        .unwrap();

        let (entries, _) = engine.normalize(&input);
        assert_eq!(engine.working_days(&entries), vec![date(2024, 5, 7)]);

        let window = engine.window(&entries, 7);
        assert_eq!(window.back_home.earliest.unwrap().to_string(), "01:30");
        assert_eq!(window.late_work.late_days, 0);
    }

    #[test]
    fn test_window_prefix_consistency() {
        let entries: Vec<_> = (1..=12)
            .map(|day| raw_entry(date(2024, 5, day), (9, 0), (12, 0), &[], true))
            .collect();
        let engine = MetricsEngine::default();
        let (normalized, _) = engine.normalize(&EngineInput::from_entries(entries));

        let seven = engine.window(&normalized, 7).date_range.unwrap();
        let thirty = engine.window(&normalized, 30).date_range.unwrap();
        assert_eq!(seven.end, thirty.end);
        assert!(thirty.start <= seven.start);
    }

    #[test]
    fn test_entries_to_metrics_report() {
        let json = entries_to_metrics(sample_batch_json().to_string()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(report["producer"]["name"], "worktrace");
        assert_eq!(report["result"]["metadata"]["workspace_name"], "Acme");
        assert_eq!(report["result"]["windows"]["7WD"]["back_home"]["mean"], "18:45");
        assert_eq!(report["result"]["windows"]["7WD"]["billable_hours"]["total"], 8.25);
    }

    #[test]
    fn test_entries_to_metrics_with_config() {
        let config = r#"{"windows": [3], "late_hour": 18}"#.to_string();
        let json = entries_to_metrics_with_config(sample_batch_json().to_string(), config).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(report["result"]["windows"]["3WD"].is_object());
        assert_eq!(report["result"]["windows"]["3WD"]["late_work"]["late_days"], 1);

        let bad = entries_to_metrics_with_config("[]".to_string(), r#"{"late_hour": 24}"#.to_string());
        assert!(matches!(bad, Err(MetricsError::InvalidConfig(_))));
    }

    #[test]
    fn test_entries_to_buckets() {
        let json = entries_to_buckets(
            sample_batch_json().to_string(),
            Resolution::Weekly,
            AggregationMode::Sum,
        )
        .unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(report["result"]["resolution"], "weekly");
        assert_eq!(report["result"]["buckets"][0]["key"], "2024-W19");
        assert_eq!(report["result"]["buckets"][0]["billable_hours"]["value"], 8.25);
        assert_eq!(report["result"]["running_means"].as_array().unwrap().len(), 3);
    }
}
