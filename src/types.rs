//! Core data types for Worktrace
//!
//! Raw entries arrive from the fetch collaborator, get normalized into
//! [`NormalizedEntry`] values, and flow through classification and
//! aggregation into [`WindowMetrics`] and [`BucketSeries`] results.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use log::debug;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MetricsError;

/// Minutes in a calendar day
pub const MINUTES_PER_DAY: u16 = 1440;

// ============================================================================
// Input
// ============================================================================

/// A raw time-tracking entry as delivered by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    /// Provider entry identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Start instant (ISO-8601)
    #[serde(default)]
    pub start: Option<String>,
    /// Stop instant (ISO-8601); absent while the entry is still running
    #[serde(default)]
    pub stop: Option<String>,
    /// Duration in seconds; non-positive for running entries
    #[serde(default, alias = "durationSeconds", deserialize_with = "null_as_default")]
    pub duration: i64,
    /// Billable flag
    #[serde(default, deserialize_with = "null_as_default")]
    pub billable: bool,
    /// Tags attached to the entry
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

/// Read `null` as the type's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode entries one by one, skipping elements that are not entries at all
pub(crate) fn entries_from_values(values: Vec<serde_json::Value>) -> Vec<TimeEntry> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("skipping malformed entry #{index}: {e}");
                None
            }
        })
        .collect()
}

fn lenient_entries<'de, D>(deserializer: D) -> Result<Vec<TimeEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries_from_values(values))
}

/// Fetch metadata carried through the engine untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_entries: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone_info: Option<serde_json::Value>,
}

/// Immutable input to a single engine invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineInput {
    /// Raw entries
    #[serde(
        rename = "raw_entries",
        alias = "entries",
        alias = "time_entries",
        deserialize_with = "lenient_entries"
    )]
    pub entries: Vec<TimeEntry>,
    /// Pass-through metadata
    #[serde(flatten)]
    pub metadata: BatchMetadata,
}

impl EngineInput {
    /// Build an input from entries alone
    pub fn from_entries(entries: Vec<TimeEntry>) -> Self {
        Self {
            entries,
            metadata: BatchMetadata::default(),
        }
    }
}

// ============================================================================
// Tags
// ============================================================================

/// Tags the engine attaches meaning to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tag {
    HomeOffice,
    Commuting,
}

impl Tag {
    /// Every recognized tag
    pub const ALL: [Tag; 2] = [Tag::HomeOffice, Tag::Commuting];

    /// Provider-side tag name (case-sensitive)
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::HomeOffice => "HomeOffice",
            Tag::Commuting => "Commuting",
        }
    }

    /// Look up a recognized tag by its exact name
    pub fn from_name(name: &str) -> Option<Tag> {
        Tag::ALL.into_iter().find(|tag| tag.as_str() == name)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed view over an entry's tags.
///
/// Recognized tags become [`Tag`] flags; everything else is kept verbatim so
/// nothing the provider sent is lost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TagSet {
    recognized: BTreeSet<Tag>,
    other: Vec<String>,
}

impl TagSet {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = TagSet::default();
        for name in names {
            let name = name.as_ref();
            match Tag::from_name(name) {
                Some(tag) => {
                    set.recognized.insert(tag);
                }
                None => {
                    if !set.other.iter().any(|existing| existing == name) {
                        set.other.push(name.to_string());
                    }
                }
            }
        }
        set
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.recognized.contains(&tag)
    }

    pub fn is_home_office(&self) -> bool {
        self.contains(Tag::HomeOffice)
    }

    pub fn is_commuting(&self) -> bool {
        self.contains(Tag::Commuting)
    }

    /// Tags the engine does not interpret
    pub fn other(&self) -> &[String] {
        &self.other
    }

    pub fn is_empty(&self) -> bool {
        self.recognized.is_empty() && self.other.is_empty()
    }
}

impl From<Vec<String>> for TagSet {
    fn from(names: Vec<String>) -> Self {
        TagSet::from_names(names)
    }
}

impl From<TagSet> for Vec<String> {
    fn from(set: TagSet) -> Self {
        set.recognized
            .iter()
            .map(|tag| tag.as_str().to_string())
            .chain(set.other)
            .collect()
    }
}

// ============================================================================
// Normalized entries
// ============================================================================

/// A validated entry with resolved instants and local wall-clock times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub start_utc: DateTime<Utc>,
    pub stop_utc: DateTime<Utc>,
    /// Start as local wall-clock time under the configured zone
    pub start_local: NaiveDateTime,
    /// Stop as local wall-clock time under the configured zone
    pub stop_local: NaiveDateTime,
    /// Strictly positive duration in seconds
    pub duration_seconds: i64,
    pub billable: bool,
    pub tags: TagSet,
}

impl NormalizedEntry {
    /// Local calendar date of the start instant
    pub fn date(&self) -> NaiveDate {
        self.start_local.date()
    }

    pub fn start_clock(&self) -> ClockTime {
        ClockTime::from_time(&self.start_local)
    }

    pub fn stop_clock(&self) -> ClockTime {
        ClockTime::from_time(&self.stop_local)
    }

    pub fn is_home_office(&self) -> bool {
        self.tags.is_home_office()
    }

    pub fn is_commuting(&self) -> bool {
        self.tags.is_commuting()
    }
}

// ============================================================================
// Clock time
// ============================================================================

/// Minutes since local midnight, in `[0, 1440)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    /// Create from minutes since midnight; `None` when out of range
    pub fn new(minutes: u16) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    /// Create from hour and minute; `None` when out of range
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour >= 24 || minute >= 60 {
            return None;
        }
        Some(Self((hour * 60 + minute) as u16))
    }

    /// Truncate a wall-clock time to whole minutes
    pub fn from_time<T: Timelike>(time: &T) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u32 {
        u32::from(self.0 / 60)
    }

    pub fn minute(self) -> u32 {
        u32::from(self.0 % 60)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MetricsError::ParseError(format!("invalid clock time '{s}', expected HH:MM"));
        let (hour, minute) = s.split_once(':').ok_or_else(invalid)?;
        let hour: u32 = hour.trim().parse().map_err(|_| invalid())?;
        let minute: u32 = minute.trim().parse().map_err(|_| invalid())?;
        ClockTime::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Render fractional minutes as `HH:MM`, truncating the fraction
pub fn format_minutes(minutes: f64) -> String {
    let whole = minutes.floor().clamp(0.0, f64::from(MINUTES_PER_DAY - 1)) as u16;
    ClockTime(whole).to_string()
}

/// Serde adapter for optional fractional minutes rendered as `HH:MM`
mod fractional_clock {
    use super::{format_minutes, ClockTime};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(minutes) => serializer.serialize_some(&format_minutes(*minutes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| {
                raw.parse::<ClockTime>()
                    .map(|clock| f64::from(clock.minutes()))
                    .map_err(de::Error::custom)
            })
            .transpose()
    }
}

// ============================================================================
// Results
// ============================================================================

/// Descriptive statistics over clock-time values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    /// Arithmetic mean in fractional minutes
    #[serde(default, with = "fractional_clock")]
    pub mean: Option<f64>,
    /// Median in fractional minutes
    #[serde(default, with = "fractional_clock")]
    pub median: Option<f64>,
    pub earliest: Option<ClockTime>,
    pub latest: Option<ClockTime>,
    pub count: usize,
}

impl StatSummary {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Hour-valued metric over a window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoursMetric {
    pub total: f64,
    /// `total` divided by `contributing_days` (0 when none)
    pub per_day_average: f64,
    /// Days with at least one contributing entry
    pub contributing_days: usize,
}

/// How often work started or ended late
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LateWorkFrequency {
    pub late_days: usize,
    pub total_days: usize,
    /// Rounded to one decimal
    pub percentage: f64,
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Aggregate metrics for one working-day window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowMetrics {
    /// Requested window size in working days
    pub window_days: usize,
    pub working_days_analyzed: usize,
    pub date_range: Option<DateRange>,
    pub total_entries: usize,
    pub billable_hours: HoursMetric,
    pub away_from_home_hours: HoursMetric,
    pub back_home: StatSummary,
    pub home_office_end: StatSummary,
    pub late_work: LateWorkFrequency,
}

/// Key used for a working-day window, e.g. `7WD`
pub fn window_label(days: usize) -> String {
    format!("{days}WD")
}

/// Per-day KPI record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyKpi {
    pub date: NaiveDate,
    pub billable_seconds: i64,
    pub away_seconds: i64,
    pub back_home: Option<ClockTime>,
    pub home_office_end: Option<ClockTime>,
    pub late_work: bool,
    pub total_entries: usize,
}

impl DailyKpi {
    pub fn billable_hours(&self) -> f64 {
        self.billable_seconds as f64 / 3600.0
    }

    pub fn away_hours(&self) -> f64 {
        self.away_seconds as f64 / 3600.0
    }
}

/// Trend direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Directional comparison of a recent value against a baseline value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// `recent - baseline`, in the metric's own unit (minutes or hours)
    pub difference: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_change: Option<f64>,
}

impl Trend {
    pub fn stable() -> Self {
        Self {
            direction: TrendDirection::Stable,
            difference: 0.0,
            percentage_change: None,
        }
    }
}

/// Trends of the recent window relative to the baseline window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub recent_window: usize,
    pub baseline_window: usize,
    pub threshold_minutes: u32,
    pub billable_hours_per_day: Trend,
    pub away_from_home_hours_per_day: Trend,
    pub back_home_mean: Trend,
    pub home_office_end_mean: Trend,
}

/// Counts from the normalization stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub total: usize,
    pub kept: usize,
    pub dropped_unparseable_start: usize,
    pub dropped_missing_stop: usize,
    pub dropped_non_positive_duration: usize,
}

impl NormalizationReport {
    pub fn dropped(&self) -> usize {
        self.dropped_unparseable_start + self.dropped_missing_stop + self.dropped_non_positive_duration
    }
}

/// Full result of a working-day analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub metadata: BatchMetadata,
    pub normalization: NormalizationReport,
    /// Window metrics keyed by label (`5WD`, `7WD`, ...)
    pub windows: BTreeMap<String, WindowMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trends: Option<TrendReport>,
}

// ============================================================================
// Multi-resolution types
// ============================================================================

/// Bucket granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Daily,
    Weekly,
    Monthly,
}

impl FromStr for Resolution {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(Resolution::Daily),
            "weekly" | "week" => Ok(Resolution::Weekly),
            "monthly" | "month" => Ok(Resolution::Monthly),
            other => Err(MetricsError::InvalidConfig(format!("unknown resolution '{other}'"))),
        }
    }
}

/// How hour metrics roll up inside a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    Sum,
    Mean,
}

impl FromStr for AggregationMode {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(AggregationMode::Sum),
            "mean" | "avg" | "average" => Ok(AggregationMode::Mean),
            other => Err(MetricsError::InvalidConfig(format!(
                "unknown aggregation mode '{other}'"
            ))),
        }
    }
}

/// Sum/mean/median over per-day hour values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoursSummary {
    pub sum: f64,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub count: usize,
}

/// Hour metric of a bucket with its mode-selected headline value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketHours {
    pub value: Option<f64>,
    #[serde(flatten)]
    pub summary: HoursSummary,
}

/// Aggregate metrics for one bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketMetrics {
    /// `YYYY-MM-DD`, `YYYY-Www` or `YYYY-MM`
    pub key: String,
    pub date_range: DateRange,
    pub working_days: usize,
    pub total_entries: usize,
    pub billable_hours: BucketHours,
    pub away_from_home_hours: BucketHours,
    pub back_home: StatSummary,
    pub home_office_end: StatSummary,
    pub late_work: LateWorkFrequency,
}

/// Trailing means aligned with the bucket list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningMeanSeries {
    /// Number of trailing buckets averaged
    pub window: usize,
    pub billable_hours: Vec<Option<f64>>,
    pub away_from_home_hours: Vec<Option<f64>>,
    pub back_home_minutes: Vec<Option<f64>>,
    pub home_office_end_minutes: Vec<Option<f64>>,
}

/// Bucketed series for charting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSeries {
    pub resolution: Resolution,
    pub mode: AggregationMode,
    pub metadata: BatchMetadata,
    /// Oldest bucket first
    pub buckets: Vec<BucketMetrics>,
    pub running_means: Vec<RunningMeanSeries>,
}

// ============================================================================
// Report envelope
// ============================================================================

/// Producer metadata stamped on every report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// A result wrapped with producer and timing metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport<T> {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub result: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_time_formatting() {
        let clock = ClockTime::from_hm(8, 5).unwrap();
        assert_eq!(clock.to_string(), "08:05");
        assert_eq!(clock.minutes(), 485);

        assert!(ClockTime::new(1440).is_none());
        assert!(ClockTime::from_hm(24, 0).is_none());
        assert_eq!("18:45".parse::<ClockTime>().unwrap().minutes(), 1125);
        assert!("1845".parse::<ClockTime>().is_err());
        assert!("18:60".parse::<ClockTime>().is_err());
    }

    #[test]
    fn test_format_minutes_truncates() {
        assert_eq!(format_minutes(1125.5), "18:45");
        assert_eq!(format_minutes(1125.99), "18:45");
        assert_eq!(format_minutes(0.0), "00:00");
    }

    #[test]
    fn test_tag_set_recognizes_closed_vocabulary() {
        let tags = TagSet::from_names(["Commuting", "ClientX", "homeoffice"]);
        assert!(tags.is_commuting());
        // Case-sensitive: "homeoffice" is just another tag
        assert!(!tags.is_home_office());
        assert_eq!(tags.other(), &["ClientX".to_string(), "homeoffice".to_string()]);
    }

    #[test]
    fn test_time_entry_deserialization() {
        let json = r#"{
            "id": 42,
            "start": "2024-01-15T08:00:00Z",
            "stop": "2024-01-15T09:00:00Z",
            "duration": 3600,
            "billable": true,
            "tags": null
        }"#;

        let entry: TimeEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, Some(42));
        assert_eq!(entry.duration, 3600);
        assert!(entry.billable);
        assert!(entry.tags.is_empty());
    }

    #[test]
    fn test_engine_input_accepts_raw_entries_and_metadata() {
        let json = r#"{
            "fetched_at": "2024-01-20T10:00:00",
            "workspace_name": "Acme",
            "workspace_id": 123,
            "total_entries": 1,
            "raw_entries": [
                {"start": "2024-01-15T08:00:00Z", "stop": "2024-01-15T09:00:00Z", "duration": 3600}
            ]
        }"#;

        let input: EngineInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.entries.len(), 1);
        assert_eq!(input.metadata.workspace_name.as_deref(), Some("Acme"));
        assert_eq!(input.metadata.total_entries, Some(1));
    }

    #[test]
    fn test_empty_stat_summary_serializes_nulls() {
        let json = serde_json::to_value(StatSummary::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "mean": null,
                "median": null,
                "earliest": null,
                "latest": null,
                "count": 0
            })
        );
    }

    #[test]
    fn test_trend_direction_serialization() {
        let json = serde_json::to_string(&TrendDirection::Stable).unwrap();
        assert_eq!(json, "\"stable\"");
    }

    #[test]
    fn test_resolution_parsing() {
        assert_eq!("weekly".parse::<Resolution>().unwrap(), Resolution::Weekly);
        assert_eq!("Mean".parse::<AggregationMode>().unwrap(), AggregationMode::Mean);
        assert!("hourly".parse::<Resolution>().is_err());
    }
}
