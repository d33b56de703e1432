//! Engine configuration
//!
//! Every tunable the engine reads lives here and is passed explicitly into
//! each call; the engine keeps no state between invocations.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::MetricsError;

/// Working-day windows computed by default
pub const DEFAULT_WINDOWS: [usize; 4] = [5, 7, 10, 30];

/// Recent side of the default trend comparison
pub const DEFAULT_RECENT_WINDOW: usize = 7;

/// Baseline side of the default trend comparison
pub const DEFAULT_BASELINE_WINDOW: usize = 30;

/// Local hour at or after which activity counts as late work (20:00)
pub const DEFAULT_LATE_HOUR: u32 = 20;

/// Differences at or below this many minutes read as stable
pub const DEFAULT_TREND_THRESHOLD_MINUTES: u32 = 15;

/// Trailing bucket counts for running means
pub const DEFAULT_RUNNING_MEAN_WINDOWS: [usize; 3] = [7, 30, 90];

/// How local wall-clock time is derived from entry instants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ZonePolicy {
    #[default]
    Utc,
    Fixed(FixedOffset),
    Named(Tz),
}

impl ZonePolicy {
    /// Convert an instant to local wall-clock time
    pub fn to_local(&self, instant: &DateTime<Utc>) -> NaiveDateTime {
        match self {
            ZonePolicy::Utc => instant.naive_utc(),
            ZonePolicy::Fixed(offset) => instant.with_timezone(offset).naive_local(),
            ZonePolicy::Named(tz) => instant.with_timezone(tz).naive_local(),
        }
    }

    /// Interpret a wall-clock time in this zone.
    ///
    /// Ambiguous times (DST fall-back) resolve to the earlier instant;
    /// times skipped by a DST jump do not exist and yield `None`.
    pub fn from_local(&self, local: &NaiveDateTime) -> Option<DateTime<Utc>> {
        let resolved = match self {
            ZonePolicy::Utc => return Some(Utc.from_utc_datetime(local)),
            ZonePolicy::Fixed(offset) => offset.from_local_datetime(local).map(|dt| dt.with_timezone(&Utc)),
            ZonePolicy::Named(tz) => tz.from_local_datetime(local).map(|dt| dt.with_timezone(&Utc)),
        };
        match resolved {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => None,
        }
    }
}

impl FromStr for ZonePolicy {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
            return Ok(ZonePolicy::Utc);
        }
        if trimmed.starts_with('+') || trimmed.starts_with('-') {
            return parse_fixed_offset(trimmed)
                .map(ZonePolicy::Fixed)
                .ok_or_else(|| MetricsError::InvalidTimezone(trimmed.to_string()));
        }
        trimmed
            .parse::<Tz>()
            .map(ZonePolicy::Named)
            .map_err(|_| MetricsError::InvalidTimezone(trimmed.to_string()))
    }
}

/// Parse `+HH:MM`, `-HH:MM` or `+HHMM`
fn parse_fixed_offset(raw: &str) -> Option<FixedOffset> {
    let sign = if raw.starts_with('-') { -1 } else { 1 };
    let digits: String = raw[1..].chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl fmt::Display for ZonePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZonePolicy::Utc => f.write_str("UTC"),
            ZonePolicy::Fixed(offset) => write!(f, "{offset}"),
            ZonePolicy::Named(tz) => f.write_str(tz.name()),
        }
    }
}

impl TryFrom<String> for ZonePolicy {
    type Error = MetricsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ZonePolicy> for String {
    fn from(policy: ZonePolicy) -> Self {
        policy.to_string()
    }
}

/// Back-home rule for days without a commuting entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackHomePolicy {
    /// Days without a commute contribute no back-home value
    #[default]
    CommuteOnly,
    /// Days without a commute use the end of their latest-starting entry
    LastEntryFallback,
}

/// Parameters of the metrics engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Working-day window sizes to compute
    pub windows: Vec<usize>,
    /// Recent window of the trend comparison
    pub recent_window: usize,
    /// Baseline window of the trend comparison
    pub baseline_window: usize,
    /// Local hour (0-23) at or after which activity is late
    pub late_hour: u32,
    /// Stability threshold for trends, in minutes
    pub trend_threshold_minutes: u32,
    /// Zone used for local dates and times of day
    pub zone: ZonePolicy,
    pub back_home_policy: BackHomePolicy,
    /// Trailing bucket counts for running means
    pub running_mean_windows: Vec<usize>,
    /// Omit windows that have fewer working days than requested
    pub require_full_windows: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            windows: DEFAULT_WINDOWS.to_vec(),
            recent_window: DEFAULT_RECENT_WINDOW,
            baseline_window: DEFAULT_BASELINE_WINDOW,
            late_hour: DEFAULT_LATE_HOUR,
            trend_threshold_minutes: DEFAULT_TREND_THRESHOLD_MINUTES,
            zone: ZonePolicy::Utc,
            back_home_policy: BackHomePolicy::CommuteOnly,
            running_mean_windows: DEFAULT_RUNNING_MEAN_WINDOWS.to_vec(),
            require_full_windows: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, MetricsError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn with_zone(mut self, zone: ZonePolicy) -> Self {
        self.zone = zone;
        self
    }

    pub fn with_late_hour(mut self, late_hour: u32) -> Self {
        self.late_hour = late_hour;
        self
    }

    pub fn with_trend_threshold(mut self, minutes: u32) -> Self {
        self.trend_threshold_minutes = minutes;
        self
    }

    pub fn with_back_home_policy(mut self, policy: BackHomePolicy) -> Self {
        self.back_home_policy = policy;
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), MetricsError> {
        if self.windows.iter().any(|&w| w == 0) {
            return Err(MetricsError::InvalidConfig(
                "window sizes must be positive".to_string(),
            ));
        }
        if self.recent_window == 0 || self.baseline_window == 0 {
            return Err(MetricsError::InvalidConfig(
                "trend windows must be positive".to_string(),
            ));
        }
        if self.late_hour >= 24 {
            return Err(MetricsError::InvalidConfig(format!(
                "late_hour must be within 0-23, got {}",
                self.late_hour
            )));
        }
        if self.running_mean_windows.iter().any(|&w| w == 0) {
            return Err(MetricsError::InvalidConfig(
                "running mean windows must be positive".to_string(),
            ));
        }
        if self.recent_window >= self.baseline_window {
            warn!(
                "recent window ({}) is not shorter than baseline window ({})",
                self.recent_window, self.baseline_window
            );
        }
        Ok(())
    }

    /// Requested windows plus the trend pair, deduplicated and ascending
    pub fn all_windows(&self) -> Vec<usize> {
        let mut windows = self.windows.clone();
        windows.push(self.recent_window);
        windows.push(self.baseline_window);
        windows.sort_unstable();
        windows.dedup();
        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.late_hour, 20);
        assert_eq!(config.trend_threshold_minutes, 15);
        assert_eq!(config.all_windows(), vec![5, 7, 10, 30]);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = EngineConfig::from_json(r#"{"late_hour": 21, "zone": "Europe/Zurich"}"#).unwrap();
        assert_eq!(config.late_hour, 21);
        assert_eq!(config.zone, ZonePolicy::Named(chrono_tz::Europe::Zurich));
        assert_eq!(config.windows, DEFAULT_WINDOWS.to_vec());
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(EngineConfig::from_json(r#"{"late_hour": 24}"#).is_err());
        assert!(EngineConfig::from_json(r#"{"windows": [7, 0]}"#).is_err());
        assert!(EngineConfig::from_json(r#"{"zone": "Mars/Olympus"}"#).is_err());
    }

    #[test]
    fn test_zone_policy_parsing() {
        assert_eq!("UTC".parse::<ZonePolicy>().unwrap(), ZonePolicy::Utc);
        assert_eq!(
            "+02:00".parse::<ZonePolicy>().unwrap(),
            ZonePolicy::Fixed(FixedOffset::east_opt(7200).unwrap())
        );
        assert_eq!(
            "-0530".parse::<ZonePolicy>().unwrap(),
            ZonePolicy::Fixed(FixedOffset::west_opt(19800).unwrap())
        );
        assert!("+25:00".parse::<ZonePolicy>().is_err());
    }

    #[test]
    fn test_zone_policy_round_trips_through_string() {
        let json = serde_json::to_string(&ZonePolicy::Named(chrono_tz::Europe::Zurich)).unwrap();
        assert_eq!(json, "\"Europe/Zurich\"");
        let parsed: ZonePolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ZonePolicy::Named(chrono_tz::Europe::Zurich));
    }

    #[test]
    fn test_named_zone_conversion() {
        let zone = ZonePolicy::Named(chrono_tz::Europe::Zurich);
        // Summer time: UTC+2
        let instant = Utc.with_ymd_and_hms(2024, 7, 1, 16, 30, 0).unwrap();
        assert_eq!(zone.to_local(&instant).hour(), 18);

        // 02:30 on the spring-forward night does not exist in Zurich
        let skipped = NaiveDate::from_ymd_opt(2024, 3, 31)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        assert!(zone.from_local(&skipped).is_none());
    }
}
