//! Fixture builders shared by the unit tests

use chrono::{NaiveDate, TimeZone, Utc};

use crate::types::{NormalizedEntry, TagSet, TimeEntry};

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A UTC entry on `day` running from `start` to `stop` (hour, minute)
pub fn entry(
    day: NaiveDate,
    start: (u32, u32),
    stop: (u32, u32),
    tags: &[&str],
    billable: bool,
) -> NormalizedEntry {
    let start_local = day.and_hms_opt(start.0, start.1, 0).unwrap();
    let stop_local = day.and_hms_opt(stop.0, stop.1, 0).unwrap();
    NormalizedEntry {
        id: None,
        start_utc: Utc.from_utc_datetime(&start_local),
        stop_utc: Utc.from_utc_datetime(&stop_local),
        start_local,
        stop_local,
        duration_seconds: (stop_local - start_local).num_seconds(),
        billable,
        tags: TagSet::from_names(tags),
    }
}

/// Raw provider entry with Zulu timestamps
pub fn raw_entry(day: NaiveDate, start: (u32, u32), stop: (u32, u32), tags: &[&str], billable: bool) -> TimeEntry {
    let start_local = day.and_hms_opt(start.0, start.1, 0).unwrap();
    let stop_local = day.and_hms_opt(stop.0, stop.1, 0).unwrap();
    TimeEntry {
        id: None,
        description: None,
        start: Some(format!("{}Z", start_local.format("%Y-%m-%dT%H:%M:%S"))),
        stop: Some(format!("{}Z", stop_local.format("%Y-%m-%dT%H:%M:%S"))),
        duration: (stop_local - start_local).num_seconds(),
        billable,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}
