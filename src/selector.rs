//! Working-day selection
//!
//! A working day is a local calendar date holding at least one valid entry.
//! Windows are counted in working days, not calendar days, so weekends and
//! holidays without activity never dilute a window.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::{DateRange, NormalizedEntry};

/// A working day and its entries, sorted by start
#[derive(Debug, Clone)]
pub struct WorkingDay<'a> {
    pub date: NaiveDate,
    pub entries: Vec<&'a NormalizedEntry>,
}

/// The most recent `N` working days
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDayWindow {
    /// Most recent first
    pub dates: Vec<NaiveDate>,
    pub date_range: Option<DateRange>,
}

impl WorkingDayWindow {
    pub fn working_days_analyzed(&self) -> usize {
        self.dates.len()
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        self.date_range
            .map(|range| range.start <= *date && *date <= range.end)
            .unwrap_or(false)
    }
}

/// Selects working days and working-day windows
pub struct WorkingDaySelector;

impl WorkingDaySelector {
    /// Distinct working days, most recent first
    pub fn working_days(entries: &[NormalizedEntry]) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = entries.iter().map(NormalizedEntry::date).collect();
        dates.sort_unstable();
        dates.dedup();
        dates.reverse();
        dates
    }

    /// The most recent `window_days` working days.
    ///
    /// Returns every working day when fewer exist; never pads.
    pub fn select(entries: &[NormalizedEntry], window_days: usize) -> WorkingDayWindow {
        Self::select_from_dates(&Self::working_days(entries), window_days)
    }

    /// Slice a most-recent-first date list
    pub fn select_from_dates(dates: &[NaiveDate], window_days: usize) -> WorkingDayWindow {
        let dates: Vec<NaiveDate> = dates.iter().take(window_days).copied().collect();
        let date_range = match (dates.last(), dates.first()) {
            (Some(&start), Some(&end)) => Some(DateRange { start, end }),
            _ => None,
        };
        WorkingDayWindow { dates, date_range }
    }

    /// Group entries by local date, oldest day first, entries ordered by start
    pub fn group_by_day(entries: &[NormalizedEntry]) -> Vec<WorkingDay<'_>> {
        let mut by_date: BTreeMap<NaiveDate, Vec<&NormalizedEntry>> = BTreeMap::new();
        for entry in entries {
            by_date.entry(entry.date()).or_default().push(entry);
        }

        by_date
            .into_iter()
            .map(|(date, mut day_entries)| {
                day_entries.sort_by_key(|e| (e.start_utc, e.stop_utc));
                WorkingDay {
                    date,
                    entries: day_entries,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TagSet;
    use chrono::{Duration, TimeZone, Utc};

    fn entry_on(day: u32, hour: u32) -> NormalizedEntry {
        let start = Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap();
        let stop = start + Duration::hours(1);
        NormalizedEntry {
            id: None,
            start_utc: start,
            stop_utc: stop,
            start_local: start.naive_utc(),
            stop_local: stop.naive_utc(),
            duration_seconds: 3600,
            billable: false,
            tags: TagSet::default(),
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_working_days_are_distinct_and_descending() {
        let entries = vec![entry_on(4, 9), entry_on(1, 9), entry_on(4, 14), entry_on(6, 9)];
        let days = WorkingDaySelector::working_days(&entries);
        assert_eq!(days, vec![date(6), date(4), date(1)]);
    }

    #[test]
    fn test_select_skips_calendar_gaps() {
        // Entries on the 1st, 4th, 5th, 6th and 8th; the 7th is empty
        let entries: Vec<_> = [1, 4, 5, 6, 8].iter().map(|&d| entry_on(d, 9)).collect();
        let window = WorkingDaySelector::select(&entries, 3);

        assert_eq!(window.dates, vec![date(8), date(6), date(5)]);
        assert_eq!(window.working_days_analyzed(), 3);
        assert_eq!(
            window.date_range,
            Some(DateRange {
                start: date(5),
                end: date(8)
            })
        );
    }

    #[test]
    fn test_select_returns_all_when_short() {
        let entries = vec![entry_on(1, 9), entry_on(2, 9)];
        let window = WorkingDaySelector::select(&entries, 30);
        assert_eq!(window.working_days_analyzed(), 2);
    }

    #[test]
    fn test_select_empty() {
        let window = WorkingDaySelector::select(&[], 7);
        assert!(window.dates.is_empty());
        assert!(window.date_range.is_none());
        assert!(!window.contains(&date(1)));
    }

    #[test]
    fn test_smaller_window_is_prefix_of_larger() {
        let entries: Vec<_> = (1..=20).map(|d| entry_on(d, 9)).collect();
        let short = WorkingDaySelector::select(&entries, 5);
        let long = WorkingDaySelector::select(&entries, 10);
        assert_eq!(short.dates[..], long.dates[..5]);
    }

    #[test]
    fn test_group_by_day_sorts_entries() {
        let entries = vec![entry_on(2, 15), entry_on(1, 9), entry_on(2, 8)];
        let days = WorkingDaySelector::group_by_day(&entries);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date(1));
        assert_eq!(days[1].entries[0].start_utc.format("%H").to_string(), "08");
        assert_eq!(days[1].entries[1].start_utc.format("%H").to_string(), "15");
    }
}
