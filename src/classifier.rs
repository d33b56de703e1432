//! Day classification
//!
//! Two independent tag-based rules evaluated per working day:
//! - back-home: when the day's last commute ended
//! - home-office end: when a pure home-office day's work ended

use serde::{Deserialize, Serialize};

use crate::config::BackHomePolicy;
use crate::selector::WorkingDay;
use crate::types::{ClockTime, NormalizedEntry};

/// Outcome of the home-office-end rules, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict", content = "end")]
pub enum HomeOfficeVerdict {
    /// Pure home-office day ending at the given time
    Qualifies(ClockTime),
    /// No entry tagged HomeOffice
    NoHomeOffice,
    /// Home-office work started after the last commute ended
    HomeOfficeAfterCommute,
    /// Non-home-office work started after home-office work ended
    MixedDay,
    /// The day's final entry is not home-office work
    LastEntryNotHomeOffice,
}

impl HomeOfficeVerdict {
    pub fn end_time(self) -> Option<ClockTime> {
        match self {
            HomeOfficeVerdict::Qualifies(end) => Some(end),
            _ => None,
        }
    }
}

/// Classifier for per-day tag rules
pub struct DayClassifier;

impl DayClassifier {
    /// Back-home time of a day.
    ///
    /// The end of the latest-starting commuting entry. Home-office entries
    /// after that commute are work resumed at home and do not move it.
    pub fn back_home(day: &WorkingDay<'_>, policy: BackHomePolicy) -> Option<ClockTime> {
        if let Some(commute) = last_commute(&day.entries) {
            return Some(commute.stop_clock());
        }

        match policy {
            BackHomePolicy::CommuteOnly => None,
            BackHomePolicy::LastEntryFallback => day.entries.last().map(|e| e.stop_clock()),
        }
    }

    /// Home-office end time, when the day is a pure home-office day
    pub fn home_office_end(day: &WorkingDay<'_>) -> Option<ClockTime> {
        Self::classify_home_office(day).end_time()
    }

    /// Evaluate the home-office rules; the first failing rule decides
    pub fn classify_home_office(day: &WorkingDay<'_>) -> HomeOfficeVerdict {
        let Some(last_home) = day.entries.iter().rev().find(|e| e.is_home_office()) else {
            return HomeOfficeVerdict::NoHomeOffice;
        };

        if let Some(commute) = last_commute(&day.entries) {
            if last_home.start_utc > commute.stop_utc {
                return HomeOfficeVerdict::HomeOfficeAfterCommute;
            }
        }

        let mixed = day
            .entries
            .iter()
            .any(|e| !e.is_home_office() && e.start_utc > last_home.stop_utc);
        if mixed {
            return HomeOfficeVerdict::MixedDay;
        }

        match day.entries.last() {
            Some(last) if last.is_home_office() => HomeOfficeVerdict::Qualifies(last_home.stop_clock()),
            _ => HomeOfficeVerdict::LastEntryNotHomeOffice,
        }
    }
}

/// Latest-starting commuting entry; `entries` must be sorted by start
fn last_commute<'a>(entries: &[&'a NormalizedEntry]) -> Option<&'a NormalizedEntry> {
    entries.iter().rev().find(|e| e.is_commuting()).copied()
}
