//! Entry normalization
//!
//! Turns raw provider entries into [`NormalizedEntry`] values:
//! - timestamps parsed into UTC instants and local wall-clock times
//! - running entries and non-positive durations dropped
//! - tags mapped onto the closed [`TagSet`](crate::types::TagSet) vocabulary
//!
//! Malformed entries never fail the batch; they are counted and skipped.

use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;

use crate::config::ZonePolicy;
use crate::types::{NormalizationReport, NormalizedEntry, TagSet, TimeEntry};

/// Wall-clock layouts accepted for timestamps without an offset
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Normalizer for raw time entries
pub struct EntryNormalizer;

impl EntryNormalizer {
    /// Normalize entries, discarding the drop counts
    pub fn normalize(entries: &[TimeEntry], zone: &ZonePolicy) -> Vec<NormalizedEntry> {
        Self::normalize_with_report(entries, zone).0
    }

    /// Normalize entries and report why any were dropped
    pub fn normalize_with_report(
        entries: &[TimeEntry],
        zone: &ZonePolicy,
    ) -> (Vec<NormalizedEntry>, NormalizationReport) {
        let mut report = NormalizationReport {
            total: entries.len(),
            ..Default::default()
        };
        let mut normalized = Vec::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            let Some(start_utc) = entry.start.as_deref().and_then(|start| parse_instant(start, zone)) else {
                debug!("dropping entry #{index}: missing or unparseable start {:?}", entry.start);
                report.dropped_unparseable_start += 1;
                continue;
            };

            let Some(stop_utc) = entry.stop.as_deref().and_then(|stop| parse_instant(stop, zone)) else {
                debug!("dropping entry #{index}: missing or unparseable stop");
                report.dropped_missing_stop += 1;
                continue;
            };

            if entry.duration <= 0 {
                debug!("dropping entry #{index}: non-positive duration {}", entry.duration);
                report.dropped_non_positive_duration += 1;
                continue;
            }

            normalized.push(NormalizedEntry {
                id: entry.id,
                start_utc,
                stop_utc,
                start_local: zone.to_local(&start_utc),
                stop_local: zone.to_local(&stop_utc),
                duration_seconds: entry.duration,
                billable: entry.billable,
                tags: TagSet::from_names(&entry.tags),
            });
        }

        report.kept = normalized.len();
        debug!(
            "normalized {} of {} entries ({} dropped)",
            report.kept,
            report.total,
            report.dropped()
        );

        (normalized, report)
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Offset-qualified values (including `Z`) are exact instants. Values without
/// an offset are wall-clock times already expressed in `zone`.
pub fn parse_instant(raw: &str, zone: &ZonePolicy) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .and_then(|local| zone.from_local(&local))
}
