//! worktrace - Working-day metrics engine for time-tracking data
//!
//! worktrace turns raw time-tracking entries into working-day KPIs through a
//! deterministic pipeline: entry normalization → working-day selection → day
//! classification → metric aggregation → trend comparison.
//!
//! ## Modules
//!
//! - **Window metrics**: billable and away-from-home hours, back-home and
//!   home-office-end time statistics, late-work frequency over the last N
//!   working days, with recent-vs-baseline trends
//! - **Bucketed series**: the same metrics rolled up per day, ISO week or
//!   month, with trailing running means

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod resolution;
pub mod selector;
pub mod stats;
pub mod trend;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

#[cfg(test)]
mod test_support;

pub use config::{BackHomePolicy, EngineConfig, ZonePolicy};
pub use encoder::ReportEncoder;
pub use error::MetricsError;
pub use pipeline::{
    entries_to_buckets, entries_to_metrics, entries_to_metrics_with_config, parse_batch, MetricsEngine,
};
pub use types::{
    AggregationMode, BucketSeries, DailyKpi, EngineInput, MetricsReport, MetricsResult, Resolution,
    TimeEntry, WindowMetrics,
};

/// Library version embedded in all reports
pub const WORKTRACE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "worktrace";
