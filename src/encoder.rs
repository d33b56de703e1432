//! Report encoding
//!
//! Wraps engine results in a [`MetricsReport`] envelope carrying producer
//! metadata and the computation timestamp. The engine results themselves stay
//! free of wall-clock and random values.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::MetricsError;
use crate::types::{MetricsReport, ReportProducer};
use crate::{PRODUCER_NAME, WORKTRACE_VERSION};

/// Current report envelope version
pub const REPORT_VERSION: &str = "1.0.0";

/// Encoder producing report envelopes
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Wrap a result in a report envelope
    pub fn encode<T>(&self, result: T) -> MetricsReport<T> {
        MetricsReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: WORKTRACE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            result,
        }
    }

    /// Encode to pretty-printed JSON
    pub fn encode_to_json<T: Serialize>(&self, result: T) -> Result<String, MetricsError> {
        let report = self.encode(result);
        serde_json::to_string_pretty(&report).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }
}
