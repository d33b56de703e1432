//! Error types for Worktrace

use thiserror::Error;

/// Errors raised at the boundaries of the metrics engine.
///
/// The engine core is total: malformed entries are dropped during
/// normalization and empty statistics come back as explicit empty summaries.
/// These variants only cover input decoding, configuration and encoding.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to parse entry batch: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
