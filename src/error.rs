//! Error types and the error-display side channel.
//!
//! Library functions return [`MetricsError`]. Callers that must never fail
//! (dashboard sections, the aggregate fetch) hand errors to an [`ErrorSink`]
//! and carry on with "no data" for the affected section.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("label '{label}' in {field} mixes scalar and breakdown values")]
    MixedValueShapes { field: String, label: String },

    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("invalid metrics payload: {0}")]
    Payload(String),

    #[error("no server configured for aggregate metrics")]
    NoServer,

    #[cfg(feature = "remote")]
    #[error("aggregate metrics request failed: {0}")]
    Remote(#[from] reqwest::Error),
}

/// Receives errors that should be shown to the user without interrupting
/// the computation that produced them.
pub trait ErrorSink {
    fn display_error(&self, title: &str, error: &MetricsError);
}

/// Reports errors through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn display_error(&self, title: &str, error: &MetricsError) {
        error!(error = %error, "{}", title);
    }
}
