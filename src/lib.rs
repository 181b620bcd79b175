//! Trip Metrics Library
//!
//! The computation behind a travel diary's metrics dashboard. A window of
//! daily trip records goes in; per-label totals, weekly comparisons, carbon
//! footprint ranges, active-minute summaries and chart records come out.
//!
//! ## Architecture Overview
//!
//! - [`models`] - Metric names, label values, day records and date ranges
//! - [`timeline`] - Trip records, day grouping and the loaded window
//! - [`summary`] - Per-day summaries for every requested metric and field
//! - [`weeks`] - Week segmentation and per-window totals
//! - [`footprint`] - Emission factors and kg CO₂ ranges
//! - [`carbon`] - Footprint card text for user and group data
//! - [`active`] - Minutes on walking and cycling
//! - [`chart`] - Chart records and mode colors
//! - [`units`] - Unit conversion and number formatting
//! - [`aggregate`] - Aggregate metrics from the study server
//! - [`dashboard`] - Section assembly with per-section error isolation
//! - [`config`] - Configuration with file and environment support
//! - [`logging`] - Structured logging with JSON and pretty formats
//!
//! All computation is pure: functions take their configuration and lookups as
//! arguments and return fresh values.
//!
//! ```rust
//! use trip_metrics::footprint::{EmissionFactors, FootprintRange};
//! use trip_metrics::models::*;
//! use trip_metrics::summary::{generate_summaries, SummaryOptions};
//! use trip_metrics::weeks::summarize_weeks;
//!
//! # fn example() -> Result<(), trip_metrics::error::MetricsError> {
//! let start = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
//! let days: Vec<DayRecord> = start
//!     .iter_days()
//!     .take(7)
//!     .map(|d| {
//!         DayRecord::new(d).with_value(MetricName::Distance, "mode_confirm", "WALKING", 1000.0)
//!     })
//!     .collect();
//!
//! let data = generate_summaries(&default_metric_list(), &days, &SummaryOptions::default(), None)?;
//! let distance = data.days(MetricName::Distance).unwrap_or_default();
//! let range = DateRange::new(start, start + chrono::Duration::days(6))?;
//! if let Some(weekly) = summarize_weeks(distance, &range, "mode_confirm")? {
//!     let factors = EmissionFactors::default();
//!     let footprint = FootprintRange::for_summary(&weekly.this_week.summary, &factors);
//!     println!("{}", footprint.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod active;
pub mod aggregate;
pub mod analyzer;
pub mod carbon;
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod display;
pub mod error;
pub mod footprint;
pub mod logging;
pub mod models;
pub mod parser;
pub mod summary;
pub mod timeline;
pub mod units;
pub mod weeks;

pub use analyzer::DashboardAnalyzer;
pub use error::{ErrorSink, MetricsError};
pub use models::*;
