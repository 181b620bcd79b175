//! Timeline file parsing
//!
//! Accepted inputs:
//! - a JSON document `{"days": [...]}` of day records
//! - a JSON document `{"trips": [...]}` of trip records
//! - JSON Lines, one trip per line; malformed lines are skipped with a warning

use crate::models::*;
use crate::timeline::{days_from_trips, TripRecord};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;
use tracing::{debug, warn};

/// Parsed contents of a timeline file.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineInput {
    Days(Vec<DayRecord>),
    Trips(Vec<TripRecord>),
}

impl TimelineInput {
    /// Day records, grouping trips by the fields in `metric_list`.
    pub fn into_days(self, metric_list: &MetricList) -> Vec<DayRecord> {
        match self {
            TimelineInput::Days(days) => days,
            TimelineInput::Trips(trips) => days_from_trips(&trips, metric_list),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TimelineInput::Days(days) => days.len(),
            TimelineInput::Trips(trips) => trips.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Deserialize)]
struct TimelineDocument {
    #[serde(default)]
    days: Option<Vec<DayRecord>>,
    #[serde(default)]
    trips: Option<Vec<TripRecord>>,
}

#[derive(Debug, Default)]
pub struct TimelineParser;

impl TimelineParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_file(&self, path: &Path) -> Result<TimelineInput> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read timeline file: {}", path.display()))?;
        let input = self
            .parse_str(&content)
            .with_context(|| format!("Failed to parse timeline file: {}", path.display()))?;
        debug!(path = %path.display(), records = input.len(), "Parsed timeline file");
        Ok(input)
    }

    pub fn parse_str(&self, content: &str) -> Result<TimelineInput> {
        if let Ok(doc) = serde_json::from_str::<TimelineDocument>(content) {
            match (doc.days, doc.trips) {
                (Some(days), None) => return Ok(TimelineInput::Days(days)),
                (None, Some(trips)) => return Ok(TimelineInput::Trips(trips)),
                (Some(_), Some(_)) => {
                    return Err(anyhow::anyhow!("Timeline document has both 'days' and 'trips'"));
                }
                (None, None) => {}
            }
        }
        let trips = self.parse_jsonl(Cursor::new(content))?;
        Ok(TimelineInput::Trips(trips))
    }

    /// One trip per line; blank lines are ignored.
    pub fn parse_jsonl<R: BufRead>(&self, reader: R) -> Result<Vec<TripRecord>> {
        let mut trips = Vec::new();
        let mut skipped = 0usize;

        for (index, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read line")?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<TripRecord>(line) {
                Ok(trip) => trips.push(trip),
                Err(e) => {
                    skipped += 1;
                    warn!(line_number = index + 1, error = %e, "Skipping malformed trip line");
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, parsed = trips.len(), "Some trip lines could not be parsed");
        }
        Ok(trips)
    }

    pub fn parse_jsonl_file(&self, path: &Path) -> Result<Vec<TripRecord>> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        self.parse_jsonl(BufReader::new(file))
    }

    /// Aggregate metrics saved from the study server.
    pub fn parse_metrics_file(&self, path: &Path) -> Result<MetricsData> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read metrics file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse metrics file: {}", path.display()))
    }
}
