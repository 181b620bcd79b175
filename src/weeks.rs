//! Week segmentation and per-window label totals.
//!
//! Weeks are 7-day buckets counted backwards from an end date: the 7 days
//! ending at the end date are "this week", the 7 before that "last week".
//! Last week only counts when the loaded range covers all 7 of its days, so
//! callers never compare against a partial week. Covered days without
//! records count as zero.

use crate::error::MetricsError;
use crate::models::*;
use crate::summary::sum_label;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;

const DAYS_PER_WEEK: i64 = 7;

/// Split `days` into weeks ending at `last_date`, most recent week first.
///
/// Each week is in chronological order. Days after `last_date` are dropped;
/// weeks with no days between sparse records stay in place as empty buckets.
pub fn segment_days_by_weeks(
    days: &[DayOfMetricData],
    last_date: NaiveDate,
) -> Vec<Vec<DayOfMetricData>> {
    let mut weeks: Vec<Vec<DayOfMetricData>> = Vec::new();
    for day in days {
        let offset = (last_date - day.date).num_days();
        if offset < 0 {
            continue;
        }
        let index = (offset / DAYS_PER_WEEK) as usize;
        if weeks.len() <= index {
            weeks.resize_with(index + 1, Vec::new);
        }
        weeks[index].push(day.clone());
    }
    for week in &mut weeks {
        week.sort_by_key(|d| d.date);
    }
    weeks
}

/// Every label seen for `field` across `days`, [`UNLABELED`] last.
pub fn unique_labels(days: &[DayOfMetricData], field: &str) -> Vec<String> {
    let labels: BTreeSet<&str> = days.iter().flat_map(|d| d.labels(field)).collect();
    let mut labels: Vec<String> = labels.into_iter().map(str::to_string).collect();
    labels.sort_by(|a, b| compare_labels(a, b));
    labels
}

/// Total per label for `field` over `days`.
pub fn summarize_days(
    days: &[DayOfMetricData],
    field: &str,
) -> Result<MetricsSummary, MetricsError> {
    let mut summary = MetricsSummary::new();
    for label in unique_labels(days, field) {
        if let Some(total) = sum_label(days, field, &label)? {
            summary.insert(label, total);
        }
    }
    Ok(summary)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekSummary {
    pub range: DateRange,
    /// Number of days with records inside `range`
    pub days: usize,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub summary: MetricsSummary,
}

impl WeekSummary {
    /// `"M/D - M/D"` of the week's days inside the loaded range.
    pub fn period(&self) -> String {
        format_period(self.first_day, self.last_day)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummaries {
    pub this_week: WeekSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_week: Option<WeekSummary>,
}

/// Totals for this week and, when `range` covers it, last week.
///
/// Weeks end at `range.end()`. Returns `None` when no day falls into this week.
pub fn summarize_weeks(
    days: &[DayOfMetricData],
    range: &DateRange,
    field: &str,
) -> Result<Option<WeeklySummaries>, MetricsError> {
    let end = range.end();
    let weeks = segment_days_by_weeks(days, end);

    let this_week = match weeks.first() {
        Some(week) if !week.is_empty() => week_summary(week, end, range, field)?,
        _ => return Ok(None),
    };

    let last_week_end = end - Duration::days(DAYS_PER_WEEK);
    let last_week_start = last_week_end - Duration::days(DAYS_PER_WEEK - 1);
    let last_week = if range.start() <= last_week_start {
        let week = weeks.get(1).map(Vec::as_slice).unwrap_or_default();
        Some(week_summary(week, last_week_end, range, field)?)
    } else {
        None
    };

    Ok(Some(WeeklySummaries { this_week, last_week }))
}

fn week_summary(
    week: &[DayOfMetricData],
    end: NaiveDate,
    loaded: &DateRange,
    field: &str,
) -> Result<WeekSummary, MetricsError> {
    let range = DateRange::ending_at(end, DAYS_PER_WEEK as u32);
    Ok(WeekSummary {
        range,
        days: week.len(),
        first_day: range.start().max(loaded.start()),
        last_day: end,
        summary: summarize_days(week, field)?,
    })
}

/// `"M/D - M/D"` for the first and last of `days`.
pub fn format_date_range_of_days(days: &[DayOfMetricData]) -> Option<String> {
    let first = days.first()?;
    let last = days.last()?;
    Some(format_period(first.date, last.date))
}

fn format_period(first: NaiveDate, last: NaiveDate) -> String {
    format!("{} - {}", first.format("%-m/%-d"), last.format("%-m/%-d"))
}
