//! Trip timeline: raw trips, per-day records, and the window the dashboard loads.
//!
//! ## Loading Rule
//!
//! Comparing "past week" with "previous week" needs two weeks of data, so the
//! dashboard asks its [`TimelineProvider`] for [`N_DAYS_TO_LOAD`] days before
//! computing anything. If the provider cannot go further back, the dashboard
//! continues with what it has.

use crate::error::MetricsError;
use crate::models::*;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// 2 weeks of data is needed to compare "past week" with "previous week".
pub const N_DAYS_TO_LOAD: u32 = 14;

/// One trip as recorded on the phone, with any labels the user confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub id: String,
    pub start_ts: i64,
    /// Local calendar date the trip started on
    pub date: NaiveDate,
    /// Metres
    #[serde(default)]
    pub distance: f64,
    /// Seconds
    #[serde(default)]
    pub duration: f64,
    /// grouping field -> confirmed label
    #[serde(default)]
    pub user_input: BTreeMap<String, String>,
    #[serde(default)]
    pub survey_responded: Option<bool>,
}

/// Group trips into one [`DayRecord`] per date.
///
/// Every trip counts under each grouping field in `metric_list`, using the
/// user's label for that field or [`UNLABELED`].
pub fn days_from_trips(trips: &[TripRecord], metric_list: &MetricList) -> Vec<DayRecord> {
    let mut by_date: BTreeMap<NaiveDate, DayRecord> = BTreeMap::new();

    for trip in trips {
        let day = by_date
            .entry(trip.date)
            .or_insert_with(|| DayRecord::new(trip.date));

        for (metric, fields) in metric_list {
            let contribution = match metric {
                MetricName::Distance => LabelValue::Scalar(trip.distance),
                MetricName::Duration => LabelValue::Scalar(trip.duration),
                MetricName::Count => LabelValue::Scalar(1.0),
                MetricName::ResponseCount => {
                    let key = if trip.survey_responded.unwrap_or(false) {
                        "responded"
                    } else {
                        "not_responded"
                    };
                    LabelValue::Breakdown([(key.to_string(), 1.0)].into_iter().collect())
                }
            };

            for field in fields {
                let label = trip
                    .user_input
                    .get(field)
                    .map(String::as_str)
                    .unwrap_or(UNLABELED);
                let labels = day
                    .metrics
                    .entry(*metric)
                    .or_default()
                    .entry(field.clone())
                    .or_default();
                add_value(labels, label, &contribution);
            }
        }
    }

    debug!(trips = trips.len(), days = by_date.len(), "Grouped trips into days");
    by_date.into_values().collect()
}

// Contributions built above always share a shape per metric
fn add_value(labels: &mut LabelValues, label: &str, value: &LabelValue) {
    let entry = labels
        .entry(label.to_string())
        .or_insert_with(|| match value {
            LabelValue::Scalar(_) => LabelValue::Scalar(0.0),
            LabelValue::Breakdown(_) => LabelValue::Breakdown(BTreeMap::new()),
        });
    match (entry, value) {
        (LabelValue::Scalar(total), LabelValue::Scalar(v)) => *total += v,
        (LabelValue::Breakdown(total), LabelValue::Breakdown(parts)) => {
            for (k, v) in parts {
                *total.entry(k.clone()).or_insert(0.0) += v;
            }
        }
        (entry, value) => *entry = value.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDirection {
    Past,
    Future,
}

/// Source of day records for the dashboard.
pub trait TimelineProvider {
    /// Currently loaded range, if any.
    fn date_range(&self) -> Option<DateRange>;

    /// Extend the loaded range by `count` days. Returns `false` when no
    /// more days are available in that direction.
    fn load_more_days(&mut self, direction: LoadDirection, count: u32) -> bool;

    fn load_date_range(&mut self, range: DateRange) -> Result<(), MetricsError>;

    /// Records inside the loaded range.
    fn days(&self) -> Vec<DayRecord>;
}

/// Whether enough days are loaded to compute the dashboard.
///
/// Requests the missing days from `provider` when the range is short and
/// reports not-ready while they load.
pub fn ready_to_load(provider: &mut dyn TimelineProvider) -> bool {
    let Some(range) = provider.date_range() else {
        return false;
    };
    let loaded = range.num_days();
    if loaded < i64::from(N_DAYS_TO_LOAD) {
        debug!(loaded, "Not enough days loaded, trying to load more");
        let missing = N_DAYS_TO_LOAD - loaded as u32;
        if provider.load_more_days(LoadDirection::Past, missing) {
            return false;
        }
        debug!("No more days can be loaded, continuing with what we have");
    }
    true
}

/// A fixed set of records, of which a window is "loaded".
#[derive(Debug, Clone)]
pub struct InMemoryTimeline {
    records: Vec<DayRecord>,
    available: Option<DateRange>,
    range: Option<DateRange>,
}

impl InMemoryTimeline {
    /// Starts with the last `initial_days` days of `records` loaded.
    pub fn new(mut records: Vec<DayRecord>, initial_days: u32) -> Self {
        records.sort_by_key(|r| r.date);
        let available = match (records.first(), records.last()) {
            (Some(first), Some(last)) => DateRange::new(first.date, last.date).ok(),
            _ => None,
        };
        let range = available.map(|a| {
            let window = DateRange::ending_at(a.end(), initial_days);
            if window.start() < a.start() {
                a
            } else {
                window
            }
        });
        Self {
            records,
            available,
            range,
        }
    }

    pub fn from_trips(trips: &[TripRecord], metric_list: &MetricList, initial_days: u32) -> Self {
        Self::new(days_from_trips(trips, metric_list), initial_days)
    }

    /// Days that can be loaded at all.
    pub fn available_range(&self) -> Option<DateRange> {
        self.available
    }
}

impl TimelineProvider for InMemoryTimeline {
    fn date_range(&self) -> Option<DateRange> {
        self.range
    }

    fn load_more_days(&mut self, direction: LoadDirection, count: u32) -> bool {
        let (Some(range), Some(available)) = (self.range, self.available) else {
            return false;
        };
        let step = Duration::days(i64::from(count));
        let next = match direction {
            LoadDirection::Past if range.start() > available.start() => {
                let start = (range.start() - step).max(available.start());
                DateRange::new(start, range.end()).ok()
            }
            LoadDirection::Future if range.end() < available.end() => {
                let end = (range.end() + step).min(available.end());
                DateRange::new(range.start(), end).ok()
            }
            _ => None,
        };
        match next {
            Some(next) => {
                debug!(range = %next, "Loaded more days");
                self.range = Some(next);
                true
            }
            None => false,
        }
    }

    fn load_date_range(&mut self, range: DateRange) -> Result<(), MetricsError> {
        self.range = Some(range);
        Ok(())
    }

    fn days(&self) -> Vec<DayRecord> {
        match self.range {
            Some(range) => self
                .records
                .iter()
                .filter(|r| range.contains(r.date))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn trip(id: &str, d: &str, distance: f64, mode: Option<&str>) -> TripRecord {
        TripRecord {
            id: id.to_string(),
            start_ts: 0,
            date: date(d),
            distance,
            duration: distance / 2.0,
            user_input: mode
                .map(|m| [("mode_confirm".to_string(), m.to_string())].into_iter().collect())
                .unwrap_or_default(),
            survey_responded: mode.map(|_| true),
        }
    }

    fn empty_days(from: &str, n: usize) -> Vec<DayRecord> {
        date(from).iter_days().take(n).map(DayRecord::new).collect()
    }

    #[test]
    fn test_days_from_trips() {
        let trips = vec![
            trip("a", "2024-05-01", 1000.0, Some("walk")),
            trip("b", "2024-05-01", 3000.0, None),
            trip("c", "2024-05-01", 500.0, Some("walk")),
            trip("d", "2024-05-03", 2000.0, Some("bus")),
        ];
        let mut metric_list = default_metric_list();
        metric_list.insert(MetricName::ResponseCount, vec!["mode_confirm".to_string()]);

        let days = days_from_trips(&trips, &metric_list);
        assert_eq!(days.len(), 2);

        let first = &days[0].metrics;
        let distance = &first[&MetricName::Distance]["mode_confirm"];
        assert_eq!(distance["walk"], LabelValue::Scalar(1500.0));
        assert_eq!(distance[UNLABELED], LabelValue::Scalar(3000.0));
        assert_eq!(first[&MetricName::Count]["mode_confirm"]["walk"], LabelValue::Scalar(2.0));

        let responses = &first[&MetricName::ResponseCount]["mode_confirm"];
        assert_eq!(responses["walk"].part("responded"), 2.0);
        assert_eq!(responses[UNLABELED].part("not_responded"), 1.0);
    }

    #[test]
    fn test_in_memory_timeline_loads_more_days() {
        let mut timeline = InMemoryTimeline::new(empty_days("2024-05-01", 20), 7);
        assert_eq!(timeline.date_range().unwrap().num_days(), 7);
        assert_eq!(timeline.days().len(), 7);

        assert!(timeline.load_more_days(LoadDirection::Past, 7));
        assert_eq!(timeline.date_range().unwrap().num_days(), 14);
        assert!(!timeline.load_more_days(LoadDirection::Future, 3));

        assert!(timeline.load_more_days(LoadDirection::Past, 30));
        assert_eq!(timeline.date_range().unwrap().start(), date("2024-05-01"));
        assert!(!timeline.load_more_days(LoadDirection::Past, 1));
    }

    #[test]
    fn test_ready_to_load() {
        let mut timeline = InMemoryTimeline::new(empty_days("2024-05-01", 20), 7);
        assert!(!ready_to_load(&mut timeline));
        assert_eq!(timeline.date_range().unwrap().num_days(), 14);
        assert!(ready_to_load(&mut timeline));

        let mut short = InMemoryTimeline::new(empty_days("2024-05-01", 5), 7);
        assert!(ready_to_load(&mut short));
        assert_eq!(short.days().len(), 5);

        let mut empty = InMemoryTimeline::new(Vec::new(), 7);
        assert!(!ready_to_load(&mut empty));
    }

    #[test]
    fn test_load_date_range() {
        let mut timeline = InMemoryTimeline::new(empty_days("2024-05-01", 20), 7);
        let range = DateRange::new(date("2024-05-02"), date("2024-05-04")).unwrap();
        timeline.load_date_range(range).unwrap();
        assert_eq!(timeline.days().len(), 3);
    }
}
