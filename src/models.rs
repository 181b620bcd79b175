//! Core Data Models
//!
//! This module defines the data structures that flow through the metrics
//! pipeline, from raw per-day records to the summaries the dashboard shows.
//!
//! ## Data Flow
//!
//! 1. **Raw Data**: [`DayRecord`] - One calendar day of trip activity, every metric
//! 2. **Per-metric days**: [`DayOfMetricData`] - One day of one metric, the shape the
//!    remote aggregate service also returns
//! 3. **Collections**: [`MetricsData`] - Per-metric sequences of days
//! 4. **Summaries**: [`MetricsSummary`] - Label totals over a window
//!
//! ## Values
//!
//! A label's value is a [`LabelValue`]: either a plain number (distance,
//! duration, count) or a breakdown such as `{responded: 2, not_responded: 1}`.
//!
//! ## Wire Format
//!
//! [`DayOfMetricData`] serializes to the flat format used by the study server,
//! where every label is a top-level key prefixed with its grouping field:
//!
//! ```json
//! { "date": "2024-05-06", "nUsers": 12, "mode_confirm_WALKING": 1830.5 }
//! ```

use crate::error::MetricsError;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Label for activity the user has not assigned a mode or purpose to yet.
pub const UNLABELED: &str = "Unlabeled";

/// Grouping fields the wire format can carry, used to split flat keys.
pub const KNOWN_GROUPING_FIELDS: &[&str] = &[
    "mode_confirm",
    "purpose_confirm",
    "replaced_mode_confirm",
    "primary_ble_sensed_mode",
    "survey",
];

pub const DEFAULT_GROUPING_FIELD: &str = "mode_confirm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MetricName {
    Distance,
    Duration,
    Count,
    ResponseCount,
}

impl MetricName {
    pub const ALL: [MetricName; 4] = [
        MetricName::Distance,
        MetricName::Duration,
        MetricName::Count,
        MetricName::ResponseCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Distance => "distance",
            MetricName::Duration => "duration",
            MetricName::Count => "count",
            MetricName::ResponseCount => "response_count",
        }
    }
}

impl FromStr for MetricName {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricName::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| MetricsError::UnknownMetric(s.to_string()))
    }
}

impl TryFrom<String> for MetricName {
    type Error = MetricsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MetricName> for String {
    fn from(metric: MetricName) -> Self {
        metric.as_str().to_string()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which grouping fields to compute for each metric.
pub type MetricList = BTreeMap<MetricName, Vec<String>>;

pub fn default_metric_list() -> MetricList {
    [MetricName::Distance, MetricName::Duration, MetricName::Count]
        .into_iter()
        .map(|m| (m, vec![DEFAULT_GROUPING_FIELD.to_string()]))
        .collect()
}

/// The value recorded for one label on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum LabelValue {
    Scalar(f64),
    Breakdown(BTreeMap<String, f64>),
}

impl LabelValue {
    /// Numeric total, treating NaN as zero.
    pub fn total(&self) -> f64 {
        match self {
            LabelValue::Scalar(v) => finite_or_zero(*v),
            LabelValue::Breakdown(parts) => parts.values().copied().map(finite_or_zero).sum(),
        }
    }

    /// One key of a breakdown; zero for scalars or missing keys.
    pub fn part(&self, key: &str) -> f64 {
        match self {
            LabelValue::Scalar(_) => 0.0,
            LabelValue::Breakdown(parts) => {
                parts.get(key).copied().map(finite_or_zero).unwrap_or(0.0)
            }
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            LabelValue::Scalar(v) => finite_or_zero(*v) == 0.0,
            LabelValue::Breakdown(parts) => parts.values().all(|v| finite_or_zero(*v) == 0.0),
        }
    }

    pub fn is_breakdown(&self) -> bool {
        matches!(self, LabelValue::Breakdown(_))
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v
    }
}

impl From<f64> for LabelValue {
    fn from(v: f64) -> Self {
        LabelValue::Scalar(v)
    }
}

impl From<BTreeMap<String, f64>> for LabelValue {
    fn from(parts: BTreeMap<String, f64>) -> Self {
        LabelValue::Breakdown(parts)
    }
}

impl TryFrom<Value> for LabelValue {
    type Error = MetricsError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(obj) => {
                let mut parts = BTreeMap::new();
                for (key, v) in obj {
                    parts.insert(key.clone(), number_or_nan(&v).ok_or_else(|| {
                        MetricsError::Payload(format!("breakdown key '{}' is not a number", key))
                    })?);
                }
                Ok(LabelValue::Breakdown(parts))
            }
            other => number_or_nan(&other)
                .map(LabelValue::Scalar)
                .ok_or_else(|| {
                    MetricsError::Payload(format!("expected a number or object, got {}", other))
                }),
        }
    }
}

// null is how NaN survives a JSON round trip
fn number_or_nan(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(f64::NAN),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

impl From<LabelValue> for Value {
    fn from(value: LabelValue) -> Self {
        match value {
            LabelValue::Scalar(v) => Value::from(v),
            LabelValue::Breakdown(parts) => Value::Object(
                parts.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

/// label -> value
pub type LabelValues = BTreeMap<String, LabelValue>;
/// grouping field -> labels
pub type FieldValues = BTreeMap<String, LabelValues>;

/// Orders labels alphabetically with [`UNLABELED`] last.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    match (a == UNLABELED, b == UNLABELED) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

pub(crate) fn midnight_ts(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// One calendar day of trip activity across all metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    #[serde(default)]
    pub metrics: BTreeMap<MetricName, FieldValues>,
}

impl DayRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            ts: None,
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_value(
        mut self,
        metric: MetricName,
        field: &str,
        label: &str,
        value: impl Into<LabelValue>,
    ) -> Self {
        self.metrics
            .entry(metric)
            .or_default()
            .entry(field.to_string())
            .or_default()
            .insert(label.to_string(), value.into());
        self
    }

    /// Unix seconds for the day; midnight UTC unless supplied upstream.
    pub fn timestamp(&self) -> i64 {
        self.ts.unwrap_or_else(|| midnight_ts(self.date))
    }

    pub fn fields(&self, metric: MetricName) -> Option<&FieldValues> {
        self.metrics.get(&metric)
    }
}

/// One day of one metric, broken down by grouping field and label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct DayOfMetricData {
    pub date: NaiveDate,
    pub ts: i64,
    pub n_users: Option<u32>,
    pub fields: FieldValues,
}

impl DayOfMetricData {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            ts: midnight_ts(date),
            n_users: None,
            fields: FieldValues::new(),
        }
    }

    /// Labels present for a grouping field on this day.
    pub fn labels(&self, field: &str) -> Vec<&str> {
        self.fields
            .get(field)
            .map(|labels| labels.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn value_for(&self, field: &str, label: &str) -> Option<&LabelValue> {
        self.fields.get(field).and_then(|labels| labels.get(label))
    }
}

fn split_wire_key(key: &str) -> Option<(&'static str, &str)> {
    let mut fields: Vec<&'static str> = KNOWN_GROUPING_FIELDS.to_vec();
    fields.sort_by_key(|f| std::cmp::Reverse(f.len()));
    fields.into_iter().find_map(|field| {
        key.strip_prefix(field)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|label| !label.is_empty())
            .map(|label| (field, label))
    })
}

impl TryFrom<Map<String, Value>> for DayOfMetricData {
    type Error = MetricsError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let date = map
            .get("date")
            .and_then(Value::as_str)
            .ok_or_else(|| MetricsError::Payload("day is missing 'date'".to_string()))?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| MetricsError::Payload(format!("bad date '{}': {}", date, e)))?;

        let mut day = DayOfMetricData::new(date);
        for (key, value) in map {
            match key.as_str() {
                "date" => {}
                "ts" => {
                    if let Some(ts) = value.as_f64() {
                        day.ts = ts as i64;
                    }
                }
                "nUsers" => day.n_users = value.as_u64().map(|n| n as u32),
                _ => match split_wire_key(&key) {
                    Some((field, label)) => {
                        let value = LabelValue::try_from(value)?;
                        day.fields
                            .entry(field.to_string())
                            .or_default()
                            .insert(label.to_string(), value);
                    }
                    None => debug!(
                        key = %key,
                        date = %date,
                        "Ignoring unrecognized key in metrics day"
                    ),
                },
            }
        }
        Ok(day)
    }
}

impl From<DayOfMetricData> for Map<String, Value> {
    fn from(day: DayOfMetricData) -> Self {
        let mut map = Map::new();
        map.insert("date".to_string(), Value::from(day.date.format("%Y-%m-%d").to_string()));
        map.insert("ts".to_string(), Value::from(day.ts));
        if let Some(n) = day.n_users {
            map.insert("nUsers".to_string(), Value::from(n));
        }
        for (field, labels) in day.fields {
            for (label, value) in labels {
                map.insert(format!("{}_{}", field, label), Value::from(value));
            }
        }
        map
    }
}

/// Per-metric sequences of days, ordered by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Value>",
    into = "BTreeMap<String, Vec<DayOfMetricData>>"
)]
pub struct MetricsData {
    metrics: BTreeMap<MetricName, Vec<DayOfMetricData>>,
}

impl MetricsData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric: MetricName, days: Vec<DayOfMetricData>) {
        self.metrics.insert(metric, days);
    }

    pub fn get(&self, metric: MetricName) -> Option<&[DayOfMetricData]> {
        self.metrics.get(&metric).map(Vec::as_slice)
    }

    /// Days for a metric, only when there is at least one.
    pub fn days(&self, metric: MetricName) -> Option<&[DayOfMetricData]> {
        self.get(metric).filter(|days| !days.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.values().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricName, &[DayOfMetricData])> {
        self.metrics.iter().map(|(m, days)| (*m, days.as_slice()))
    }
}

impl TryFrom<BTreeMap<String, Value>> for MetricsData {
    type Error = MetricsError;

    fn try_from(raw: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        let mut data = MetricsData::new();
        for (key, value) in raw {
            match key.parse::<MetricName>() {
                Ok(metric) => {
                    let days: Vec<DayOfMetricData> = serde_json::from_value(value)
                        .map_err(|e| MetricsError::Payload(format!("{}: {}", key, e)))?;
                    data.insert(metric, days);
                }
                Err(_) => debug!(key = %key, "Skipping unknown metric in payload"),
            }
        }
        Ok(data)
    }
}

impl From<MetricsData> for BTreeMap<String, Vec<DayOfMetricData>> {
    fn from(data: MetricsData) -> Self {
        data.metrics
            .into_iter()
            .map(|(metric, days)| (metric.as_str().to_string(), days))
            .collect()
    }
}

/// Cumulative value per label over one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsSummary {
    values: BTreeMap<String, LabelValue>,
}

impl MetricsSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<&LabelValue> {
        self.values.get(label)
    }

    pub(crate) fn insert(&mut self, label: String, value: LabelValue) {
        self.values.insert(label, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries in presentation order, [`UNLABELED`] last.
    pub fn ordered(&self) -> Vec<(&str, &LabelValue)> {
        let mut entries: Vec<(&str, &LabelValue)> =
            self.values.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| compare_labels(a.0, b.0));
        entries
    }

    /// Sum over all labels.
    pub fn total(&self) -> f64 {
        self.values.values().map(LabelValue::total).sum()
    }
}

impl FromIterator<(String, LabelValue)> for MetricsSummary {
    fn from_iter<I: IntoIterator<Item = (String, LabelValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[NaiveDate; 2]", into = "[NaiveDate; 2]")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, MetricsError> {
        if start > end {
            return Err(MetricsError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The `days` days ending at `end`, inclusive.
    pub fn ending_at(end: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self {
            start: end - chrono::Duration::days(span),
            end,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, counting both ends.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl TryFrom<[NaiveDate; 2]> for DateRange {
    type Error = MetricsError;

    fn try_from([start, end]: [NaiveDate; 2]) -> Result<Self, Self::Error> {
        DateRange::new(start, end)
    }
}

impl From<DateRange> for [NaiveDate; 2] {
    fn from(range: DateRange) -> Self {
        [range.start, range.end]
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_metric_name_parsing() {
        assert_eq!("distance".parse::<MetricName>().unwrap(), MetricName::Distance);
        assert_eq!(
            "response_count".parse::<MetricName>().unwrap(),
            MetricName::ResponseCount
        );
        assert!("speed".parse::<MetricName>().is_err());
    }

    #[test]
    fn test_label_value_from_json() {
        let scalar: LabelValue = serde_json::from_value(json!(1200.5)).unwrap();
        assert_eq!(scalar, LabelValue::Scalar(1200.5));

        let breakdown: LabelValue =
            serde_json::from_value(json!({"responded": 2, "not_responded": 1})).unwrap();
        assert_eq!(breakdown.part("responded"), 2.0);
        assert_eq!(breakdown.total(), 3.0);

        let missing: LabelValue = serde_json::from_value(json!(null)).unwrap();
        assert!(matches!(missing, LabelValue::Scalar(v) if v.is_nan()));
        assert_eq!(missing.total(), 0.0);

        assert!(serde_json::from_value::<LabelValue>(json!("fast")).is_err());
    }

    #[test]
    fn test_day_of_metric_data_wire_format() {
        let day: DayOfMetricData = serde_json::from_value(json!({
            "date": "2024-05-06",
            "nUsers": 4,
            "mode_confirm_WALKING": 1000,
            "replaced_mode_confirm_bus": 300,
            "label_something": 5
        }))
        .unwrap();

        assert_eq!(day.date, date("2024-05-06"));
        assert_eq!(day.n_users, Some(4));
        assert_eq!(day.ts, midnight_ts(date("2024-05-06")));
        assert_eq!(day.labels("mode_confirm"), vec!["WALKING"]);
        assert_eq!(
            day.value_for("replaced_mode_confirm", "bus"),
            Some(&LabelValue::Scalar(300.0))
        );
        assert!(day.value_for("mode_confirm", "bus").is_none());

        let encoded = serde_json::to_value(&day).unwrap();
        assert_eq!(encoded["mode_confirm_WALKING"], json!(1000.0));
        assert!(encoded.get("label_something").is_none());
    }

    #[test]
    fn test_day_requires_date() {
        let result = serde_json::from_value::<DayOfMetricData>(json!({"mode_confirm_CAR": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_metrics_data_skips_unknown_metrics() {
        let data: MetricsData = serde_json::from_value(json!({
            "distance": [{"date": "2024-05-06", "mode_confirm_CAR": 5000}],
            "footprint": {"whatever": true}
        }))
        .unwrap();
        assert_eq!(data.get(MetricName::Distance).map(|d| d.len()), Some(1));
        assert!(data.get(MetricName::Duration).is_none());
    }

    #[test]
    fn test_unlabeled_sorts_last() {
        let summary: MetricsSummary = vec![
            (UNLABELED.to_string(), LabelValue::Scalar(1.0)),
            ("WALKING".to_string(), LabelValue::Scalar(2.0)),
            ("BUS".to_string(), LabelValue::Scalar(3.0)),
        ]
        .into_iter()
        .collect();

        let labels: Vec<&str> = summary.ordered().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["BUS", "WALKING", UNLABELED]);
        assert_eq!(summary.total(), 6.0);
    }

    #[test]
    fn test_date_range() {
        assert!(DateRange::new(date("2024-05-07"), date("2024-05-06")).is_err());

        let range = DateRange::ending_at(date("2024-05-14"), 14);
        assert_eq!(range.start(), date("2024-05-01"));
        assert_eq!(range.num_days(), 14);
        assert!(range.contains(date("2024-05-01")));
        assert!(!range.contains(date("2024-05-15")));

        let decoded: DateRange =
            serde_json::from_value(json!(["2024-05-01", "2024-05-14"])).unwrap();
        assert_eq!(decoded, range);
        assert!(serde_json::from_value::<DateRange>(json!(["2024-05-14", "2024-05-01"])).is_err());
    }
}
