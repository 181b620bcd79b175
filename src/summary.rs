//! Metrics Summary Generator
//!
//! Turns a window of [`DayRecord`]s into per-metric, per-day summaries
//! ([`MetricsData`]) in the same shape the aggregate service returns, so that
//! user and group data flow through the same downstream code.
//!
//! ## Rules
//!
//! - Days are ordered by date and same-date records are merged
//! - With [`SummaryOptions::fill_gaps`] every date between the first and last
//!   record is present; quiet days carry empty label maps rather than being skipped
//! - NaN values are summed as zero and logged
//! - A label whose value is a number on one day and a breakdown on another is
//!   rejected with [`MetricsError::MixedValueShapes`]

use crate::error::{ErrorSink, MetricsError};
use crate::models::*;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Folds raw labels into the label they should be counted under.
pub type LabelMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    /// Insert zero-activity days for dates missing between records
    pub fill_gaps: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self { fill_gaps: true }
    }
}

/// Compute per-day summaries for every metric and grouping field requested.
pub fn generate_summaries(
    metric_list: &MetricList,
    days: &[DayRecord],
    options: &SummaryOptions,
    label_map: Option<&LabelMap>,
) -> Result<MetricsData, MetricsError> {
    let mut data = MetricsData::new();
    if days.is_empty() {
        debug!("No day records supplied, nothing to summarize");
        return Ok(data);
    }

    let timeline = merge_by_date(days, options.fill_gaps)?;

    for (metric, fields) in metric_list {
        let mut metric_days = Vec::with_capacity(timeline.len());
        for (date, record) in &timeline {
            let mut day = DayOfMetricData::new(*date);
            if let Some(record) = record {
                day.ts = record.timestamp();
            }
            for field in fields {
                let labels = record
                    .as_ref()
                    .and_then(|r| r.fields(*metric))
                    .and_then(|f| f.get(field));
                let mut summed = LabelValues::new();
                if let Some(labels) = labels {
                    for (label, value) in labels {
                        let target = label_map
                            .and_then(|m| m.get(label))
                            .unwrap_or(label);
                        accumulate(&mut summed, field, target, value)?;
                    }
                }
                day.fields.insert(field.clone(), summed);
            }
            metric_days.push(day);
        }
        data.insert(*metric, metric_days);
    }

    debug!(
        days = timeline.len(),
        metrics = metric_list.len(),
        "Computed metrics summaries"
    );
    Ok(data)
}

/// Like [`generate_summaries`], but reports failures to `sink` and yields `None`.
pub fn compute_user_metrics(
    metric_list: &MetricList,
    days: &[DayRecord],
    options: &SummaryOptions,
    label_map: Option<&LabelMap>,
    sink: &dyn ErrorSink,
) -> Option<MetricsData> {
    match generate_summaries(metric_list, days, options, label_map) {
        Ok(data) => {
            debug!("Computed user metrics");
            Some(data)
        }
        Err(e) => {
            sink.display_error("Error computing user metrics", &e);
            None
        }
    }
}

/// Sum of a label's values across `days`, NaN-safe.
pub fn sum_label(
    days: &[DayOfMetricData],
    field: &str,
    label: &str,
) -> Result<Option<LabelValue>, MetricsError> {
    let mut acc = LabelValues::new();
    for day in days {
        if let Some(value) = day.value_for(field, label) {
            let value = sanitize(value, field, label, day.date);
            accumulate(&mut acc, field, label, &value)?;
        }
    }
    Ok(acc.remove(label))
}

// Sorted by date; `None` marks a filled gap
fn merge_by_date(
    days: &[DayRecord],
    fill_gaps: bool,
) -> Result<BTreeMap<NaiveDate, Option<DayRecord>>, MetricsError> {
    let mut timeline: BTreeMap<NaiveDate, Option<DayRecord>> = BTreeMap::new();

    for record in days {
        let record = sanitize_record(record);
        match timeline.get_mut(&record.date) {
            Some(Some(existing)) => merge_records(existing, &record)?,
            _ => {
                timeline.insert(record.date, Some(record));
            }
        }
    }

    if fill_gaps {
        let first = timeline.keys().next().copied();
        let last = timeline.keys().next_back().copied();
        if let (Some(first), Some(last)) = (first, last) {
            for date in first.iter_days().take_while(|d| *d <= last) {
                timeline.entry(date).or_insert(None);
            }
        }
    }

    Ok(timeline)
}

fn merge_records(into: &mut DayRecord, other: &DayRecord) -> Result<(), MetricsError> {
    for (metric, fields) in &other.metrics {
        let target = into.metrics.entry(*metric).or_default();
        for (field, labels) in fields {
            let target_labels = target.entry(field.clone()).or_default();
            for (label, value) in labels {
                accumulate(target_labels, field, label, value)?;
            }
        }
    }
    Ok(())
}

fn sanitize_record(record: &DayRecord) -> DayRecord {
    let mut clean = record.clone();
    for fields in clean.metrics.values_mut() {
        for (field, labels) in fields.iter_mut() {
            for (label, value) in labels.iter_mut() {
                *value = sanitize(value, field, label, record.date);
            }
        }
    }
    clean
}

fn sanitize(value: &LabelValue, field: &str, label: &str, date: NaiveDate) -> LabelValue {
    match value {
        LabelValue::Scalar(v) if v.is_nan() => {
            warn!(field, label, date = %date, "Value is NaN, changing to 0");
            LabelValue::Scalar(0.0)
        }
        LabelValue::Breakdown(parts) if parts.values().any(|v| v.is_nan()) => {
            warn!(field, label, date = %date, "Breakdown contains NaN, changing to 0");
            LabelValue::Breakdown(
                parts
                    .iter()
                    .map(|(k, v)| (k.clone(), if v.is_nan() { 0.0 } else { *v }))
                    .collect(),
            )
        }
        other => other.clone(),
    }
}

/// Adds `value` into `acc[label]`: numbers add, breakdowns merge key-wise.
pub(crate) fn accumulate(
    acc: &mut LabelValues,
    field: &str,
    label: &str,
    value: &LabelValue,
) -> Result<(), MetricsError> {
    if !acc.contains_key(label) {
        acc.insert(label.to_string(), value.clone());
        return Ok(());
    }
    match (acc.get_mut(label), value) {
        (Some(LabelValue::Scalar(total)), LabelValue::Scalar(v)) => *total += v,
        (Some(LabelValue::Breakdown(total)), LabelValue::Breakdown(parts)) => {
            for (key, v) in parts {
                *total.entry(key.clone()).or_insert(0.0) += v;
            }
        }
        _ => {
            return Err(MetricsError::MixedValueShapes {
                field: field.to_string(),
                label: label.to_string(),
            })
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::test_support::RecordingSink;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn distance_only() -> MetricList {
        [(MetricName::Distance, vec!["mode_confirm".to_string()])]
            .into_iter()
            .collect()
    }

    fn car(d: &str, value: impl Into<LabelValue>) -> DayRecord {
        DayRecord::new(date(d)).with_value(MetricName::Distance, "mode_confirm", "CAR", value)
    }

    fn summarize(days: &[DayRecord]) -> Result<MetricsData, MetricsError> {
        generate_summaries(&distance_only(), days, &SummaryOptions::default(), None)
    }

    #[test]
    fn test_empty_input_yields_empty_data() {
        assert!(summarize(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_gaps_are_filled_with_zero_days() {
        let days = vec![car("2024-05-01", 100.0), car("2024-05-04", 50.0)];
        let data = summarize(&days).unwrap();
        let out = data.get(MetricName::Distance).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out[1].date, date("2024-05-02"));
        assert!(out[1].labels("mode_confirm").is_empty());

        let sparse = generate_summaries(
            &distance_only(),
            &days,
            &SummaryOptions { fill_gaps: false },
            None,
        )
        .unwrap();
        assert_eq!(sparse.get(MetricName::Distance).unwrap().len(), 2);
    }

    #[test]
    fn test_same_date_records_are_merged() {
        let days = vec![car("2024-05-01", 100.0), car("2024-05-01", 25.0)];
        let data = summarize(&days).unwrap();
        let out = data.get(MetricName::Distance).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value_for("mode_confirm", "CAR"), Some(&LabelValue::Scalar(125.0)));
    }

    #[test]
    fn test_label_map_folds_labels() {
        let days = vec![DayRecord::new(date("2024-05-01"))
            .with_value(MetricName::Distance, "mode_confirm", "walk", 300.0)
            .with_value(MetricName::Distance, "mode_confirm", "WALKING", 200.0)];
        let label_map: LabelMap = [("walk".to_string(), "WALKING".to_string())]
            .into_iter()
            .collect();

        let data = generate_summaries(
            &distance_only(),
            &days,
            &SummaryOptions::default(),
            Some(&label_map),
        )
        .unwrap();
        let day = &data.get(MetricName::Distance).unwrap()[0];
        assert_eq!(day.labels("mode_confirm"), vec!["WALKING"]);
        assert_eq!(day.value_for("mode_confirm", "WALKING"), Some(&LabelValue::Scalar(500.0)));
    }

    #[test]
    fn test_mixed_shapes_are_rejected() {
        let breakdown: BTreeMap<String, f64> =
            [("responded".to_string(), 1.0)].into_iter().collect();
        let days = vec![car("2024-05-01", 1.0), car("2024-05-01", breakdown)];
        let result = summarize(&days);
        assert!(matches!(result, Err(MetricsError::MixedValueShapes { .. })));
    }

    #[test]
    fn test_compute_user_metrics_reports_errors() {
        let breakdown: BTreeMap<String, f64> = [("a".to_string(), 1.0)].into_iter().collect();
        let days = vec![car("2024-05-01", breakdown), car("2024-05-01", 3.0)];
        let sink = RecordingSink::default();
        let result = compute_user_metrics(
            &distance_only(),
            &days,
            &SummaryOptions::default(),
            None,
            &sink,
        );
        assert!(result.is_none());
        assert_eq!(sink.reported.borrow().len(), 1);
    }

    #[test]
    fn test_sum_label_treats_nan_as_zero() {
        let mut day_a = DayOfMetricData::new(date("2024-05-01"));
        day_a
            .fields
            .entry("mode_confirm".to_string())
            .or_default()
            .insert("CAR".to_string(), LabelValue::Scalar(f64::NAN));
        let mut day_b = DayOfMetricData::new(date("2024-05-02"));
        day_b
            .fields
            .entry("mode_confirm".to_string())
            .or_default()
            .insert("CAR".to_string(), LabelValue::Scalar(40.0));

        let total = sum_label(&[day_a, day_b], "mode_confirm", "CAR").unwrap();
        assert_eq!(total, Some(LabelValue::Scalar(40.0)));
    }
}
