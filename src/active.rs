//! Minutes spent on active modes (walking, cycling).

use crate::chart::{readable_label, sort_chart_records, ChartRecord};
use crate::error::MetricsError;
use crate::models::*;
use crate::weeks::summarize_weeks;
use serde::Serialize;

pub fn default_active_modes() -> Vec<String> {
    vec!["WALKING".to_string(), "BICYCLING".to_string()]
}

fn minutes(seconds: f64) -> f64 {
    seconds / 60.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveMinutes {
    pub mode: String,
    pub this_week: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_week: Option<f64>,
}

/// Minutes per active mode for this week and, when `range` covers it, last week.
///
/// `duration` holds the duration metric's days. Modes with no trips report zero.
pub fn weekly_active_minutes(
    duration: &[DayOfMetricData],
    range: &DateRange,
    field: &str,
    active_modes: &[String],
) -> Result<Vec<ActiveMinutes>, MetricsError> {
    let weekly = summarize_weeks(duration, range, field)?;
    let result = active_modes
        .iter()
        .map(|mode| {
            let this_week = weekly
                .as_ref()
                .and_then(|w| w.this_week.summary.get(mode))
                .map(|v| minutes(v.total()))
                .unwrap_or(0.0);
            let last_week = weekly.as_ref().and_then(|w| w.last_week.as_ref()).map(|week| {
                week.summary
                    .get(mode)
                    .map(|v| minutes(v.total()))
                    .unwrap_or(0.0)
            });
            ActiveMinutes {
                mode: mode.clone(),
                this_week,
                last_week,
            }
        })
        .collect();
    Ok(result)
}

/// One chart record per active mode per day with any activity, in minutes.
pub fn daily_active_minutes(
    duration: &[DayOfMetricData],
    field: &str,
    active_modes: &[String],
) -> Vec<ChartRecord> {
    let mut records: Vec<ChartRecord> = duration
        .iter()
        .flat_map(|day| {
            active_modes.iter().filter_map(move |mode| {
                let value = day.value_for(field, mode)?;
                let mins = minutes(value.total());
                (mins.is_finite() && mins > 0.0).then(|| ChartRecord {
                    label: readable_label(mode),
                    x: mins,
                    y: day.ts * 1000,
                })
            })
        })
        .collect();
    sort_chart_records(&mut records);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn duration_days(from: &str, n: usize, values: &[(&str, f64)]) -> Vec<DayOfMetricData> {
        date(from)
            .iter_days()
            .take(n)
            .map(|d| {
                let mut day = DayOfMetricData::new(d);
                let labels = day.fields.entry("mode_confirm".to_string()).or_default();
                for (label, value) in values {
                    labels.insert(label.to_string(), LabelValue::Scalar(*value));
                }
                day
            })
            .collect()
    }

    #[test]
    fn test_weekly_active_minutes() {
        let days = duration_days("2024-05-01", 14, &[("WALKING", 600.0), ("CAR", 1200.0)]);
        let range = DateRange::new(date("2024-05-01"), date("2024-05-14")).unwrap();
        let weekly =
            weekly_active_minutes(&days, &range, "mode_confirm", &default_active_modes()).unwrap();

        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly[0].mode, "WALKING");
        assert_eq!(weekly[0].this_week, 70.0);
        assert_eq!(weekly[0].last_week, Some(70.0));
        assert_eq!(weekly[1].mode, "BICYCLING");
        assert_eq!(weekly[1].this_week, 0.0);
    }

    #[test]
    fn test_weekly_active_minutes_without_last_week() {
        let days = duration_days("2024-05-10", 5, &[("BICYCLING", 120.0)]);
        let range = DateRange::new(date("2024-05-10"), date("2024-05-14")).unwrap();
        let weekly =
            weekly_active_minutes(&days, &range, "mode_confirm", &default_active_modes()).unwrap();
        assert_eq!(weekly[1].this_week, 10.0);
        assert!(weekly[1].last_week.is_none());
    }

    #[test]
    fn test_daily_active_minutes() {
        let mut days = duration_days("2024-05-01", 2, &[("WALKING", 300.0)]);
        days[1]
            .fields
            .get_mut("mode_confirm")
            .unwrap()
            .insert("BICYCLING".to_string(), LabelValue::Scalar(900.0));

        let records = daily_active_minutes(&days, "mode_confirm", &default_active_modes());
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].label, "Walking");
        assert_eq!(records[0].x, 5.0);
        assert!(records.iter().any(|r| r.label == "Bicycling" && r.x == 15.0));
    }
}
