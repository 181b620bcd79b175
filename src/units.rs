//! Unit conversion and display formatting per metric.

use crate::models::{LabelValue, MetricName};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const METRES_PER_MILE: f64 = 1609.344;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl FromStr for UnitSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            other => Err(format!("unknown unit system '{}'", other)),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitSystem::Metric => f.write_str("metric"),
            UnitSystem::Imperial => f.write_str("imperial"),
        }
    }
}

/// Axis label, conversion and display string for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitUtils {
    metric: MetricName,
    system: UnitSystem,
}

impl UnitUtils {
    pub fn for_metric(metric: MetricName, system: UnitSystem) -> Self {
        Self { metric, system }
    }

    pub fn axis_label(&self) -> &'static str {
        match (self.metric, self.system) {
            (MetricName::Distance, UnitSystem::Metric) => "km",
            (MetricName::Distance, UnitSystem::Imperial) => "mi",
            (MetricName::Duration, _) => "hours",
            (MetricName::Count, _) => "trips",
            (MetricName::ResponseCount, _) => "responses",
        }
    }

    /// Raw value in display units.
    pub fn convert(&self, value: &LabelValue) -> f64 {
        match self.metric {
            MetricName::Distance => match self.system {
                UnitSystem::Metric => value.total() / 1000.0,
                UnitSystem::Imperial => value.total() / METRES_PER_MILE,
            },
            MetricName::Duration => value.total() / 3600.0,
            MetricName::Count => value.total(),
            MetricName::ResponseCount => value.part("responded"),
        }
    }

    pub fn display(&self, value: &LabelValue) -> String {
        match self.metric {
            MetricName::ResponseCount => format!(
                "{} responded / {} not responded",
                format_for_display(value.part("responded")),
                format_for_display(value.part("not_responded"))
            ),
            _ => format!("{} {}", format_for_display(self.convert(value)), self.axis_label()),
        }
    }
}

/// No decimals from 100 up, otherwise at most one; thousands separated by commas.
pub fn format_for_display(value: f64) -> String {
    let decimals = if value.abs() >= 100.0 { 0 } else { 1 };
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;

    let mut text = format!("{:.*}", decimals as usize, rounded);
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    if text == "-0" {
        text = "0".to_string();
    }

    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest.to_string()),
        None => ("", text),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (digits, None),
    };

    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_format_for_display() {
        assert_eq!(format_for_display(0.0), "0");
        assert_eq!(format_for_display(7.0), "7");
        assert_eq!(format_for_display(1.25), "1.3");
        assert_eq!(format_for_display(99.94), "99.9");
        assert_eq!(format_for_display(123.6), "124");
        assert_eq!(format_for_display(1234567.0), "1,234,567");
        assert_eq!(format_for_display(-1500.0), "-1,500");
    }

    #[test]
    fn test_distance_units() {
        let value = LabelValue::Scalar(7000.0);
        let metric = UnitUtils::for_metric(MetricName::Distance, UnitSystem::Metric);
        assert_eq!(metric.axis_label(), "km");
        assert_eq!(metric.convert(&value), 7.0);
        assert_eq!(metric.display(&value), "7 km");

        let imperial = UnitUtils::for_metric(MetricName::Distance, UnitSystem::Imperial);
        assert_eq!(imperial.display(&LabelValue::Scalar(METRES_PER_MILE * 2.0)), "2 mi");
    }

    #[test]
    fn test_duration_and_count_units() {
        let duration = UnitUtils::for_metric(MetricName::Duration, UnitSystem::Metric);
        assert_eq!(duration.display(&LabelValue::Scalar(5400.0)), "1.5 hours");

        let count = UnitUtils::for_metric(MetricName::Count, UnitSystem::Imperial);
        assert_eq!(count.display(&LabelValue::Scalar(3.0)), "3 trips");
    }

    #[test]
    fn test_response_count_units() {
        let parts: BTreeMap<String, f64> = [
            ("responded".to_string(), 2.0),
            ("not_responded".to_string(), 1.0),
        ]
        .into_iter()
        .collect();
        let utils = UnitUtils::for_metric(MetricName::ResponseCount, UnitSystem::Metric);
        let value = LabelValue::Breakdown(parts);
        assert_eq!(utils.convert(&value), 2.0);
        assert_eq!(utils.display(&value), "2 responded / 1 not responded");
    }

    #[test]
    fn test_unit_system_parsing() {
        assert_eq!("Imperial".parse::<UnitSystem>().unwrap(), UnitSystem::Imperial);
        assert!("nautical".parse::<UnitSystem>().is_err());
    }
}
