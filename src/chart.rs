//! Chart records and colors for the per-day bar charts.

use crate::models::{DayOfMetricData, UNLABELED};
use crate::units::UnitUtils;
use serde::Serialize;
use std::collections::BTreeMap;

const UNLABELED_ALPHA: f64 = 0.15;

/// One bar segment: `x` in display units, `y` the day in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRecord {
    pub label: String,
    pub x: f64,
    pub y: i64,
}

/// Records for every non-zero label of `field` on every day.
///
/// Sorted by time, with [`UNLABELED`] records moved to the end so the legend
/// lists them last.
pub fn build_chart_records(
    days: &[DayOfMetricData],
    field: &str,
    units: &UnitUtils,
) -> Vec<ChartRecord> {
    let mut records = Vec::new();
    for day in days {
        for label in day.labels(field) {
            let Some(value) = day.value_for(field, label) else {
                continue;
            };
            if value.is_zero() {
                continue;
            }
            records.push(ChartRecord {
                label: readable_label(label),
                x: units.convert(value),
                y: day.ts * 1000,
            });
        }
    }
    sort_chart_records(&mut records);
    records
}

pub fn sort_chart_records(records: &mut [ChartRecord]) {
    records.sort_by_key(|r| (r.label == UNLABELED, r.y));
}

/// `drove_alone` -> `Drove Alone`, `E_BIKE` -> `E Bike`.
pub fn readable_label(key: &str) -> String {
    if key == UNLABELED {
        return key.to_string();
    }
    key.split(|c: char| c == '_' || c == ' ')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Mode colors, as `#rrggbb`.
pub trait ColorLookup {
    fn color_for_label(&self, label: &str) -> Option<&str>;
    fn unknown_color(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct BaseModeColors {
    colors: BTreeMap<String, String>,
    unknown: String,
}

impl Default for BaseModeColors {
    fn default() -> Self {
        let colors = [
            ("WALKING", "#0068a5"),
            ("BICYCLING", "#008148"),
            ("E_BIKE", "#00b050"),
            ("E_SCOOTER", "#dd4400"),
            ("BUS", "#8a31a1"),
            ("TRAIN", "#e65100"),
            ("LIGHT_RAIL", "#e65100"),
            ("SUBWAY", "#e65100"),
            ("TRAM", "#e65100"),
            ("CAR", "#c00000"),
            ("TAXI", "#d4a017"),
            ("AIR_OR_HSR", "#1a237e"),
        ];
        Self {
            colors: colors
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            unknown: "#555555".to_string(),
        }
    }
}

fn color_key(label: &str) -> String {
    label.trim().replace(' ', "_").to_uppercase()
}

impl ColorLookup for BaseModeColors {
    fn color_for_label(&self, label: &str) -> Option<&str> {
        self.colors.get(&color_key(label)).map(String::as_str)
    }

    fn unknown_color(&self) -> &str {
        &self.unknown
    }
}

/// Bar color for a label; [`UNLABELED`] gets the unknown color, mostly transparent.
pub fn color_for_label(label: &str, lookup: &dyn ColorLookup) -> String {
    if label == UNLABELED {
        return hex_to_rgba(lookup.unknown_color(), UNLABELED_ALPHA)
            .unwrap_or_else(|| format!("rgba(85, 85, 85, {})", UNLABELED_ALPHA));
    }
    lookup
        .color_for_label(label)
        .unwrap_or_else(|| lookup.unknown_color())
        .to_string()
}

fn hex_to_rgba(hex: &str, alpha: f64) -> Option<String> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(format!(
        "rgba({}, {}, {}, {})",
        channel(0)?,
        channel(2)?,
        channel(4)?,
        alpha
    ))
}
