//! Carbon footprint estimates from distance summaries.
//!
//! Distances are in metres, emission factors in kg CO₂ per kilometre. The
//! factor table is reached through [`FootprintLookup`] so callers can supply
//! their own study's table.

use crate::models::{MetricsSummary, UNLABELED};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Per-label emission factors.
pub trait FootprintLookup {
    /// kg CO₂ per km for `label`, or `None` when the label is not a known mode.
    fn footprint_for_label(&self, label: &str) -> Option<f64>;

    /// The largest factor of any known mode.
    fn highest_footprint(&self) -> f64;
}

/// Emission factor table with label aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionFactors {
    pub factors: BTreeMap<String, f64>,
    pub aliases: BTreeMap<String, String>,
}

impl Default for EmissionFactors {
    fn default() -> Self {
        let factors = [
            ("WALKING", 0.0),
            ("BICYCLING", 0.0),
            ("E_BIKE", 0.00728),
            ("E_SCOOTER", 0.00894),
            ("BUS", 0.27867),
            ("LIGHT_RAIL", 0.12256),
            ("TRAM", 0.12256),
            ("SUBWAY", 0.09233),
            ("TRAIN", 0.09233),
            ("CAR", 0.26720),
            ("TAXI", 0.30741),
            ("AIR_OR_HSR", 0.21750),
        ];
        let aliases = [
            ("ON_FOOT", "WALKING"),
            ("walk", "WALKING"),
            ("bike", "BICYCLING"),
            ("e-bike", "E_BIKE"),
            ("scootershare", "E_SCOOTER"),
            ("bus", "BUS"),
            ("train", "TRAIN"),
            ("drove_alone", "CAR"),
            ("shared_ride", "CAR"),
            ("taxi", "TAXI"),
            ("air", "AIR_OR_HSR"),
        ];
        Self {
            factors: factors.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            aliases: aliases
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl EmissionFactors {
    pub fn new(factors: BTreeMap<String, f64>) -> Self {
        Self {
            factors,
            aliases: BTreeMap::new(),
        }
    }
}

impl FootprintLookup for EmissionFactors {
    fn footprint_for_label(&self, label: &str) -> Option<f64> {
        let key = self.aliases.get(label).map(String::as_str).unwrap_or(label);
        self.factors.get(key).copied()
    }

    fn highest_footprint(&self) -> f64 {
        self.factors.values().copied().fold(0.0, f64::max)
    }
}

fn m_to_km(metres: f64) -> f64 {
    metres / 1000.0
}

/// kg CO₂ for a distance-by-label summary.
///
/// [`UNLABELED`] distance, and distance under labels the lookup does not know,
/// is charged at `default_if_missing`.
pub fn footprint_for_metrics(
    summary: &MetricsSummary,
    default_if_missing: f64,
    lookup: &dyn FootprintLookup,
) -> f64 {
    summary
        .ordered()
        .into_iter()
        .map(|(label, value)| {
            let km = m_to_km(value.total());
            if label == UNLABELED {
                return default_if_missing * km;
            }
            match lookup.footprint_for_label(label) {
                Some(factor) => factor * km,
                None => {
                    warn!(mode = label, "Footprint requested for an unknown mode, using default");
                    default_if_missing * km
                }
            }
        })
        .sum()
}

pub fn highest_footprint(lookup: &dyn FootprintLookup) -> f64 {
    lookup.highest_footprint()
}

/// kg CO₂ if all of `distance` metres were travelled by the highest-emission mode.
pub fn highest_footprint_for_distance(distance: f64, lookup: &dyn FootprintLookup) -> f64 {
    lookup.highest_footprint() * m_to_km(distance)
}

/// Best and worst case kg CO₂ for one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FootprintRange {
    pub low: f64,
    pub high: f64,
}

impl FootprintRange {
    /// Low charges unlabeled distance nothing; high charges it at the highest factor.
    pub fn for_summary(summary: &MetricsSummary, lookup: &dyn FootprintLookup) -> Self {
        Self {
            low: footprint_for_metrics(summary, 0.0, lookup),
            high: footprint_for_metrics(summary, highest_footprint(lookup), lookup),
        }
    }

    /// Exact comparison on unrounded values.
    pub fn is_single_value(&self) -> bool {
        self.low == self.high
    }

    pub fn display(&self) -> FootprintDisplay {
        if self.is_single_value() {
            FootprintDisplay::Single(self.low.round() as i64)
        } else {
            FootprintDisplay::Range {
                low: self.low.round() as i64,
                high: self.high.round() as i64,
            }
        }
    }
}

/// Rounded kg CO₂ ready for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FootprintDisplay {
    Single(i64),
    Range { low: i64, high: i64 },
}

impl FootprintDisplay {
    pub fn is_range(&self) -> bool {
        matches!(self, FootprintDisplay::Range { .. })
    }
}

impl fmt::Display for FootprintDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FootprintDisplay::Single(v) => write!(f, "{}", v),
            FootprintDisplay::Range { low, high } => write!(f, "{} - {}", low, high),
        }
    }
}

/// Percent change from `previous` to `current`; `None` when `previous` is zero.
pub fn calculate_percent_change(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    let change = current * 100.0 / previous - 100.0;
    change.is_finite().then_some(change)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentChange {
    pub low: f64,
    pub high: f64,
}

/// Percent change of both bounds; `None` if either previous bound is zero.
pub fn range_percent_change(
    previous: &FootprintRange,
    current: &FootprintRange,
) -> Option<PercentChange> {
    Some(PercentChange {
        low: calculate_percent_change(previous.low, current.low)?,
        high: calculate_percent_change(previous.high, current.high)?,
    })
}
