//! Footprint card text: the user's weekly kg CO₂ ranges and the group value.

use crate::error::MetricsError;
use crate::footprint::*;
use crate::models::*;
use crate::weeks::{format_date_range_of_days, segment_days_by_weeks, summarize_weeks};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FootprintOptions {
    /// Show the footnote explaining ranges caused by unlabeled trips
    pub unlabeled_uncertainty: bool,
}

impl Default for FootprintOptions {
    fn default() -> Self {
        Self {
            unlabeled_uncertainty: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CarbonEntryKind {
    PreviousWeek,
    PastWeek,
    WorstCase,
    GroupAverage,
}

impl CarbonEntryKind {
    pub fn title(&self) -> &'static str {
        match self {
            CarbonEntryKind::PreviousWeek => "Prev. week",
            CarbonEntryKind::PastWeek => "Past week",
            CarbonEntryKind::WorstCase => "Worst case",
            CarbonEntryKind::GroupAverage => "Group average",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarbonTextEntry {
    pub kind: CarbonEntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    pub range: FootprintRange,
    pub value: FootprintDisplay,
    /// Low and high differ because some distance is unlabeled
    pub uncertain: bool,
}

impl CarbonTextEntry {
    fn new(kind: CarbonEntryKind, period: Option<String>, range: FootprintRange) -> Self {
        Self {
            kind,
            period,
            range,
            value: range.display(),
            uncertain: !range.is_single_value(),
        }
    }

    /// `"Past week (5/4 - 5/10)²"`; the mark flags an uncertain range.
    pub fn label(&self) -> String {
        let mut label = match &self.period {
            Some(period) => format!("{} ({})", self.kind.title(), period),
            None => self.kind.title().to_string(),
        };
        if self.uncertain {
            label.push('²');
        }
        label
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarbonText {
    pub entries: Vec<CarbonTextEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<PercentChange>,
    pub show_uncertainty_footnote: bool,
}

/// Distance field the footprint is computed over.
pub fn distance_field(metric_list: &MetricList) -> &str {
    metric_list
        .get(&MetricName::Distance)
        .and_then(|fields| fields.first())
        .map(String::as_str)
        .unwrap_or(DEFAULT_GROUPING_FIELD)
}

/// Previous week, past week and worst case for the user's own distance.
///
/// The previous week is only shown when `range` covers all of it.
pub fn user_carbon_entries(
    distance: &[DayOfMetricData],
    range: &DateRange,
    field: &str,
    lookup: &dyn FootprintLookup,
) -> Result<(Vec<CarbonTextEntry>, Option<PercentChange>), MetricsError> {
    let Some(weekly) = summarize_weeks(distance, range, field)? else {
        return Ok((Vec::new(), None));
    };

    let mut entries = Vec::new();
    let mut change = None;
    let past = FootprintRange::for_summary(&weekly.this_week.summary, lookup);

    if let Some(last_week) = &weekly.last_week {
        let previous = FootprintRange::for_summary(&last_week.summary, lookup);
        change = range_percent_change(&previous, &past);
        entries.push(CarbonTextEntry::new(
            CarbonEntryKind::PreviousWeek,
            Some(last_week.period()),
            previous,
        ));
    }

    entries.push(CarbonTextEntry::new(
        CarbonEntryKind::PastWeek,
        Some(weekly.this_week.period()),
        past,
    ));

    let worst = highest_footprint_for_distance(weekly.this_week.summary.total(), lookup);
    entries.push(CarbonTextEntry::new(
        CarbonEntryKind::WorstCase,
        None,
        FootprintRange { low: worst, high: worst },
    ));

    debug!(entries = entries.len(), "Computed user carbon text");
    Ok((entries, change))
}

/// This week's footprint for the aggregate distance.
pub fn group_carbon_entry(
    distance: &[DayOfMetricData],
    range: &DateRange,
    field: &str,
    lookup: &dyn FootprintLookup,
) -> Result<Option<CarbonTextEntry>, MetricsError> {
    let Some(weekly) = summarize_weeks(distance, range, field)? else {
        return Ok(None);
    };
    let group = FootprintRange::for_summary(&weekly.this_week.summary, lookup);
    debug!(low = group.low, high = group.high, "Computed group carbon");
    Ok(Some(CarbonTextEntry::new(CarbonEntryKind::GroupAverage, None, group)))
}

/// Date range covered by the two most recent aggregate weeks.
pub fn subtitle_range(distance: &[DayOfMetricData], end: chrono::NaiveDate) -> Option<String> {
    let recent: Vec<DayOfMetricData> = segment_days_by_weeks(distance, end)
        .into_iter()
        .take(2)
        .rev()
        .flatten()
        .collect();
    format_date_range_of_days(&recent)
}

/// Everything the footprint card shows.
pub fn carbon_text(
    user: Option<&MetricsData>,
    agg: Option<&MetricsData>,
    range: &DateRange,
    metric_list: &MetricList,
    options: &FootprintOptions,
    lookup: &dyn FootprintLookup,
) -> Result<CarbonText, MetricsError> {
    let field = distance_field(metric_list);

    let (mut entries, change) = match user.and_then(|u| u.days(MetricName::Distance)) {
        Some(days) => user_carbon_entries(days, range, field, lookup)?,
        None => (Vec::new(), None),
    };

    let agg_distance = agg.and_then(|a| a.days(MetricName::Distance));
    if let Some(days) = agg_distance {
        entries.extend(group_carbon_entry(days, range, field, lookup)?);
    }

    Ok(CarbonText {
        entries,
        subtitle_range: agg_distance.and_then(|days| subtitle_range(days, range.end())),
        change,
        show_uncertainty_footnote: options.unlabeled_uncertainty,
    })
}
