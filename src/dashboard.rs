//! Dashboard assembly.
//!
//! Each configured section is computed independently: a section that fails
//! is reported through the [`ErrorSink`] and left empty, the rest still show.

use crate::active::{
    daily_active_minutes, default_active_modes, weekly_active_minutes, ActiveMinutes,
};
use crate::carbon::{carbon_text, CarbonText, FootprintOptions};
use crate::chart::ChartRecord;
use crate::error::{ErrorSink, MetricsError};
use crate::footprint::FootprintLookup;
use crate::models::*;
use crate::summary::SummaryOptions;
use crate::units::{UnitSystem, UnitUtils};
use crate::weeks::{format_date_range_of_days, summarize_days};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsUiSection {
    Footprint,
    ActiveTravel,
    Summary,
    Surveys,
    Engagement,
}

pub fn default_sections() -> Vec<MetricsUiSection> {
    vec![
        MetricsUiSection::Footprint,
        MetricsUiSection::ActiveTravel,
        MetricsUiSection::Summary,
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub metric_list: MetricList,
    pub sections: Vec<MetricsUiSection>,
    pub footprint_options: FootprintOptions,
    pub summary: SummaryOptions,
    pub active_modes: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            metric_list: default_metric_list(),
            sections: default_sections(),
            footprint_options: FootprintOptions::default(),
            summary: SummaryOptions::default(),
            active_modes: default_active_modes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelTotal {
    pub label: String,
    pub value: LabelValue,
    pub display: String,
}

/// Per-label totals of one population over the loaded days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationTotals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    pub totals: Vec<LabelTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryCard {
    pub metric: MetricName,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PopulationTotals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<PopulationTotals>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveTravel {
    pub weekly: Vec<ActiveMinutes>,
    pub daily: Vec<ChartRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub range: DateRange,
    pub sections: Vec<MetricsUiSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footprint: Option<CarbonText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_travel: Option<ActiveTravel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub summary: Vec<SummaryCard>,
}

/// Totals per label for `field`, with display strings in `units`.
pub fn population_totals(
    days: &[DayOfMetricData],
    field: &str,
    units: &UnitUtils,
) -> Result<PopulationTotals, MetricsError> {
    let summary = summarize_days(days, field)?;
    let totals = summary
        .ordered()
        .into_iter()
        .map(|(label, value)| LabelTotal {
            label: label.to_string(),
            value: value.clone(),
            display: units.display(value),
        })
        .collect();
    Ok(PopulationTotals {
        period: format_date_range_of_days(days),
        totals,
    })
}

fn summary_cards(
    user: Option<&MetricsData>,
    agg: Option<&MetricsData>,
    metric_list: &MetricList,
    system: UnitSystem,
) -> Result<Vec<SummaryCard>, MetricsError> {
    let mut cards = Vec::new();
    for (metric, fields) in metric_list {
        let Some(field) = fields.first() else {
            continue;
        };
        let units = UnitUtils::for_metric(*metric, system);
        let totals_for =
            |data: Option<&MetricsData>| -> Result<Option<PopulationTotals>, MetricsError> {
                data.and_then(|d| d.days(*metric))
                    .map(|days| population_totals(days, field, &units))
                    .transpose()
            };
        cards.push(SummaryCard {
            metric: *metric,
            field: field.clone(),
            user: totals_for(user)?,
            aggregate: totals_for(agg)?,
        });
    }
    Ok(cards)
}

fn active_travel(
    user: Option<&MetricsData>,
    range: &DateRange,
    config: &DashboardConfig,
) -> Result<Option<ActiveTravel>, MetricsError> {
    let Some(duration) = user.and_then(|u| u.days(MetricName::Duration)) else {
        return Ok(None);
    };
    let field = config
        .metric_list
        .get(&MetricName::Duration)
        .and_then(|f| f.first())
        .map(String::as_str)
        .unwrap_or(DEFAULT_GROUPING_FIELD);
    Ok(Some(ActiveTravel {
        weekly: weekly_active_minutes(duration, range, field, &config.active_modes)?,
        daily: daily_active_minutes(duration, field, &config.active_modes),
    }))
}

/// Assemble the configured dashboard sections from user and aggregate metrics.
pub fn build_dashboard(
    user: Option<&MetricsData>,
    agg: Option<&MetricsData>,
    range: &DateRange,
    config: &DashboardConfig,
    lookup: &dyn FootprintLookup,
    units: UnitSystem,
    sink: &dyn ErrorSink,
) -> DashboardView {
    let mut view = DashboardView {
        range: *range,
        sections: config.sections.clone(),
        footprint: None,
        active_travel: None,
        summary: Vec::new(),
    };

    for section in &config.sections {
        match section {
            MetricsUiSection::Footprint => {
                match carbon_text(
                    user,
                    agg,
                    range,
                    &config.metric_list,
                    &config.footprint_options,
                    lookup,
                ) {
                    Ok(text) => view.footprint = Some(text),
                    Err(e) => sink.display_error("Error computing footprint", &e),
                }
            }
            MetricsUiSection::ActiveTravel => match active_travel(user, range, config) {
                Ok(active) => view.active_travel = active,
                Err(e) => sink.display_error("Error computing active minutes", &e),
            },
            MetricsUiSection::Summary => {
                match summary_cards(user, agg, &config.metric_list, units) {
                    Ok(cards) => view.summary = cards,
                    Err(e) => sink.display_error("Error computing summaries", &e),
                }
            }
            MetricsUiSection::Surveys | MetricsUiSection::Engagement => {
                debug!(section = ?section, "Section has no content");
            }
        }
    }

    debug!(range = %range, sections = view.sections.len(), "Built dashboard");
    view
}
