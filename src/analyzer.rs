//! Dashboard Analysis Engine
//!
//! [`DashboardAnalyzer`] runs one CLI command end to end:
//!
//! 1. **Parse** the timeline file into day records
//! 2. **Load** a window of days, two weeks unless `--since`/`--end` say otherwise
//! 3. **Summarize** the window into per-metric daily data
//! 4. **Fetch** aggregate data when a file or server is available
//! 5. **Report** through the [`DisplayManager`]
//!
//! Failures inside a report section are shown and skipped. Input errors stop
//! the run.

use crate::carbon::carbon_text;
use crate::chart::{
    build_chart_records, color_for_label, readable_label, BaseModeColors, ChartRecord,
};
use crate::config::Config;
use crate::dashboard::{build_dashboard, population_totals, PopulationTotals};
use crate::display::{ConsoleErrorSink, DisplayManager};
use crate::error::ErrorSink;
use crate::models::*;
use crate::parser::TimelineParser;
use crate::summary::generate_summaries;
use crate::timeline::{ready_to_load, InMemoryTimeline, TimelineProvider, N_DAYS_TO_LOAD};
use crate::units::{UnitSystem, UnitUtils};
use crate::weeks::{summarize_weeks, unique_labels, WeeklySummaries};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Days loaded before asking the timeline for more.
const INITIAL_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Summary,
    Footprint,
    Chart,
    Dashboard,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Summary => "summary",
            Command::Footprint => "footprint",
            Command::Chart => "chart",
            Command::Dashboard => "dashboard",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub command: Command,
    pub input: PathBuf,
    pub json_output: bool,
    pub since: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub unit_system: UnitSystem,
    /// Chart only
    pub metric: MetricName,
    /// Chart only; defaults to the metric's first configured field
    pub field: Option<String>,
    /// Saved aggregate metrics, used instead of the server
    pub aggregate: Option<PathBuf>,
}

impl RunOptions {
    pub fn new(command: Command, input: PathBuf) -> Self {
        Self {
            command,
            input,
            json_output: false,
            since: None,
            end: None,
            unit_system: UnitSystem::default(),
            metric: MetricName::Distance,
            field: None,
            aggregate: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    pub metric: MetricName,
    pub field: String,
    pub totals: PopulationTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly: Option<WeeklySummaries>,
    #[serde(skip)]
    pub units: UnitUtils,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub range: DateRange,
    pub metrics: Vec<MetricReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartReport {
    pub metric: MetricName,
    pub field: String,
    pub axis_label: String,
    pub records: Vec<ChartRecord>,
    /// readable label -> bar color
    pub colors: BTreeMap<String, String>,
}

pub struct DashboardAnalyzer {
    config: Config,
    parser: TimelineParser,
    display: DisplayManager,
}

impl DashboardAnalyzer {
    pub fn new(config: Config) -> Self {
        let display = DisplayManager::new(config.output.json_pretty);
        Self {
            config,
            parser: TimelineParser::new(),
            display,
        }
    }

    pub async fn run(&self, options: &RunOptions) -> Result<()> {
        let sink = ConsoleErrorSink;
        let (range, days) = self.load_window(options)?;
        info!(
            command = options.command.as_str(),
            range = %range,
            days = days.len(),
            "Loaded timeline window"
        );

        let metric_list = &self.config.dashboard.metric_list;
        let user = generate_summaries(metric_list, &days, &self.config.dashboard.summary, None)
            .context("Failed to compute user metrics")?;

        match options.command {
            Command::Summary => {
                let report = self.summary_report(&user, &range, options.unit_system)?;
                self.display.display_summary(&report, options.json_output);
            }
            Command::Footprint => {
                let agg = self.aggregate_metrics(options, &range, &sink).await?;
                let text = carbon_text(
                    Some(&user),
                    agg.as_ref(),
                    &range,
                    metric_list,
                    &self.config.dashboard.footprint_options,
                    &self.config.emission_factors,
                )?;
                self.display.display_footprint(&text, &range, options.json_output);
            }
            Command::Chart => {
                let report = self.chart_report(&user, options)?;
                self.display.display_chart(&report, options.json_output);
            }
            Command::Dashboard => {
                let agg = self.aggregate_metrics(options, &range, &sink).await?;
                let view = build_dashboard(
                    Some(&user),
                    agg.as_ref(),
                    &range,
                    &self.config.dashboard,
                    &self.config.emission_factors,
                    options.unit_system,
                    &sink,
                );
                self.display.display_dashboard(&view, options.json_output);
            }
        }
        Ok(())
    }

    /// Parse the input and pick the window of days to report on.
    pub fn load_window(&self, options: &RunOptions) -> Result<(DateRange, Vec<DayRecord>)> {
        let input = self.parser.parse_file(&options.input)?;
        let days = input.into_days(&self.config.dashboard.metric_list);
        let mut timeline = InMemoryTimeline::new(days, INITIAL_DAYS);

        let available = timeline
            .available_range()
            .with_context(|| format!("No trip data in {}", options.input.display()))?;

        if options.since.is_some() || options.end.is_some() {
            let end = options.end.unwrap_or(available.end());
            let start = options
                .since
                .unwrap_or(end - Duration::days(i64::from(N_DAYS_TO_LOAD) - 1));
            timeline.load_date_range(DateRange::new(start, end)?)?;
        } else {
            let mut requests = 0;
            while !ready_to_load(&mut timeline) {
                requests += 1;
                debug!(requests, "Waiting for more days to load");
            }
        }

        let range = timeline.date_range().context("No date range loaded")?;
        Ok((range, timeline.days()))
    }

    pub fn summary_report(
        &self,
        user: &MetricsData,
        range: &DateRange,
        system: UnitSystem,
    ) -> Result<SummaryReport> {
        let mut metrics = Vec::new();
        for (metric, fields) in &self.config.dashboard.metric_list {
            let Some(field) = fields.first() else {
                continue;
            };
            let days = user.get(*metric).unwrap_or_default();
            let units = UnitUtils::for_metric(*metric, system);
            metrics.push(MetricReport {
                metric: *metric,
                field: field.clone(),
                totals: population_totals(days, field, &units)?,
                weekly: summarize_weeks(days, range, field)?,
                units,
            });
        }
        Ok(SummaryReport { range: *range, metrics })
    }

    pub fn chart_report(&self, user: &MetricsData, options: &RunOptions) -> Result<ChartReport> {
        let metric = options.metric;
        let field = match &options.field {
            Some(field) => field.clone(),
            None => self
                .config
                .dashboard
                .metric_list
                .get(&metric)
                .and_then(|f| f.first())
                .cloned()
                .with_context(|| {
                    format!("Metric '{}' is not in the configured metric list", metric)
                })?,
        };
        let days = user.get(metric).unwrap_or_default();
        let units = UnitUtils::for_metric(metric, options.unit_system);

        let palette = BaseModeColors::default();
        let colors = unique_labels(days, &field)
            .into_iter()
            .map(|label| (readable_label(&label), color_for_label(&label, &palette)))
            .collect();

        Ok(ChartReport {
            metric,
            axis_label: units.axis_label().to_string(),
            records: build_chart_records(days, &field, &units),
            field,
            colors,
        })
    }

    /// Aggregate metrics from `--aggregate`, else from the configured server.
    async fn aggregate_metrics(
        &self,
        options: &RunOptions,
        range: &DateRange,
        sink: &dyn ErrorSink,
    ) -> Result<Option<MetricsData>> {
        if let Some(path) = &options.aggregate {
            return Ok(Some(self.parser.parse_metrics_file(path)?));
        }

        Ok(self.fetch_from_server(range, sink).await)
    }

    #[cfg(feature = "remote")]
    async fn fetch_from_server(
        &self,
        range: &DateRange,
        sink: &dyn ErrorSink,
    ) -> Option<MetricsData> {
        use crate::aggregate::{fetch_agg_metrics, AggregateClient};

        let Some(url) = &self.config.server.connect_url else {
            debug!("No server configured, skipping aggregate metrics");
            return None;
        };
        let client = match AggregateClient::new(url, self.config.server.timeout()) {
            Ok(client) => client,
            Err(e) => {
                sink.display_error("Error fetching aggregate metrics", &e);
                return None;
            }
        };
        fetch_agg_metrics(
            Some(&client),
            &self.config.dashboard.metric_list,
            range,
            &self.config.survey_info,
            sink,
        )
        .await
    }

    #[cfg(not(feature = "remote"))]
    async fn fetch_from_server(
        &self,
        _range: &DateRange,
        _sink: &dyn ErrorSink,
    ) -> Option<MetricsData> {
        debug!("Built without remote support, skipping aggregate metrics");
        None
    }
}
