//! Output formatting
//!
//! Every report prints either as colored terminal text or as JSON. Errors
//! shown through [`ConsoleErrorSink`] go to stderr so JSON on stdout stays
//! parseable.

use crate::analyzer::{ChartReport, SummaryReport};
use crate::carbon::CarbonText;
use crate::dashboard::{ActiveTravel, DashboardView, PopulationTotals, SummaryCard};
use crate::error::{ErrorSink, MetricsError};
use crate::models::DateRange;
use crate::units::{format_for_display, UnitUtils};
use crate::weeks::WeekSummary;
use colored::Colorize;
use serde::Serialize;

const RULE_WIDTH: usize = 60;

/// Prints sink errors in red on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleErrorSink;

impl ErrorSink for ConsoleErrorSink {
    fn display_error(&self, title: &str, error: &MetricsError) {
        tracing::error!(error = %error, "{}", title);
        eprintln!("{} {}", format!("{}:", title).red().bold(), error);
    }
}

pub struct DisplayManager {
    json_pretty: bool,
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DisplayManager {
    pub fn new(json_pretty: bool) -> Self {
        Self { json_pretty }
    }

    fn print_json<T: Serialize>(&self, key: &str, value: &T) {
        let rendered = serde_json::to_value(value).and_then(|value| {
            let mut output = serde_json::Map::new();
            output.insert(key.to_string(), value);
            if self.json_pretty {
                serde_json::to_string_pretty(&output)
            } else {
                serde_json::to_string(&output)
            }
        });
        match rendered {
            Ok(json_str) => println!("{}", json_str),
            Err(e) => eprintln!("Error serializing {} to JSON: {}", key, e),
        }
    }

    fn header(&self, title: &str, range: &DateRange) {
        println!("\n{}", "=".repeat(RULE_WIDTH).bright_cyan());
        println!("{}", title.bright_white().bold());
        println!("{}", range.to_string().bright_black());
        println!("{}", "=".repeat(RULE_WIDTH).bright_cyan());
    }

    pub fn display_summary(&self, report: &SummaryReport, json_output: bool) {
        if json_output {
            self.print_json("summary", report);
            return;
        }

        self.header("Trip Summary", &report.range);
        for metric in &report.metrics {
            println!(
                "\n{} {} by {}",
                "▸".bright_blue(),
                metric.metric.to_string().bright_white().bold(),
                metric.field.bright_cyan()
            );
            self.print_totals(&metric.totals);
            if let Some(weekly) = &metric.weekly {
                self.print_week("This week", &weekly.this_week, &metric.units);
                match &weekly.last_week {
                    Some(last) => self.print_week("Last week", last, &metric.units),
                    None => println!("   {}", "Last week: not enough data".bright_black()),
                }
            }
        }
        println!();
    }

    fn print_totals(&self, totals: &PopulationTotals) {
        if totals.totals.is_empty() {
            println!("   {}", "no trips".bright_black());
            return;
        }
        if let Some(period) = &totals.period {
            println!("   {}", period.bright_black());
        }
        for total in &totals.totals {
            println!("   {:<24} {}", total.label.bright_cyan(), total.display.bright_green());
        }
    }

    fn print_week(&self, title: &str, week: &WeekSummary, units: &UnitUtils) {
        let totals: Vec<String> = week
            .summary
            .ordered()
            .into_iter()
            .map(|(label, value)| format!("{} {}", label, units.display(value)))
            .collect();
        println!(
            "   {} ({}, {} days): {}",
            title.bright_white(),
            week.period(),
            week.days,
            totals.join(", ")
        );
    }

    pub fn display_footprint(&self, text: &CarbonText, range: &DateRange, json_output: bool) {
        if json_output {
            self.print_json("footprint", text);
            return;
        }

        self.header("Carbon Footprint", range);
        self.print_carbon(text);
        println!();
    }

    fn print_carbon(&self, text: &CarbonText) {
        if let Some(subtitle) = &text.subtitle_range {
            println!("{}", format!("Estimated emissions ({})", subtitle).bright_black());
        }
        if text.entries.is_empty() {
            println!("   {}", "no distance data".bright_black());
        }
        for entry in &text.entries {
            println!(
                "   {:<32} {}",
                entry.label().bright_white(),
                format!("{} kg CO₂", entry.value).bright_green().bold()
            );
        }
        if let Some(change) = &text.change {
            println!(
                "   {:<32} {}",
                "Change from previous week".bright_white(),
                format!("{:+.0}% to {:+.0}%", change.low, change.high).bright_yellow()
            );
        }
        if text.show_uncertainty_footnote {
            println!(
                "{}",
                "² Range shown because some trips are unlabeled.".bright_black().italic()
            );
        }
    }

    pub fn display_chart(&self, report: &ChartReport, json_output: bool) {
        if json_output {
            self.print_json("chart", report);
            return;
        }

        println!(
            "\n{} {} by {} ({})",
            "📊".bright_yellow(),
            report.metric.to_string().bright_white().bold(),
            report.field.bright_cyan(),
            report.axis_label
        );
        for record in &report.records {
            let day = chrono::DateTime::from_timestamp_millis(record.y)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| record.y.to_string());
            let color = report.colors.get(&record.label).map(String::as_str).unwrap_or("");
            println!(
                "   {} {:<20} {:>10} {}",
                day.bright_black(),
                record.label.bright_cyan(),
                format_for_display(record.x).bright_green(),
                color.bright_black()
            );
        }
        println!();
    }

    pub fn display_dashboard(&self, view: &DashboardView, json_output: bool) {
        if json_output {
            self.print_json("dashboard", view);
            return;
        }

        self.header("Metrics Dashboard", &view.range);
        if let Some(footprint) = &view.footprint {
            println!("\n{}", "Footprint".bright_white().bold());
            self.print_carbon(footprint);
        }
        if let Some(active) = &view.active_travel {
            self.print_active_travel(active);
        }
        for card in &view.summary {
            self.print_summary_card(card);
        }
        println!();
    }

    fn print_active_travel(&self, active: &ActiveTravel) {
        println!("\n{}", "Active Travel (minutes)".bright_white().bold());
        for mode in &active.weekly {
            let last = mode
                .last_week
                .map(format_for_display)
                .unwrap_or_else(|| "-".to_string());
            println!(
                "   {:<16} this week {:>8}   last week {:>8}",
                mode.mode.bright_cyan(),
                format_for_display(mode.this_week).bright_green(),
                last.bright_white()
            );
        }
    }

    fn print_summary_card(&self, card: &SummaryCard) {
        println!(
            "\n{} {}",
            card.metric.to_string().bright_white().bold(),
            format!("by {}", card.field).bright_black()
        );
        if let Some(user) = &card.user {
            println!("  {}", "Your totals".bright_white());
            self.print_totals(user);
        }
        if let Some(aggregate) = &card.aggregate {
            println!("  {}", "Group totals".bright_white());
            self.print_totals(aggregate);
        }
    }
}
