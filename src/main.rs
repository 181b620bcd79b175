use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::Instrument;

use trip_metrics::analyzer::{Command, DashboardAnalyzer, RunOptions};
use trip_metrics::config::Config;
use trip_metrics::logging::{init_logging, run_span};
use trip_metrics::models::MetricName;
use trip_metrics::units::UnitSystem;

#[derive(Parser)]
#[command(name = "trip-metrics")]
#[command(about = "Trip summaries, weekly comparisons and footprint ranges from a travel diary")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct CommonArgs {
    /// Timeline file: JSON with "days" or "trips", or JSON Lines of trips
    #[arg(long, short)]
    input: PathBuf,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
    /// Last day of the window (YYYY-MM-DD)
    #[arg(long)]
    end: Option<String>,
    /// First day of the window (YYYY-MM-DD)
    #[arg(long)]
    since: Option<String>,
    /// Show distances in miles
    #[arg(long)]
    imperial: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-label totals and weekly comparisons for each metric
    Summary {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Carbon footprint ranges for the past weeks
    Footprint {
        #[command(flatten)]
        common: CommonArgs,
        /// Saved aggregate metrics (JSON) for the group value
        #[arg(long)]
        aggregate: Option<PathBuf>,
    },
    /// Per-day chart records for one metric
    Chart {
        #[command(flatten)]
        common: CommonArgs,
        /// distance, duration, count or response_count
        #[arg(long, default_value = "distance")]
        metric: MetricName,
        /// Grouping field, e.g. mode_confirm
        #[arg(long)]
        field: Option<String>,
    },
    /// Every configured dashboard section
    Dashboard {
        #[command(flatten)]
        common: CommonArgs,
        /// Saved aggregate metrics (JSON) instead of fetching from the server
        #[arg(long)]
        aggregate: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };
    let _guard = init_logging(&config.logging, &config.paths.log_directory);

    let (options, json) = match build_options(cli.command, &config) {
        Ok(built) => built,
        Err(e) => handle_error(e, false),
    };

    let analyzer = DashboardAnalyzer::new(config);
    let span = run_span(options.command.as_str());
    match analyzer.run(&options).instrument(span).await {
        Ok(()) => Ok(()),
        Err(e) => handle_error(e, json),
    }
}

fn build_options(command: Commands, config: &Config) -> Result<(RunOptions, bool)> {
    let (kind, common, metric, field, aggregate) = match command {
        Commands::Summary { common } => (Command::Summary, common, None, None, None),
        Commands::Footprint { common, aggregate } => {
            (Command::Footprint, common, None, None, aggregate)
        }
        Commands::Chart {
            common,
            metric,
            field,
        } => (Command::Chart, common, Some(metric), field, None),
        Commands::Dashboard { common, aggregate } => {
            (Command::Dashboard, common, None, None, aggregate)
        }
    };

    let mut options = RunOptions::new(kind, common.input);
    options.json_output = common.json;
    options.since = parse_date(common.since.as_deref(), "since")?;
    options.end = parse_date(common.end.as_deref(), "end")?;
    options.unit_system = if common.imperial {
        UnitSystem::Imperial
    } else {
        config.output.unit_system
    };
    if let Some(metric) = metric {
        options.metric = metric;
    }
    options.field = field;
    options.aggregate = aggregate;

    Ok((options, common.json))
}

fn parse_date(value: Option<&str>, name: &str) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("Invalid {} date format: {}. Use YYYY-MM-DD", name, s))
        })
        .transpose()
}

fn handle_error(e: anyhow::Error, json: bool) -> ! {
    if json {
        println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
    } else {
        eprintln!("Error: {:#}", e);
    }
    process::exit(1);
}
