//! Configuration
//!
//! Settings come from, in increasing precedence:
//! - Built-in defaults
//! - The first config file found (`trip-metrics.toml`, `.trip-metrics.toml`,
//!   `<config dir>/trip-metrics/config.toml`)
//! - Environment variables
//!
//! There is no process-wide instance. The CLI loads a [`Config`] once and
//! hands each library function the part it needs.

use crate::aggregate::SurveyInfo;
use crate::dashboard::DashboardConfig;
use crate::footprint::EmissionFactors;
use crate::units::UnitSystem;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const LOG_LEVELS: &[&str] = &["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
    pub server: ServerConfig,
    pub survey_info: SurveyInfo,
    pub dashboard: DashboardConfig,
    pub output: OutputConfig,
    pub emission_factors: EmissionFactors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// `console`, `file` or `both`
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "WARN".to_string(),
            format: "pretty".to_string(),
            output: "console".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn writes_to_file(&self) -> bool {
        matches!(self.output.as_str(), "file" | "both")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub log_directory: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_directory: dirs::data_local_dir()
                .map(|d| d.join("trip-metrics").join("logs"))
                .unwrap_or_else(|| PathBuf::from("logs")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Study server base URL; aggregate metrics are skipped without one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            connect_url: None,
            timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub json_pretty: bool,
    pub unit_system: UnitSystem,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_pretty: true,
            unit_system: UnitSystem::Metric,
        }
    }
}

impl Config {
    /// Load configuration from file, environment, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        let config_paths = [
            Some(PathBuf::from("trip-metrics.toml")),
            Some(PathBuf::from(".trip-metrics.toml")),
            dirs::config_dir().map(|d| d.join("trip-metrics").join("config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        if let Ok(val) = env::var("TRIP_METRICS_SERVER_URL") {
            self.server.connect_url = Some(val).filter(|v| !v.is_empty());
        }
        if let Ok(val) = env::var("TRIP_METRICS_UNITS") {
            self.output.unit_system = val
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid TRIP_METRICS_UNITS")?;
        }
        if let Ok(val) = env::var("TRIP_METRICS_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.logging.level.to_uppercase().as_str()) {
            return Err(anyhow::anyhow!("Unknown log level: {}", self.logging.level));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(anyhow::anyhow!(
                "Log format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            ));
        }
        if !matches!(self.logging.output.as_str(), "console" | "file" | "both") {
            return Err(anyhow::anyhow!(
                "Log output must be 'console', 'file' or 'both', got '{}'",
                self.logging.output
            ));
        }

        if let Some(url) = &self.server.connect_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow::anyhow!(
                    "Server URL must start with http:// or https://, got {}",
                    url
                ));
            }
        }
        if self.server.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Server timeout must be greater than 0"));
        }

        if self.dashboard.metric_list.values().any(Vec::is_empty) {
            return Err(anyhow::anyhow!(
                "Every metric in metric_list needs at least one grouping field"
            ));
        }
        if self.dashboard.sections.is_empty() {
            warn!("No dashboard sections configured, the dashboard will be empty");
        }

        if self.logging.writes_to_file() && !self.paths.log_directory.exists() {
            fs::create_dir_all(&self.paths.log_directory)
                .context("Failed to create log directory")?;
        }

        Ok(())
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}
