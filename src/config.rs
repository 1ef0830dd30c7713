use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Top-level configuration for quictrace.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity (debug, info, warn, error). Default: "info".
    /// Used when no `--log-level` flag is given.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether diagnostic events are kept. Default: full.
    #[serde(default)]
    pub parse_mode: ParseMode,

    /// Derived analytics configuration.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report threshold configuration.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Which event kinds ingestion keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Keep every event.
    #[default]
    Full,
    /// Drop error, assert and log message events.
    Filtered,
}

/// Derived analytics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Width of a connection throughput window. Default: 25ms.
    #[serde(default = "default_resolution", with = "humantime_serde")]
    pub throughput_resolution: Duration,

    /// Width of a datapath batching window. Default: 25ms.
    #[serde(default = "default_resolution", with = "humantime_serde")]
    pub datapath_resolution: Duration,

    /// Cut trailing idle and cleanup phases from stream timing at the end
    /// of the trace. Default: true.
    #[serde(default = "default_true")]
    pub trim_trailing: bool,
}

/// Report threshold configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Average queue delay at which a worker is reported unhealthy.
    /// Default: 25ms.
    #[serde(default = "default_unhealthy_queue_delay", with = "humantime_serde")]
    pub unhealthy_queue_delay: Duration,

    /// Active percentage at or below which a worker is mostly idle.
    /// Default: 5.
    #[serde(default = "default_idle_active_percent")]
    pub idle_active_percent: u64,

    /// Active percentage at or above which a worker is really active.
    /// Default: 80.
    #[serde(default = "default_busy_active_percent")]
    pub busy_active_percent: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_resolution() -> Duration {
    Duration::from_millis(25)
}

fn default_true() -> bool {
    true
}

fn default_unhealthy_queue_delay() -> Duration {
    Duration::from_millis(25)
}

fn default_idle_active_percent() -> u64 {
    5
}

fn default_busy_active_percent() -> u64 {
    80
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            parse_mode: ParseMode::default(),
            analysis: AnalysisConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            throughput_resolution: default_resolution(),
            datapath_resolution: default_resolution(),
            trim_trailing: default_true(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            unhealthy_queue_delay: default_unhealthy_queue_delay(),
            idle_active_percent: default_idle_active_percent(),
            busy_active_percent: default_busy_active_percent(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        Self::parse(&data).with_context(|| format!("loading config file {}", path.display()))
    }

    /// Parse and validate configuration from YAML text. Empty input yields
    /// the defaults.
    pub fn parse(data: &str) -> Result<Self> {
        let cfg: Config = if data.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(data).context("parsing config")?
        };

        cfg.validate()?;

        Ok(cfg)
    }

    /// Tracing filter to install: `flag` when present, else `log_level`.
    pub fn log_filter<'a>(&'a self, flag: Option<&'a str>) -> &'a str {
        flag.unwrap_or(&self.log_level)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.analysis.throughput_resolution.is_zero() {
            bail!("analysis.throughput_resolution must be positive");
        }

        if self.analysis.datapath_resolution.is_zero() {
            bail!("analysis.datapath_resolution must be positive");
        }

        let report = &self.report;
        if report.idle_active_percent > 100 {
            bail!("report.idle_active_percent must be at most 100");
        }

        if report.busy_active_percent > 100 {
            bail!("report.busy_active_percent must be at most 100");
        }

        if report.idle_active_percent >= report.busy_active_percent {
            bail!(
                "report.idle_active_percent ({}) must be below report.busy_active_percent ({})",
                report.idle_active_percent,
                report.busy_active_percent
            );
        }

        Ok(())
    }
}
