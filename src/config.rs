//! Configuration for herakles-perf-monitor.
//!
//! All fields are optional so that a partial YAML/JSON/TOML file merges onto
//! the defaults. `MonitorSettings` is the resolved, validated view the
//! sampling loop runs with.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::aggregator::DEFAULT_TOP_N;
use crate::error::MonitorError;
use crate::model::MetricKind;
use crate::system;

// Default configuration constants
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 75.0;
pub const DEFAULT_TICK_INTERVAL_SECONDS: f64 = 1.0;
pub const MIN_TICK_INTERVAL_SECONDS: f64 = 0.001;
pub const MAX_TICK_INTERVAL_SECONDS: f64 = 86_400.0;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_DATABASE_PATH: &str = "./herakles-perf-monitor.db";
pub const DEFAULT_SINK_BUSY_TIMEOUT_MS: u64 = 5000;

/// Locations probed when no config path is given, in order.
pub const DEFAULT_CONFIG_LOCATIONS: [&str; 8] = [
    "/etc/herakles/perf-monitor.yaml",
    "/etc/herakles/perf-monitor.yml",
    "/etc/herakles/perf-monitor.json",
    "/etc/herakles/perf-monitor.toml",
    "./herakles-perf-monitor.yaml",
    "./herakles-perf-monitor.yml",
    "./herakles-perf-monitor.json",
    "./herakles-perf-monitor.toml",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Decision policy
    #[serde(alias = "threshold-percent")]
    pub threshold_percent: Option<f64>,
    /// Overrides `threshold_percent` for CPU only
    #[serde(alias = "cpu-threshold-percent")]
    pub cpu_threshold_percent: Option<f64>,
    /// Overrides `threshold_percent` for RAM only
    #[serde(alias = "ram-threshold-percent")]
    pub ram_threshold_percent: Option<f64>,

    // Sampling
    #[serde(alias = "tick-interval-seconds")]
    pub tick_interval_seconds: Option<f64>,
    #[serde(alias = "top-n")]
    pub top_n: Option<usize>,
    #[serde(alias = "device-name")]
    pub device_name: Option<String>,

    // Persistence
    #[serde(alias = "database-path")]
    pub database_path: Option<PathBuf>,
    #[serde(alias = "sink-busy-timeout-ms")]
    pub sink_busy_timeout_ms: Option<u64>,
    /// Keep events in memory instead of the database
    #[serde(alias = "dry-run")]
    pub dry_run: Option<bool>,

    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,
    #[serde(alias = "enable-http")]
    pub enable_http: Option<bool>,

    // Display
    #[serde(alias = "enable-console")]
    pub enable_console: Option<bool>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold_percent: Some(DEFAULT_THRESHOLD_PERCENT),
            cpu_threshold_percent: None,
            ram_threshold_percent: None,
            tick_interval_seconds: Some(DEFAULT_TICK_INTERVAL_SECONDS),
            top_n: Some(DEFAULT_TOP_N),
            device_name: None,
            database_path: Some(PathBuf::from(DEFAULT_DATABASE_PATH)),
            sink_busy_timeout_ms: Some(DEFAULT_SINK_BUSY_TIMEOUT_MS),
            dry_run: Some(false),
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            enable_http: Some(true),
            enable_console: Some(false),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    pub fn threshold_for(&self, kind: MetricKind) -> f64 {
        let shared = self.threshold_percent.unwrap_or(DEFAULT_THRESHOLD_PERCENT);
        match kind {
            MetricKind::Cpu => self.cpu_threshold_percent.unwrap_or(shared),
            MetricKind::Ram => self.ram_threshold_percent.unwrap_or(shared),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH))
    }

    pub fn sink_busy_timeout(&self) -> Duration {
        Duration::from_millis(
            self.sink_busy_timeout_ms
                .unwrap_or(DEFAULT_SINK_BUSY_TIMEOUT_MS),
        )
    }

    /// Resolves the settings the sampling loop runs with. The device name
    /// falls back to the host name.
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            cpu_threshold: self.threshold_for(MetricKind::Cpu),
            ram_threshold: self.threshold_for(MetricKind::Ram),
            tick_interval: self
                .tick_interval_seconds
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
                .filter(|d| !d.is_zero())
                .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_TICK_INTERVAL_SECONDS)),
            top_n: self.top_n.unwrap_or(DEFAULT_TOP_N).max(1),
            device_name: self
                .device_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(system::hostname),
        }
    }
}

/// Effective settings of the sampling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub cpu_threshold: f64,
    pub ram_threshold: f64,
    pub tick_interval: Duration,
    pub top_n: usize,
    pub device_name: String,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Config::default().monitor_settings()
    }
}

impl MonitorSettings {
    pub fn threshold_for(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Cpu => self.cpu_threshold,
            MetricKind::Ram => self.ram_threshold,
        }
    }
}

fn validate_threshold(name: &str, value: Option<f64>) -> Result<(), MonitorError> {
    if let Some(v) = value {
        if !(v.is_finite() && v > 0.0 && v <= 100.0) {
            return Err(MonitorError::Config(format!(
                "{} must be within (0, 100], got {}",
                name, v
            )));
        }
    }
    Ok(())
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), MonitorError> {
    validate_threshold("threshold_percent", cfg.threshold_percent)?;
    validate_threshold("cpu_threshold_percent", cfg.cpu_threshold_percent)?;
    validate_threshold("ram_threshold_percent", cfg.ram_threshold_percent)?;

    if let Some(interval) = cfg.tick_interval_seconds {
        if !(MIN_TICK_INTERVAL_SECONDS..=MAX_TICK_INTERVAL_SECONDS).contains(&interval) {
            return Err(MonitorError::Config(format!(
                "tick_interval_seconds must be between {} and {}, got {}",
                MIN_TICK_INTERVAL_SECONDS, MAX_TICK_INTERVAL_SECONDS, interval
            )));
        }
    }

    if cfg.top_n == Some(0) {
        return Err(MonitorError::Config("top_n must be at least 1".into()));
    }

    if let Some(name) = &cfg.device_name {
        if name.trim().is_empty() {
            return Err(MonitorError::Config("device_name must not be empty".into()));
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        match level.to_ascii_lowercase().as_str() {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(MonitorError::Config(format!(
                    "Invalid log_level '{}', expected off/error/warn/info/debug/trace",
                    other
                )))
            }
        }
    }

    Ok(())
}

/// Loads configuration from `path`, or from the first existing default
/// location. Falls back to defaults when no file is found. The format is
/// chosen by extension (YAML when unknown).
pub fn load_config(path: Option<&Path>) -> Result<Config, MonitorError> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(MonitorError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_LOCATIONS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
        {
            Some(p) => p.to_path_buf(),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .map_err(|e| MonitorError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let config = parse_config(&content, path.extension().and_then(|s| s.to_str()))?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config content in the format named by `extension`. Keys missing
/// from the content keep their default values.
pub fn parse_config(content: &str, extension: Option<&str>) -> Result<Config, MonitorError> {
    let parsed: Config = match extension {
        Some("json") => serde_json::from_str(content)
            .map_err(|e| MonitorError::Config(format!("Invalid JSON config: {}", e)))?,
        Some("toml") => toml::from_str(content)
            .map_err(|e| MonitorError::Config(format!("Invalid TOML config: {}", e)))?,
        _ => serde_yaml::from_str(content)
            .map_err(|e| MonitorError::Config(format!("Invalid YAML config: {}", e)))?,
    };
    Ok(merge_onto_defaults(parsed))
}

fn merge_onto_defaults(user: Config) -> Config {
    let d = Config::default();
    Config {
        threshold_percent: user.threshold_percent.or(d.threshold_percent),
        cpu_threshold_percent: user.cpu_threshold_percent.or(d.cpu_threshold_percent),
        ram_threshold_percent: user.ram_threshold_percent.or(d.ram_threshold_percent),
        tick_interval_seconds: user.tick_interval_seconds.or(d.tick_interval_seconds),
        top_n: user.top_n.or(d.top_n),
        device_name: user.device_name.or(d.device_name),
        database_path: user.database_path.or(d.database_path),
        sink_busy_timeout_ms: user.sink_busy_timeout_ms.or(d.sink_busy_timeout_ms),
        dry_run: user.dry_run.or(d.dry_run),
        port: user.port.or(d.port),
        bind: user.bind.or(d.bind),
        enable_http: user.enable_http.or(d.enable_http),
        enable_console: user.enable_console.or(d.enable_console),
        log_level: user.log_level.or(d.log_level),
    }
}
