//! CLI arguments and subcommands for herakles-perf-monitor.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format for exported performance logs
#[derive(Debug, Clone, ValueEnum)]
pub enum ExportFormat {
    Table,
    Json,
    Yaml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-perf-monitor",
    about = "Host CPU/RAM monitor that logs threshold entries and new peaks",
    long_about = "Host CPU/RAM monitor that logs threshold entries and new peaks.\n\n\
                  Samples CPU and memory utilization once per tick and persists a performance \
                  log only when a metric crosses the threshold or sets a new peak while above it, \
                  instead of one record per tick.",
    author = "Michael Moll <proc-mem@herakles.io> - Herakles IO",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides log_level from the config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Threshold in percent shared by CPU and RAM
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Seconds between two samples
    #[arg(long)]
    pub interval: Option<f64>,

    /// Number of processes ranked and summed for CPU utilization
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Device name stored with every log (defaults to the host name)
    #[arg(long)]
    pub device_name: Option<String>,

    /// SQLite database holding the performance logs
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Keep events in memory instead of writing the database
    #[arg(long)]
    pub dry_run: bool,

    /// Print the utilization summary and process table every tick
    #[arg(long)]
    pub console: bool,

    /// Do not start the HTTP server
    #[arg(long)]
    pub disable_http: bool,

    /// Path to JSON test data file (replays synthetic frames instead of /proc)
    #[arg(short = 't', long)]
    pub test_data_file: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check {
        /// Check /proc filesystem readers
        #[arg(long)]
        proc: bool,

        /// Check the event database
        #[arg(long)]
        database: bool,

        /// Check all system requirements
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run a few ticks without persisting and print what would happen
    Sample {
        /// Number of ticks
        #[arg(short = 'n', long, default_value_t = 3)]
        iterations: usize,

        /// Show the ranked process table for every tick
        #[arg(long)]
        verbose: bool,
    },

    /// Print the hardware codes and all persisted performance logs
    Export {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: ExportFormat,

        /// Only the newest N logs
        #[arg(short = 'l', long)]
        limit: Option<u32>,
    },

    /// Generate synthetic test data JSON file
    GenerateTestdata {
        /// Output file path
        #[arg(short = 'o', long, default_value = "testdata.json")]
        output: PathBuf,

        /// Number of frames to generate
        #[arg(long, default_value_t = 60)]
        frames: usize,

        /// Number of processes per frame
        #[arg(long, default_value_t = 30)]
        processes: usize,

        /// Logical cores of the simulated host
        #[arg(long, default_value_t = 8)]
        logical_cores: u32,
    },
}
