//! CLI command implementations for herakles-perf-monitor.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `sample`: Dry sampling without persistence
//! - `export`: Print hardware codes and persisted performance logs
//! - `generate`: Test data generation

pub mod check;
pub mod config;
pub mod export;
pub mod generate;
pub mod sample;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use export::command_export;
pub use generate::command_generate_testdata;
pub use sample::command_sample;
