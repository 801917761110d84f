//! herakles-perf-monitor library.
//!
//! Samples host CPU and memory utilization once per tick and persists a
//! performance log only when a metric enters an over-threshold episode or
//! reaches a new peak within one.

pub mod aggregator;
pub mod config;
pub mod display;
pub mod error;
pub mod health_stats;
pub mod model;
pub mod orchestrator;
pub mod sink;
pub mod source;
pub mod system;
pub mod tracker;

pub use aggregator::Aggregator;
pub use config::{Config, MonitorSettings};
pub use error::MonitorError;
pub use health_stats::HealthStats;
pub use model::{
    CoreCounts, DisplayFrame, LogEvent, MemoryReading, MetricKind, ProcessSample, RankedProcess,
    UtilizationReading,
};
pub use orchestrator::{Orchestrator, TickReport};
pub use tracker::{Decision, PeakState, PeakTracker};
