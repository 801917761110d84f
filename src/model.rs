//! Data types shared between the sampling core and its collaborators.
//!
//! Everything in here is plain data: samples coming in from the process and
//! memory sources, the ranked view produced by the aggregator, the events
//! handed to the sink and the frame handed to display subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One live process as reported by a process source for a single tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSample {
    pub pid: u32,
    /// CPU consumption where 100.0 means one fully busy logical core.
    pub raw_cpu_percent: f64,
    pub name: String,
}

impl ProcessSample {
    pub fn new(pid: u32, raw_cpu_percent: f64, name: impl Into<String>) -> Self {
        Self {
            pid,
            raw_cpu_percent,
            name: name.into(),
        }
    }
}

/// A process sample normalized to the whole host (0..100 scale).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProcess {
    pub pid: u32,
    pub normalized_cpu_percent: f64,
    pub name: String,
}

/// The two monitored metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Ram,
}

impl MetricKind {
    pub const ALL: [MetricKind; 2] = [MetricKind::Cpu, MetricKind::Ram];

    /// Identifier stored in the `hardware_id` column of persisted logs.
    pub fn hardware_id(self) -> i64 {
        match self {
            MetricKind::Cpu => 1,
            MetricKind::Ram => 2,
        }
    }

    pub fn from_hardware_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(MetricKind::Cpu),
            2 => Some(MetricKind::Ram),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Cpu => "CPU",
            MetricKind::Ram => "RAM",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounded utilization percentage for one metric at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilizationReading {
    pub metric_kind: MetricKind,
    pub percent: f64,
    pub timestamp: DateTime<Utc>,
}

impl UtilizationReading {
    pub fn new(metric_kind: MetricKind, percent: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            metric_kind,
            percent,
            timestamp,
        }
    }
}

/// Physical and logical core counts of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreCounts {
    pub physical: u32,
    pub logical: u32,
}

/// Host memory as reported by a memory source. Sizes are whole gibibytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryReading {
    pub percent: f64,
    pub total_gb: u64,
    pub used_gb: u64,
    pub available_gb: u64,
}

/// A record worth persisting: entry into an over-threshold episode or a new
/// peak within one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub metric_kind: MetricKind,
    pub usage_percent: f64,
    pub physical_cores: u32,
    pub logical_cores: u32,
    pub total_memory_gb: u64,
    pub used_memory_gb: u64,
    pub available_memory_gb: u64,
    pub device_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything a display subscriber gets once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayFrame {
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub physical_cores: u32,
    pub logical_cores: u32,
    pub total_gb: u64,
    pub used_gb: u64,
    pub available_gb: u64,
    pub ranked_processes: Vec<RankedProcess>,
    pub cpu_alarm: bool,
    pub ram_alarm: bool,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_id_mapping() {
        for kind in MetricKind::ALL {
            assert_eq!(MetricKind::from_hardware_id(kind.hardware_id()), Some(kind));
        }
        assert_eq!(MetricKind::from_hardware_id(0), None);
        assert_eq!(MetricKind::from_hardware_id(3), None);
    }

    #[test]
    fn test_metric_kind_serializes_lowercase() {
        let json = serde_json::to_string(&MetricKind::Ram).unwrap();
        assert_eq!(json, "\"ram\"");
        assert_eq!(MetricKind::Cpu.to_string(), "CPU");
    }
}
