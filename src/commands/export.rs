//! Export command implementation.
//!
//! Prints the hardware code table and the persisted performance logs.

use anyhow::{bail, Context};
use herakles_perf_monitor::sink::{HardwareCode, PersistedLog, SqliteSink};
use herakles_perf_monitor::Config;
use serde::Serialize;
use std::fmt::Write as FmtWrite;

use crate::cli::ExportFormat;

#[derive(Serialize)]
struct ExportDocument {
    hardware_codes: Vec<HardwareCode>,
    performance_logs: Vec<PersistedLog>,
}

/// Prints the content of the event database.
pub fn command_export(
    format: ExportFormat,
    limit: Option<u32>,
    config: &Config,
) -> anyhow::Result<()> {
    let path = config.database_path();
    if !path.exists() {
        bail!("Database not found: {}", path.display());
    }

    let sink = SqliteSink::open(&path, config.sink_busy_timeout())
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let doc = ExportDocument {
        hardware_codes: sink.fetch_hardware_codes()?,
        performance_logs: sink.fetch_logs(limit)?,
    };

    match format {
        ExportFormat::Json => println!("{}", serde_json::to_string_pretty(&doc)?),
        ExportFormat::Yaml => print!("{}", serde_yaml::to_string(&doc)?),
        ExportFormat::Table => print!(
            "{}",
            render_tables(&doc.hardware_codes, &doc.performance_logs)
        ),
    }
    Ok(())
}

fn render_tables(codes: &[HardwareCode], logs: &[PersistedLog]) -> String {
    let mut out = String::new();

    writeln!(out, "HARDWARE CODES").ok();
    writeln!(out, "==============").ok();
    writeln!(out).ok();
    writeln!(out, "{:>4} | {}", "ID", "Name").ok();
    writeln!(out, "{}", "-".repeat(16)).ok();
    for code in codes {
        writeln!(out, "{:>4} | {}", code.id, code.name).ok();
    }

    writeln!(out).ok();
    writeln!(out, "PERFORMANCE LOGS").ok();
    writeln!(out, "================").ok();
    writeln!(out).ok();
    writeln!(
        out,
        "{:>6} | {:4} | {:>7} | {:>4} | {:>4} | {:>6} | {:>5} | {:>6} | {:20} | {}",
        "ID", "HW", "Usage %", "Phys", "Log", "Tot GB", "Used", "Avail", "Device", "Time"
    )
    .ok();
    writeln!(out, "{}", "-".repeat(110)).ok();
    for log in logs {
        let hw = log
            .metric_kind()
            .map(|k| k.as_str().to_string())
            .unwrap_or_else(|| log.hardware_id.to_string());
        writeln!(
            out,
            "{:>6} | {:4} | {:>7.1} | {:>4} | {:>4} | {:>6} | {:>5} | {:>6} | {:20} | {}",
            log.id,
            hw,
            log.usage_percent,
            log.physical_cores,
            log.logical_cores,
            log.total_memory_gb,
            log.used_memory_gb,
            log.available_memory_gb,
            log.device_name,
            log.time.format("%Y-%m-%d %H:%M:%S")
        )
        .ok();
    }
    writeln!(out).ok();
    writeln!(out, "{} log(s)", logs.len()).ok();
    out
}
