//! Display subscribers.
//!
//! A `DisplaySink` receives one `DisplayFrame` per tick, whatever the peak
//! trackers decided. Subscribers only present data; they never feed back into
//! the sampling loop.

use std::fmt::Write as FmtWrite;
use std::io::Write;
use tracing::{debug, warn};

use crate::model::{DisplayFrame, RankedProcess};

pub trait DisplaySink: Send {
    fn render(&mut self, frame: &DisplayFrame);
}

/// Emits each frame as a structured debug event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn render(&mut self, frame: &DisplayFrame) {
        debug!(
            cpu_percent = frame.cpu_percent,
            ram_percent = frame.ram_percent,
            cpu_alarm = frame.cpu_alarm,
            ram_alarm = frame.ram_alarm,
            used_gb = frame.used_gb,
            top_process = frame.ranked_processes.first().map(|p| p.name.as_str()).unwrap_or("-"),
            "tick"
        );
    }
}

/// Writes a human readable summary and process table to a writer
/// (stdout by default) on every tick.
pub struct ConsoleDisplay<W: Write + Send> {
    out: W,
}

impl ConsoleDisplay<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> DisplaySink for ConsoleDisplay<W> {
    fn render(&mut self, frame: &DisplayFrame) {
        let text = render_frame(frame);
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            warn!("Failed to write console display: {}", e);
        }
    }
}

fn alarm_marker(alarm: bool) -> &'static str {
    if alarm {
        "HIGH"
    } else {
        "ok"
    }
}

/// Renders the summary block followed by the process table.
pub fn render_frame(frame: &DisplayFrame) -> String {
    let mut out = String::new();
    writeln!(out, "{}", frame.timestamp.format("%Y-%m-%d %H:%M:%S UTC")).ok();
    writeln!(
        out,
        "{:<28} {:<28}",
        format!("CPU {:>5.1}% [{}]", frame.cpu_percent, alarm_marker(frame.cpu_alarm)),
        format!("RAM {:>5.1}% [{}]", frame.ram_percent, alarm_marker(frame.ram_alarm)),
    )
    .ok();
    writeln!(
        out,
        "{:<28} {:<28}",
        format!("Physical Cores: {}", frame.physical_cores),
        format!("Total Memory: {}GB", frame.total_gb),
    )
    .ok();
    writeln!(
        out,
        "{:<28} {:<28}",
        format!("Logical Cores: {}", frame.logical_cores),
        format!("Used Memory: {}GB", frame.used_gb),
    )
    .ok();
    writeln!(
        out,
        "{:<28} {:<28}",
        "",
        format!("Available Memory: {}GB", frame.available_gb),
    )
    .ok();
    writeln!(out).ok();
    out.push_str(&render_process_table(&frame.ranked_processes));
    out
}

/// Fixed-width table of ranked processes: pid, normalized CPU percent, name.
pub fn render_process_table(processes: &[RankedProcess]) -> String {
    let mut out = String::new();
    writeln!(out, "{:>7} | {:>6} | {}", "PID", "CPU %", "Program Name").ok();
    writeln!(out, "{}", "-".repeat(40)).ok();
    for p in processes {
        writeln!(
            out,
            "{:>7} | {:>6.1} | {}",
            p.pid, p.normalized_cpu_percent, p.name
        )
        .ok();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn frame() -> DisplayFrame {
        DisplayFrame {
            cpu_percent: 81.5,
            ram_percent: 40.0,
            physical_cores: 4,
            logical_cores: 8,
            total_gb: 32,
            used_gb: 12,
            available_gb: 20,
            ranked_processes: vec![
                RankedProcess {
                    pid: 1234,
                    normalized_cpu_percent: 60.0,
                    name: "rustc".into(),
                },
                RankedProcess {
                    pid: 99,
                    normalized_cpu_percent: 21.5,
                    name: "cargo".into(),
                },
            ],
            cpu_alarm: true,
            ram_alarm: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_process_table_rows() {
        let table = render_process_table(&frame().ranked_processes);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "   1234 |   60.0 | rustc");
        assert_eq!(lines[3], "     99 |   21.5 | cargo");
    }

    #[test]
    fn test_console_display_writes_frame() {
        let mut display = ConsoleDisplay::new(Vec::new());
        display.render(&frame());
        let text = String::from_utf8(display.into_inner()).unwrap();
        assert!(text.contains("CPU  81.5% [HIGH]"));
        assert!(text.contains("RAM  40.0% [ok]"));
        assert!(text.contains("Logical Cores: 8"));
        assert!(text.contains("Available Memory: 20GB"));
        assert!(text.contains("rustc"));
    }
}
