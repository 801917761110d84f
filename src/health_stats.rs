//! Running statistics about the sampling loop.
//!
//! Shared between the orchestrator (writer) and the HTTP handlers (readers).

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Clone, Copy, Default)]
struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

#[derive(Default)]
struct Stat {
    inner: Mutex<RunningStat>,
}

/// (current, average, max, min, count)
pub type StatSnapshot = (f64, f64, f64, f64, u64);

impl Stat {
    fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    fn snapshot(&self) -> StatSnapshot {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

pub struct HealthStats {
    sampled_processes: Stat,
    tick_duration_seconds: Stat,
    completed_ticks: AtomicU64,
    skipped_ticks: AtomicU64,
    events_emitted: AtomicU64,
    sink_failures: AtomicU64,
    started: Instant,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            sampled_processes: Stat::default(),
            tick_duration_seconds: Stat::default(),
            completed_ticks: AtomicU64::new(0),
            skipped_ticks: AtomicU64::new(0),
            events_emitted: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            started: Instant::now(),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_tick(&self, sampled: u64, duration_seconds: f64) {
        self.sampled_processes.add_sample(sampled as f64);
        self.tick_duration_seconds.add_sample(duration_seconds);
        self.completed_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_tick(&self) {
        self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_emitted(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed_ticks(&self) -> u64 {
        self.completed_ticks.load(Ordering::Relaxed)
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks.load(Ordering::Relaxed)
    }

    pub fn events_emitted(&self) -> u64 {
        self.events_emitted.load(Ordering::Relaxed)
    }

    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    pub fn tick_duration(&self) -> StatSnapshot {
        self.tick_duration_seconds.snapshot()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn render_table(&self) -> String {
        let (sp_cur, sp_avg, sp_max, sp_min, _) = self.sampled_processes.snapshot();
        let (td_cur, td_avg, td_max, td_min, _) = self.tick_duration_seconds.snapshot();

        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "metric",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out, "{}", "-".repeat(left_col + 3 + (col_w + 3) * 4)).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "sampled processes",
            format!("{:.0}", sp_cur),
            format!("{:.1}", sp_avg),
            format!("{:.0}", sp_max),
            format!("{:.0}", sp_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "tick duration (s)",
            format!("{:.3}", td_cur),
            format!("{:.3}", td_avg),
            format!("{:.3}", td_max),
            format!("{:.3}", td_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "completed ticks:  {}", self.completed_ticks()).ok();
        writeln!(out, "skipped ticks:    {}", self.skipped_ticks()).ok();
        writeln!(out, "events emitted:   {}", self.events_emitted()).ok();
        writeln!(out, "sink failures:    {}", self.sink_failures()).ok();
        writeln!(out, "uptime (s):       {}", self.uptime_seconds()).ok();

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stat() {
        let mut s = RunningStat::default();
        for v in [3.0, 1.0, 2.0] {
            s.add(v);
        }
        assert_eq!(s.count, 3);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        assert_eq!(s.last, 2.0);
        assert!((s.avg() - 2.0).abs() < 1e-9);
        assert_eq!(RunningStat::default().avg(), 0.0);
    }

    #[test]
    fn test_counters_and_table() {
        let stats = HealthStats::new();
        stats.record_tick(120, 0.010);
        stats.record_tick(100, 0.030);
        stats.record_skipped_tick();
        stats.record_event_emitted();
        stats.record_sink_failure();

        assert_eq!(stats.completed_ticks(), 2);
        assert_eq!(stats.skipped_ticks(), 1);
        let (cur, avg, max, min, count) = stats.tick_duration();
        assert_eq!(count, 2);
        assert!((cur - 0.030).abs() < 1e-9);
        assert!((avg - 0.020).abs() < 1e-9);
        assert!((max - 0.030).abs() < 1e-9);
        assert!((min - 0.010).abs() < 1e-9);

        let table = stats.render_table();
        assert!(table.contains("sampled processes"));
        assert!(table.contains("completed ticks:  2"));
        assert!(table.contains("sink failures:    1"));
    }
}
