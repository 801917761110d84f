//! Prometheus metrics for herakles-perf-monitor.
//!
//! `PrometheusDisplay` is a display subscriber of the sampling loop: it copies
//! every frame into gauges and keeps the latest frame for `/status`.

use herakles_perf_monitor::display::DisplaySink;
use herakles_perf_monitor::{DisplayFrame, HealthStats};
use prometheus::{Gauge, GaugeVec, Opts, Registry};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Collection of Prometheus metrics for utilization monitoring.
#[derive(Clone)]
pub struct MonitorMetrics {
    pub cpu_percent: Gauge,
    pub ram_percent: Gauge,
    pub alarm: GaugeVec,
    pub memory_gb: GaugeVec,
    pub cores: GaugeVec,
    pub top_cpu_percent: GaugeVec,

    // Loop statistics, refreshed at scrape time
    pub ticks: Gauge,
    pub skipped_ticks: Gauge,
    pub events_emitted: Gauge,
    pub sink_failures: Gauge,
    pub tick_duration: Gauge,
}

impl MonitorMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, Box<dyn std::error::Error>> {
        let cpu_percent = Gauge::new(
            "herakles_perf_cpu_percent",
            "Host CPU utilization in percent (sum of top-N normalized processes, clamped to 100)",
        )?;
        let ram_percent = Gauge::new(
            "herakles_perf_ram_percent",
            "Host memory utilization in percent",
        )?;
        let alarm = GaugeVec::new(
            Opts::new(
                "herakles_perf_alarm",
                "Whether the metric is currently at or above its threshold (1) or not (0)",
            ),
            &["metric"],
        )?;
        let memory_gb = GaugeVec::new(
            Opts::new("herakles_perf_memory_gb", "Host memory in whole GiB"),
            &["kind"],
        )?;
        let cores = GaugeVec::new(
            Opts::new("herakles_perf_cores", "Host core counts"),
            &["kind"],
        )?;
        let top_cpu_percent = GaugeVec::new(
            Opts::new(
                "herakles_perf_top_cpu_percent",
                "Top-N processes by CPU, normalized to the whole host",
            ),
            &["rank", "pid", "name"],
        )?;

        let ticks = Gauge::new(
            "herakles_perf_ticks",
            "Number of completed sampling ticks",
        )?;
        let skipped_ticks = Gauge::new(
            "herakles_perf_skipped_ticks",
            "Number of ticks skipped because a source was unavailable",
        )?;
        let events_emitted = Gauge::new(
            "herakles_perf_events_emitted",
            "Number of performance logs persisted",
        )?;
        let sink_failures = Gauge::new(
            "herakles_perf_sink_failures",
            "Number of performance logs lost to sink write failures",
        )?;
        let tick_duration = Gauge::new(
            "herakles_perf_tick_duration_seconds",
            "Duration of the last completed tick",
        )?;

        registry.register(Box::new(cpu_percent.clone()))?;
        registry.register(Box::new(ram_percent.clone()))?;
        registry.register(Box::new(alarm.clone()))?;
        registry.register(Box::new(memory_gb.clone()))?;
        registry.register(Box::new(cores.clone()))?;
        registry.register(Box::new(top_cpu_percent.clone()))?;

        registry.register(Box::new(ticks.clone()))?;
        registry.register(Box::new(skipped_ticks.clone()))?;
        registry.register(Box::new(events_emitted.clone()))?;
        registry.register(Box::new(sink_failures.clone()))?;
        registry.register(Box::new(tick_duration.clone()))?;

        Ok(Self {
            cpu_percent,
            ram_percent,
            alarm,
            memory_gb,
            cores,
            top_cpu_percent,
            ticks,
            skipped_ticks,
            events_emitted,
            sink_failures,
            tick_duration,
        })
    }

    /// Sets all per-frame gauges. The top-N vector is reset first so that
    /// processes that dropped out of the ranking disappear.
    pub fn set_frame(&self, frame: &DisplayFrame) {
        self.cpu_percent.set(frame.cpu_percent);
        self.ram_percent.set(frame.ram_percent);
        self.alarm
            .with_label_values(&["cpu"])
            .set(if frame.cpu_alarm { 1.0 } else { 0.0 });
        self.alarm
            .with_label_values(&["ram"])
            .set(if frame.ram_alarm { 1.0 } else { 0.0 });

        self.memory_gb
            .with_label_values(&["total"])
            .set(frame.total_gb as f64);
        self.memory_gb
            .with_label_values(&["used"])
            .set(frame.used_gb as f64);
        self.memory_gb
            .with_label_values(&["available"])
            .set(frame.available_gb as f64);
        self.cores
            .with_label_values(&["physical"])
            .set(f64::from(frame.physical_cores));
        self.cores
            .with_label_values(&["logical"])
            .set(f64::from(frame.logical_cores));

        self.top_cpu_percent.reset();
        for (idx, p) in frame.ranked_processes.iter().enumerate() {
            let rank = (idx + 1).to_string();
            let pid = p.pid.to_string();
            self.top_cpu_percent
                .with_label_values(&[rank.as_str(), pid.as_str(), p.name.as_str()])
                .set(p.normalized_cpu_percent);
        }
    }

    /// Copies the loop counters into their gauges.
    pub fn set_loop_stats(&self, stats: &HealthStats) {
        self.ticks.set(stats.completed_ticks() as f64);
        self.skipped_ticks.set(stats.skipped_ticks() as f64);
        self.events_emitted.set(stats.events_emitted() as f64);
        self.sink_failures.set(stats.sink_failures() as f64);
        let (last, _, _, _, _) = stats.tick_duration();
        self.tick_duration.set(last);
    }
}

/// Display subscriber feeding the HTTP surface.
pub struct PrometheusDisplay {
    metrics: MonitorMetrics,
    latest: Arc<RwLock<Option<DisplayFrame>>>,
}

impl PrometheusDisplay {
    pub fn new(metrics: MonitorMetrics, latest: Arc<RwLock<Option<DisplayFrame>>>) -> Self {
        Self { metrics, latest }
    }
}

impl DisplaySink for PrometheusDisplay {
    fn render(&mut self, frame: &DisplayFrame) {
        self.metrics.set_frame(frame);
        match self.latest.write() {
            Ok(mut latest) => *latest = Some(frame.clone()),
            Err(e) => warn!("Latest frame lock poisoned: {}", e),
        }
    }
}
