//! The sampling loop.
//!
//! Once per tick the orchestrator pulls a process snapshot and a memory
//! reading, turns them into CPU and RAM utilization, lets each metric's
//! `PeakTracker` decide on its own reading, hands emitted events to the sink
//! and finally pushes a `DisplayFrame` to every display subscriber.
//!
//! Ticks never overlap. A stop request is only honoured between ticks, so an
//! event that was decided on is always either persisted or reported as lost.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::aggregator::Aggregator;
use crate::config::MonitorSettings;
use crate::display::DisplaySink;
use crate::error::MonitorError;
use crate::health_stats::HealthStats;
use crate::model::{
    CoreCounts, DisplayFrame, LogEvent, MemoryReading, MetricKind, UtilizationReading,
};
use crate::sink::EventSink;
use crate::source::{MemorySource, ProcessSource};
use crate::tracker::{Decision, PeakTracker};

/// Shortest cadence the run loop accepts; a zero period would stall tokio's
/// interval.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// What happened during one completed tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub cpu: UtilizationReading,
    pub ram: UtilizationReading,
    pub cpu_decision: Decision,
    pub ram_decision: Decision,
    /// Events the sink accepted.
    pub persisted: usize,
    /// Events the sink rejected.
    pub lost: usize,
    pub sampled_processes: usize,
    pub frame: DisplayFrame,
}

pub struct Orchestrator {
    settings: MonitorSettings,
    aggregator: Aggregator,
    processes: Box<dyn ProcessSource>,
    memory: Box<dyn MemorySource>,
    sink: Box<dyn EventSink>,
    displays: Vec<Box<dyn DisplaySink>>,
    cpu: PeakTracker,
    ram: PeakTracker,
    stats: Arc<HealthStats>,
}

impl Orchestrator {
    pub fn new(
        settings: MonitorSettings,
        processes: Box<dyn ProcessSource>,
        memory: Box<dyn MemorySource>,
        sink: Box<dyn EventSink>,
    ) -> Self {
        Self {
            aggregator: Aggregator::new(settings.top_n),
            settings,
            processes,
            memory,
            sink,
            displays: Vec::new(),
            cpu: PeakTracker::new(MetricKind::Cpu),
            ram: PeakTracker::new(MetricKind::Ram),
            stats: Arc::new(HealthStats::new()),
        }
    }

    /// Adds a display subscriber.
    pub fn with_display(mut self, display: Box<dyn DisplaySink>) -> Self {
        self.displays.push(display);
        self
    }

    /// Shares an existing statistics collector (e.g. with the HTTP layer).
    pub fn with_stats(mut self, stats: Arc<HealthStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn stats(&self) -> Arc<HealthStats> {
        self.stats.clone()
    }

    /// Closes the sink without running; used when startup fails after the
    /// orchestrator was built.
    pub fn close(mut self) -> Result<(), MonitorError> {
        self.sink.close()
    }

    pub fn tracker(&self, kind: MetricKind) -> &PeakTracker {
        match kind {
            MetricKind::Cpu => &self.cpu,
            MetricKind::Ram => &self.ram,
        }
    }

    /// Runs one sampling-decide-render cycle.
    ///
    /// Returns `SourceUnavailable` without touching the trackers, the sink or
    /// the displays when a source cannot produce a reading.
    #[instrument(skip(self))]
    pub fn tick(&mut self) -> Result<TickReport, MonitorError> {
        let start = Instant::now();
        let now = Utc::now();

        let samples = self.processes.enumerate()?;
        let cores = self.processes.core_counts()?;
        let memory = self.memory.read()?;
        if !memory.percent.is_finite() {
            return Err(MonitorError::SourceUnavailable(format!(
                "memory source returned {}",
                memory.percent
            )));
        }

        let ranked = self.aggregator.rank(&samples, cores.logical);
        let cpu_percent = Aggregator::utilization_of(&ranked);
        let cpu = UtilizationReading::new(MetricKind::Cpu, cpu_percent, now);
        let ram = UtilizationReading::new(MetricKind::Ram, memory.percent.clamp(0.0, 100.0), now);

        // Each tracker only ever sees its own metric's reading.
        let cpu_decision = self.cpu.observe(cpu.percent, self.settings.cpu_threshold);
        let ram_decision = self.ram.observe(ram.percent, self.settings.ram_threshold);

        let mut persisted = 0;
        let mut lost = 0;
        for (reading, decision) in [(cpu, cpu_decision), (ram, ram_decision)] {
            if decision != Decision::Emit {
                continue;
            }
            let event = self.build_event(&reading, cores, memory);
            if self.deliver(event) {
                persisted += 1;
            } else {
                lost += 1;
            }
        }

        let frame = DisplayFrame {
            cpu_percent: cpu.percent,
            ram_percent: ram.percent,
            physical_cores: cores.physical,
            logical_cores: cores.logical,
            total_gb: memory.total_gb,
            used_gb: memory.used_gb,
            available_gb: memory.available_gb,
            ranked_processes: ranked,
            cpu_alarm: self.cpu.is_elevated(),
            ram_alarm: self.ram.is_elevated(),
            timestamp: now,
        };
        for display in self.displays.iter_mut() {
            display.render(&frame);
        }

        self.stats
            .record_tick(samples.len() as u64, start.elapsed().as_secs_f64());
        debug!(
            "Tick done: CPU {:.1}% ({:?}), RAM {:.1}% ({:?}), {} processes",
            cpu.percent,
            cpu_decision,
            ram.percent,
            ram_decision,
            samples.len()
        );

        Ok(TickReport {
            cpu,
            ram,
            cpu_decision,
            ram_decision,
            persisted,
            lost,
            sampled_processes: samples.len(),
            frame,
        })
    }

    fn build_event(
        &self,
        reading: &UtilizationReading,
        cores: CoreCounts,
        memory: MemoryReading,
    ) -> LogEvent {
        LogEvent {
            metric_kind: reading.metric_kind,
            usage_percent: reading.percent,
            physical_cores: cores.physical,
            logical_cores: cores.logical,
            total_memory_gb: memory.total_gb,
            used_memory_gb: memory.used_gb,
            available_memory_gb: memory.available_gb,
            device_name: self.settings.device_name.clone(),
            timestamp: reading.timestamp,
        }
    }

    /// Hands an event to the sink. Returns false if the event was lost; the
    /// tracker has already advanced either way.
    fn deliver(&mut self, event: LogEvent) -> bool {
        let kind = event.metric_kind;
        let percent = event.usage_percent;
        match self.sink.persist(event) {
            Ok(()) => {
                self.stats.record_event_emitted();
                info!(
                    metric = %kind,
                    usage_percent = percent,
                    "Recorded {} peak at {:.1}%",
                    kind,
                    percent
                );
                true
            }
            Err(e) => {
                self.stats.record_sink_failure();
                error!(
                    metric = %kind,
                    usage_percent = percent,
                    "Lost {} event at {:.1}%: {}",
                    kind,
                    percent,
                    e
                );
                false
            }
        }
    }

    /// Runs ticks at the configured cadence until `shutdown` turns true (or
    /// its sender goes away), then closes the sink.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), MonitorError> {
        let period = self.settings.tick_interval.max(MIN_TICK_INTERVAL);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Sampling every {:.3}s (CPU threshold {:.1}%, RAM threshold {:.1}%, top {})",
            period.as_secs_f64(),
            self.settings.cpu_threshold,
            self.settings.ram_threshold,
            self.settings.top_n
        );

        while !*shutdown.borrow() {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped, stopping sampling loop");
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.tick() {
                self.stats.record_skipped_tick();
                warn!("Skipping tick: {}", e);
            }
        }

        info!(
            "Sampling loop stopped after {} ticks ({} skipped)",
            self.stats.completed_ticks(),
            self.stats.skipped_ticks()
        );
        self.close()
    }
}
