use herakles_perf_monitor::sink::{EventSink, MemorySink, SqliteSink};
use herakles_perf_monitor::source::{TestDataSource, TestFrame};
use herakles_perf_monitor::{
    CoreCounts, Decision, LogEvent, MemoryReading, MetricKind, MonitorError, MonitorSettings,
    Orchestrator, ProcessSample,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::watch;

fn frame(cpu: f64, ram: f64) -> TestFrame {
    TestFrame {
        cores: CoreCounts {
            physical: 1,
            logical: 1,
        },
        memory: MemoryReading {
            percent: ram,
            total_gb: 16,
            used_gb: 8,
            available_gb: 8,
        },
        processes: vec![
            ProcessSample::new(0, 400.0, "idle"),
            ProcessSample::new(42, cpu, "worker"),
        ],
        unavailable: false,
    }
}

fn unavailable() -> TestFrame {
    TestFrame {
        unavailable: true,
        ..frame(0.0, 0.0)
    }
}

fn settings() -> MonitorSettings {
    MonitorSettings {
        cpu_threshold: 75.0,
        ram_threshold: 75.0,
        tick_interval: Duration::from_secs(1),
        top_n: 20,
        device_name: "itest".into(),
    }
}

fn orchestrator(frames: Vec<TestFrame>, sink: Box<dyn EventSink>) -> Orchestrator {
    let source = Arc::new(TestDataSource::new(frames).unwrap());
    Orchestrator::new(settings(), Box::new(source.clone()), Box::new(source), sink)
}

fn percents(events: &[LogEvent], kind: MetricKind) -> Vec<f64> {
    events
        .iter()
        .filter(|e| e.metric_kind == kind)
        .map(|e| e.usage_percent)
        .collect()
}

/// Fails the first `failures` writes, then delegates.
struct FlakySink {
    failures: usize,
    inner: MemorySink,
}

impl EventSink for FlakySink {
    fn persist(&mut self, event: LogEvent) -> Result<(), MonitorError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(MonitorError::SinkWrite("disk full".into()));
        }
        self.inner.persist(event)
    }
}

/// Counts `close` calls.
struct ClosingSink {
    inner: MemorySink,
    closed: Arc<AtomicUsize>,
}

impl EventSink for ClosingSink {
    fn persist(&mut self, event: LogEvent) -> Result<(), MonitorError> {
        self.inner.persist(event)
    }

    fn close(&mut self) -> Result<(), MonitorError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_episode_entry_and_new_peaks_are_recorded() {
    let sink = MemorySink::new();
    let frames = [60.0, 80.0, 95.0, 70.0, 90.0]
        .iter()
        .map(|&c| frame(c, 10.0))
        .collect();
    let mut orch = orchestrator(frames, Box::new(sink.clone()));

    let decisions: Vec<Decision> = (0..5).map(|_| orch.tick().unwrap().cpu_decision).collect();
    assert_eq!(
        decisions,
        vec![
            Decision::None,
            Decision::Emit,
            Decision::Emit,
            Decision::None,
            Decision::Emit
        ]
    );

    let events = sink.events();
    assert_eq!(percents(&events, MetricKind::Cpu), vec![80.0, 95.0, 90.0]);
    assert!(percents(&events, MetricKind::Ram).is_empty());
    assert!(events.iter().all(|e| e.device_name == "itest"));
}

#[test]
fn test_idle_process_is_excluded_from_cpu() {
    let sink = MemorySink::new();
    let mut orch = orchestrator(vec![frame(20.0, 10.0)], Box::new(sink));
    let report = orch.tick().unwrap();
    assert_eq!(report.cpu.percent, 20.0);
    assert_eq!(report.frame.ranked_processes.len(), 1);
    assert_eq!(report.frame.ranked_processes[0].pid, 42);
}

#[test]
fn test_metrics_are_tracked_independently() {
    let sink = MemorySink::new();
    let frames = vec![frame(90.0, 80.0), frame(50.0, 85.0), frame(95.0, 60.0)];
    let mut orch = orchestrator(frames, Box::new(sink.clone()));
    for _ in 0..3 {
        orch.tick().unwrap();
    }

    let events = sink.events();
    assert_eq!(percents(&events, MetricKind::Cpu), vec![90.0, 95.0]);
    assert_eq!(percents(&events, MetricKind::Ram), vec![80.0, 85.0]);
}

#[test]
fn test_lost_event_still_advances_tracker() {
    let inner = MemorySink::new();
    let sink = FlakySink {
        failures: 1,
        inner: inner.clone(),
    };
    let frames = vec![frame(80.0, 10.0), frame(80.0, 10.0), frame(90.0, 10.0)];
    let mut orch = orchestrator(frames, Box::new(sink));

    let first = orch.tick().unwrap();
    assert_eq!(first.cpu_decision, Decision::Emit);
    assert_eq!(first.lost, 1);
    assert!(orch.tracker(MetricKind::Cpu).is_elevated());

    // same value again: no retry of the lost event
    let second = orch.tick().unwrap();
    assert_eq!(second.cpu_decision, Decision::None);

    let third = orch.tick().unwrap();
    assert_eq!(third.persisted, 1);

    assert_eq!(percents(&inner.events(), MetricKind::Cpu), vec![90.0]);
    let stats = orch.stats();
    assert_eq!(stats.sink_failures(), 1);
    assert_eq!(stats.events_emitted(), 1);
}

#[test]
fn test_unavailable_tick_is_skipped_without_state_change() {
    let sink = MemorySink::new();
    let frames = vec![frame(80.0, 10.0), unavailable(), frame(80.0, 10.0)];
    let mut orch = orchestrator(frames, Box::new(sink.clone()));

    orch.tick().unwrap();
    let state = orch.tracker(MetricKind::Cpu).state();
    assert!(matches!(
        orch.tick(),
        Err(MonitorError::SourceUnavailable(_))
    ));
    assert_eq!(orch.tracker(MetricKind::Cpu).state(), state);

    let third = orch.tick().unwrap();
    assert_eq!(third.cpu_decision, Decision::None);
    assert_eq!(sink.events().len(), 1);
}

#[test]
fn test_non_finite_memory_percent_skips_tick() {
    let sink = MemorySink::new();
    let mut broken = frame(80.0, 0.0);
    broken.memory.percent = f64::NAN;
    let frames = vec![frame(80.0, 80.0), broken, frame(80.0, 80.0)];
    let mut orch = orchestrator(frames, Box::new(sink.clone()));

    orch.tick().unwrap();
    let cpu_state = orch.tracker(MetricKind::Cpu).state();
    let ram_state = orch.tracker(MetricKind::Ram).state();
    assert!(matches!(
        orch.tick(),
        Err(MonitorError::SourceUnavailable(_))
    ));
    assert_eq!(orch.tracker(MetricKind::Cpu).state(), cpu_state);
    assert_eq!(orch.tracker(MetricKind::Ram).state(), ram_state);

    // the episode carries on as if the broken tick never happened
    let third = orch.tick().unwrap();
    assert_eq!(third.cpu_decision, Decision::None);
    assert_eq!(third.ram_decision, Decision::None);
    assert_eq!(sink.events().len(), 2);
}

#[test]
fn test_ram_percent_is_clamped_to_full() {
    let sink = MemorySink::new();
    let frames = vec![frame(10.0, 120.0), frame(10.0, 130.0)];
    let mut orch = orchestrator(frames, Box::new(sink.clone()));

    let first = orch.tick().unwrap();
    assert_eq!(first.ram.percent, 100.0);
    assert_eq!(first.ram_decision, Decision::Emit);

    // 130% is still 100%, not a new peak
    let second = orch.tick().unwrap();
    assert_eq!(second.ram.percent, 100.0);
    assert_eq!(second.ram_decision, Decision::None);

    assert_eq!(percents(&sink.events(), MetricKind::Ram), vec![100.0]);
}

#[test]
fn test_close_without_running_closes_sink() {
    let closed = Arc::new(AtomicUsize::new(0));
    let sink = ClosingSink {
        inner: MemorySink::new(),
        closed: closed.clone(),
    };
    let orch = orchestrator(vec![frame(10.0, 10.0)], Box::new(sink));

    orch.close().unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_ticks_until_shutdown_and_closes_sink() {
    let inner = MemorySink::new();
    let closed = Arc::new(AtomicUsize::new(0));
    let sink = ClosingSink {
        inner: inner.clone(),
        closed: closed.clone(),
    };
    let frames = vec![frame(80.0, 10.0), frame(90.0, 10.0), frame(95.0, 10.0)];
    let orch = orchestrator(frames, Box::new(sink));
    let stats = orch.stats();

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(orch.run(rx));

    // ticks at 0s, 1s and 2s
    tokio::time::sleep(Duration::from_millis(2500)).await;
    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(stats.completed_ticks(), 3);
    assert_eq!(percents(&inner.events(), MetricKind::Cpu), vec![80.0, 90.0, 95.0]);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_when_sender_dropped() {
    let orch = orchestrator(vec![frame(10.0, 10.0)], Box::new(MemorySink::new()));
    let stats = orch.stats();

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(orch.run(rx));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    drop(tx);

    handle.await.unwrap().unwrap();
    assert_eq!(stats.completed_ticks(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_counts_skipped_ticks() {
    let frames = vec![unavailable(), frame(10.0, 10.0)];
    let orch = orchestrator(frames, Box::new(MemorySink::new()));
    let stats = orch.stats();

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(orch.run(rx));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(stats.skipped_ticks(), 1);
    assert_eq!(stats.completed_ticks(), 1);
}

#[test]
fn test_events_reach_sqlite() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("perf.db");
    let sink = SqliteSink::open(&db_path, Duration::from_secs(1)).unwrap();
    let frames = vec![frame(80.0, 90.0), frame(85.0, 20.0)];
    let mut orch = orchestrator(frames, Box::new(sink));
    orch.tick().unwrap();
    orch.tick().unwrap();
    drop(orch);

    let reader = SqliteSink::open(&db_path, Duration::from_secs(1)).unwrap();
    let logs = reader.fetch_logs(None).unwrap();
    let kinds: Vec<Option<MetricKind>> = logs.iter().map(|l| l.metric_kind()).collect();
    assert_eq!(
        kinds,
        vec![
            Some(MetricKind::Cpu),
            Some(MetricKind::Ram),
            Some(MetricKind::Cpu)
        ]
    );
    assert_eq!(logs[1].usage_percent, 90.0);
    assert_eq!(logs[2].usage_percent, 85.0);
    assert!(logs.iter().all(|l| l.device_name == "itest" && l.total_memory_gb == 16));
}
