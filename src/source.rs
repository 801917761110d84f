//! Process and memory sources.
//!
//! The sampling loop pulls its input through the `ProcessSource` and
//! `MemorySource` traits. Two backends are provided: the live /proc readers
//! and a replay source driven by a JSON test data file.

use ahash::AHashMap as HashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, info};

use crate::error::MonitorError;
use crate::model::{CoreCounts, MemoryReading, ProcessSample};
use crate::system;

/// Supplies the live process list and the host's core counts.
pub trait ProcessSource: Send + Sync {
    /// Current processes. Processes that exit while being read are left out.
    fn enumerate(&self) -> Result<Vec<ProcessSample>, MonitorError>;

    fn core_counts(&self) -> Result<CoreCounts, MonitorError>;
}

/// Supplies host memory utilization.
pub trait MemorySource: Send + Sync {
    fn read(&self) -> Result<MemoryReading, MonitorError>;
}

impl<T: ProcessSource + ?Sized> ProcessSource for Arc<T> {
    fn enumerate(&self) -> Result<Vec<ProcessSample>, MonitorError> {
        (**self).enumerate()
    }

    fn core_counts(&self) -> Result<CoreCounts, MonitorError> {
        (**self).core_counts()
    }
}

impl<T: MemorySource + ?Sized> MemorySource for Arc<T> {
    fn read(&self) -> Result<MemoryReading, MonitorError> {
        (**self).read()
    }
}

/// -------------------------------------------------------------------
/// PROCFS BACKEND
/// -------------------------------------------------------------------

/// Process entry representing a directory in /proc.
#[derive(Debug, Clone)]
struct ProcEntry {
    pid: u32,
    proc_path: PathBuf,
}

/// Last observed CPU time of a pid, for delta-based percentages.
#[derive(Debug, Clone, Copy)]
struct CpuEntry {
    cpu_time_seconds: f64,
    last_updated: Instant,
}

/// Reads processes from /proc and derives per-process CPU percent from the
/// CPU time consumed since the previous pass.
///
/// A pid seen for the first time reports 0.0, so the very first pass after
/// startup shows an idle host.
pub struct ProcfsProcessSource {
    root: PathBuf,
    clock_ticks: f64,
    cpu_cache: RwLock<HashMap<u32, CpuEntry>>,
}

impl Default for ProcfsProcessSource {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcfsProcessSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock_ticks: system::clock_ticks_per_second(),
            cpu_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Computes raw CPU percent for a pid from the delta against the cache.
    fn cpu_percent_for(&self, pid: u32, cpu_time_seconds: f64, now: Instant) -> f64 {
        let previous = match self.cpu_cache.read() {
            Ok(cache) => cache.get(&pid).copied(),
            Err(_) => None,
        };

        match previous {
            Some(entry) => {
                let dt = now.duration_since(entry.last_updated).as_secs_f64();
                let delta_cpu = cpu_time_seconds - entry.cpu_time_seconds;
                if dt > 0.0 && delta_cpu > 0.0 {
                    delta_cpu / dt * 100.0
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    fn sample_entry(&self, entry: &ProcEntry, now: Instant) -> Option<(ProcessSample, CpuEntry)> {
        // Any read failure here means the process is gone or inaccessible.
        let cpu_time_seconds = match parse_cpu_time_seconds(&entry.proc_path, self.clock_ticks) {
            Ok(v) => v,
            Err(e) => {
                debug!("Skipping pid {}: failed to read CPU time: {}", entry.pid, e);
                return None;
            }
        };
        let name = match read_process_name(&entry.proc_path) {
            Some(name) => name,
            None => {
                debug!("Skipping pid {}: could not read name", entry.pid);
                return None;
            }
        };

        let raw_cpu_percent = self.cpu_percent_for(entry.pid, cpu_time_seconds, now);
        Some((
            ProcessSample {
                pid: entry.pid,
                raw_cpu_percent,
                name,
            },
            CpuEntry {
                cpu_time_seconds,
                last_updated: now,
            },
        ))
    }
}

impl ProcessSource for ProcfsProcessSource {
    fn enumerate(&self) -> Result<Vec<ProcessSample>, MonitorError> {
        let entries = collect_proc_entries(&self.root).map_err(|e| {
            MonitorError::SourceUnavailable(format!(
                "Failed to list {}: {}",
                self.root.display(),
                e
            ))
        })?;
        let now = Instant::now();

        let results: Vec<(ProcessSample, CpuEntry)> = entries
            .par_iter()
            .filter_map(|entry| self.sample_entry(entry, now))
            .collect();

        // Replace the cache wholesale so exited pids do not linger.
        let mut cache = self
            .cpu_cache
            .write()
            .map_err(|e| {
                MonitorError::SourceUnavailable(format!("CPU cache lock poisoned: {}", e))
            })?;
        cache.clear();
        let mut samples = Vec::with_capacity(results.len());
        for (sample, cpu) in results {
            cache.insert(sample.pid, cpu);
            samples.push(sample);
        }

        debug!(
            "Sampled {} of {} process entries",
            samples.len(),
            entries.len()
        );
        Ok(samples)
    }

    fn core_counts(&self) -> Result<CoreCounts, MonitorError> {
        system::read_core_counts().map_err(MonitorError::SourceUnavailable)
    }
}

/// Memory source backed by /proc/meminfo.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcfsMemorySource;

impl MemorySource for ProcfsMemorySource {
    fn read(&self) -> Result<MemoryReading, MonitorError> {
        system::read_meminfo()
            .map(|m| m.to_reading())
            .map_err(MonitorError::SourceUnavailable)
    }
}

/// Scans a /proc style directory for numeric pid entries.
fn collect_proc_entries(root: &Path) -> std::io::Result<Vec<ProcEntry>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root)?.flatten() {
        let p = entry.path();
        let Some(name) = p.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let Ok(pid) = name.parse::<u32>() else {
            continue;
        };
        out.push(ProcEntry { pid, proc_path: p });
    }
    Ok(out)
}

/// Reads process name from comm file or extracts it from cmdline.
fn read_process_name(proc_path: &Path) -> Option<String> {
    if let Ok(s) = fs::read_to_string(proc_path.join("comm")) {
        let t = s.trim();
        if !t.is_empty() {
            return Some(t.into());
        }
    }

    let content = fs::read(proc_path.join("cmdline")).ok()?;
    let first = content
        .split(|&b| b == 0u8)
        .find(|s| !s.is_empty())
        .and_then(|s| std::str::from_utf8(s).ok())?;
    Path::new(first)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
}

/// Total CPU time (user + system) in seconds from /proc/<pid>/stat.
fn parse_cpu_time_seconds(proc_path: &Path, clock_ticks: f64) -> std::io::Result<f64> {
    let content = fs::read_to_string(proc_path.join("stat"))?;
    parse_stat_cpu_time(&content, clock_ticks)
        .ok_or_else(|| std::io::Error::other("Invalid stat format"))
}

/// Parses utime + stime out of a stat line. The command name is wrapped in
/// parentheses and may itself contain spaces, so fields are counted from the
/// last ')'.
fn parse_stat_cpu_time(content: &str, clock_ticks: f64) -> Option<f64> {
    let (_, rest) = content.rsplit_once(')')?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // rest starts at field 3 (state); utime is field 14, stime field 15
    let utime: f64 = fields.get(11)?.parse().ok()?;
    let stime: f64 = fields.get(12)?.parse().ok()?;
    Some((utime + stime) / clock_ticks)
}

/// -------------------------------------------------------------------
/// TEST DATA BACKEND
/// -------------------------------------------------------------------

/// One recorded tick in a test data file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestFrame {
    pub cores: CoreCounts,
    pub memory: MemoryReading,
    pub processes: Vec<ProcessSample>,
    /// Simulates a tick where the sources cannot produce a reading.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unavailable: bool,
}

/// Root structure for test data JSON files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestData {
    pub version: String,
    pub generated_at: String,
    pub frames: Vec<TestFrame>,
}

/// Replays frames from a test data file, one per `enumerate` call. After the
/// last frame the source keeps returning it.
pub struct TestDataSource {
    frames: Vec<TestFrame>,
    next: AtomicUsize,
    current: AtomicUsize,
}

impl TestDataSource {
    pub fn new(frames: Vec<TestFrame>) -> Result<Self, MonitorError> {
        if frames.is_empty() {
            return Err(MonitorError::SourceUnavailable(
                "Test data contains no frames".to_string(),
            ));
        }
        Ok(Self {
            frames,
            next: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, MonitorError> {
        let data = load_test_data_from_file(path)?;
        Self::new(data.frames)
    }

    fn current_frame(&self) -> &TestFrame {
        let idx = self.current.load(Ordering::SeqCst);
        &self.frames[idx.min(self.frames.len() - 1)]
    }

    fn unavailable(&self) -> MonitorError {
        MonitorError::SourceUnavailable(format!(
            "Test data frame {} marked unavailable",
            self.current.load(Ordering::SeqCst)
        ))
    }
}

impl ProcessSource for TestDataSource {
    fn enumerate(&self) -> Result<Vec<ProcessSample>, MonitorError> {
        let idx = self.next.fetch_add(1, Ordering::SeqCst).min(self.frames.len() - 1);
        self.current.store(idx, Ordering::SeqCst);
        let frame = &self.frames[idx];
        if frame.unavailable {
            return Err(self.unavailable());
        }
        Ok(frame.processes.clone())
    }

    fn core_counts(&self) -> Result<CoreCounts, MonitorError> {
        Ok(self.current_frame().cores)
    }
}

impl MemorySource for TestDataSource {
    fn read(&self) -> Result<MemoryReading, MonitorError> {
        let frame = self.current_frame();
        if frame.unavailable {
            return Err(self.unavailable());
        }
        Ok(frame.memory)
    }
}

/// Loads test data from a JSON file.
pub fn load_test_data_from_file(path: &Path) -> Result<TestData, MonitorError> {
    debug!("Loading test data from: {}", path.display());

    let content = fs::read_to_string(path).map_err(|e| {
        MonitorError::SourceUnavailable(format!(
            "Failed to read test data file {}: {}",
            path.display(),
            e
        ))
    })?;
    let test_data: TestData = serde_json::from_str(&content).map_err(|e| {
        MonitorError::SourceUnavailable(format!("Failed to parse test data JSON: {}", e))
    })?;

    info!(
        "Loaded test data version {} ({} frames) generated at {}",
        test_data.version,
        test_data.frames.len(),
        test_data.generated_at
    );

    Ok(test_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn frame(cpu: f64, mem: f64) -> TestFrame {
        TestFrame {
            cores: CoreCounts {
                physical: 2,
                logical: 4,
            },
            memory: MemoryReading {
                percent: mem,
                total_gb: 16,
                used_gb: 8,
                available_gb: 8,
            },
            processes: vec![ProcessSample::new(42, cpu, "worker")],
            unavailable: false,
        }
    }

    #[test]
    fn test_parse_stat_cpu_time() {
        let stat = "1234 (my proc) S 1 1234 1234 0 -1 4194560 100 0 0 0 250 150 0 0 20 0 1 0 100 0 0";
        let seconds = parse_stat_cpu_time(stat, 100.0).unwrap();
        assert!((seconds - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_stat_cpu_time_invalid() {
        assert!(parse_stat_cpu_time("garbage", 100.0).is_none());
        assert!(parse_stat_cpu_time("1 (x) S 1 2", 100.0).is_none());
    }

    #[test]
    fn test_procfs_source_reads_fake_tree() {
        let dir = tempdir().unwrap();
        let pid_dir = dir.path().join("77");
        fs::create_dir(&pid_dir).unwrap();
        fs::write(pid_dir.join("comm"), "fake-daemon\n").unwrap();
        fs::write(
            pid_dir.join("stat"),
            "77 (fake-daemon) S 1 77 77 0 -1 0 0 0 0 0 10 5 0 0 20 0 1 0 100 0 0",
        )
        .unwrap();
        // not a pid
        fs::create_dir(dir.path().join("self-test")).unwrap();
        // pid without readable stat is skipped
        fs::create_dir(dir.path().join("78")).unwrap();

        let source = ProcfsProcessSource::new(dir.path());
        let samples = source.enumerate().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].pid, 77);
        assert_eq!(samples[0].name, "fake-daemon");
        // first sight of a pid reports no usage
        assert_eq!(samples[0].raw_cpu_percent, 0.0);
    }

    #[test]
    fn test_procfs_source_missing_root_is_unavailable() {
        let source = ProcfsProcessSource::new("/nonexistent/proc/root");
        assert!(matches!(
            source.enumerate(),
            Err(MonitorError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn test_read_process_name_from_cmdline() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("cmdline"), b"/usr/bin/postgres\0-D\0/data\0").unwrap();
        assert_eq!(read_process_name(dir.path()).as_deref(), Some("postgres"));
    }

    #[test]
    fn test_test_data_source_replays_and_repeats_last() {
        let source = TestDataSource::new(vec![frame(10.0, 20.0), frame(30.0, 90.0)]).unwrap();

        assert_eq!(source.enumerate().unwrap()[0].raw_cpu_percent, 10.0);
        assert_eq!(source.read().unwrap().percent, 20.0);

        assert_eq!(source.enumerate().unwrap()[0].raw_cpu_percent, 30.0);
        assert_eq!(source.read().unwrap().percent, 90.0);

        assert_eq!(source.enumerate().unwrap()[0].raw_cpu_percent, 30.0);
        assert_eq!(source.core_counts().unwrap().logical, 4);
    }

    #[test]
    fn test_test_data_source_unavailable_frame() {
        let mut bad = frame(0.0, 0.0);
        bad.unavailable = true;
        let source = TestDataSource::new(vec![bad, frame(5.0, 5.0)]).unwrap();
        assert!(source.enumerate().is_err());
        assert!(source.read().is_err());
        assert!(source.enumerate().is_ok());
    }

    #[test]
    fn test_test_data_source_rejects_empty() {
        assert!(TestDataSource::new(Vec::new()).is_err());
    }

    #[test]
    fn test_load_test_data_from_file() {
        let data = TestData {
            version: "1.0".into(),
            generated_at: "2024-01-01T00:00:00Z".into(),
            frames: vec![frame(50.0, 50.0)],
        };
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&data).unwrap().as_bytes())
            .unwrap();

        let source = TestDataSource::from_file(file.path()).unwrap();
        assert_eq!(source.enumerate().unwrap().len(), 1);
    }
}
