//! Generate testdata command implementation.
//!
//! Generates synthetic test data JSON files that the monitor can replay
//! with `--test-data-file`. The CPU curve idles, climbs into an
//! over-threshold episode, wobbles around its peak and falls back; the
//! memory curve follows with a small lag.

use anyhow::{bail, Context};
use chrono::Utc;
use herakles_perf_monitor::source::{TestData, TestFrame};
use herakles_perf_monitor::{CoreCounts, MemoryReading, ProcessSample};
use rand::Rng;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Names handed out round-robin to the synthetic processes.
const PROCESS_NAMES: [&str; 12] = [
    "postgres", "nginx", "java", "node", "python3", "redis-server", "dockerd", "containerd",
    "sshd", "systemd", "chrome", "rustc",
];

const TOTAL_MEMORY_GB: u64 = 32;

/// Generates a synthetic test data JSON file.
pub fn command_generate_testdata(
    output: PathBuf,
    frames: usize,
    processes: usize,
    logical_cores: u32,
) -> anyhow::Result<()> {
    if frames == 0 || processes == 0 || logical_cores == 0 {
        bail!("frames, processes and logical cores must all be at least 1");
    }
    debug!(
        "Generating test data: frames={}, processes={}, cores={}, output={}",
        frames,
        processes,
        logical_cores,
        output.display()
    );

    let mut rng = rand::thread_rng();
    let test_data = TestData {
        version: "1.0".to_string(),
        generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        frames: generate_frames(&mut rng, frames, processes, logical_cores),
    };

    let json_content = serde_json::to_string_pretty(&test_data)?;
    fs::write(&output, &json_content)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "✅ Generated test data: {} frames x {} processes in {}",
        test_data.frames.len(),
        processes,
        output.display()
    );

    Ok(())
}

/// Builds `count` frames. Host CPU of frame `i` is the sum of the raw
/// process values divided by `logical_cores`.
pub fn generate_frames(
    rng: &mut impl Rng,
    count: usize,
    processes: usize,
    logical_cores: u32,
) -> Vec<TestFrame> {
    let cores = CoreCounts {
        physical: (logical_cores / 2).max(1),
        logical: logical_cores,
    };

    (0..count)
        .map(|i| {
            let cpu_target = episode_curve(i, count, rng);
            let ram_target = episode_curve(i.saturating_sub(2), count, rng).clamp(20.0, 97.0);

            let budget = cpu_target * f64::from(logical_cores);
            let weights: Vec<f64> = (0..processes).map(|_| rng.gen_range(0.05..1.0)).collect();
            let weight_sum: f64 = weights.iter().sum();

            let samples = weights
                .iter()
                .enumerate()
                .map(|(idx, w)| {
                    ProcessSample::new(
                        1000 + idx as u32,
                        budget * w / weight_sum,
                        PROCESS_NAMES[idx % PROCESS_NAMES.len()],
                    )
                })
                .collect();

            let used_gb = ((ram_target / 100.0) * TOTAL_MEMORY_GB as f64) as u64;
            TestFrame {
                cores,
                memory: MemoryReading {
                    percent: ram_target,
                    total_gb: TOTAL_MEMORY_GB,
                    used_gb,
                    available_gb: TOTAL_MEMORY_GB - used_gb,
                },
                processes: samples,
                unavailable: false,
            }
        })
        .collect()
}

/// Idle for the first third, ramp to ~95% in the middle third, then drop.
fn episode_curve(i: usize, count: usize, rng: &mut impl Rng) -> f64 {
    let third = (count / 3).max(1);
    let noise: f64 = rng.gen_range(-3.0..3.0);
    let base = if i < third {
        25.0
    } else if i < 2 * third {
        let progress = (i - third) as f64 / third as f64;
        70.0 + 25.0 * progress
    } else {
        30.0
    };
    (base + noise).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_perf_monitor::Aggregator;

    #[test]
    fn test_generated_frames_have_episode() {
        let mut rng = rand::thread_rng();
        let frames = generate_frames(&mut rng, 30, 10, 4);
        assert_eq!(frames.len(), 30);

        let aggregator = Aggregator::new(20);
        let cpu: Vec<f64> = frames
            .iter()
            .map(|f| aggregator.utilization(&f.processes, f.cores.logical))
            .collect();

        // idle start, elevated middle
        assert!(cpu[0] < 50.0);
        assert!(cpu[19] > 75.0);
        assert!(frames.iter().all(|f| f.processes.len() == 10));
        assert!(frames
            .iter()
            .all(|f| f.memory.used_gb + f.memory.available_gb == TOTAL_MEMORY_GB));
    }
}
