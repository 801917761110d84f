//! Normalization and ranking of per-process CPU samples.
//!
//! Raw per-process percentages are on a "100 = one core" scale. The
//! aggregator divides them by the logical core count, drops the idle
//! placeholder (pid 0), keeps the busiest `top_n` and sums those into a single
//! host-wide CPU percentage.
//!
//! The sum of independently sampled per-process percentages can overshoot
//! 100 because of sampling jitter, so the host value is clamped to 100.

use crate::model::{ProcessSample, RankedProcess};
use tracing::debug;

/// Number of processes ranked and summed unless configured otherwise.
pub const DEFAULT_TOP_N: usize = 20;

/// Pid used by the OS for idle capacity rather than a real workload.
pub const IDLE_PID: u32 = 0;

#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    top_n: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_N)
    }
}

impl Aggregator {
    pub fn new(top_n: usize) -> Self {
        Self { top_n: top_n.max(1) }
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Ranks samples by normalized CPU percent, busiest first.
    ///
    /// Ties keep their input order. The idle process and samples without a
    /// usable CPU value are left out.
    pub fn rank(&self, samples: &[ProcessSample], logical_cores: u32) -> Vec<RankedProcess> {
        let cores = f64::from(logical_cores.max(1));

        let mut ranked: Vec<RankedProcess> = samples
            .iter()
            .filter(|s| s.pid != IDLE_PID)
            .filter(|s| {
                let usable = s.raw_cpu_percent.is_finite() && s.raw_cpu_percent >= 0.0;
                if !usable {
                    debug!(
                        "Skipping pid {} ({}): unusable CPU value {}",
                        s.pid, s.name, s.raw_cpu_percent
                    );
                }
                usable
            })
            .map(|s| RankedProcess {
                pid: s.pid,
                normalized_cpu_percent: s.raw_cpu_percent / cores,
                name: s.name.clone(),
            })
            .collect();

        // sort_by is stable
        ranked.sort_by(|a, b| b.normalized_cpu_percent.total_cmp(&a.normalized_cpu_percent));
        ranked.truncate(self.top_n);
        ranked
    }

    /// Host CPU utilization in percent, always within [0, 100].
    pub fn utilization(&self, samples: &[ProcessSample], logical_cores: u32) -> f64 {
        Self::utilization_of(&self.rank(samples, logical_cores))
    }

    /// Sums an already ranked list, clamped to 100.
    pub fn utilization_of(ranked: &[RankedProcess]) -> f64 {
        let sum: f64 = ranked.iter().map(|p| p.normalized_cpu_percent).sum();
        sum.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pid: u32, raw: f64) -> ProcessSample {
        ProcessSample::new(pid, raw, format!("proc-{}", pid))
    }

    #[test]
    fn test_idle_process_excluded_and_normalized() {
        let samples = vec![sample(0, 400.0), sample(1, 50.0), sample(2, 30.0)];
        let agg = Aggregator::default();

        let ranked = agg.rank(&samples, 4);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].pid, 1);
        assert!((ranked[0].normalized_cpu_percent - 12.5).abs() < 1e-9);
        assert_eq!(ranked[1].pid, 2);
        assert!((ranked[1].normalized_cpu_percent - 7.5).abs() < 1e-9);

        let util = agg.utilization(&samples, 4);
        assert!((util - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_only_top_twenty_are_summed() {
        // 25 processes at 5% normalized each on a 2-core host
        let samples: Vec<_> = (1..=25).map(|pid| sample(pid, 10.0)).collect();
        let agg = Aggregator::default();
        assert_eq!(agg.rank(&samples, 2).len(), 20);
        assert!((agg.utilization(&samples, 2) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_overshoot_is_clamped() {
        // 25 processes at 6% normalized each: top 20 sum to 120
        let samples: Vec<_> = (1..=25).map(|pid| sample(pid, 12.0)).collect();
        let util = Aggregator::default().utilization(&samples, 2);
        assert_eq!(util, 100.0);
    }

    #[test]
    fn test_pathological_single_process_is_clamped() {
        let samples = vec![sample(7, 6400.0)];
        assert_eq!(Aggregator::default().utilization(&samples, 8), 100.0);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let samples = vec![
            sample(10, 20.0),
            sample(11, 40.0),
            sample(12, 20.0),
            sample(13, 20.0),
        ];
        let ranked = Aggregator::default().rank(&samples, 1);
        let pids: Vec<u32> = ranked.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![11, 10, 12, 13]);
    }

    #[test]
    fn test_ranked_length_is_min_of_top_n_and_non_idle() {
        let samples = vec![sample(0, 90.0), sample(3, 1.0), sample(4, 2.0)];
        assert_eq!(Aggregator::default().rank(&samples, 1).len(), 2);
        assert_eq!(Aggregator::new(1).rank(&samples, 1).len(), 1);
    }

    #[test]
    fn test_empty_and_zero_cores() {
        let agg = Aggregator::default();
        assert!(agg.rank(&[], 4).is_empty());
        assert_eq!(agg.utilization(&[], 4), 0.0);

        // zero cores is treated as one
        let samples = vec![sample(1, 30.0)];
        assert!((agg.utilization(&samples, 0) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_unusable_values_skipped() {
        let samples = vec![
            sample(1, f64::NAN),
            sample(2, -5.0),
            sample(3, f64::INFINITY),
            sample(4, 10.0),
        ];
        let ranked = Aggregator::default().rank(&samples, 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].pid, 4);
    }

    #[test]
    fn test_idle_process_never_counts_even_when_small() {
        let samples = vec![sample(0, 1.0), sample(1, 1.0)];
        let ranked = Aggregator::default().rank(&samples, 1);
        assert!(ranked.iter().all(|p| p.pid != IDLE_PID));
        assert!((Aggregator::utilization_of(&ranked) - 1.0).abs() < 1e-9);
    }
}
