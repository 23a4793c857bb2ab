use std::sync::atomic::{AtomicU64, Ordering};

use execd_core::{CacheStats, CommandsStats, DurationStats, StatsSnapshot};
use parking_lot::Mutex;

/// Running mean/variance over non-cached execution durations, computed
/// with Welford's online algorithm so a snapshot never needs to revisit
/// the raw sample stream for those two figures. The median has no
/// streaming equivalent, so the raw samples are retained and sorted only
/// when a snapshot is actually requested.
#[derive(Default)]
struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    samples: Vec<f64>,
}

impl Welford {
    fn update(&mut self, sample: f64) {
        if self.count == 0 {
            self.min = sample;
            self.max = sample;
        } else {
            self.min = self.min.min(sample);
            self.max = self.max.max(sample);
        }
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = sample - self.mean;
        self.m2 += delta * delta2;
        self.samples.push(sample);
    }

    fn stats(&self) -> DurationStats {
        if self.count == 0 {
            return DurationStats::default();
        }
        let variance = if self.count > 1 {
            self.m2 / (self.count - 1) as f64
        } else {
            0.0
        };
        DurationStats {
            average: Some(self.mean),
            median: Some(median(&self.samples)),
            max: Some(self.max),
            min: Some(self.min),
            stddev: Some(variance.sqrt()),
        }
    }
}

fn median(samples: &[f64]) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Thread-safe rolling counts and duration statistics over non-cached
/// executions.
///
/// `ran`, `commands_total`, hits and misses are plain atomics since each
/// is an independent monotonic counter; `Welford`'s running mean/variance
/// needs a critical section because updating it is not a single atomic
/// operation.
pub struct StatsAggregator {
    ran: AtomicU64,
    commands_total: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    durations: Mutex<Welford>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        StatsAggregator {
            ran: AtomicU64::new(0),
            commands_total: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            durations: Mutex::new(Welford::default()),
        }
    }

    /// Records a cache hit. Per the update protocol, a hit does not touch
    /// `ran`/`duration`/`commands`.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed non-cached execution: `duration` is the
    /// aggregate chain/command duration, `commands_executed` is the number
    /// of per-step executions it comprised (1 for a single command).
    pub fn record_miss(&self, duration: f64, commands_executed: u64) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.ran.fetch_add(1, Ordering::Relaxed);
        self.commands_total
            .fetch_add(commands_executed, Ordering::Relaxed);
        self.durations.lock().update(duration);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        StatsSnapshot {
            ran: self.ran.load(Ordering::Relaxed),
            duration: self.durations.lock().stats(),
            commands: CommandsStats {
                total: self.commands_total.load(Ordering::Relaxed),
            },
            cache: CacheStats {
                hits,
                misses,
                hit_rate,
            },
        }
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}
