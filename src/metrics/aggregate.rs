//! Aggregate outcome metrics across all clients
//!
//! Writers are observer tasks running on arbitrary runtime threads. Each `record`
//! appends under the bucket's own lock and then bumps the bucket's atomic counter,
//! so a live `count` read can briefly run ahead of the sample snapshot that
//! `summarize` sees. Reports are produced after the run has quiesced, where both
//! always agree.

use crate::common::lock;
use crate::metrics::outcome::{LatencyStats, Outcome, Summary};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
struct Bucket {
    count: AtomicU64,
    samples: Mutex<Vec<u64>>,
}

/// Thread-safe per-outcome counters and latency samples for one run
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    buckets: [Bucket; 4],
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, outcome: Outcome) -> &Bucket {
        &self.buckets[outcome.index()]
    }

    /// Record one occurrence of `outcome` that took `elapsed`
    pub fn record(&self, outcome: Outcome, elapsed: Duration) {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let bucket = self.bucket(outcome);

        lock(&bucket.samples).push(elapsed_ms);
        bucket.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Live occurrence count, lock-free
    pub fn count(&self, outcome: Outcome) -> u64 {
        self.bucket(outcome).count.load(Ordering::Relaxed)
    }

    /// Total occurrences across every outcome
    pub fn total(&self) -> u64 {
        Outcome::ALL.iter().map(|&o| self.count(o)).sum()
    }

    /// Count and latency over the current sample snapshot
    pub fn summarize(&self, outcome: Outcome) -> Summary {
        let samples = lock(&self.bucket(outcome).samples);

        Summary {
            outcome,
            count: samples.len() as u64,
            latency: LatencyStats::from_samples(&samples),
        }
    }

    /// Summaries of every outcome, in report order
    pub fn summarize_all(&self) -> Vec<Summary> {
        Outcome::ALL.iter().map(|&o| self.summarize(o)).collect()
    }
}
