use std::collections::BTreeMap;
use std::time::Duration;

use crate::histogram::LatencyHistogram;
use crate::outcome::{ErrorKind, WorkOutcome};

pub type ErrorTally = BTreeMap<ErrorKind, u64>;

/// Counters owned by a single worker.
///
/// A worker mutates its own stats without synchronization and hands them over to the
/// aggregator exactly once, when it stops.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerStats {
    pub total_response_bytes: u64,
    pub total_success_latency: Duration,
    pub min_latency: Option<Duration>,
    pub max_latency: Option<Duration>,
    pub success_count: u64,
    /// Subset of `success_count`.
    pub redirect_success_count: u64,
    pub error_count: u64,
    pub error_tally: ErrorTally,
    pub histogram: LatencyHistogram,
}

impl WorkerStats {
    #[must_use]
    pub fn new(histogram: LatencyHistogram) -> Self {
        Self {
            total_response_bytes: 0,
            total_success_latency: Duration::ZERO,
            min_latency: None,
            max_latency: None,
            success_count: 0,
            redirect_success_count: 0,
            error_count: 0,
            error_tally: ErrorTally::new(),
            histogram,
        }
    }

    pub fn record(&mut self, outcome: WorkOutcome) {
        match outcome {
            WorkOutcome::Success {
                response_size,
                latency,
            } => self.record_success(response_size, latency),
            WorkOutcome::RedirectSuccess {
                response_size,
                latency,
            } => {
                self.redirect_success_count += 1;
                self.record_success(response_size, latency);
            }
            WorkOutcome::Failure { kind } => {
                self.error_count += 1;
                *self.error_tally.entry(kind).or_insert(0) += 1;
            }
        }
    }

    fn record_success(&mut self, response_size: u64, latency: Duration) {
        self.success_count += 1;
        self.total_response_bytes = self.total_response_bytes.saturating_add(response_size);
        self.total_success_latency = self.total_success_latency.saturating_add(latency);
        self.min_latency = Some(self.min_latency.map_or(latency, |m| m.min(latency)));
        self.max_latency = Some(self.max_latency.map_or(latency, |m| m.max(latency)));
        self.histogram.record(latency);
    }

    /// Folds `other` into `self`. Commutative and associative.
    pub fn merge(&mut self, other: WorkerStats) {
        self.total_response_bytes = self
            .total_response_bytes
            .saturating_add(other.total_response_bytes);
        self.total_success_latency = self
            .total_success_latency
            .saturating_add(other.total_success_latency);
        self.min_latency = merge_opt(self.min_latency, other.min_latency, Duration::min);
        self.max_latency = merge_opt(self.max_latency, other.max_latency, Duration::max);
        self.success_count += other.success_count;
        self.redirect_success_count += other.redirect_success_count;
        self.error_count += other.error_count;
        for (kind, n) in other.error_tally {
            *self.error_tally.entry(kind).or_insert(0) += n;
        }
        self.histogram.merge(&other.histogram);
    }

    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.success_count + self.error_count
    }
}

fn merge_opt(
    a: Option<Duration>,
    b: Option<Duration>,
    pick: fn(Duration, Duration) -> Duration,
) -> Option<Duration> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}
