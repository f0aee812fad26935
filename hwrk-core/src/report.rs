use std::time::Duration;

use crate::histogram::{LatencyHistogram, LatencySummary};
use crate::stats::{ErrorTally, WorkerStats};

/// Totals of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateReport {
    pub workers: u64,
    /// Wall-clock time from the first spawn to the last worker handoff.
    pub elapsed: Duration,
    pub success_count: u64,
    pub redirect_success_count: u64,
    pub error_count: u64,
    pub total_response_bytes: u64,
    pub total_success_latency: Duration,
    pub min_latency: Option<Duration>,
    pub max_latency: Option<Duration>,
    pub error_tally: ErrorTally,
    pub histogram: LatencyHistogram,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportMetrics {
    pub requests_per_second: f64,
    pub bytes_per_second: f64,
    pub mean_latency: Duration,
    pub latency: LatencySummary,
}

impl AggregateReport {
    pub fn from_stats(workers: u64, elapsed: Duration, stats: WorkerStats) -> Self {
        Self {
            workers,
            elapsed,
            success_count: stats.success_count,
            redirect_success_count: stats.redirect_success_count,
            error_count: stats.error_count,
            total_response_bytes: stats.total_response_bytes,
            total_success_latency: stats.total_success_latency,
            min_latency: stats.min_latency,
            max_latency: stats.max_latency,
            error_tally: stats.error_tally,
            histogram: stats.histogram,
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.success_count + self.error_count
    }

    /// Derived rates and latency stats; `None` when no request succeeded.
    pub fn metrics(&self) -> Option<ReportMetrics> {
        if self.success_count == 0 {
            return None;
        }
        let latency = self.histogram.summary()?;

        let secs = self.elapsed.as_secs_f64().max(1e-9);

        Some(ReportMetrics {
            requests_per_second: self.success_count as f64 / secs,
            bytes_per_second: self.total_response_bytes as f64 / secs,
            mean_latency: mean(self.total_success_latency, self.success_count),
            latency,
        })
    }
}

fn mean(total: Duration, count: u64) -> Duration {
    let nanos = total.as_nanos() / u128::from(count.max(1));
    let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
    let subsec = u32::try_from(nanos % 1_000_000_000).unwrap_or(0);
    Duration::new(secs, subsec)
}
