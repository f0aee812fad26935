use std::collections::BTreeMap;
use std::io::Write as _;
use std::time::Duration;

use hwrk_core::{AggregateReport, LatencySummary};
use serde::Serialize;

use super::{OutputFormatter, ProgressFn};
use crate::config::Settings;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _settings: &Settings) {}

    fn progress(&self, _total: Duration) -> Option<ProgressFn> {
        None
    }

    fn print_summary(&self, report: &AggregateReport) -> anyhow::Result<()> {
        let line = build_summary_line(report);
        emit_json_line(&line)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub connections: u64,
    pub elapsed_secs: f64,

    pub requests_total: u64,
    pub success_total: u64,
    pub redirect_success_total: u64,
    pub errors_total: u64,
    pub bytes_total: u64,

    /// Keyed by error message.
    pub errors: BTreeMap<String, u64>,
    /// Keyed by error class (`transport`, `redirected`, `http_status`).
    pub error_classes: BTreeMap<String, u64>,

    pub no_data: bool,
    pub metrics: Option<JsonMetrics>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonMetrics {
    pub requests_per_sec: f64,
    pub bytes_per_sec: f64,
    pub latency_mean_us: u64,
    pub latency_min_us: u64,
    pub latency_max_us: u64,
    pub latency: JsonLatency,
}

/// Histogram readouts, microseconds.
#[derive(Debug, Serialize)]
pub(crate) struct JsonLatency {
    pub p50: u64,
    pub p75: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
    pub mean: u64,
    pub stdev: u64,
    pub count: u64,
    pub clamped: u64,
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

fn build_latency(l: &LatencySummary, clamped: u64) -> JsonLatency {
    JsonLatency {
        p50: micros(l.p50),
        p75: micros(l.p75),
        p90: micros(l.p90),
        p95: micros(l.p95),
        p99: micros(l.p99),
        min: micros(l.min),
        max: micros(l.max),
        mean: micros(l.mean),
        stdev: micros(l.stdev),
        count: l.count,
        clamped,
    }
}

pub(crate) fn build_summary_line(report: &AggregateReport) -> JsonSummaryLine {
    let mut errors = BTreeMap::new();
    let mut error_classes = BTreeMap::new();
    for (kind, count) in &report.error_tally {
        *errors.entry(kind.to_string()).or_insert(0) += count;
        *error_classes.entry(kind.class().to_string()).or_insert(0) += count;
    }

    let metrics = report.metrics().map(|m| JsonMetrics {
        requests_per_sec: m.requests_per_second,
        bytes_per_sec: m.bytes_per_second,
        latency_mean_us: micros(m.mean_latency),
        latency_min_us: report.min_latency.map_or(0, micros),
        latency_max_us: report.max_latency.map_or(0, micros),
        latency: build_latency(&m.latency, report.histogram.clamped()),
    });

    JsonSummaryLine {
        kind: "summary",
        connections: report.workers,
        elapsed_secs: report.elapsed.as_secs_f64(),
        requests_total: report.requests_total(),
        success_total: report.success_count,
        redirect_success_total: report.redirect_success_count,
        errors_total: report.error_count,
        bytes_total: report.total_response_bytes,
        errors,
        error_classes,
        no_data: metrics.is_none(),
        metrics,
    }
}

fn emit_json_line<T: Serialize>(line: &T) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer(&mut out, line)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwrk_core::{ErrorKind, HistogramConfig, LatencyHistogram, WorkOutcome, WorkerStats};

    fn stats() -> WorkerStats {
        match LatencyHistogram::new(HistogramConfig::default()) {
            Ok(h) => WorkerStats::new(h),
            Err(err) => panic!("failed to create histogram: {err}"),
        }
    }

    #[test]
    fn summary_without_successes_has_null_metrics() -> anyhow::Result<()> {
        let mut s = stats();
        s.record(WorkOutcome::Failure {
            kind: ErrorKind::HttpStatus(503),
        });
        let report = AggregateReport::from_stats(1, Duration::from_secs(1), s);

        let v = serde_json::to_value(build_summary_line(&report))?;
        anyhow::ensure!(v["kind"] == "summary");
        anyhow::ensure!(v["no_data"] == true);
        anyhow::ensure!(v["metrics"].is_null());
        anyhow::ensure!(v["errors"]["http status 503"] == 1, "{v}");
        anyhow::ensure!(v["error_classes"]["http_status"] == 1, "{v}");
        Ok(())
    }

    #[test]
    fn summary_with_successes_reports_microseconds() -> anyhow::Result<()> {
        let mut s = stats();
        s.record(WorkOutcome::Success {
            response_size: 100,
            latency: Duration::from_millis(5),
        });
        let report = AggregateReport::from_stats(1, Duration::from_secs(1), s);

        let v = serde_json::to_value(build_summary_line(&report))?;
        anyhow::ensure!(v["no_data"] == false);
        anyhow::ensure!(v["bytes_total"] == 100);
        anyhow::ensure!(v["metrics"]["latency_mean_us"] == 5000, "{v}");
        anyhow::ensure!(v["metrics"]["latency"]["count"] == 1, "{v}");
        Ok(())
    }
}
