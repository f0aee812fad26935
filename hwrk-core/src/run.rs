use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::aggregate::Aggregator;
use crate::cancel::CancellationFlag;
use crate::error::{Error, Result};
use crate::gate::RunGate;
use crate::histogram::{HistogramConfig, LatencyHistogram};
use crate::report::AggregateReport;
use crate::request::RequestTemplate;
use crate::sender::RequestSender;
use crate::stats::WorkerStats;
use crate::worker::{WorkerContext, run_worker};

#[derive(Debug, Clone)]
pub struct LoadPlan {
    pub workers: u64,
    pub duration: Duration,
    pub request: RequestTemplate,
    pub histogram: HistogramConfig,
}

/// Runs `plan.workers` concurrent workers against one shared transport and returns the
/// merged report once every worker has handed its stats over.
pub async fn run_load<S>(
    sender: Arc<S>,
    plan: LoadPlan,
    cancel: CancellationFlag,
) -> Result<AggregateReport>
where
    S: RequestSender + 'static,
{
    if plan.workers == 0 {
        return Err(Error::InvalidWorkers);
    }
    if Instant::now().checked_add(plan.duration).is_none() {
        return Err(Error::InvalidDuration(plan.duration));
    }

    let prototype = LatencyHistogram::new(plan.histogram)?;
    let request = Arc::new(plan.request);
    let gate = Arc::new(RunGate::new(plan.duration, cancel));

    tracing::info!(
        workers = plan.workers,
        duration = ?plan.duration,
        url = %request.url,
        "starting load"
    );

    let started = Instant::now();
    let (aggregator, stats_tx) = Aggregator::new(plan.workers, started);
    gate.start_at(started);

    let mut handles = Vec::with_capacity(usize::try_from(plan.workers).unwrap_or(0));
    for worker_id in 0..plan.workers {
        let sender = sender.clone();
        let stats_tx = stats_tx.clone();
        let stats = WorkerStats::new(prototype.empty_like());
        let ctx = WorkerContext {
            worker_id,
            request: request.clone(),
            gate: gate.clone(),
        };

        handles.push(tokio::spawn(async move {
            let stats = run_worker(sender.as_ref(), &ctx, stats).await;
            stats_tx.submit(stats).await;
        }));
    }
    drop(stats_tx);

    let collected = aggregator.collect().await;

    // A panicked worker shows up as a missing handoff; report the panic instead.
    for h in handles {
        h.await?;
    }

    let report = collected?;
    tracing::info!(
        requests = report.requests_total(),
        errors = report.error_count,
        elapsed = ?report.elapsed,
        "load finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::{OutboundRequest, SendResult};

    struct Panicking;

    impl RequestSender for Panicking {
        async fn send(&self, _req: &OutboundRequest) -> SendResult {
            panic!("boom");
        }
    }

    fn plan(workers: u64) -> LoadPlan {
        LoadPlan {
            workers,
            duration: Duration::from_secs(1),
            request: RequestTemplate::get("http://localhost/"),
            histogram: HistogramConfig::default(),
        }
    }

    #[tokio::test]
    async fn zero_workers_is_rejected() {
        let res = run_load(Arc::new(Panicking), plan(0), CancellationFlag::new()).await;
        assert!(matches!(res, Err(Error::InvalidWorkers)));
    }

    #[tokio::test]
    async fn invalid_histogram_is_rejected_before_spawning() {
        let mut p = plan(1);
        p.histogram.sigfig = 9;
        let res = run_load(Arc::new(Panicking), p, CancellationFlag::new()).await;
        assert!(matches!(res, Err(Error::InvalidHistogram(_))));
    }

    #[tokio::test]
    async fn oversized_duration_is_rejected_before_spawning() {
        let mut p = plan(1);
        p.duration = Duration::from_secs(10_000_000_000_000_000_000);
        let res = run_load(Arc::new(Panicking), p, CancellationFlag::new()).await;
        assert!(matches!(res, Err(Error::InvalidDuration(_))));
    }

    #[tokio::test]
    async fn worker_panic_surfaces_as_join_error() {
        let res = run_load(Arc::new(Panicking), plan(2), CancellationFlag::new()).await;
        assert!(matches!(res, Err(Error::Join(_))));
    }
}
