use std::sync::Arc;

use tokio::time::Instant;

use crate::gate::RunGate;
use crate::outcome::{WorkOutcome, classify};
use crate::request::RequestTemplate;
use crate::sender::RequestSender;
use crate::stats::WorkerStats;

#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub worker_id: u64,
    pub request: Arc<RequestTemplate>,
    pub gate: Arc<RunGate>,
}

/// Sends requests back to back until the gate closes, then returns the accumulated stats.
///
/// Request failures of any kind are tallied; they never stop the loop.
pub async fn run_worker<S: RequestSender>(
    sender: &S,
    ctx: &WorkerContext,
    mut stats: WorkerStats,
) -> WorkerStats {
    let request = ctx.request.build();
    tracing::debug!(worker_id = ctx.worker_id, url = %request.url, "worker started");

    while ctx.gate.next() {
        let started = Instant::now();
        let result = sender.send(&request).await;
        let outcome = classify(result, started.elapsed());

        if let WorkOutcome::Failure { kind } = &outcome {
            tracing::trace!(worker_id = ctx.worker_id, error = %kind, "request failed");
        }
        stats.record(outcome);
    }

    tracing::debug!(
        worker_id = ctx.worker_id,
        requests = stats.attempts(),
        errors = stats.error_count,
        "worker stopped"
    );
    stats
}
