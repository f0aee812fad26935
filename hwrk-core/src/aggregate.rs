use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::report::AggregateReport;
use crate::stats::WorkerStats;

/// Receives exactly one [`WorkerStats`] from every worker and folds them together.
#[derive(Debug)]
pub struct Aggregator {
    expected: u64,
    started: Instant,
    rx: mpsc::Receiver<WorkerStats>,
}

#[derive(Debug, Clone)]
pub struct StatsSender {
    tx: mpsc::Sender<WorkerStats>,
}

impl StatsSender {
    /// Hands the worker's stats over. Consumes the sender: one handoff per worker.
    pub async fn submit(self, stats: WorkerStats) {
        if self.tx.send(stats).await.is_err() {
            tracing::warn!("aggregator is gone; dropping worker stats");
        }
    }
}

impl Aggregator {
    /// `started` is the wall-clock origin used for rates.
    pub fn new(expected: u64, started: Instant) -> (Self, StatsSender) {
        let capacity = usize::try_from(expected).unwrap_or(usize::MAX).clamp(1, 4096);
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                expected,
                started,
                rx,
            },
            StatsSender { tx },
        )
    }

    /// Waits for all `expected` handoffs, in any order.
    ///
    /// Every [`StatsSender`] clone must be submitted or dropped, otherwise this waits forever.
    pub async fn collect(mut self) -> Result<AggregateReport> {
        let mut acc: Option<WorkerStats> = None;
        let mut received = 0u64;
        let mut finished = self.started;

        while received < self.expected {
            let Some(stats) = self.rx.recv().await else {
                return Err(Error::MissingWorkers {
                    expected: self.expected,
                    received,
                });
            };
            received += 1;
            finished = Instant::now();
            tracing::debug!(received, expected = self.expected, "worker stats received");

            match acc.as_mut() {
                Some(acc) => acc.merge(stats),
                None => acc = Some(stats),
            }
        }

        let Some(totals) = acc else {
            return Err(Error::InvalidWorkers);
        };

        Ok(AggregateReport::from_stats(
            self.expected,
            finished.saturating_duration_since(self.started),
            totals,
        ))
    }
}
