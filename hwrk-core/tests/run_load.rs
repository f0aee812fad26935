use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hwrk_core::{
    CancellationFlag, ErrorKind, HistogramConfig, LoadPlan, OutboundRequest, RequestSender,
    RequestTemplate, ResponseHead, SendError, SendResult, run_load,
};

/// Answers every request with a fixed status after a fixed delay.
struct Stub {
    delay: Duration,
    status: u16,
    body_bytes: u64,
    calls: AtomicU64,
}

impl Stub {
    fn new(delay: Duration, status: u16, body_bytes: u64) -> Self {
        Self {
            delay,
            status,
            body_bytes,
            calls: AtomicU64::new(0),
        }
    }
}

impl RequestSender for Stub {
    async fn send(&self, _req: &OutboundRequest) -> SendResult {
        self.calls.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.delay).await;
        Ok(ResponseHead {
            status: self.status,
            content_length: Some(self.body_bytes),
            body_bytes: self.body_bytes,
            header_bytes: 0,
        })
    }
}

struct Refusing;

impl RequestSender for Refusing {
    async fn send(&self, req: &OutboundRequest) -> SendResult {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Err(SendError::Transport(format!("dial {}: connection refused", req.url)))
    }
}

fn plan(workers: u64, duration: Duration) -> LoadPlan {
    LoadPlan {
        workers,
        duration,
        request: RequestTemplate::get("http://stub.local/"),
        histogram: HistogramConfig::for_run(duration, 3),
    }
}

#[tokio::test(start_paused = true)]
async fn four_workers_hundred_requests_each() -> anyhow::Result<()> {
    let stub = Arc::new(Stub::new(Duration::from_millis(10), 200, 1000));
    let report = run_load(
        stub.clone(),
        plan(4, Duration::from_secs(1)),
        CancellationFlag::new(),
    )
    .await?;

    assert_eq!(report.workers, 4);
    assert_eq!(report.success_count, 400);
    assert_eq!(report.error_count, 0);
    assert_eq!(report.total_response_bytes, 400_000);
    assert_eq!(report.histogram.len(), 400);
    assert_eq!(stub.calls.load(Ordering::Relaxed), 400);
    assert_eq!(report.elapsed, Duration::from_secs(1));

    let Some(metrics) = report.metrics() else {
        anyhow::bail!("expected metrics for a successful run");
    };
    assert!(metrics.requests_per_second > 0.0);
    assert!((metrics.requests_per_second - 400.0).abs() < 1e-6);
    assert!((metrics.bytes_per_second - 400_000.0).abs() < 1e-3);
    assert_eq!(metrics.mean_latency, Duration::from_millis(10));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn zero_duration_sends_nothing() -> anyhow::Result<()> {
    let stub = Arc::new(Stub::new(Duration::from_millis(10), 200, 10));
    let report = run_load(stub.clone(), plan(3, Duration::ZERO), CancellationFlag::new()).await?;

    assert_eq!(report.requests_total(), 0);
    assert_eq!(stub.calls.load(Ordering::Relaxed), 0);
    assert!(report.metrics().is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn every_request_failing_means_no_data() -> anyhow::Result<()> {
    let report = run_load(
        Arc::new(Refusing),
        plan(2, Duration::from_millis(100)),
        CancellationFlag::new(),
    )
    .await?;

    assert_eq!(report.success_count, 0);
    assert_eq!(report.error_count, 40);
    assert!(report.metrics().is_none());
    assert_eq!(
        report.error_tally.get(&ErrorKind::Transport(
            "dial http://stub.local/: connection refused".to_string()
        )),
        Some(&40)
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn status_errors_are_tallied_by_code() -> anyhow::Result<()> {
    let stub = Arc::new(Stub::new(Duration::from_millis(20), 503, 5));
    let report = run_load(
        stub,
        plan(1, Duration::from_millis(100)),
        CancellationFlag::new(),
    )
    .await?;

    assert_eq!(report.error_count, 5);
    assert_eq!(report.error_tally.get(&ErrorKind::HttpStatus(503)), Some(&5));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_workers_between_requests() -> anyhow::Result<()> {
    let stub = Arc::new(Stub::new(Duration::from_millis(10), 200, 1));
    let cancel = CancellationFlag::new();

    let relay = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(495)).await;
        relay.cancel();
    });

    let report = run_load(stub, plan(2, Duration::from_secs(60)), cancel).await?;

    // Requests already in flight finish; nothing new starts after the flag flips.
    assert_eq!(report.success_count, 100);
    assert_eq!(report.error_count, 0);
    assert!(report.elapsed < Duration::from_secs(1));
    Ok(())
}
