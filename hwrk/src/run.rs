use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use hwrk_core::{CancellationFlag, run_load};
use hwrk_http::HttpClient;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::cli::Cli;
use crate::config::{FileConfig, Settings, load_file};
use crate::exit_codes::ExitCode;
use crate::output::{self, ProgressFn};
use crate::run_error::RunError;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

pub async fn run(cli: Cli) -> Result<ExitCode, RunError> {
    let file = match &cli.config {
        Some(path) => load_file(path).await.map_err(RunError::InvalidInput)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(&cli, file).map_err(RunError::InvalidInput)?;
    let plan = settings.load_plan().await.map_err(RunError::InvalidInput)?;

    let client = HttpClient::new(settings.client_options())
        .context("failed to build HTTP client")
        .map_err(RunError::InvalidInput)?;

    let out = output::formatter(settings.output);
    out.print_header(&settings);

    let cancel = CancellationFlag::new();
    let relay = spawn_ctrl_c_relay(cancel.clone());
    let ticker = out.progress(settings.duration).map(spawn_progress);

    let res = run_load(Arc::new(client), plan, cancel).await;

    relay.abort();
    if let Some(t) = ticker {
        t.abort();
    }

    let report = res.map_err(|err| match err {
        hwrk_core::Error::InvalidWorkers
        | hwrk_core::Error::InvalidDuration(_)
        | hwrk_core::Error::InvalidHistogram(_) => RunError::InvalidInput(err.into()),
        other => RunError::RuntimeError(anyhow::Error::new(other).context("load run failed")),
    })?;

    out.print_summary(&report).map_err(RunError::RuntimeError)?;

    if report.metrics().is_none() {
        return Ok(ExitCode::NoData);
    }
    Ok(ExitCode::Success)
}

/// First Ctrl-C stops the run; workers finish the request they are in.
fn spawn_ctrl_c_relay(cancel: CancellationFlag) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                if cancel.cancel() {
                    tracing::info!("stopping...");
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to listen for Ctrl-C"),
        }
    })
}

fn spawn_progress(progress: ProgressFn) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            progress(started.elapsed());
        }
    })
}
