use std::sync::Arc;
use std::time::Duration;

use hwrk_core::AggregateReport;

mod format;
mod progress;
mod summary;

use format::format_duration;
use progress::HumanProgress;

use super::{OutputFormatter, ProgressFn};
use crate::config::Settings;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, settings: &Settings) {
        println!(
            "Running {} test @ {}",
            format_duration(settings.duration),
            settings.url
        );
        println!("  {} connection(s)", settings.connections);
        println!();
    }

    fn progress(&self, total: Duration) -> Option<ProgressFn> {
        let progress = self.progress.clone();
        Some(Arc::new(move |elapsed| {
            progress.update(total, elapsed, format!("elapsed={}", format_duration(elapsed)));
        }))
    }

    fn print_summary(&self, report: &AggregateReport) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", summary::render(report));
        Ok(())
    }
}
