use std::sync::Arc;
use std::time::Duration;

use hwrk_core::AggregateReport;

use crate::cli::OutputFormat;
use crate::config::Settings;

mod human;
mod json;

/// Called periodically with the time since the run started.
pub(crate) type ProgressFn = Arc<dyn Fn(Duration) + Send + Sync>;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, settings: &Settings);
    fn progress(&self, total: Duration) -> Option<ProgressFn>;
    fn print_summary(&self, report: &AggregateReport) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
