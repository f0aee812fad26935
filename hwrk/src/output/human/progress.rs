use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub(crate) struct HumanProgress {
    inner: Mutex<Option<ProgressBar>>,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// A zero-length run has no bar to fill and gets a spinner.
    pub(crate) fn update(&self, total: Duration, elapsed: Duration, message: String) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let pb = inner.get_or_insert_with(|| new_bar(total));
        pb.set_message(message);

        if total.is_zero() {
            pb.tick();
        } else {
            let total_ms = u64::try_from(total.as_millis()).unwrap_or(u64::MAX);
            let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
            pb.set_position(elapsed_ms.min(total_ms));
        }
    }

    pub(crate) fn finish(&self) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(pb) = inner.take() {
            pb.finish_and_clear();
        }
    }
}

fn new_bar(total: Duration) -> ProgressBar {
    let pb = if total.is_zero() {
        let pb = ProgressBar::new_spinner();
        pb.set_style(spinner_style());
        pb
    } else {
        let pb = ProgressBar::new(u64::try_from(total.as_millis()).unwrap_or(u64::MAX));
        pb.set_style(bar_style());
        pb
    };
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
    pb.set_prefix("hwrk");
    pb
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [ {bar:20.cyan/blue} ] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} {spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
