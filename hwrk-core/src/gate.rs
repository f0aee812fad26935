use std::sync::OnceLock;
use std::time::Duration;

use tokio::time::Instant;

use crate::cancel::CancellationFlag;

/// Decides whether a worker may start another request.
///
/// The deadline is soft: it is only consulted between requests, so a request that
/// started before the deadline is allowed to finish. A duration too large to land on
/// the clock leaves the gate without a deadline; only cancellation closes it then.
#[derive(Debug)]
pub struct RunGate {
    duration: Duration,
    deadline: OnceLock<Option<Instant>>,
    cancel: CancellationFlag,
}

impl RunGate {
    pub fn new(duration: Duration, cancel: CancellationFlag) -> Self {
        Self {
            duration,
            deadline: OnceLock::new(),
            cancel,
        }
    }

    pub fn start_at(&self, started: Instant) {
        if self.deadline.get().is_some() {
            return;
        }
        let _ = self.deadline.set(started.checked_add(self.duration));
    }

    pub fn start(&self) {
        self.start_at(Instant::now());
    }

    pub fn next(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let now = Instant::now();

        // Lazily start from the first observed iteration if the driver didn't.
        if self.deadline.get().is_none() {
            self.start_at(now);
        }

        match self.deadline.get() {
            Some(Some(deadline)) => now < *deadline,
            Some(None) => true,
            None => false,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }
}
