use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Run-wide stop request shared by the driver, the workers and the signal relay.
///
/// Cancelling never interrupts an in-flight request; workers observe the flag
/// between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    inner: Arc<AtomicBool>,
}

impl CancellationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the call that actually flipped the flag.
    pub fn cancel(&self) -> bool {
        !self.inner.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent() {
        let flag = CancellationFlag::new();
        assert!(!flag.is_cancelled());
        assert!(flag.cancel());
        assert!(!flag.cancel());
        assert!(flag.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let flag = CancellationFlag::new();
        let observer = flag.clone();
        flag.cancel();
        assert!(observer.is_cancelled());
    }

    #[tokio::test]
    async fn only_one_concurrent_caller_wins() {
        let flag = CancellationFlag::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let flag = flag.clone();
            handles.push(tokio::spawn(async move { flag.cancel() }));
        }

        let mut winners = 0;
        for h in handles {
            match h.await {
                Ok(true) => winners += 1,
                Ok(false) => {}
                Err(err) => panic!("task failed: {err}"),
            }
        }
        assert_eq!(winners, 1);
    }
}
