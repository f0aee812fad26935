use std::time::Duration;

use hdrhistogram::Histogram;

use crate::error::{Error, Result};

pub const DEFAULT_SIGFIG: u8 = 3;

const MIN_TRACKABLE: Duration = Duration::from_secs(1);
const RUN_FLOOR: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramConfig {
    pub max_trackable: Duration,
    pub sigfig: u8,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            max_trackable: RUN_FLOOR,
            sigfig: DEFAULT_SIGFIG,
        }
    }
}

impl HistogramConfig {
    /// Bound for a run of the given length: a single request can't take longer than
    /// the run itself, but short runs still get at least a minute of headroom.
    #[must_use]
    pub fn for_run(duration: Duration, sigfig: u8) -> Self {
        Self {
            max_trackable: duration.max(RUN_FLOOR),
            sigfig,
        }
    }

    fn high_micros(&self) -> u64 {
        let micros = u64::try_from(self.max_trackable.max(MIN_TRACKABLE).as_micros())
            .unwrap_or(u64::MAX);
        micros.max(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub p50: Duration,
    pub p75: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub stdev: Duration,
    pub count: u64,
}

/// Microsecond latency histogram with a fixed range and precision.
///
/// Out-of-range observations are clamped into `[1µs, max_trackable]` and counted in
/// [`LatencyHistogram::clamped`] so nothing is silently dropped.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    inner: Histogram<u64>,
    clamped: u64,
}

impl LatencyHistogram {
    pub fn new(config: HistogramConfig) -> Result<Self> {
        if !(1..=5).contains(&config.sigfig) {
            return Err(Error::InvalidHistogram(format!(
                "significant figures must be within 1..=5, got {}",
                config.sigfig
            )));
        }

        let inner = Histogram::<u64>::new_with_bounds(1, config.high_micros(), config.sigfig)
            .map_err(|err| Error::InvalidHistogram(format!("{err:?}")))?;

        Ok(Self { inner, clamped: 0 })
    }

    /// Empty histogram with the same bounds and precision.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        let mut inner = self.inner.clone();
        inner.reset();
        Self { inner, clamped: 0 }
    }

    pub fn record(&mut self, latency: Duration) {
        let value = self.clamp(latency);
        self.inner.saturating_record(value);
    }

    /// Adds every observation of `other` to `self`.
    ///
    /// Histograms built from the same config add bucket-wise. Anything else is
    /// re-recorded value by value, clamping into this histogram's range.
    pub fn merge(&mut self, other: &Self) {
        self.clamped = self.clamped.saturating_add(other.clamped);

        if other.inner.is_empty() || self.inner.add(&other.inner).is_ok() {
            return;
        }

        let high = self.inner.high();
        for v in other.inner.iter_recorded() {
            let value = v.value_iterated_to();
            let count = v.count_at_value();
            if value > high {
                self.clamped = self.clamped.saturating_add(count);
            }
            let _ = self.inner.record_n(value.clamp(1, high), count);
        }
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of observations that fell outside the trackable range.
    #[must_use]
    pub fn clamped(&self) -> u64 {
        self.clamped
    }

    /// `percentile` is in `0.0..=100.0`.
    #[must_use]
    pub fn value_at_percentile(&self, percentile: f64) -> Option<Duration> {
        (!self.is_empty())
            .then(|| Duration::from_micros(self.inner.value_at_percentile(percentile)))
    }

    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        (!self.is_empty()).then(|| Duration::from_micros(self.inner.min()))
    }

    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        (!self.is_empty()).then(|| Duration::from_micros(self.inner.max()))
    }

    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        (!self.is_empty()).then(|| micros_f64(self.inner.mean()))
    }

    #[must_use]
    pub fn stddev(&self) -> Option<Duration> {
        (!self.is_empty()).then(|| micros_f64(self.inner.stdev()))
    }

    #[must_use]
    pub fn summary(&self) -> Option<LatencySummary> {
        if self.is_empty() {
            return None;
        }
        let q = |quantile| Duration::from_micros(self.inner.value_at_quantile(quantile));

        Some(LatencySummary {
            p50: q(0.50),
            p75: q(0.75),
            p90: q(0.90),
            p95: q(0.95),
            p99: q(0.99),
            min: Duration::from_micros(self.inner.min()),
            max: Duration::from_micros(self.inner.max()),
            mean: micros_f64(self.inner.mean()),
            stdev: micros_f64(self.inner.stdev()),
            count: self.inner.len(),
        })
    }

    fn clamp(&mut self, latency: Duration) -> u64 {
        let high = self.inner.high();
        let micros = latency.as_micros();
        if micros < 1 || micros > u128::from(high) {
            self.clamped = self.clamped.saturating_add(1);
        }
        u64::try_from(micros).unwrap_or(high).clamp(1, high)
    }
}

impl PartialEq for LatencyHistogram {
    fn eq(&self, other: &Self) -> bool {
        self.clamped == other.clamped && self.inner == other.inner
    }
}

fn micros_f64(v: f64) -> Duration {
    if v.is_finite() && v > 0.0 {
        Duration::from_secs_f64(v / 1_000_000.0)
    } else {
        Duration::ZERO
    }
}
