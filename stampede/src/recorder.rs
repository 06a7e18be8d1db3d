//! The single shared store of a run's outcomes.
//!
//! Workers append through cheap [`Recorder`] handles. Each outcome is folded into running
//! counts as it arrives; only its latency is retained, so that final percentiles are exact.
//! The run loop drains a separate interval window for live progress.
use crate::measurement::Measurement;
use metrics_util::AtomicBucket;
use stampede_core::{
    AggregatedMetrics, Check, CheckCounts, ErrorTag, LatencyDistribution, RequestOutcome,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Clone)]
pub struct Recorder {
    inner: Arc<Inner>,
}

struct Inner {
    tally: Mutex<Tally>,
    latencies: AtomicBucket<Duration>,
    recorded: AtomicU64,
    // Interval window, reset on every `collect_interval`.
    success: AtomicU64,
    error: AtomicU64,
    interval_latencies: AtomicBucket<Duration>,
    #[cfg(feature = "metrics")]
    labels: MetricLabels,
}

/// Running counts over every outcome recorded so far.
#[derive(Debug, Default)]
struct Tally {
    passed: u64,
    failed: u64,
    http_failed: u64,
    status_codes: BTreeMap<u16, u64>,
    error_tags: BTreeMap<ErrorTag, u64>,
    checks: HashMap<Check, CheckCounts>,
}

impl Tally {
    fn add(&mut self, outcome: &RequestOutcome) {
        if outcome.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        if outcome.http_failed() {
            self.http_failed += 1;
        }
        if let Some(status) = outcome.status {
            *self.status_codes.entry(status).or_default() += 1;
        }
        if let Some(tag) = outcome.error {
            *self.error_tags.entry(tag).or_default() += 1;
        }
        for result in &outcome.checks {
            let counts = self.checks.entry(result.check).or_default();
            if result.passed {
                counts.passes += 1;
            } else {
                counts.fails += 1;
            }
        }
    }
}

#[cfg(feature = "metrics")]
struct MetricLabels {
    requests: metrics::Counter,
    errors: metrics::Counter,
    latency: metrics::Histogram,
}

#[cfg(feature = "metrics")]
impl MetricLabels {
    fn new(name: &str) -> Self {
        metrics::describe_histogram!(
            "stampede_http_req_duration",
            metrics::Unit::Seconds,
            "Signup request latency"
        );
        Self {
            requests: metrics::counter!("stampede_http_reqs", "run" => name.to_string()),
            errors: metrics::counter!("stampede_errors", "run" => name.to_string()),
            latency: metrics::histogram!("stampede_http_req_duration", "run" => name.to_string()),
        }
    }
}

impl Recorder {
    #[allow(unused_variables)]
    pub fn new(name: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                tally: Mutex::new(Tally::default()),
                latencies: AtomicBucket::new(),
                recorded: AtomicU64::new(0),
                success: AtomicU64::new(0),
                error: AtomicU64::new(0),
                interval_latencies: AtomicBucket::new(),
                #[cfg(feature = "metrics")]
                labels: MetricLabels::new(name),
            }),
        }
    }

    pub fn record(&self, outcome: RequestOutcome) {
        let inner = &self.inner;

        inner.interval_latencies.push(outcome.latency);
        if outcome.passed {
            inner.success.fetch_add(1, Ordering::Relaxed);
        } else {
            inner.error.fetch_add(1, Ordering::Relaxed);
        }

        #[cfg(feature = "metrics")]
        {
            inner.labels.requests.increment(1);
            inner.labels.latency.record(outcome.latency.as_secs_f64());
            if !outcome.passed {
                inner.labels.errors.increment(1);
            }
        }

        inner
            .tally
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(&outcome);
        inner.latencies.push(outcome.latency);
        inner.recorded.fetch_add(1, Ordering::Release);
    }

    /// Number of outcomes recorded so far.
    pub fn recorded(&self) -> u64 {
        self.inner.recorded.load(Ordering::Acquire)
    }

    /// Drain the interval window into a [`Measurement`].
    pub(crate) fn collect_interval(&self, elapsed: Duration) -> Measurement {
        let success = self.inner.success.swap(0, Ordering::Relaxed);
        let error = self.inner.error.swap(0, Ordering::Relaxed);
        let mut measurement = Measurement::new(success, error, elapsed);
        self.inner
            .interval_latencies
            .clear_with(|samples| measurement.insert_latencies(samples));
        measurement
    }

    /// Drain the running counts and latency samples into run-level statistics.
    ///
    /// Only meaningful once no worker can record anymore.
    pub fn aggregate(&self, elapsed: Duration, max_vus: u32) -> AggregatedMetrics {
        let tally = {
            let mut tally = self.inner.tally.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tally)
        };
        let mut latencies = Vec::new();
        self.inner
            .latencies
            .clear_with(|samples| latencies.extend_from_slice(samples));

        let requests = tally.passed + tally.failed;
        let mut metrics = AggregatedMetrics {
            requests,
            passed: tally.passed,
            failed: tally.failed,
            elapsed,
            max_vus,
            latency: LatencyDistribution::new(latencies),
            checks: tally
                .checks
                .into_iter()
                .map(|(check, counts)| (check.to_string(), counts))
                .collect(),
            status_codes: tally.status_codes,
            error_tags: tally.error_tags,
            ..Default::default()
        };

        if requests > 0 {
            metrics.error_rate = tally.failed as f64 / requests as f64;
            metrics.http_req_failed = tally.http_failed as f64 / requests as f64;
        }
        if !elapsed.is_zero() {
            metrics.throughput = requests as f64 / elapsed.as_secs_f64();
        }
        metrics
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("recorded", &self.recorded())
            .finish()
    }
}
