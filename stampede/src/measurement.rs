use pdatastructs::tdigest::{TDigest, K1};
use std::fmt;
use std::time::Duration;

const DIGEST_COMPRESSION: f64 = 50.;
const DIGEST_BACKLOG: usize = 256;

/// Live statistics for one progress window. Latency quantiles come from a t-digest and are
/// approximate; the final run metrics are exact.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub requests: u64,
    pub failed: u64,
    pub window: Duration,
    latency: TDigest<K1>,
}

impl Measurement {
    pub fn new(passed: u64, failed: u64, window: Duration) -> Self {
        Self {
            requests: passed + failed,
            failed,
            window,
            latency: TDigest::new(K1::new(DIGEST_COMPRESSION), DIGEST_BACKLOG),
        }
    }

    /// Feed one block of latency samples. May be called several times per window.
    pub fn insert_latencies(&mut self, samples: &[Duration]) {
        for sample in samples {
            self.latency.insert(sample.as_secs_f64());
        }
    }

    /// Requests per second over the window.
    pub fn rps(&self) -> f64 {
        if self.window.is_zero() {
            return 0.;
        }
        self.requests as f64 / self.window.as_secs_f64()
    }

    pub fn fail_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.;
        }
        self.failed as f64 / self.requests as f64
    }

    /// Estimated latency at `quantile` in `[0, 1]`, `None` without samples.
    pub fn quantile(&self, quantile: f64) -> Option<Duration> {
        if self.latency.is_empty() {
            return None;
        }
        let secs = self.latency.quantile(quantile);
        // NOTE: Sparse digests can yield NaN.
        (secs.is_finite() && secs >= 0.).then(|| Duration::from_secs_f64(secs))
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = |q| {
            self.quantile(q)
                .map(|d| format!("{:.1}ms", d.as_secs_f64() * 1e3))
                .unwrap_or_else(|| "-".to_string())
        };
        write!(
            f,
            "reqs={} ({:.1}/s) failed={:.2}% p(50)={} p(95)={} in the last {}",
            self.requests,
            self.rps(),
            self.fail_rate() * 100.,
            ms(0.5),
            ms(0.95),
            humantime::format_duration(Duration::from_secs(self.window.as_secs())),
        )
    }
}
