use crate::data::ErrorTag;
use crate::threshold::{Aggregation, Metric, Threshold};
use serde::{Serialize, Serializer};
use serde_with::{serde_as, DurationMilliSecondsWithFrac};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Every latency observed during a run, kept sorted so that any percentile is exact.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LatencyDistribution {
    sorted: Vec<Duration>,
}

impl LatencyDistribution {
    pub fn new(mut samples: Vec<Duration>) -> Self {
        samples.sort_unstable();
        Self { sorted: samples }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn min(&self) -> Option<Duration> {
        self.sorted.first().copied()
    }

    pub fn max(&self) -> Option<Duration> {
        self.sorted.last().copied()
    }

    pub fn avg(&self) -> Option<Duration> {
        if self.sorted.is_empty() {
            return None;
        }
        let total: Duration = self.sorted.iter().sum();
        Some(total / self.sorted.len() as u32)
    }

    pub fn med(&self) -> Option<Duration> {
        self.percentile(50.)
    }

    /// Percentile `pct` in `(0, 100]`, linearly interpolated between the two closest ranks.
    pub fn percentile(&self, pct: f64) -> Option<Duration> {
        let n = self.sorted.len();
        if n == 0 {
            return None;
        }

        let rank = (pct.clamp(0., 100.) / 100.) * (n - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let lo_v = self.sorted[lo].as_secs_f64();
        let hi_v = self.sorted[hi].as_secs_f64();
        let secs = lo_v + (hi_v - lo_v) * (rank - lo as f64);
        Some(Duration::from_secs_f64(secs))
    }

    pub fn summary(&self) -> Option<LatencySummary> {
        Some(LatencySummary {
            min: self.min()?,
            avg: self.avg()?,
            med: self.med()?,
            max: self.max()?,
            p90: self.percentile(90.)?,
            p95: self.percentile(95.)?,
            p99: self.percentile(99.)?,
        })
    }
}

impl Serialize for LatencyDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.summary().serialize(serializer)
    }
}

#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LatencySummary {
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub min: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub avg: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub med: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub max: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub p90: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub p95: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub p99: Duration,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CheckCounts {
    pub passes: u64,
    pub fails: u64,
}

/// Statistics derived from the full outcome set of a run.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AggregatedMetrics {
    pub requests: u64,
    pub passed: u64,
    pub failed: u64,
    /// `failed / requests`, the `errors` metric.
    pub error_rate: f64,
    /// The `http_req_failed` metric.
    pub http_req_failed: f64,
    /// Requests per second over the whole run.
    pub throughput: f64,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub elapsed: Duration,
    pub max_vus: u32,
    pub latency: LatencyDistribution,
    pub checks: BTreeMap<String, CheckCounts>,
    pub status_codes: BTreeMap<u16, u64>,
    pub error_tags: BTreeMap<ErrorTag, u64>,
}

impl AggregatedMetrics {
    /// Fraction of all named check evaluations which passed.
    pub fn checks_rate(&self) -> f64 {
        let (passes, total) = self
            .checks
            .values()
            .fold((0, 0), |(p, t), c| (p + c.passes, t + c.passes + c.fails));
        if total == 0 {
            0.
        } else {
            passes as f64 / total as f64
        }
    }

    /// The value a threshold on `metric`/`aggregation` is compared against. Latencies are in
    /// milliseconds. `None` when the value is undefined, e.g. a percentile of zero samples.
    pub fn value(&self, metric: Metric, aggregation: Aggregation) -> Option<f64> {
        let ms = |d: Option<Duration>| d.map(|d| d.as_secs_f64() * 1e3);
        match (metric, aggregation) {
            (Metric::HttpReqDuration, Aggregation::Avg) => ms(self.latency.avg()),
            (Metric::HttpReqDuration, Aggregation::Min) => ms(self.latency.min()),
            (Metric::HttpReqDuration, Aggregation::Med) => ms(self.latency.med()),
            (Metric::HttpReqDuration, Aggregation::Max) => ms(self.latency.max()),
            (Metric::HttpReqDuration, Aggregation::Percentile(p)) => ms(self.latency.percentile(p)),
            (Metric::HttpReqFailed, Aggregation::Rate) => Some(self.http_req_failed),
            (Metric::Errors, Aggregation::Rate) => Some(self.error_rate),
            (Metric::Checks, Aggregation::Rate) => Some(self.checks_rate()),
            (Metric::HttpReqs, Aggregation::Count) => Some(self.requests as f64),
            (Metric::HttpReqs, Aggregation::Rate) => Some(self.throughput),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThresholdResult {
    pub threshold: Threshold,
    pub observed: Option<f64>,
    pub passed: bool,
}

/// Final classification of a completed run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Verdict {
    pub results: Vec<ThresholdResult>,
    pub passed: bool,
}

impl Verdict {
    pub fn failures(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

/// What a completed run hands to a report sink.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunReport {
    pub name: String,
    pub started_vus: u64,
    pub completed_vus: u64,
    pub aborted: bool,
    pub metrics: AggregatedMetrics,
    pub verdict: Verdict,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metrics;
        writeln!(f)?;
        writeln!(f, "  run: {}", self.name)?;
        writeln!(
            f,
            "  elapsed: {}, vus_max: {}{}",
            humantime::format_duration(round_ms(m.elapsed)),
            m.max_vus,
            if self.aborted { " (aborted)" } else { "" }
        )?;
        writeln!(f)?;

        if !self.verdict.results.is_empty() {
            writeln!(f, "  thresholds:")?;
            for r in &self.verdict.results {
                let observed = r
                    .observed
                    .map(|v| format!("{v:.4}"))
                    .unwrap_or_else(|| "n/a".to_string());
                writeln!(
                    f,
                    "    {} {} (observed {})",
                    mark(r.passed),
                    r.threshold,
                    observed
                )?;
            }
            writeln!(f)?;
        }

        writeln!(f, "  checks.............: {:.2}%", m.checks_rate() * 100.)?;
        for (name, counts) in &m.checks {
            writeln!(
                f,
                "    {} {} ({} passed, {} failed)",
                mark(counts.fails == 0),
                name,
                counts.passes,
                counts.fails
            )?;
        }

        match m.latency.summary() {
            Some(l) => writeln!(
                f,
                "  http_req_duration..: avg={:?} min={:?} med={:?} max={:?} p(90)={:?} p(95)={:?} p(99)={:?}",
                round_us(l.avg),
                round_us(l.min),
                round_us(l.med),
                round_us(l.max),
                round_us(l.p90),
                round_us(l.p95),
                round_us(l.p99),
            )?,
            None => writeln!(f, "  http_req_duration..: n/a")?,
        }
        writeln!(f, "  http_req_failed....: {:.2}%", m.http_req_failed * 100.)?;
        writeln!(
            f,
            "  errors.............: {:.2}% ({} of {})",
            m.error_rate * 100.,
            m.failed,
            m.requests
        )?;
        writeln!(
            f,
            "  http_reqs..........: {} ({:.2}/s)",
            m.requests, m.throughput
        )?;

        if !m.status_codes.is_empty() {
            let codes: Vec<_> = m
                .status_codes
                .iter()
                .map(|(code, n)| format!("{code}={n}"))
                .collect();
            writeln!(f, "  status_codes.......: {}", codes.join(", "))?;
        }
        if !m.error_tags.is_empty() {
            let tags: Vec<_> = m
                .error_tags
                .iter()
                .map(|(tag, n)| format!("{tag}={n}"))
                .collect();
            writeln!(f, "  error_tags.........: {}", tags.join(", "))?;
        }

        writeln!(f)?;
        write!(
            f,
            "  result: {}",
            if self.verdict.passed { "PASSED" } else { "FAILED" }
        )
    }
}

fn mark(passed: bool) -> &'static str {
    if passed {
        "✓"
    } else {
        "✗"
    }
}

fn round_ms(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}

fn round_us(d: Duration) -> Duration {
    Duration::from_micros(d.as_micros() as u64)
}
