use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Metrics a threshold can be declared against. Names follow k6 so existing threshold
/// declarations carry over unchanged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    /// Request latency, in milliseconds.
    HttpReqDuration,
    /// Fraction of requests which errored at the transport level or returned a status outside 200-399.
    HttpReqFailed,
    /// Fraction of iterations whose outcome did not pass.
    Errors,
    /// Fraction of individual named checks which passed.
    Checks,
    /// Number of requests issued.
    HttpReqs,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::HttpReqDuration => "http_req_duration",
            Metric::HttpReqFailed => "http_req_failed",
            Metric::Errors => "errors",
            Metric::Checks => "checks",
            Metric::HttpReqs => "http_reqs",
        }
    }

    fn supports(&self, aggregation: Aggregation) -> bool {
        use Aggregation::*;
        match self {
            Metric::HttpReqDuration => matches!(aggregation, Avg | Min | Med | Max | Percentile(_)),
            Metric::HttpReqFailed | Metric::Errors | Metric::Checks => aggregation == Rate,
            Metric::HttpReqs => matches!(aggregation, Count | Rate),
        }
    }
}

impl FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "http_req_duration" => Ok(Metric::HttpReqDuration),
            "http_req_failed" => Ok(Metric::HttpReqFailed),
            "errors" => Ok(Metric::Errors),
            "checks" => Ok(Metric::Checks),
            "http_reqs" => Ok(Metric::HttpReqs),
            other => Err(ConfigError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Med,
    Max,
    /// Percentile in the range `(0, 100]`, e.g. `p(95)`.
    Percentile(f64),
    Rate,
    Count,
}

impl FromStr for Aggregation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidThreshold(s.to_string());
        match s.trim() {
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "med" => Ok(Aggregation::Med),
            "max" => Ok(Aggregation::Max),
            "rate" => Ok(Aggregation::Rate),
            "count" => Ok(Aggregation::Count),
            p => {
                let inner = p
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(invalid)?;
                let pct: f64 = inner.trim().parse().map_err(|_| invalid())?;
                if pct > 0. && pct <= 100. {
                    Ok(Aggregation::Percentile(pct))
                } else {
                    Err(invalid())
                }
            }
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Avg => f.write_str("avg"),
            Aggregation::Min => f.write_str("min"),
            Aggregation::Med => f.write_str("med"),
            Aggregation::Max => f.write_str("max"),
            Aggregation::Percentile(p) => write!(f, "p({p})"),
            Aggregation::Rate => f.write_str("rate"),
            Aggregation::Count => f.write_str("count"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparator {
    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparator::Lt => observed < bound,
            Comparator::Le => observed <= bound,
            Comparator::Gt => observed > bound,
            Comparator::Ge => observed >= bound,
            Comparator::Eq => observed == bound,
            Comparator::Ne => observed != bound,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }
}

/// A pass/fail predicate over one aggregated metric, e.g. `http_req_duration: p(95)<500`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Threshold {
    pub metric: Metric,
    pub aggregation: Aggregation,
    pub comparator: Comparator,
    pub value: f64,
}

impl Threshold {
    /// Parse a k6 style expression (`p(95)<500`, `rate<0.05`) declared against `metric`.
    pub fn parse(metric: &str, expr: &str) -> Result<Self, ConfigError> {
        let metric: Metric = metric.parse()?;
        let invalid = || ConfigError::InvalidThreshold(expr.to_string());

        let op_start = expr.find(&['<', '>', '=', '!'][..]).ok_or_else(invalid)?;
        let (lhs, rest) = expr.split_at(op_start);
        let (comparator, rhs) = if let Some(rhs) = rest.strip_prefix("<=") {
            (Comparator::Le, rhs)
        } else if let Some(rhs) = rest.strip_prefix(">=") {
            (Comparator::Ge, rhs)
        } else if let Some(rhs) = rest.strip_prefix("==") {
            (Comparator::Eq, rhs)
        } else if let Some(rhs) = rest.strip_prefix("!=") {
            (Comparator::Ne, rhs)
        } else if let Some(rhs) = rest.strip_prefix('<') {
            (Comparator::Lt, rhs)
        } else if let Some(rhs) = rest.strip_prefix('>') {
            (Comparator::Gt, rhs)
        } else {
            return Err(invalid());
        };

        let aggregation: Aggregation = lhs.parse().map_err(|_| invalid())?;
        let value: f64 = rhs.trim().parse().map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(invalid());
        }

        if !metric.supports(aggregation) {
            return Err(ConfigError::UnsupportedAggregation {
                metric: metric.to_string(),
                aggregation: aggregation.to_string(),
            });
        }

        Ok(Self {
            metric,
            aggregation,
            comparator,
            value,
        })
    }

    pub fn expression(&self) -> String {
        format!(
            "{}{}{}",
            self.aggregation,
            self.comparator.as_str(),
            self.value
        )
    }
}

/// Accepts the `metric:expression` form used on the command line.
impl FromStr for Threshold {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (metric, expr) = s
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidThreshold(s.to_string()))?;
        Threshold::parse(metric, expr)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.metric, self.expression())
    }
}

impl Serialize for Threshold {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The threshold set of a run. Written in config files the way k6 declares them:
///
/// ```json
/// { "http_req_duration": ["p(95)<500"], "errors": ["rate<0.05"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct Thresholds(Vec<Threshold>);

impl Thresholds {
    pub fn new(thresholds: Vec<Threshold>) -> Self {
        Self(thresholds)
    }

    pub fn push(&mut self, threshold: Threshold) {
        self.0.push(threshold);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Threshold> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for Thresholds {
    type Error = ConfigError;

    fn try_from(map: BTreeMap<String, Vec<String>>) -> Result<Self, Self::Error> {
        let mut thresholds = vec![];
        for (metric, exprs) in &map {
            for expr in exprs {
                thresholds.push(Threshold::parse(metric, expr)?);
            }
        }
        Ok(Self(thresholds))
    }
}

impl From<Thresholds> for BTreeMap<String, Vec<String>> {
    fn from(thresholds: Thresholds) -> Self {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for threshold in thresholds.0 {
            map.entry(threshold.metric.to_string())
                .or_default()
                .push(threshold.expression());
        }
        map
    }
}

impl FromIterator<Threshold> for Thresholds {
    fn from_iter<I: IntoIterator<Item = Threshold>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
