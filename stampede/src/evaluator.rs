use stampede_core::{AggregatedMetrics, ThresholdResult, Thresholds, Verdict};

/// Evaluate every threshold against the final metrics. The run passes only if all of them do;
/// an undefined observation (e.g. a percentile of no samples) fails its threshold.
pub fn evaluate(metrics: &AggregatedMetrics, thresholds: &Thresholds) -> Verdict {
    let results: Vec<_> = thresholds
        .iter()
        .map(|threshold| {
            let observed = metrics.value(threshold.metric, threshold.aggregation);
            let passed = observed.is_some_and(|v| threshold.comparator.holds(v, threshold.value));
            ThresholdResult {
                threshold: *threshold,
                observed,
                passed,
            }
        })
        .collect();

    Verdict {
        passed: results.iter().all(|r| r.passed),
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_core::{LatencyDistribution, Threshold};
    use std::time::Duration;

    fn thresholds(decls: &[&str]) -> Thresholds {
        decls.iter().map(|d| d.parse::<Threshold>().unwrap()).collect()
    }

    fn metrics(latencies_ms: &[u64], requests: u64, failed: u64) -> AggregatedMetrics {
        AggregatedMetrics {
            requests,
            passed: requests - failed,
            failed,
            error_rate: if requests == 0 {
                0.
            } else {
                failed as f64 / requests as f64
            },
            latency: LatencyDistribution::new(
                latencies_ms.iter().map(|&ms| Duration::from_millis(ms)).collect(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn passes_when_all_thresholds_hold() {
        let verdict = evaluate(
            &metrics(&[20, 30, 40, 90], 4, 0),
            &thresholds(&["http_req_duration:p(95)<500", "errors:rate<0.05"]),
        );
        assert!(verdict.passed);
        assert_eq!(verdict.results.len(), 2);
        assert_eq!(verdict.failures().count(), 0);
    }

    #[test]
    fn any_failure_fails_the_run() {
        let verdict = evaluate(
            &metrics(&[20, 30], 2, 2),
            &thresholds(&["http_req_duration:p(95)<500", "errors:rate<0.05"]),
        );
        assert!(!verdict.passed);
        let failures: Vec<_> = verdict.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].observed, Some(1.));
        assert_eq!(failures[0].threshold.to_string(), "errors:rate<0.05");
    }

    #[test]
    fn empty_threshold_set_passes() {
        let verdict = evaluate(&metrics(&[], 0, 0), &Thresholds::default());
        assert!(verdict.passed);
        assert!(verdict.results.is_empty());
    }

    #[test]
    fn percentile_of_nothing_fails() {
        let verdict = evaluate(
            &metrics(&[], 0, 0),
            &thresholds(&["http_req_duration:p(95)<500", "errors:rate<0.05"]),
        );
        assert!(!verdict.passed);
        assert_eq!(verdict.results[0].observed, None);
        assert!(!verdict.results[0].passed);
        assert!(verdict.results[1].passed);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let m = metrics(&[100, 200, 300, 600], 4, 1);
        let t = thresholds(&[
            "http_req_duration:p(95)<500",
            "http_req_duration:avg<=400",
            "errors:rate<0.3",
        ]);
        assert_eq!(evaluate(&m, &t), evaluate(&m, &t));
    }
}
