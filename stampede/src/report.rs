//! Where a finished run's report ends up.
use crate::error::ReportError;
use stampede_core::RunReport;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

pub trait ReportSink {
    fn emit(&self, report: &RunReport) -> Result<(), ReportError>;
}

/// Prints the human readable summary to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ReportSink for ConsoleSink {
    fn emit(&self, report: &RunReport) -> Result<(), ReportError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{report}")?;
        Ok(())
    }
}

/// Writes the full report as JSON, e.g. for `--summary-export`.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for JsonFileSink {
    fn emit(&self, report: &RunReport) -> Result<(), ReportError> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.flush()?;
        debug!("Wrote summary to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::Recorder;
    use stampede_core::{CheckResult, Check, RequestOutcome, Verdict};
    use std::time::{Duration, SystemTime};

    fn report() -> RunReport {
        let recorder = Recorder::new("report");
        for i in 0..4 {
            recorder.record(RequestOutcome {
                timestamp: SystemTime::now(),
                vu: 0,
                iteration: i,
                email: format!("user{i}@loadtest.com"),
                latency: Duration::from_millis(10 * (i + 1)),
                status: Some(201),
                passed: true,
                error: None,
                checks: vec![CheckResult {
                    check: Check::StatusCreated,
                    passed: true,
                }],
            });
        }

        RunReport {
            name: "report".to_string(),
            started_vus: 1,
            completed_vus: 1,
            aborted: false,
            metrics: recorder.aggregate(Duration::from_secs(4), 1),
            verdict: Verdict {
                results: vec![],
                passed: true,
            },
        }
    }

    #[test]
    fn json_summary() {
        let path = std::env::temp_dir().join(format!("stampede-summary-{}.json", std::process::id()));
        JsonFileSink::new(&path).emit(&report()).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(json["name"], "report");
        assert_eq!(json["metrics"]["requests"], 4);
        assert_eq!(json["metrics"]["latency"]["max"], 40.0);
        assert_eq!(json["metrics"]["checks"]["status is 201"]["passes"], 4);
        assert_eq!(json["verdict"]["passed"], true);
    }

    #[test]
    fn console_summary() {
        let summary = report().to_string();
        assert!(summary.contains("run: report"));
        assert!(summary.contains("✓ status is 201"));
        assert!(summary.contains("http_reqs..........: 4 (1.00/s)"));
        assert!(summary.ends_with("result: PASSED"));
        ConsoleSink.emit(&report()).unwrap();
    }
}
