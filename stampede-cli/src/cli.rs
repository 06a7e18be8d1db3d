use clap::Parser;
use stampede::Profile;
use stampede_core::{RunConfig, Stage, Threshold, Thresholds, DEFAULT_BASE_URL};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Ramp virtual users against a signup endpoint and check the results against thresholds.
///
/// Settings are taken from, in order of precedence: flags, `STAMPEDE_BASE_URL` /
/// `K6_BASE_URL`, the `--config` file, and finally the `--profile` (default `load`).
#[derive(Parser, Debug)]
#[command(name = "stampede", version)]
pub struct Cli {
    /// Built-in profile: smoke, load or stress.
    #[arg(short, long)]
    pub profile: Option<Profile>,

    /// JSON run configuration.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base URL of the service under test.
    #[arg(short, long, env = "STAMPEDE_BASE_URL")]
    pub base_url: Option<Url>,

    #[arg(short, long)]
    pub name: Option<String>,

    /// Replace the stages, e.g. `--stage 30s:10 --stage 1m:10 --stage 10s:0`.
    #[arg(short, long = "stage", value_name = "DURATION:TARGET")]
    pub stages: Vec<Stage>,

    /// Replace the thresholds, e.g. `--threshold "http_req_duration:p(95)<500"`.
    #[arg(short, long = "threshold", value_name = "METRIC:EXPR")]
    pub thresholds: Vec<Threshold>,

    /// VUs the first stage ramps from.
    #[arg(long)]
    pub start_vus: Option<u32>,

    #[arg(long, value_parser = humantime::parse_duration)]
    pub think_time: Option<Duration>,

    /// Per-request timeout.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Cap on requests per second across all VUs.
    #[arg(long)]
    pub max_rps: Option<NonZeroU32>,

    /// Also write the report as JSON to this path.
    #[arg(long)]
    pub summary_export: Option<PathBuf>,

    /// Serve Prometheus metrics on this address while the run is going.
    #[arg(long)]
    pub prometheus_listen: Option<SocketAddr>,
}

impl Cli {
    /// Build the run configuration. `k6_base_url` is the compatibility fallback for
    /// `STAMPEDE_BASE_URL`.
    pub fn resolve(&self, k6_base_url: Option<String>) -> anyhow::Result<RunConfig> {
        let env_url = match k6_base_url {
            Some(raw) => Some(Url::parse(&raw)?),
            None => None,
        };
        let base_url = self.base_url.clone().or(env_url);

        let mut config = match (&self.config, self.profile) {
            (Some(path), _) => RunConfig::from_path(path)?,
            (None, profile) => {
                let default_url = Url::parse(DEFAULT_BASE_URL)?;
                profile
                    .unwrap_or(Profile::Load)
                    .config(base_url.clone().unwrap_or(default_url))
            }
        };

        if let Some(base_url) = base_url {
            config.base_url = base_url;
        }
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if !self.stages.is_empty() {
            config.stages = self.stages.clone();
        }
        if !self.thresholds.is_empty() {
            config.thresholds = self.thresholds.iter().copied().collect::<Thresholds>();
        }
        if let Some(start_vus) = self.start_vus {
            config.start_vus = start_vus;
        }
        if let Some(think_time) = self.think_time {
            config.think_time = think_time;
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout = timeout;
        }
        if let Some(max_rps) = self.max_rps {
            config.max_rps = Some(max_rps);
        }

        config.validate()?;
        Ok(config)
    }
}
