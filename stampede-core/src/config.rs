use crate::duration::HumanDuration;
use crate::error::ConfigError;
use crate::threshold::Thresholds;
use crate::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_THINK_TIME, SIGNUP_PATH};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::fmt;
use std::num::NonZeroU32;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// One segment of a ramp profile: move to `target` virtual users over `duration`.
#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde_as(as = "HumanDuration")]
    pub duration: Duration,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

/// Parses the `<duration>:<target>` form, e.g. `30s:10`.
impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidStage(s.to_string());
        let (duration, target) = s.split_once(':').ok_or_else(invalid)?;
        let duration = humantime::parse_duration(duration.trim()).map_err(|_| invalid())?;
        let target = target.trim().parse().map_err(|_| invalid())?;
        Ok(Self { duration, target })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            humantime::format_duration(self.duration),
            self.target
        )
    }
}

/// How the target concurrency moves from one stage level to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RampPolicy {
    /// Interpolate linearly over the stage duration.
    #[default]
    Linear,
    /// Jump to the stage target as soon as the stage starts.
    Step,
}

/// A named check applied to every signup response. Checks are recorded independently, so a
/// run can report e.g. "status is 201" and "has valid response" separately.
#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "check")]
pub enum Check {
    /// Status code is `201`.
    StatusCreated,
    /// Body carries a `user` whose `email` is the one that was sent.
    ResponseHasUser,
    /// Body carries a `user` with an `id`.
    HasUserData,
    /// Body carries either a `user` object or a `message`.
    HasValidResponse,
    /// Response arrived within `limit`.
    ResponseTime {
        #[serde_as(as = "HumanDuration")]
        limit: Duration,
    },
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::StatusCreated => f.write_str("status is 201"),
            Check::ResponseHasUser => f.write_str("response has user"),
            Check::HasUserData => f.write_str("has user data"),
            Check::HasValidResponse => f.write_str("has valid response"),
            Check::ResponseTime { limit } => {
                write!(f, "response time < {}", humantime::format_duration(*limit))
            }
        }
    }
}

/// Knobs for synthetic signup payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadConfig {
    pub email_prefix: String,
    pub email_domain: String,
    pub first_names: Vec<String>,
    pub last_names: Vec<String>,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self::from_pools(
            "user",
            "loadtest.com",
            &[
                "John", "Jane", "Mike", "Sarah", "David", "Emily", "Chris", "Lisa", "Tom", "Anna",
            ],
            &[
                "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis",
                "Wilson", "Moore",
            ],
        )
    }
}

impl PayloadConfig {
    pub fn from_pools(prefix: &str, domain: &str, first: &[&str], last: &[&str]) -> Self {
        Self {
            email_prefix: prefix.to_string(),
            email_domain: domain.to_string(),
            first_names: first.iter().map(|s| s.to_string()).collect(),
            last_names: last.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Everything a run needs, fixed before it starts.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub name: String,
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Concurrency the first stage ramps from.
    #[serde(default)]
    pub start_vus: u32,
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub ramp: RampPolicy,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde_as(as = "HumanDuration")]
    #[serde(default = "default_think_time")]
    pub think_time: Duration,
    #[serde_as(as = "HumanDuration")]
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
    /// Global cap on requests per second across all virtual users.
    #[serde(default)]
    pub max_rps: Option<NonZeroU32>,
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default = "default_checks")]
    pub checks: Vec<Check>,
}

impl RunConfig {
    pub fn new(name: &str, base_url: Url) -> Self {
        Self {
            name: name.to_string(),
            base_url,
            start_vus: 0,
            stages: vec![],
            ramp: RampPolicy::default(),
            thresholds: Thresholds::default(),
            think_time: DEFAULT_THINK_TIME,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_rps: None,
            payload: PayloadConfig::default(),
            checks: default_checks(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Reject configurations which can not be run. Called once before a run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::NoStages);
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        if self.base_url.cannot_be_a_base() || !matches!(self.base_url.scheme(), "http" | "https")
        {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.to_string()));
        }

        if self.payload.first_names.is_empty() || self.payload.last_names.is_empty() {
            return Err(ConfigError::EmptyNamePool);
        }

        Ok(())
    }

    /// The sum of all stage durations.
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub fn max_vus(&self) -> u32 {
        self.stages
            .iter()
            .map(|s| s.target)
            .chain(std::iter::once(self.start_vus))
            .max()
            .unwrap_or(0)
    }

    /// `GET {base}/`.
    pub fn health_url(&self) -> Url {
        self.base_dir()
    }

    /// `POST {base}/signup`.
    pub fn signup_url(&self) -> Result<Url, ConfigError> {
        self.base_dir()
            .join(SIGNUP_PATH)
            .map_err(|_| ConfigError::InvalidBaseUrl(self.base_url.to_string()))
    }

    fn base_dir(&self) -> Url {
        let mut base = self.base_url.clone();
        // NOTE: `Url::join` drops the last path segment unless it ends with a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base
    }
}

fn default_base_url() -> Url {
    // NOTE: DEFAULT_BASE_URL is a constant and known to parse.
    Url::parse(DEFAULT_BASE_URL).expect("DEFAULT_BASE_URL is a valid URL")
}

fn default_think_time() -> Duration {
    DEFAULT_THINK_TIME
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_checks() -> Vec<Check> {
    vec![Check::StatusCreated, Check::ResponseHasUser]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://127.0.0.1:3000").unwrap()
    }

    #[test]
    fn parses_stage_shorthand() {
        let stage: Stage = "1m 30s:100".parse().unwrap();
        assert_eq!(stage, Stage::new(Duration::from_secs(90), 100));
        assert_eq!(stage.to_string(), "1m 30s:100");

        assert!("30s".parse::<Stage>().is_err());
        assert!("30s:-5".parse::<Stage>().is_err());
        assert!("soon:5".parse::<Stage>().is_err());
    }

    #[test]
    fn loads_k6_like_json() {
        let config = RunConfig::from_json(
            r#"{
                "name": "signup-load",
                "base_url": "http://localhost:3000",
                "stages": [
                    {"duration": "30s", "target": 10},
                    {"duration": "1m", "target": 50},
                    {"duration": "0s", "target": 5}
                ],
                "thresholds": {
                    "http_req_duration": ["p(95)<500"],
                    "errors": ["rate<0.05"]
                },
                "think_time": "500ms",
                "checks": [
                    {"check": "status_created"},
                    {"check": "response_time", "limit": "500ms"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.stages.len(), 3);
        assert_eq!(config.total_duration(), Duration::from_secs(90));
        assert_eq!(config.think_time, Duration::from_millis(500));
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.thresholds.len(), 2);
        assert_eq!(config.max_vus(), 50);
        assert_eq!(
            config.checks[1],
            Check::ResponseTime {
                limit: Duration::from_millis(500)
            }
        );
    }

    #[test]
    fn rejects_negative_stage_values() {
        let negative_target = r#"{"name": "x", "stages": [{"duration": "5s", "target": -1}]}"#;
        assert!(matches!(
            RunConfig::from_json(negative_target),
            Err(ConfigError::Parse(_))
        ));

        let negative_duration = r#"{"name": "x", "stages": [{"duration": "-5s", "target": 1}]}"#;
        assert!(matches!(
            RunConfig::from_json(negative_duration),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_unrunnable_configs() {
        let config = RunConfig::new("empty", base());
        assert!(matches!(config.validate(), Err(ConfigError::NoStages)));

        let mut config = RunConfig::new("timeout", base());
        config.stages.push(Stage::new(Duration::from_secs(1), 1));
        config.request_timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));

        let mut config = RunConfig::new("scheme", Url::parse("ftp://example.com").unwrap());
        config.stages.push(Stage::new(Duration::from_secs(1), 1));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBaseUrl(_))
        ));

        let mut config = RunConfig::new("pools", base());
        config.stages.push(Stage::new(Duration::from_secs(1), 1));
        config.payload.last_names.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyNamePool)));
    }

    #[test]
    fn joins_endpoint_paths() {
        let config = RunConfig::new("url", base());
        assert_eq!(config.health_url().as_str(), "http://127.0.0.1:3000/");
        assert_eq!(
            config.signup_url().unwrap().as_str(),
            "http://127.0.0.1:3000/signup"
        );

        for raw in ["http://example.com/api", "http://example.com/api/"] {
            let config = RunConfig::new("url", Url::parse(raw).unwrap());
            assert_eq!(config.health_url().as_str(), "http://example.com/api/");
            assert_eq!(
                config.signup_url().unwrap().as_str(),
                "http://example.com/api/signup"
            );
        }
    }

    #[test]
    fn check_names_match_report_labels() {
        assert_eq!(Check::StatusCreated.to_string(), "status is 201");
        assert_eq!(
            Check::ResponseTime {
                limit: Duration::from_millis(500)
            }
            .to_string(),
            "response time < 500ms"
        );
    }
}
