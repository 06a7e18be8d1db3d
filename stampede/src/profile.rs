//! Built-in run profiles for the signup endpoint.
use stampede_core::{
    Aggregation, Check, Comparator, ConfigError, Metric, PayloadConfig, RampPolicy, RunConfig,
    Stage, Threshold, Thresholds,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// 5 VUs for 30s. Verifies the endpoint works at all.
    Smoke,
    /// Ramp to 100 VUs and hold. Expected production traffic.
    Load,
    /// Ramp to 3000 VUs. Finds the breaking point.
    Stress,
}

impl Profile {
    pub fn config(&self, base_url: Url) -> RunConfig {
        let mut config = RunConfig::new(&self.to_string(), base_url);

        match self {
            Profile::Smoke => {
                config.start_vus = 5;
                config.stages = vec![stage(30, 5)];
                config.ramp = RampPolicy::Step;
                config.thresholds = Thresholds::new(vec![
                    threshold(Metric::HttpReqDuration, Aggregation::Percentile(95.), 1000.),
                    threshold(Metric::HttpReqFailed, Aggregation::Rate, 0.1),
                ]);
                config.payload = PayloadConfig::from_pools("smoke", "test.com", &["Smoke"], &["Test"]);
                config.checks = vec![Check::StatusCreated, Check::HasUserData];
            }
            Profile::Load => {
                config.stages = vec![
                    stage(30, 10),
                    stage(60, 50),
                    stage(120, 100),
                    stage(60, 100),
                    stage(30, 0),
                ];
                config.thresholds = Thresholds::new(vec![
                    threshold(Metric::HttpReqDuration, Aggregation::Percentile(95.), 500.),
                    threshold(Metric::HttpReqFailed, Aggregation::Rate, 0.05),
                    threshold(Metric::Errors, Aggregation::Rate, 0.05),
                ]);
                config.payload = PayloadConfig::default();
                config.checks = vec![
                    Check::StatusCreated,
                    Check::ResponseHasUser,
                    Check::ResponseTime {
                        limit: Duration::from_millis(500),
                    },
                ];
            }
            Profile::Stress => {
                config.stages = vec![
                    stage(60, 300),
                    stage(120, 500),
                    stage(180, 1500),
                    stage(120, 3000),
                    stage(120, 0),
                ];
                config.thresholds = Thresholds::new(vec![
                    threshold(Metric::HttpReqDuration, Aggregation::Percentile(95.), 2000.),
                    threshold(Metric::HttpReqFailed, Aggregation::Rate, 0.3),
                    threshold(Metric::Errors, Aggregation::Rate, 0.3),
                ]);
                config.think_time = Duration::from_millis(500);
                config.request_timeout = Duration::from_secs(10);
                config.payload = PayloadConfig::from_pools(
                    "stress",
                    "test.com",
                    &[
                        "Alice", "Bob", "Carol", "Dave", "Eve", "Frank", "Grace", "Henry", "Iris",
                        "Jack",
                    ],
                    &[
                        "Anderson", "Baker", "Clark", "Davis", "Evans", "Ford", "Gray", "Hall",
                        "Irwin", "James",
                    ],
                );
                config.checks = vec![Check::StatusCreated, Check::HasValidResponse];
            }
        }

        config
    }
}

fn stage(secs: u64, target: u32) -> Stage {
    Stage::new(Duration::from_secs(secs), target)
}

fn threshold(metric: Metric, aggregation: Aggregation, value: f64) -> Threshold {
    Threshold {
        metric,
        aggregation,
        comparator: Comparator::Lt,
        value,
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "smoke" => Ok(Profile::Smoke),
            "load" => Ok(Profile::Load),
            "stress" => Ok(Profile::Stress),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Smoke => f.write_str("smoke"),
            Profile::Load => f.write_str("load"),
            Profile::Stress => f.write_str("stress"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:3000").unwrap()
    }

    #[test]
    fn profiles_are_valid() {
        for profile in [Profile::Smoke, Profile::Load, Profile::Stress] {
            let config = profile.config(base());
            config.validate().unwrap();
            assert_eq!(config.name, profile.to_string());
            assert_eq!(profile.to_string().parse::<Profile>().unwrap(), profile);
        }
    }

    #[test]
    fn load_profile_shape() {
        let config = Profile::Load.config(base());
        assert_eq!(config.total_duration(), Duration::from_secs(300));
        assert_eq!(config.max_vus(), 100);
        assert_eq!(config.think_time, Duration::from_secs(1));
        let thresholds: Vec<_> = config.thresholds.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            thresholds,
            vec![
                "http_req_duration:p(95)<500",
                "http_req_failed:rate<0.05",
                "errors:rate<0.05"
            ]
        );
    }

    #[test]
    fn stress_profile_shape() {
        let config = Profile::Stress.config(base());
        assert_eq!(config.total_duration(), Duration::from_secs(600));
        assert_eq!(config.max_vus(), 3000);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.payload.email_prefix, "stress");
    }

    #[test]
    fn smoke_profile_holds_five_vus() {
        let config = Profile::Smoke.config(base());
        assert_eq!(config.start_vus, 5);
        assert_eq!(config.max_vus(), 5);
        assert_eq!(config.total_duration(), Duration::from_secs(30));
    }

    #[test]
    fn unknown_profile() {
        assert!(matches!(
            "soak".parse::<Profile>(),
            Err(ConfigError::UnknownProfile(_))
        ));
    }
}
