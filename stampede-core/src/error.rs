use thiserror::Error;

/// Reasons a [`RunConfig`](crate::RunConfig) is rejected before a run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("At least one stage is required")]
    NoStages,

    #[error("Invalid stage `{0}`; expected `<duration>:<target>` (e.g. `30s:10`)")]
    InvalidStage(String),

    #[error("Unknown metric `{0}`")]
    UnknownMetric(String),

    #[error("Invalid threshold expression `{0}`")]
    InvalidThreshold(String),

    #[error("Aggregation `{aggregation}` is not supported for metric `{metric}`")]
    UnsupportedAggregation { metric: String, aggregation: String },

    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Base URL `{0}` must be an absolute http(s) URL")]
    InvalidBaseUrl(String),

    #[error("Unknown profile `{0}`; expected one of smoke, load, stress")]
    UnknownProfile(String),

    #[error("First and last name pools must not be empty")]
    EmptyNamePool,

    #[error("Unable to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unable to read config: {0}")]
    Io(#[from] std::io::Error),
}
