use stampede_core::{ConfigError, ErrorTag};
use thiserror::Error;

/// Reasons a run never starts. No metrics are produced for these.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Invalid run configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Unable to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Health check against {url} returned {status}, expected 200")]
    Unhealthy { url: String, status: u16 },

    #[error("Target at {url} is not reachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: TargetError,
    },

    #[error("Run was aborted before it started")]
    Aborted,
}

/// Per-request failures. These are recorded as failed outcomes and never end a run.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Request failed: {0}")]
    Other(String),
}

impl TargetError {
    pub fn tag(&self) -> ErrorTag {
        match self {
            TargetError::Timeout => ErrorTag::Timeout,
            TargetError::Cancelled => ErrorTag::Cancelled,
            TargetError::Connection(_) | TargetError::Other(_) => ErrorTag::Connection,
        }
    }
}

impl From<reqwest::Error> for TargetError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TargetError::Timeout
        } else if err.is_connect() {
            TargetError::Connection(err.to_string())
        } else {
            TargetError::Other(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Unable to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}
