use crate::config::Check;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

/// Why a request outcome did not pass. Ordered roughly from "never reached the service" to
/// "reached it and answered, but not the way we wanted".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorTag {
    /// The run was aborted while the request was in flight.
    Cancelled,
    /// No response within the configured request timeout.
    Timeout,
    /// Connection refused/reset, DNS failure, TLS failure and friends.
    Connection,
    /// A response arrived with a status other than `201`.
    Status,
    /// A `201` whose body was not JSON, lacked `user.id`, or echoed a different email.
    MalformedBody,
    /// The signup contract held but one of the configured named checks did not.
    CheckFailed,
}

impl ErrorTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorTag::Cancelled => "cancelled",
            ErrorTag::Timeout => "timeout",
            ErrorTag::Connection => "connection",
            ErrorTag::Status => "status",
            ErrorTag::MalformedBody => "malformed_body",
            ErrorTag::CheckFailed => "check_failed",
        }
    }
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckResult {
    pub check: Check,
    pub passed: bool,
}

/// The result of one iteration of one virtual user. Never mutated once recorded.
#[derive(Clone, Debug)]
pub struct RequestOutcome {
    pub timestamp: SystemTime,
    pub vu: u32,
    pub iteration: u64,
    pub email: String,
    pub latency: Duration,
    /// `None` when no response was received.
    pub status: Option<u16>,
    pub passed: bool,
    pub error: Option<ErrorTag>,
    pub checks: Vec<CheckResult>,
}

impl RequestOutcome {
    /// Whether this counts towards `http_req_failed`: transport error or status outside 200-399.
    pub fn http_failed(&self) -> bool {
        !matches!(self.status, Some(200..=399))
    }
}
