//! Pure response classification.
//!
//! Every outcome is held to the signup contract: a `201` whose JSON body carries a `user` with
//! an `id` and the email that was sent. The configured named checks are evaluated alongside and
//! recorded on their own, so e.g. "status is 201" and "has valid response" can be told apart in
//! the summary even when one of them alone would have accepted the response.
use crate::error::TargetError;
use crate::target::ResponseSnapshot;
use serde::Deserialize;
use stampede_core::{Check, CheckResult, ErrorTag, STATUS_CREATED};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct SignupBody {
    user: Option<UserBody>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: Option<serde_json::Value>,
    email: Option<String>,
}

/// The verdict on a single response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub passed: bool,
    pub error: Option<ErrorTag>,
    pub checks: Vec<CheckResult>,
}

/// Classify a response (or the reason there is none) for a request which sent `sent_email`.
pub fn classify(
    response: &Result<ResponseSnapshot, TargetError>,
    latency: Duration,
    sent_email: &str,
    checks: &[Check],
) -> Classification {
    let snapshot = match response {
        Ok(snapshot) => snapshot,
        Err(err) => {
            return Classification {
                passed: false,
                error: Some(err.tag()),
                checks: checks
                    .iter()
                    .map(|&check| CheckResult {
                        check,
                        passed: false,
                    })
                    .collect(),
            }
        }
    };

    let body: Option<SignupBody> = serde_json::from_slice(&snapshot.body).ok();
    let body = body.as_ref();

    let checks: Vec<_> = checks
        .iter()
        .map(|&check| CheckResult {
            check,
            passed: evaluate(&check, snapshot, body, latency, sent_email),
        })
        .collect();

    let error = if snapshot.status != STATUS_CREATED {
        Some(ErrorTag::Status)
    } else if !(user_echoes(body, sent_email) && user_has_id(body)) {
        Some(ErrorTag::MalformedBody)
    } else if checks.iter().any(|c| !c.passed) {
        Some(ErrorTag::CheckFailed)
    } else {
        None
    };

    Classification {
        passed: error.is_none(),
        error,
        checks,
    }
}

fn evaluate(
    check: &Check,
    snapshot: &ResponseSnapshot,
    body: Option<&SignupBody>,
    latency: Duration,
    sent_email: &str,
) -> bool {
    match check {
        Check::StatusCreated => snapshot.status == STATUS_CREATED,
        Check::ResponseHasUser => user_echoes(body, sent_email),
        Check::HasUserData => user_has_id(body),
        Check::HasValidResponse => {
            body.is_some_and(|b| b.user.is_some() || b.message.as_deref().is_some_and(|m| !m.is_empty()))
        }
        Check::ResponseTime { limit } => latency < *limit,
    }
}

fn user_echoes(body: Option<&SignupBody>, sent_email: &str) -> bool {
    body.and_then(|b| b.user.as_ref())
        .and_then(|u| u.email.as_deref())
        .is_some_and(|email| email == sent_email)
}

fn user_has_id(body: Option<&SignupBody>) -> bool {
    body.and_then(|b| b.user.as_ref())
        .is_some_and(|u| u.id.is_some())
}
