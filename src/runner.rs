#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Sequential execution of a check suite against one loaded artifact.

use std::{fmt::Display, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;

use crate::{
    loader::Artifact,
    suite::{CheckDefinition, CheckSuite},
};

/// Diagnostic recorded when a check outlives its deadline.
pub const CHECK_TIMEOUT_COMMENT: &str = "Likely an infinite operation during check";

/// What a check body reported, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Every assertion held.
    Passed,
    /// An assertion failed; carries the raised diagnostic.
    Failed(String),
    /// Something other than an assertion went wrong; carries the trace.
    Errored(String),
}

/// Classified status of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Counts toward the score.
    Pass,
    /// Assertion-style failure.
    Fail,
    /// Non-assertion failure.
    Error,
}

impl Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Fail => "fail",
            CheckStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Result of running one check against one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Name of the check that produced this result.
    pub check_name: String,
    /// Classified status.
    pub status:     CheckStatus,
    /// Short message suitable for the student.
    pub diagnostic: Option<String>,
    /// Full trace for failures and errors.
    pub raw_trace:  Option<String>,
}

impl CheckResult {
    /// Classifies a raw outcome.
    pub fn from_outcome(check_name: impl Into<String>, outcome: CheckOutcome) -> Self {
        let check_name = check_name.into();
        match outcome {
            CheckOutcome::Passed => Self {
                check_name,
                status: CheckStatus::Pass,
                diagnostic: None,
                raw_trace: None,
            },
            CheckOutcome::Failed(trace) => Self {
                check_name,
                status: CheckStatus::Fail,
                diagnostic: trailing_message(&trace),
                raw_trace: Some(trace),
            },
            CheckOutcome::Errored(trace) => Self {
                check_name,
                status: CheckStatus::Error,
                diagnostic: trailing_message(&trace),
                raw_trace: Some(trace),
            },
        }
    }

    /// True when the check passed.
    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }
}

/// The part of a diagnostic after its last colon, which is where assertion
/// helpers put the human-readable message.
pub fn trailing_message(trace: &str) -> Option<String> {
    let (_, tail) = trace.rsplit_once(':')?;
    let tail = tail.strip_prefix(' ').unwrap_or(tail).trim_end();
    (!tail.is_empty()).then(|| tail.to_string())
}

/// Runs one check, optionally bounded by a deadline.
async fn run_one<A: Artifact>(
    artifact: &A,
    check: &CheckDefinition,
    deadline: Option<Duration>,
) -> CheckResult {
    let outcome = match deadline {
        Some(limit) => match timeout(limit, artifact.run_check(check)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return CheckResult {
                    check_name: check.name().to_string(),
                    status:     CheckStatus::Error,
                    diagnostic: Some(CHECK_TIMEOUT_COMMENT.to_string()),
                    raw_trace:  Some(format!(
                        "check `{}` did not finish within {:.1}s",
                        check.name(),
                        limit.as_secs_f64()
                    )),
                };
            }
        },
        None => artifact.run_check(check).await,
    };

    CheckResult::from_outcome(check.name(), outcome)
}

/// Runs every check in suite order. Checks are never run concurrently
/// against the same artifact.
///
/// With `deadline` unset a check that never returns stalls the caller; that
/// is the historical behavior and remains the default.
pub async fn run_checks<A: Artifact>(
    artifact: &A,
    suite: &CheckSuite,
    deadline: Option<Duration>,
) -> Vec<CheckResult> {
    let mut results = Vec::with_capacity(suite.len());
    for check in suite {
        let result = run_one(artifact, check, deadline).await;
        debug!("{}: {}", check.name(), result.status);
        results.push(result);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_message_takes_text_after_last_colon() {
        let trace = "Traceback (most recent call last):\n  File \"t.py\", line 3\nAssertionError: 3 \
                     != 0 : 3 does not equal 0\n";
        assert_eq!(trailing_message(trace).as_deref(), Some("3 does not equal 0"));
    }

    #[test]
    fn trailing_message_is_none_without_colon_or_text() {
        assert_eq!(trailing_message("no colon here"), None);
        assert_eq!(trailing_message("ends with colon:"), None);
    }

    #[test]
    fn failure_keeps_trace_and_extracts_diagnostic() {
        let result =
            CheckResult::from_outcome("test_b", CheckOutcome::Failed("AssertionError: boom".into()));
        assert_eq!(result.status, CheckStatus::Fail);
        assert_eq!(result.diagnostic.as_deref(), Some("boom"));
        assert_eq!(result.raw_trace.as_deref(), Some("AssertionError: boom"));
    }
}
