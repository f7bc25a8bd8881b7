#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Turning check results into points and percentages.

use serde::{Deserialize, Serialize};

use crate::{
    loader::LoadFailure,
    runner::CheckResult,
    suite::CheckSuite,
};

/// Percentage points taken off a naughty submission.
pub const NAUGHTY_PENALTY: f64 = 20.0;

/// Everything graded about one submission.
///
/// When `load_failure` is set, `checks` is empty and every score field is
/// zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    /// Module identifier of the submission.
    pub submission_name: String,
    /// Per-check results in suite order.
    pub checks:          Vec<CheckResult>,
    /// Sum of every check's weight.
    pub total_points:    u32,
    /// Sum of the weights of passing checks.
    pub earned_points:   u32,
    /// `100 * earned / total`, zero when nothing is at stake.
    pub percent:         f64,
    /// Set when the artifact never reached check execution.
    pub load_failure:    Option<LoadFailure>,
}

impl SubmissionResult {
    /// Result for a submission whose artifact could not be loaded.
    pub fn from_load_failure(submission_name: impl Into<String>, failure: LoadFailure) -> Self {
        Self {
            submission_name: submission_name.into(),
            checks:          Vec::new(),
            total_points:    0,
            earned_points:   0,
            percent:         0.0,
            load_failure:    Some(failure),
        }
    }

    /// Looks up one check's result.
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.check_name == name)
    }

    /// True when the artifact loaded and at least one check ran.
    pub fn reached_checks(&self) -> bool {
        self.load_failure.is_none() && !self.checks.is_empty()
    }

    /// Percent after the flat naughty penalty, floored at zero.
    pub fn adjusted_percent(&self) -> f64 {
        penalize(self.percent)
    }
}

/// Applies the naughty penalty to a percentage.
pub fn penalize(percent: f64) -> f64 {
    (percent - NAUGHTY_PENALTY).max(0.0)
}

/// Folds per-check results into a weighted score.
///
/// Weights come from the suite, so results naming checks outside it earn
/// nothing and `earned_points` can never exceed `total_points`.
pub fn score(
    submission_name: impl Into<String>,
    checks: Vec<CheckResult>,
    suite: &CheckSuite,
) -> SubmissionResult {
    let total_points = suite.total_points();
    let earned_points = suite
        .iter()
        .filter(|def| {
            checks
                .iter()
                .any(|r| r.check_name == def.name() && r.passed())
        })
        .map(|def| def.point_weight())
        .sum::<u32>();

    let percent = if total_points > 0 {
        100.0 * f64::from(earned_points) / f64::from(total_points)
    } else {
        0.0
    };

    SubmissionResult {
        submission_name: submission_name.into(),
        checks,
        total_points,
        earned_points,
        percent,
        load_failure: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn penalty_is_floored_at_zero() {
        assert_eq!(penalize(85.0), 65.0);
        assert_eq!(penalize(12.5), 0.0);
        assert_eq!(penalize(0.0), 0.0);
    }

    #[test]
    fn empty_suite_scores_zero_percent() {
        let result = score("doe_john_hw1", Vec::new(), &CheckSuite::default());
        assert_eq!(result.total_points, 0);
        assert_eq!(result.percent, 0.0);
    }
}
