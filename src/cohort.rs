#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Per-check statistics across a whole batch.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, object::Rows},
};
use tracing::error;

use crate::{runner::CheckStatus, score::SubmissionResult};

/// Pass/fail/error counts for one check across the cohort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckTally {
    /// Name of the check.
    pub check_name:    String,
    /// Submissions that passed.
    pub pass_count:    u32,
    /// Submissions that failed an assertion.
    pub fail_count:    u32,
    /// Submissions that raised something else.
    pub error_count:   u32,
    /// Submissions that ran the check at all.
    pub attempt_count: u32,
}

impl CheckTally {
    /// A zeroed tally for `check_name`.
    fn new(check_name: &str) -> Self {
        Self {
            check_name: check_name.to_string(),
            ..Self::default()
        }
    }

    /// Counts one attempt with the given status.
    fn record(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::Pass => self.pass_count += 1,
            CheckStatus::Fail => self.fail_count += 1,
            CheckStatus::Error => self.error_count += 1,
        }
        self.attempt_count += 1;
    }

    /// Share of attempts that passed, in percent.
    pub fn pass_rate(&self) -> f64 {
        if self.attempt_count == 0 {
            0.0
        } else {
            100.0 * f64::from(self.pass_count) / f64::from(self.attempt_count)
        }
    }
}

/// One rendered row of the statistics table.
#[derive(Tabled)]
struct StatsRow {
    /// Check name.
    #[tabled(rename = "Check")]
    check:    String,
    /// Passes.
    #[tabled(rename = "Pass")]
    pass:     u32,
    /// Failures.
    #[tabled(rename = "Fail")]
    fail:     u32,
    /// Errors.
    #[tabled(rename = "Error")]
    error:    u32,
    /// Attempts.
    #[tabled(rename = "Attempts")]
    attempts: u32,
    /// Pass rate.
    #[tabled(rename = "Pass %")]
    rate:     String,
}

/// Per-check tallies in the order the checks were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CohortStats {
    /// One tally per check.
    tallies: Vec<CheckTally>,
}

impl CohortStats {
    /// Looks up the tally for a check.
    pub fn get(&self, check_name: &str) -> Option<&CheckTally> {
        self.tallies.iter().find(|t| t.check_name == check_name)
    }

    /// Tallies in check order.
    pub fn iter(&self) -> std::slice::Iter<'_, CheckTally> {
        self.tallies.iter()
    }

    /// Number of checks tallied.
    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    /// True when no submission reached check execution.
    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    /// Returns the tally for `check_name`, creating it if needed.
    fn tally_mut(&mut self, check_name: &str) -> &mut CheckTally {
        let index = match self.tallies.iter().position(|t| t.check_name == check_name) {
            Some(index) => index,
            None => {
                self.tallies.push(CheckTally::new(check_name));
                self.tallies.len() - 1
            }
        };
        &mut self.tallies[index]
    }

    /// Renders the tallies as a console table.
    pub fn table(&self) -> String {
        let rows = self.tallies.iter().map(|t| StatsRow {
            check:    t.check_name.clone(),
            pass:     t.pass_count,
            fail:     t.fail_count,
            error:    t.error_count,
            attempts: t.attempt_count,
            rate:     format!("{:.1}", t.pass_rate()),
        });

        Table::new(rows)
            .with(Style::modern())
            .with(Panel::header("Grading Statistics"))
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .to_string()
    }

    /// Writes the tallies as JSON for external chart tooling.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Could not serialize statistics")?;
        fs::write(path, json).with_context(|| format!("Could not write {}", path.display()))
    }
}

impl<'a> IntoIterator for &'a CohortStats {
    type IntoIter = std::slice::Iter<'a, CheckTally>;
    type Item = &'a CheckTally;

    fn into_iter(self) -> Self::IntoIter {
        self.tallies.iter()
    }
}

/// Counts pass/fail/error per check over every submission that reached check
/// execution.
///
/// Check order follows the first submission that ran any checks. Submissions
/// that failed to load contribute nothing. If none reached check execution
/// the result is empty and the condition is logged.
pub fn aggregate(results: &[SubmissionResult]) -> CohortStats {
    let mut stats = CohortStats::default();

    let Some(first) = results.iter().find(|r| r.reached_checks()) else {
        error!("No submission reached check execution; cohort statistics are empty");
        return stats;
    };
    for check in &first.checks {
        stats.tally_mut(&check.check_name);
    }

    for result in results.iter().filter(|r| r.reached_checks()) {
        for check in &result.checks {
            stats.tally_mut(&check.check_name).record(check.status);
        }
    }

    stats
}
