#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Fans submissions out over a worker pool and assembles the batch outputs.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use futures::{StreamExt, stream};
use tracing::{error, info};

use crate::{
    cohort::{CohortStats, aggregate},
    config::{DEFAULT_LOAD_TIMEOUT_SECS, HarnessConfig},
    gradebook::{Merged, update_gradebook},
    loader::{ArtifactLoader, LoadFailure, load_with_deadline},
    report::{self, compose, naughty_reasons},
    runner::run_checks,
    score::{SubmissionResult, score},
    submission::{Submission, SubmissionSet},
    suite::CheckSuite,
};

/// Grades submissions against one check suite.
pub struct Harness<L: ArtifactLoader> {
    /// Brings artifacts to an executable state.
    loader:         Arc<L>,
    /// Checks every artifact is run against.
    suite:          Arc<CheckSuite>,
    /// Deadline around each load.
    load_deadline:  Duration,
    /// Optional deadline around each check.
    check_deadline: Option<Duration>,
    /// Maximum number of submissions in flight.
    workers:        usize,
}

impl<L: ArtifactLoader> Harness<L> {
    /// A harness with the default load deadline, no check deadline and one
    /// worker per available core.
    pub fn new(loader: L, suite: CheckSuite) -> Self {
        Self {
            loader:         Arc::new(loader),
            suite:          Arc::new(suite),
            load_deadline:  Duration::from_secs(DEFAULT_LOAD_TIMEOUT_SECS),
            check_deadline: None,
            workers:        HarnessConfig::default().workers(),
        }
    }

    /// Takes deadlines and worker count from `config`.
    pub fn configured(loader: L, suite: CheckSuite, config: &HarnessConfig) -> Self {
        Self::new(loader, suite)
            .with_load_deadline(config.load_deadline())
            .with_check_deadline(config.check_deadline())
            .with_workers(config.workers())
    }

    /// Returns a new harness with a custom load deadline.
    pub fn with_load_deadline(mut self, deadline: Duration) -> Self {
        self.load_deadline = deadline;
        self
    }

    /// Returns a new harness with a per-check deadline.
    pub fn with_check_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.check_deadline = deadline;
        self
    }

    /// Returns a new harness with a custom worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// The suite being graded.
    pub fn suite(&self) -> &CheckSuite {
        &self.suite
    }

    /// Grades every submission, at most `workers` at a time.
    ///
    /// Tasks share nothing mutable; each returns its own result and the map is
    /// assembled once all of them have finished. A task that panics is
    /// recorded as a load error, so the map always holds exactly one entry per
    /// distinct submission name.
    pub async fn grade_all(&self, submissions: &[Submission]) -> HashMap<String, SubmissionResult> {
        let tasks = submissions.iter().cloned().map(|submission| {
            let loader = Arc::clone(&self.loader);
            let suite = Arc::clone(&self.suite);
            let load_deadline = self.load_deadline;
            let check_deadline = self.check_deadline;
            let name = submission.name().to_string();

            async move {
                let task = tokio::spawn(async move {
                    grade_one(loader.as_ref(), &suite, &submission, load_deadline, check_deadline)
                        .await
                });
                match task.await {
                    Ok(result) => result,
                    Err(err) => {
                        error!("{name}: grading task aborted: {err}");
                        SubmissionResult::from_load_failure(name, LoadFailure::import_error())
                    }
                }
            }
        });

        stream::iter(tasks)
            .buffer_unordered(self.workers)
            .map(|result| (result.submission_name.clone(), result))
            .collect()
            .await
    }
}

/// Loads one submission and, if that worked, runs and scores the suite.
pub async fn grade_one<L: ArtifactLoader>(
    loader: &L,
    suite: &CheckSuite,
    submission: &Submission,
    load_deadline: Duration,
    check_deadline: Option<Duration>,
) -> SubmissionResult {
    info!("Testing {}", submission.name());

    let result = match load_with_deadline(loader, submission, load_deadline).await {
        Ok(artifact) => {
            let checks = run_checks(&artifact, suite, check_deadline).await;
            score(submission.name(), checks, suite)
        }
        Err(failure) => SubmissionResult::from_load_failure(submission.name(), failure),
    };

    info!(
        "{}: {}/{} ({:.2}%)",
        result.submission_name, result.earned_points, result.total_points, result.percent
    );
    result
}

/// Lays results out in `names` order, dropping names with no result.
pub fn ordered(mut results: HashMap<String, SubmissionResult>, names: &[String]) -> Vec<SubmissionResult> {
    names.iter().filter_map(|name| results.remove(name)).collect()
}

/// Where and under which assignment to record scores.
#[derive(Debug, Clone)]
pub struct GradebookTarget {
    /// Roster CSV exported from the LMS.
    pub roster:     PathBuf,
    /// Assignment name as it appears in the roster header.
    pub assignment: String,
}

/// Everything a batch run produced.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Results in discovery order.
    pub results:        Vec<SubmissionResult>,
    /// Per-check cohort statistics.
    pub stats:          CohortStats,
    /// The master report text.
    pub report:         String,
    /// Feedback files written.
    pub feedback_files: Vec<PathBuf>,
    /// The gradebook merge, if one was requested.
    pub merged:         Option<Merged>,
}

/// Grades a discovered set and writes every batch output: report, stats,
/// feedback files and, optionally, the gradebook.
///
/// File system writes all happen here, after the parallel phase.
pub async fn run_batch<L: ArtifactLoader>(
    harness: &Harness<L>,
    config: &HarnessConfig,
    set: &SubmissionSet,
    gradebook: Option<&GradebookTarget>,
) -> Result<BatchOutcome> {
    let names = set.names();
    let by_name = harness.grade_all(set.submissions()).await;
    let results = ordered(by_name.clone(), &names);

    let stats = aggregate(&results);
    if !stats.is_empty() {
        stats.write_json(config.stats_path())?;
    }

    let report = compose(&results, harness.suite(), &naughty_reasons(set));
    report::write_report(config.report_path(), &report)?;
    set.remove_renamed_copies()?;

    let feedback = report::split(&report, &names)?;
    let feedback_files = report::write_feedback(config.feedback_dir(), &feedback, set)?;

    let merged = match gradebook {
        Some(target) => Some(update_gradebook(
            &target.roster,
            &target.assignment,
            set.student_ids(),
            &by_name,
            config.id_column(),
            config.leading_columns(),
        )?),
        None => None,
    };

    Ok(BatchOutcome {
        results,
        stats,
        report,
        feedback_files,
        merged,
    })
}
