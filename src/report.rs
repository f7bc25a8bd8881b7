#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The master grading report and the per-submission feedback cut from it.
//!
//! Grammar: every block is wrapped as
//! `BLOCK_OPEN "\n" block "\n" BLOCK_CLOSE "\n"`, and a block's first line
//! is the submission name. [`split`] undoes [`compose`] exactly.

use std::{
    collections::{BTreeMap, HashMap},
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use anyhow::{Context, Result};

use crate::{
    error::HarnessError,
    runner::CheckStatus,
    score::SubmissionResult,
    submission::SubmissionSet,
    suite::CheckSuite,
};

/// Opens a submission block.
pub static BLOCK_OPEN: LazyLock<String> = LazyLock::new(|| "-".repeat(70));

/// Closes a submission block.
pub static BLOCK_CLOSE: LazyLock<String> = LazyLock::new(|| "*".repeat(70));

/// Submission name to naughty reason.
pub type NaughtyReasons = HashMap<String, String>;

/// Collects the naughty reasons of every submission in the set.
pub fn naughty_reasons(set: &SubmissionSet) -> NaughtyReasons {
    set.submissions()
        .iter()
        .filter_map(|s| {
            s.violation_reason()
                .map(|reason| (s.name().to_string(), reason.to_string()))
        })
        .collect()
}

/// Renders the feedback block for one submission.
pub fn render_block(
    result: &SubmissionResult,
    suite: &CheckSuite,
    naughty_reason: Option<&str>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}\n", result.submission_name);

    for check in &result.checks {
        let (summary, points) = suite
            .get(&check.check_name)
            .map(|def| (def.summary(), def.point_weight()))
            .unwrap_or((check.check_name.as_str(), 0));

        let _ = writeln!(out, "TEST DESCRIPTION: {summary}");
        let _ = writeln!(out, "POINTS: {points}");
        let _ = writeln!(out, "STATUS: {}", check.status);
        if let Some(diagnostic) = &check.diagnostic {
            let _ = writeln!(out, "FEEDBACK: {diagnostic}");
        }
        if check.status == CheckStatus::Error {
            let raw = check.raw_trace.as_deref().unwrap_or_default();
            let _ = writeln!(out, "RAW ERROR OUTPUT:\n{raw}");
        } else if check.diagnostic.is_none() {
            out.push('\n');
        }
    }

    if let Some(failure) = &result.load_failure {
        let _ = writeln!(out, "{}\n", failure.comment);
    }

    let _ = writeln!(out, "TOTAL % FROM TESTS: {:.2}", result.percent);
    if let Some(reason) = naughty_reason {
        let _ = writeln!(out, "PENALTY: {reason}");
        let _ = writeln!(out, "ADJUSTED TOTAL: {:.2}", result.adjusted_percent());
    }

    out
}

/// Renders the master report: one block per result, in the order given.
pub fn compose(results: &[SubmissionResult], suite: &CheckSuite, naughty: &NaughtyReasons) -> String {
    let mut out = String::new();
    for result in results {
        let block = render_block(
            result,
            suite,
            naughty.get(&result.submission_name).map(String::as_str),
        );
        let _ = write!(out, "{}\n{block}\n{}\n", *BLOCK_OPEN, *BLOCK_CLOSE);
    }
    out
}

/// Cuts a composed report back into per-submission blocks.
///
/// `names` is the order the report was composed in; every block must start
/// with the matching name. Anything that does not fit the grammar is an
/// error rather than a best-effort guess, since feedback would otherwise go
/// to the wrong student.
pub fn split(report: &str, names: &[String]) -> Result<BTreeMap<String, String>, HarnessError> {
    if report.is_empty() && names.is_empty() {
        return Ok(BTreeMap::new());
    }

    let head = format!("{}\n", *BLOCK_OPEN);
    let tail = format!("\n{}\n", *BLOCK_CLOSE);
    let separator = format!("\n{}\n{}\n", *BLOCK_CLOSE, *BLOCK_OPEN);

    let body = report
        .strip_prefix(&head)
        .ok_or_else(|| HarnessError::MalformedReport("missing opening delimiter".into()))?
        .strip_suffix(&tail)
        .ok_or_else(|| HarnessError::MalformedReport("missing closing delimiter".into()))?;

    let blocks: Vec<&str> = body.split(&separator).collect();
    if blocks.len() != names.len() {
        return Err(HarnessError::MalformedReport(format!(
            "expected {} block(s), found {}",
            names.len(),
            blocks.len()
        )));
    }

    let mut feedback = BTreeMap::new();
    for (index, (block, expected)) in blocks.into_iter().zip(names).enumerate() {
        let found = block.split('\n').next().unwrap_or_default();
        if found != expected {
            return Err(HarnessError::UnknownSubmission {
                index,
                found: found.to_string(),
                expected: expected.clone(),
            });
        }
        feedback.insert(expected.clone(), block.to_string());
    }

    Ok(feedback)
}

/// Writes the master report.
pub fn write_report(path: &Path, report: &str) -> Result<()> {
    fs::write(path, report).with_context(|| format!("Could not write report {}", path.display()))
}

/// Writes one feedback file per submission into `dir`, named after the file
/// the student originally submitted.
pub fn write_feedback(
    dir: &Path,
    feedback: &BTreeMap<String, String>,
    submissions: &SubmissionSet,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Could not create {}", dir.display()))?;

    let mut written = Vec::with_capacity(feedback.len());
    for (name, text) in feedback {
        let stem = submissions
            .get(name)
            .map(|s| {
                Path::new(s.original_filename())
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or(name)
                    .to_string()
            })
            .unwrap_or_else(|| name.clone());
        let path = dir.join(format!("{stem}.txt"));
        fs::write(&path, text).with_context(|| format!("Could not write {}", path.display()))?;
        written.push(path);
    }

    Ok(written)
}
