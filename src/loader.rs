#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The artifact loading contract and its deadline wrapper.
//!
//! How an artifact is brought to an executable state is ecosystem specific,
//! so it sits behind [`ArtifactLoader`]. This module owns only the deadline
//! and the classification of load failures. [`ProcessLoader`] is the stock
//! implementation that drives an interpreter through subprocesses.

use std::{
    fmt::Display,
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use bon::Builder;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::warn;
use which::which;

use crate::{process::Invocation, runner::CheckOutcome, submission::Submission, suite::CheckDefinition};

/// Comment attached to a load that outlived its deadline.
pub const TIMEOUT_COMMENT: &str = "Likely an infinite operation during load";

/// Comment attached to a load that failed for any other reason.
pub const IMPORT_ERROR_COMMENT: &str = "Loading led to an error";

/// A loaded artifact that checks can run against.
pub trait Artifact: Send + Sync {
    /// Executes `check` and reports how it went. Must not panic for ordinary
    /// check failures; those are [`CheckOutcome::Failed`] or
    /// [`CheckOutcome::Errored`].
    fn run_check(&self, check: &CheckDefinition) -> impl Future<Output = CheckOutcome> + Send;
}

/// Brings a submission to an executable state.
///
/// `load` must yield to the runtime while it waits; a loader that blocks the
/// worker thread cannot be abandoned by the deadline.
pub trait ArtifactLoader: Send + Sync + 'static {
    /// Handle handed unmodified to the check runner.
    type Artifact: Artifact + 'static;

    /// Loads one submission.
    fn load(&self, submission: &Submission) -> impl Future<Output = Result<Self::Artifact>> + Send;
}

/// Why a submission never reached check execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadFailureKind {
    /// The load deadline expired.
    Timeout,
    /// Loading raised an error.
    ImportError,
}

impl Display for LoadFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadFailureKind::Timeout => f.write_str("timeout"),
            LoadFailureKind::ImportError => f.write_str("import_error"),
        }
    }
}

/// A classified inability to load an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFailure {
    /// Classification.
    pub kind:    LoadFailureKind,
    /// Human-readable explanation rendered into feedback.
    pub comment: String,
}

impl LoadFailure {
    /// The load deadline expired.
    pub fn timeout() -> Self {
        Self {
            kind:    LoadFailureKind::Timeout,
            comment: TIMEOUT_COMMENT.to_string(),
        }
    }

    /// Loading raised an error.
    pub fn import_error() -> Self {
        Self {
            kind:    LoadFailureKind::ImportError,
            comment: IMPORT_ERROR_COMMENT.to_string(),
        }
    }
}

/// Loads `submission`, abandoning the attempt once `deadline` passes.
///
/// The abandoned load future is dropped, not awaited; for [`ProcessLoader`]
/// that kills the child process.
pub async fn load_with_deadline<L: ArtifactLoader>(
    loader: &L,
    submission: &Submission,
    deadline: Duration,
) -> Result<L::Artifact, LoadFailure> {
    match timeout(deadline, loader.load(submission)).await {
        Ok(Ok(artifact)) => Ok(artifact),
        Ok(Err(err)) => {
            warn!("{}: loading failed: {err:#}", submission.name());
            Err(LoadFailure::import_error())
        }
        Err(_) => {
            warn!(
                "{}: load did not finish within {:.1}s",
                submission.name(),
                deadline.as_secs_f64()
            );
            Err(LoadFailure::timeout())
        }
    }
}

/// Replaces `{module}`, `{path}`, `{dir}` and `{interpreter}` in `template`.
fn substitute(template: &str, module: &str, path: &Path, dir: &Path, interpreter: &Path) -> String {
    template
        .replace("{module}", module)
        .replace("{path}", &path.display().to_string())
        .replace("{dir}", &dir.display().to_string())
        .replace("{interpreter}", &interpreter.display().to_string())
}

/// Loads submissions by running an interpreter in the submissions directory.
#[derive(Debug, Clone, Builder)]
pub struct ProcessLoader {
    /// Resolved interpreter binary.
    #[builder(into)]
    interpreter:       PathBuf,
    /// Directory holding the (renamed) submission files.
    #[builder(into)]
    dir:               PathBuf,
    /// Arguments for the load step; placeholders are substituted.
    #[builder(default = vec!["-c".to_string(), "import {module}".to_string()])]
    load_args:         Vec<String>,
    /// Exit code a check uses to signal an assertion failure.
    #[builder(default = 1)]
    failure_exit_code: i32,
}

impl ProcessLoader {
    /// Looks `interpreter` up on the path and builds a loader with default
    /// load arguments.
    pub fn from_path(interpreter: &str, dir: &Path, failure_exit_code: i32) -> Result<Self> {
        let interpreter = which(interpreter)
            .with_context(|| format!("Cannot find an interpreter on path ({interpreter})"))?;
        Ok(Self::builder()
            .interpreter(interpreter)
            .dir(dir)
            .failure_exit_code(failure_exit_code)
            .build())
    }
}

impl ArtifactLoader for ProcessLoader {
    type Artifact = ProcessArtifact;

    async fn load(&self, submission: &Submission) -> Result<ProcessArtifact> {
        let module = submission.name().to_string();
        let path = self.dir.join(submission.file_name());
        let args: Vec<String> = self
            .load_args
            .iter()
            .map(|a| substitute(a, &module, &path, &self.dir, &self.interpreter))
            .collect();

        let collected = Invocation::new(&self.interpreter)
            .args(&args)
            .current_dir(&self.dir)
            .collect()
            .await?;
        if !collected.status.success() {
            bail!("{}", collected.trace());
        }

        Ok(ProcessArtifact {
            interpreter: self.interpreter.clone(),
            dir: self.dir.clone(),
            module,
            path,
            failure_exit_code: self.failure_exit_code,
        })
    }
}

/// A submission that imported cleanly under [`ProcessLoader`].
#[derive(Debug, Clone)]
pub struct ProcessArtifact {
    /// Interpreter that loaded it.
    interpreter:       PathBuf,
    /// Submissions directory.
    dir:               PathBuf,
    /// Module identifier.
    module:            String,
    /// Path of the file that was loaded.
    path:              PathBuf,
    /// Exit code a check uses to signal an assertion failure.
    failure_exit_code: i32,
}

impl Artifact for ProcessArtifact {
    async fn run_check(&self, check: &CheckDefinition) -> CheckOutcome {
        let mut parts = check
            .command()
            .iter()
            .map(|part| substitute(part, &self.module, &self.path, &self.dir, &self.interpreter));
        let Some(program) = parts.next() else {
            return CheckOutcome::Errored(format!("check `{}` has no command", check.name()));
        };

        let collected = Invocation::new(&program)
            .args(parts)
            .current_dir(&self.dir)
            .collect()
            .await;
        match collected {
            Ok(c) if c.status.success() => CheckOutcome::Passed,
            Ok(c) if c.code() == Some(self.failure_exit_code) => CheckOutcome::Failed(c.trace()),
            Ok(c) => CheckOutcome::Errored(c.trace()),
            Err(err) => CheckOutcome::Errored(format!("{err:#}")),
        }
    }
}
