//! # hwgrade
//!
//! A batch autograder. It discovers submitted files, loads each one under a
//! deadline, runs a weighted suite of checks against it, and writes a master
//! report, per-submission feedback, cohort statistics, and an updated
//! gradebook.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Cohort-wide pass/fail/error statistics
pub mod cohort;
/// Environment-driven configuration
pub mod config;
/// Batch-wide error taxonomy
pub mod error;
/// Writing scores back into a gradebook export
pub mod gradebook;
/// Worker pool and batch pipeline
pub mod harness;
/// Artifact loading contract and deadline
pub mod loader;
/// Subprocess plumbing
pub mod process;
/// Master report and feedback splitting
pub mod report;
/// Running checks against a loaded artifact
pub mod runner;
/// Weighted scoring
pub mod score;
/// Submission discovery and name normalization
pub mod submission;
/// Check definitions and suites
pub mod suite;

pub use cohort::{CheckTally, CohortStats, aggregate};
pub use error::HarnessError;
pub use harness::{BatchOutcome, GradebookTarget, Harness, run_batch};
pub use loader::{Artifact, ArtifactLoader, LoadFailure, LoadFailureKind, ProcessLoader};
pub use runner::{CheckOutcome, CheckResult, CheckStatus};
pub use score::{SubmissionResult, score};
pub use submission::{NameFilter, Submission, SubmissionSet, Violation, discover, normalize};
pub use suite::{CheckDefinition, CheckSuite};
