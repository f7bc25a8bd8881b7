#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Errors that abort a batch.

use thiserror::Error;

/// Batch-wide contract violations.
///
/// Anything that goes wrong with a single submission is recorded as data on
/// its `SubmissionResult`; these variants are reserved for failures that make
/// the whole batch output untrustworthy and are therefore returned to the
/// caller.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The report text does not follow the block delimiter grammar.
    #[error("Report is malformed: {0}")]
    MalformedReport(String),
    /// A report block names a submission that was not expected at that
    /// position.
    #[error("Report block {index} belongs to `{found}`, expected `{expected}`")]
    UnknownSubmission {
        /// Position of the offending block.
        index:    usize,
        /// Submission name found on the first line of the block.
        found:    String,
        /// Submission name expected at this position.
        expected: String,
    },
    /// No roster header matched `<assignment> (<digits>)`.
    #[error("No gradebook column matches assignment `{0}` (expected a header like `{0} (12345)`)")]
    AssignmentColumnNotFound(String),
    /// The roster lacks the header, muted, or points-possible rows.
    #[error("Roster has {0} row(s); a header, muted, and points-possible row are required")]
    RosterTooShort(usize),
    /// The points-possible cell for the assignment is not a number.
    #[error("Points possible for the assignment (`{0}`) is not a number")]
    InvalidMaxPoints(String),
    /// A point weight, or the suite total, does not fit a point count.
    #[error("Point value {0} is out of range")]
    InvalidPoints(String),
    /// Two checks in a suite share a name.
    #[error("Check `{0}` is defined more than once in the suite")]
    DuplicateCheck(String),
}
