#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Harness configuration.
//!
//! Defaults can be overridden through `HWGRADE_*` environment variables, and a
//! process-wide copy is kept behind [`get`] and [`set`].

use std::{
    path::PathBuf,
    str::FromStr,
    sync::{Arc, Mutex, OnceLock},
    thread::available_parallelism,
    time::Duration,
};

/// Default regex a normalized file name must contain to count as a
/// submission.
pub const DEFAULT_PATTERN: &str = r"[A-Za-z]+_[A-Za-z]+_(?i:hw)\d+\.py";

/// Default regex that disqualifies a file from grading.
pub const DEFAULT_EXCLUDE: &str = "test|solution|definition";

/// Default load deadline in seconds.
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration for one grading batch.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Directory holding the submissions.
    submissions_dir:   PathBuf,
    /// Regex a submission's normalized name must contain.
    pattern:           String,
    /// Regex that disqualifies a file.
    exclude:           String,
    /// Deadline around loading each artifact.
    load_deadline:     Duration,
    /// Optional deadline around each check.
    check_deadline:    Option<Duration>,
    /// Number of submissions graded concurrently.
    workers:           usize,
    /// Where the master report is written.
    report_path:       PathBuf,
    /// Where per-submission feedback files are written.
    feedback_dir:      PathBuf,
    /// Where cohort statistics are written as JSON.
    stats_path:        PathBuf,
    /// Interpreter used by the process-backed loader.
    interpreter:       String,
    /// Exit code a check uses to signal an assertion failure.
    failure_exit_code: i32,
    /// Roster column holding the student id.
    id_column:         usize,
    /// Roster columns kept in front of the assignment column on export.
    leading_columns:   usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            submissions_dir:   PathBuf::from("."),
            pattern:           DEFAULT_PATTERN.to_string(),
            exclude:           DEFAULT_EXCLUDE.to_string(),
            load_deadline:     Duration::from_secs(DEFAULT_LOAD_TIMEOUT_SECS),
            check_deadline:    None,
            workers:           default_workers(),
            report_path:       PathBuf::from("grades.txt"),
            feedback_dir:      PathBuf::from("feedback"),
            stats_path:        PathBuf::from("stats.json"),
            interpreter:       "python3".to_string(),
            failure_exit_code: 1,
            id_column:         1,
            leading_columns:   5,
        }
    }
}

impl HarnessConfig {
    /// Reads `HWGRADE_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            submissions_dir:   read_var("HWGRADE_DIR", defaults.submissions_dir),
            pattern:           read_var("HWGRADE_PATTERN", defaults.pattern),
            exclude:           read_var("HWGRADE_EXCLUDE", defaults.exclude),
            load_deadline:     read_timeout_secs(
                "HWGRADE_LOAD_TIMEOUT_SECS",
                DEFAULT_LOAD_TIMEOUT_SECS,
            ),
            check_deadline:    std::env::var("HWGRADE_CHECK_TIMEOUT_SECS")
                .ok()
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
            workers:           read_var("HWGRADE_WORKERS", defaults.workers).max(1),
            report_path:       read_var("HWGRADE_REPORT", defaults.report_path),
            feedback_dir:      read_var("HWGRADE_FEEDBACK_DIR", defaults.feedback_dir),
            stats_path:        read_var("HWGRADE_STATS", defaults.stats_path),
            interpreter:       read_var("HWGRADE_INTERPRETER", defaults.interpreter),
            failure_exit_code: read_var("HWGRADE_FAILURE_EXIT_CODE", defaults.failure_exit_code),
            id_column:         read_var("HWGRADE_ROSTER_ID_COLUMN", defaults.id_column),
            leading_columns:   read_var(
                "HWGRADE_ROSTER_LEADING_COLUMNS",
                defaults.leading_columns,
            ),
        }
    }

    /// Directory holding the submissions.
    pub fn submissions_dir(&self) -> &PathBuf {
        &self.submissions_dir
    }

    /// Regex a submission's normalized name must contain.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Regex that disqualifies a file.
    pub fn exclude(&self) -> &str {
        &self.exclude
    }

    /// Deadline around loading each artifact.
    pub fn load_deadline(&self) -> Duration {
        self.load_deadline
    }

    /// Optional deadline around each check.
    pub fn check_deadline(&self) -> Option<Duration> {
        self.check_deadline
    }

    /// Number of submissions graded concurrently.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Where the master report is written.
    pub fn report_path(&self) -> &PathBuf {
        &self.report_path
    }

    /// Where per-submission feedback files are written.
    pub fn feedback_dir(&self) -> &PathBuf {
        &self.feedback_dir
    }

    /// Where cohort statistics are written.
    pub fn stats_path(&self) -> &PathBuf {
        &self.stats_path
    }

    /// Interpreter used by the process-backed loader.
    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// Exit code a check uses to signal an assertion failure.
    pub fn failure_exit_code(&self) -> i32 {
        self.failure_exit_code
    }

    /// Roster column holding the student id.
    pub fn id_column(&self) -> usize {
        self.id_column
    }

    /// Roster columns kept in front of the assignment column.
    pub fn leading_columns(&self) -> usize {
        self.leading_columns
    }

    /// Returns a new config with a different submissions directory.
    pub fn with_submissions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.submissions_dir = dir.into();
        self
    }

    /// Returns a new config with a different submission pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Returns a new config with a different exclude pattern.
    pub fn with_exclude(mut self, exclude: impl Into<String>) -> Self {
        self.exclude = exclude.into();
        self
    }

    /// Returns a new config with a custom load deadline.
    pub fn with_load_deadline(mut self, deadline: Duration) -> Self {
        self.load_deadline = deadline;
        self
    }

    /// Returns a new config with a per-check deadline.
    pub fn with_check_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.check_deadline = deadline;
        self
    }

    /// Returns a new config with a custom worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Returns a new config with a different interpreter.
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Returns a new config writing the report, feedback and statistics
    /// under `dir`, using their default file names.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.report_path = dir.join("grades.txt");
        self.feedback_dir = dir.join("feedback");
        self.stats_path = dir.join("stats.json");
        self
    }
}

/// Worker count matching the machine's available parallelism.
fn default_workers() -> usize {
    available_parallelism().map(usize::from).unwrap_or(4)
}

/// Parses an environment variable, falling back to `default` when it is
/// missing or unparseable.
fn read_var<T: FromStr>(env: &str, default: T) -> T {
    std::env::var(env)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Parses an environment variable into a `Duration`, falling back to
/// `default_secs` when parsing fails or the variable is missing.
fn read_timeout_secs(env: &str, default_secs: u64) -> Duration {
    std::env::var(env)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}

/// Global storage for the lazily constructed configuration.
static CONFIG_SLOT: OnceLock<Mutex<Option<Arc<HarnessConfig>>>> = OnceLock::new();

/// Returns the mutex guarding the global configuration slot.
fn slot() -> &'static Mutex<Option<Arc<HarnessConfig>>> {
    CONFIG_SLOT.get_or_init(|| Mutex::new(None))
}

/// Returns the active configuration, reading the environment on first use.
pub fn get() -> Arc<HarnessConfig> {
    let mut guard = slot().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(guard.get_or_insert_with(|| Arc::new(HarnessConfig::from_env())))
}

/// Replaces the active configuration, typically with CLI overrides applied.
pub fn set(config: HarnessConfig) -> Arc<HarnessConfig> {
    let config = Arc::new(config);
    let mut guard = slot().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Some(Arc::clone(&config));
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = HarnessConfig::default();
        assert_eq!(cfg.load_deadline(), Duration::from_secs(10));
        assert_eq!(cfg.check_deadline(), None);
        assert!(cfg.workers() >= 1);
        assert_eq!(cfg.leading_columns(), 5);
    }

    #[test]
    fn worker_override_is_never_zero() {
        assert_eq!(HarnessConfig::default().with_workers(0).workers(), 1);
    }
}
