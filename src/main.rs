#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # hwgrade
//!
//! Grades a directory of submissions against a check suite.
//!
//! `hwgrade grade --suite checks.json --dir submissions/` writes `grades.txt`,
//! one feedback file per submission, and `stats.json`. Pass `--gradebook` and
//! `--assignment` to also write the scores into an LMS gradebook export.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use bpaf::*;
use colored::Colorize;
use dotenvy::dotenv;
use hwgrade::{
    CheckSuite, Harness, NameFilter, ProcessLoader, Submission, SubmissionResult, config,
    discover,
    harness::{GradebookTarget, ordered, run_batch},
    normalize,
    report::{self, NaughtyReasons},
};
use itertools::Itertools;
use tracing::{Level, info, metadata::LevelFilter, warn};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Options for the `grade` subcommand.
#[derive(Debug, Clone)]
struct GradeArgs {
    /// Check suite JSON file.
    suite:         PathBuf,
    /// Submissions directory override.
    dir:           Option<PathBuf>,
    /// Submission pattern override.
    pattern:       Option<String>,
    /// Exclude pattern override.
    exclude:       Option<String>,
    /// Grade one module by name, skipping discovery.
    single:        Option<String>,
    /// Gradebook CSV to update.
    gradebook:     Option<PathBuf>,
    /// Assignment name in the gradebook header.
    assignment:    Option<String>,
    /// Load deadline override, in seconds.
    load_timeout:  Option<u64>,
    /// Per-check deadline, in seconds.
    check_timeout: Option<u64>,
    /// Worker count override.
    workers:       Option<usize>,
    /// Interpreter override.
    interpreter:   Option<String>,
}

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Grade a batch of submissions
    Grade(GradeArgs),
    /// Show how file names would be normalized
    Normalize(Vec<String>),
}

/// Parse the command line arguments and return the command plus verbosity
fn options() -> (Cmd, bool) {
    let suite = long("suite")
        .short('s')
        .help("JSON file describing the checks")
        .argument::<PathBuf>("PATH");
    let dir = long("dir")
        .short('d')
        .help("Directory with submissions to be tested")
        .argument::<PathBuf>("DIR")
        .optional();
    let pattern = long("pattern")
        .short('p')
        .help("Regex a submission file name must match")
        .argument::<String>("REGEX")
        .optional();
    let exclude = long("exclude")
        .short('e')
        .help("Regex for file names that must not be graded")
        .argument::<String>("REGEX")
        .optional();
    let single = long("single")
        .help("Grade a single module by name")
        .argument::<String>("MODULE")
        .optional();
    let gradebook = long("gradebook")
        .short('g')
        .help("CSV export of the LMS gradebook to update")
        .argument::<PathBuf>("CSV")
        .optional();
    let assignment = long("assignment")
        .short('a')
        .help("Assignment name as it appears in the gradebook")
        .argument::<String>("NAME")
        .optional();
    let load_timeout = long("load-timeout")
        .help("Seconds a submission may take to load")
        .argument::<u64>("SECS")
        .optional();
    let check_timeout = long("check-timeout")
        .help("Seconds a single check may take; unbounded when omitted")
        .argument::<u64>("SECS")
        .optional();
    let workers = long("workers")
        .short('w')
        .help("Number of submissions graded at once")
        .argument::<usize>("N")
        .optional();
    let interpreter = long("interpreter")
        .help("Interpreter used to load submissions")
        .argument::<String>("PROGRAM")
        .optional();

    let grade = construct!(GradeArgs {
        suite,
        dir,
        pattern,
        exclude,
        single,
        gradebook,
        assignment,
        load_timeout,
        check_timeout,
        workers,
        interpreter,
    })
    .map(Cmd::Grade)
    .to_options()
    .command("grade")
    .help("Grade every submission in a directory");

    let names = positional::<String>("FILENAME")
        .help("Submission file name")
        .some("at least one file name is required");
    let normalize_cmd = construct!(Cmd::Normalize(names))
        .to_options()
        .command("normalize")
        .help("Show how submission file names would be rewritten");

    let cmd = construct!([grade, normalize_cmd]);
    let verbose = long("verbose")
        .short('v')
        .help("Log debug output")
        .switch();

    construct!(cmd, verbose)
        .to_options()
        .descr("Batch autograder with per-submission feedback")
        .run()
}

/// Applies CLI overrides on top of the environment configuration.
fn configure(args: &GradeArgs) -> config::HarnessConfig {
    let mut cfg = (*config::get()).clone();
    if let Some(dir) = &args.dir {
        cfg = cfg.with_submissions_dir(dir);
    }
    if let Some(pattern) = &args.pattern {
        cfg = cfg.with_pattern(pattern);
    }
    if let Some(exclude) = &args.exclude {
        cfg = cfg.with_exclude(exclude);
    }
    if let Some(secs) = args.load_timeout {
        cfg = cfg.with_load_deadline(Duration::from_secs(secs));
    }
    if let Some(secs) = args.check_timeout {
        cfg = cfg.with_check_deadline(Some(Duration::from_secs(secs)));
    }
    if let Some(workers) = args.workers {
        cfg = cfg.with_workers(workers);
    }
    if let Some(interpreter) = &args.interpreter {
        cfg = cfg.with_interpreter(interpreter);
    }
    cfg
}

/// Prints one line per submission.
fn print_summary(results: &[SubmissionResult]) {
    for result in results {
        let score = format!("{:>6.2}%", result.percent);
        let score = match &result.load_failure {
            Some(failure) => format!("{score} ({})", failure.kind).red(),
            None if result.earned_points == result.total_points => score.green(),
            None => score.yellow(),
        };
        println!("{score}  {}", result.submission_name);
    }
}

/// Runs the `grade` subcommand.
async fn grade(args: GradeArgs) -> Result<()> {
    let cfg = config::set(configure(&args));
    let suite = CheckSuite::load(&args.suite)?;
    info!("Loaded {} check(s) worth {} point(s)", suite.len(), suite.total_points());

    let loader =
        ProcessLoader::from_path(cfg.interpreter(), cfg.submissions_dir(), cfg.failure_exit_code())?;
    let harness = Harness::configured(loader, suite, &cfg);

    if let Some(module) = args.single {
        let submission = Submission::single(module, "py");
        let names = vec![submission.name().to_string()];
        let results = ordered(harness.grade_all(&[submission]).await, &names);
        let text = report::compose(&results, harness.suite(), &NaughtyReasons::new());
        report::write_report(cfg.report_path(), &text)?;
        print_summary(&results);
        return Ok(());
    }

    let filter = NameFilter::new(cfg.pattern(), cfg.exclude())?;
    let set = discover(cfg.submissions_dir(), &filter).with_context(|| {
        format!("Could not discover submissions in {}", cfg.submissions_dir().display())
    })?;
    if set.submissions().is_empty() {
        warn!("No submissions matched in {}", cfg.submissions_dir().display());
    }

    let gradebook = match (args.gradebook, args.assignment) {
        (Some(roster), Some(assignment)) => Some(GradebookTarget { roster, assignment }),
        _ => {
            info!(
                "Pass --gradebook and --assignment to produce an updated gradebook csv"
            );
            None
        }
    };

    let outcome = run_batch(&harness, &cfg, &set, gradebook.as_ref()).await?;

    eprintln!("{}", outcome.stats.table());
    print_summary(&outcome.results);
    info!(
        "Wrote {} and {} feedback file(s) to {}",
        cfg.report_path().display(),
        outcome.feedback_files.len(),
        cfg.feedback_dir().display()
    );
    if let Some(merged) = &outcome.merged
        && !merged.unmatched.is_empty()
    {
        warn!("No submission for: {}", merged.unmatched.iter().join(", "));
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let (cmd, verbose) = options();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::registry()
        .with(fmt)
        .with(LevelFilter::from_level(level))
        .init();

    match cmd {
        Cmd::Grade(args) => grade(args).await?,
        Cmd::Normalize(names) => {
            for raw in names {
                let out = normalize(&raw);
                if out.violations.is_empty() {
                    println!("{raw} -> {}", out.name);
                } else {
                    println!("{raw} -> {} [{}]", out.name, out.violations.iter().join(", "));
                }
            }
        }
    };

    Ok(())
}
