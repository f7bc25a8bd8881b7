use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::PathBuf,
    time::Duration,
};

use hwgrade::{
    Artifact, ArtifactLoader, CheckDefinition, CheckOutcome, CheckStatus, CheckSuite, Harness,
    LoadFailureKind, NameFilter, Submission, config, discover,
    gradebook::read_roster,
    harness::{GradebookTarget, run_batch},
    runner::CHECK_TIMEOUT_COMMENT,
};
use uuid::Uuid;

/// How a fake submission behaves when loaded.
#[derive(Clone)]
enum Behavior {
    /// Loads; checks report the mapped outcome, `None` spins forever.
    Loads(HashMap<String, Option<CheckOutcome>>),
    /// Never finishes loading.
    Hangs,
    /// Loading raises.
    Raises,
    /// Loading panics.
    Panics,
}

struct FakeLoader {
    behaviors: HashMap<String, Behavior>,
}

struct FakeArtifact {
    outcomes: HashMap<String, Option<CheckOutcome>>,
}

impl Artifact for FakeArtifact {
    async fn run_check(&self, check: &CheckDefinition) -> CheckOutcome {
        match self.outcomes.get(check.name()) {
            Some(Some(outcome)) => outcome.clone(),
            Some(None) => {
                std::future::pending::<()>().await;
                CheckOutcome::Passed
            }
            None => CheckOutcome::Errored(format!("NameError: {} missing", check.name())),
        }
    }
}

impl ArtifactLoader for FakeLoader {
    type Artifact = FakeArtifact;

    async fn load(&self, submission: &Submission) -> anyhow::Result<FakeArtifact> {
        match self.behaviors.get(submission.name()) {
            Some(Behavior::Loads(outcomes)) => Ok(FakeArtifact {
                outcomes: outcomes.clone(),
            }),
            Some(Behavior::Hangs) => {
                std::future::pending::<()>().await;
                anyhow::bail!("unreachable")
            }
            Some(Behavior::Panics) => panic!("loader blew up"),
            Some(Behavior::Raises) | None => anyhow::bail!("SyntaxError: invalid syntax"),
        }
    }
}

fn suite() -> CheckSuite {
    CheckSuite::new([
        CheckDefinition::new("test_a", "Test a\n\npoints=1").expect("check"),
        CheckDefinition::new("test_b", "Test b\n\npoints=1").expect("check"),
    ])
    .expect("suite")
}

fn loads(a: Option<CheckOutcome>, b: Option<CheckOutcome>) -> Behavior {
    Behavior::Loads(HashMap::from([("test_a".to_string(), a), ("test_b".to_string(), b)]))
}

fn submission(module: &str) -> Submission {
    Submission::single(module, "py")
}

fn harness(behaviors: HashMap<String, Behavior>) -> Harness<FakeLoader> {
    Harness::new(FakeLoader { behaviors }, suite())
        .with_load_deadline(Duration::from_millis(100))
        .with_workers(2)
}

#[tokio::test]
async fn every_submission_gets_exactly_one_result() {
    let behaviors = HashMap::from([
        (
            "good_one_hw1".to_string(),
            loads(Some(CheckOutcome::Passed), Some(CheckOutcome::Passed)),
        ),
        (
            "half_one_hw1".to_string(),
            loads(
                Some(CheckOutcome::Passed),
                Some(CheckOutcome::Failed("AssertionError: 1 != 0 : b is wrong".into())),
            ),
        ),
        ("hang_one_hw1".to_string(), Behavior::Hangs),
        ("bad_one_hw1".to_string(), Behavior::Raises),
        ("boom_one_hw1".to_string(), Behavior::Panics),
    ]);
    let names: Vec<&str> = vec![
        "good_one_hw1",
        "half_one_hw1",
        "hang_one_hw1",
        "bad_one_hw1",
        "boom_one_hw1",
    ];
    let submissions: Vec<Submission> = names.iter().map(|n| submission(n)).collect();

    let results = harness(behaviors).grade_all(&submissions).await;
    assert_eq!(
        results.keys().map(String::as_str).collect::<BTreeSet<_>>(),
        names.iter().copied().collect::<BTreeSet<_>>()
    );

    assert_eq!(results["good_one_hw1"].percent, 100.0);

    let half = &results["half_one_hw1"];
    assert_eq!(half.percent, 50.0);
    let b = half.check("test_b").expect("test_b");
    assert_eq!(b.status, CheckStatus::Fail);
    assert_eq!(b.diagnostic.as_deref(), Some("b is wrong"));

    let hang = &results["hang_one_hw1"];
    assert_eq!(hang.load_failure.as_ref().map(|f| f.kind), Some(LoadFailureKind::Timeout));
    assert!(hang.checks.is_empty());
    assert_eq!(hang.percent, 0.0);

    for name in ["bad_one_hw1", "boom_one_hw1"] {
        let failure = results[name].load_failure.as_ref().expect("load failure");
        assert_eq!(failure.kind, LoadFailureKind::ImportError);
        assert_eq!(failure.comment, "Loading led to an error");
    }
}

#[tokio::test]
async fn check_deadline_turns_a_spinning_check_into_an_error() {
    let behaviors = HashMap::from([(
        "spin_check_hw1".to_string(),
        loads(Some(CheckOutcome::Passed), None),
    )]);
    let results = harness(behaviors)
        .with_check_deadline(Some(Duration::from_millis(50)))
        .grade_all(&[submission("spin_check_hw1")])
        .await;

    let result = &results["spin_check_hw1"];
    assert!(result.load_failure.is_none());
    assert_eq!(result.percent, 50.0);
    let b = result.check("test_b").expect("test_b");
    assert_eq!(b.status, CheckStatus::Error);
    assert_eq!(b.diagnostic.as_deref(), Some(CHECK_TIMEOUT_COMMENT));
}

#[tokio::test]
async fn batch_writes_report_feedback_stats_and_gradebook() {
    let root: PathBuf = std::env::temp_dir().join(format!("hwgrade-batch-{}", Uuid::new_v4()));
    let subs = root.join("subs");
    let out = root.join("out");
    fs::create_dir_all(&subs).expect("create subs");
    fs::create_dir_all(&out).expect("create out");

    fs::write(subs.join("doe_john_hw1.py"), "a = 1\n").expect("write");
    fs::write(subs.join("roe-jane_hw1-2.py"), "a = 2\n").expect("write");
    fs::write(subs.join("test_hw1.py"), "").expect("write");

    let roster = root.join("gradebook.csv");
    fs::write(
        &roster,
        "Student,ID,SIS User ID,SIS Login ID,Section,HW1 (555)\n\
         Muted,,,,,\n\
         Points Possible,,,,,50\n\
         \"Doe, John\",john,,,A,\n\
         \"Roe, Jane\",jane,,,A,\n\
         \"Zed, Nobody\",zed,,,B,3\n",
    )
    .expect("write roster");

    let cfg = config::HarnessConfig::default()
        .with_submissions_dir(&subs)
        .with_output_dir(&out)
        .with_load_deadline(Duration::from_millis(100));
    let filter = NameFilter::new(cfg.pattern(), cfg.exclude()).expect("filter");
    let set = discover(&subs, &filter).expect("discover");
    assert_eq!(set.names(), vec!["doe_john_hw1".to_string(), "roe_jane_hw1".to_string()]);

    let behaviors = HashMap::from([
        (
            "doe_john_hw1".to_string(),
            loads(Some(CheckOutcome::Passed), Some(CheckOutcome::Passed)),
        ),
        (
            "roe_jane_hw1".to_string(),
            loads(
                Some(CheckOutcome::Passed),
                Some(CheckOutcome::Errored("ZeroDivisionError: division by zero".into())),
            ),
        ),
    ]);
    let harness = Harness::configured(FakeLoader { behaviors }, suite(), &cfg);
    let target = GradebookTarget {
        roster:     roster.clone(),
        assignment: "HW1".to_string(),
    };

    let outcome = run_batch(&harness, &cfg, &set, Some(&target)).await.expect("batch");

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.stats.get("test_b").map(|t| t.error_count), Some(1));

    let report = fs::read_to_string(out.join("grades.txt")).expect("report");
    assert_eq!(report, outcome.report);
    assert!(report.contains("ADJUSTED TOTAL: 30.00"));
    assert!(out.join("stats.json").exists());

    let doe = fs::read_to_string(out.join("feedback").join("doe_john_hw1.txt")).expect("doe");
    assert!(doe.starts_with("doe_john_hw1\n"));
    let roe = fs::read_to_string(out.join("feedback").join("roe-jane_hw1-2.txt")).expect("roe");
    assert!(roe.contains("RAW ERROR OUTPUT:\nZeroDivisionError: division by zero\n"));

    assert!(!subs.join("roe_jane_hw1.py").exists());
    assert!(subs.join("roe-jane_hw1-2.py").exists());

    let rows = read_roster(&roster).expect("roster");
    assert_eq!(rows[1][5], "Muted");
    assert_eq!(rows[3][5], "50.0");
    assert_eq!(rows[4][5], "25.0");
    assert_eq!(rows[5][5], "3");
    let merged = outcome.merged.expect("merged");
    assert_eq!(merged.unmatched, vec!["Zed, Nobody".to_string()]);

    let _ = fs::remove_dir_all(root);
}
