use hwgrade::{
    CheckDefinition, CheckOutcome, CheckResult, CheckStatus, CheckSuite, LoadFailure,
    LoadFailureKind, SubmissionResult, aggregate, score,
};

fn suite_abc() -> CheckSuite {
    CheckSuite::new([
        CheckDefinition::new("a", "Test a\n\npoints=1").expect("check"),
        CheckDefinition::new("b", "Test b\n\npoints=1").expect("check"),
        CheckDefinition::new("c", "Test c").expect("check"),
    ])
    .expect("suite")
}

fn outcome(status: CheckStatus) -> CheckOutcome {
    match status {
        CheckStatus::Pass => CheckOutcome::Passed,
        CheckStatus::Fail => CheckOutcome::Failed("AssertionError: nope".into()),
        CheckStatus::Error => CheckOutcome::Errored("NameError: name 'c' is not defined".into()),
    }
}

fn results_for(statuses: &[(&str, CheckStatus)]) -> Vec<CheckResult> {
    statuses
        .iter()
        .map(|(name, status)| CheckResult::from_outcome(*name, outcome(*status)))
        .collect()
}

#[test]
fn two_of_three_equal_weight_checks() {
    let checks = results_for(&[
        ("a", CheckStatus::Pass),
        ("b", CheckStatus::Pass),
        ("c", CheckStatus::Fail),
    ]);
    let result = score("doe_john_hw3", checks, &suite_abc());

    assert_eq!(result.earned_points, 2);
    assert_eq!(result.total_points, 3);
    assert_eq!(format!("{:.2}", result.percent), "66.67");
    assert!(result.load_failure.is_none());
}

#[test]
fn weights_come_from_the_suite() {
    let suite = CheckSuite::new([
        CheckDefinition::new("small", "points=1").expect("check"),
        CheckDefinition::new("big", "points=9").expect("check"),
    ])
    .expect("suite");
    let checks = results_for(&[("small", CheckStatus::Fail), ("big", CheckStatus::Pass)]);
    let result = score("s", checks, &suite);

    assert_eq!(result.earned_points, 9);
    assert_eq!(result.total_points, 10);
    assert_eq!(result.percent, 90.0);
}

#[test]
fn score_is_bounded_for_every_status_combination() {
    let statuses = [CheckStatus::Pass, CheckStatus::Fail, CheckStatus::Error];
    for a in statuses {
        for b in statuses {
            for c in statuses {
                let checks = results_for(&[("a", a), ("b", b), ("c", c)]);
                let result = score("s", checks, &suite_abc());
                assert!(result.earned_points <= result.total_points);
                assert!((0.0..=100.0).contains(&result.percent));
            }
        }
    }
}

#[test]
fn unknown_or_repeated_results_cannot_inflate_score() {
    let checks = results_for(&[
        ("a", CheckStatus::Pass),
        ("a", CheckStatus::Pass),
        ("zzz", CheckStatus::Pass),
    ]);
    let result = score("s", checks, &suite_abc());
    assert_eq!(result.earned_points, 1);
}

#[test]
fn load_failure_carries_kind_and_zero_score() {
    let result = SubmissionResult::from_load_failure("spin_forever_hw1", LoadFailure::timeout());
    assert!(result.checks.is_empty());
    assert_eq!(result.percent, 0.0);
    assert_eq!(result.total_points, 0);
    let failure = result.load_failure.expect("failure");
    assert_eq!(failure.kind, LoadFailureKind::Timeout);
    assert_eq!(failure.comment, "Likely an infinite operation during load");
}

#[test]
fn cohort_counts_skip_load_failures() {
    let suite = suite_abc();
    let results = vec![
        SubmissionResult::from_load_failure("broken", LoadFailure::import_error()),
        score(
            "one",
            results_for(&[
                ("a", CheckStatus::Pass),
                ("b", CheckStatus::Fail),
                ("c", CheckStatus::Error),
            ]),
            &suite,
        ),
        score(
            "two",
            results_for(&[
                ("a", CheckStatus::Pass),
                ("b", CheckStatus::Pass),
                ("c", CheckStatus::Fail),
            ]),
            &suite,
        ),
    ];

    let stats = aggregate(&results);
    assert_eq!(stats.iter().map(|t| t.check_name.as_str()).collect::<Vec<_>>(), ["a", "b", "c"]);

    let a = stats.get("a").expect("a");
    assert_eq!((a.pass_count, a.fail_count, a.error_count, a.attempt_count), (2, 0, 0, 2));
    let c = stats.get("c").expect("c");
    assert_eq!((c.pass_count, c.fail_count, c.error_count, c.attempt_count), (0, 1, 1, 2));

    let loaded = results.iter().filter(|r| r.load_failure.is_none()).count() as u32;
    for tally in &stats {
        assert_eq!(tally.pass_count + tally.fail_count + tally.error_count, tally.attempt_count);
        assert!(tally.attempt_count <= loaded);
    }
    assert!(stats.table().contains("Grading Statistics"));
}

#[test]
fn cohort_is_empty_when_nothing_loaded() {
    let results = vec![
        SubmissionResult::from_load_failure("x", LoadFailure::timeout()),
        SubmissionResult::from_load_failure("y", LoadFailure::import_error()),
    ];
    assert!(aggregate(&results).is_empty());
    assert!(aggregate(&[]).is_empty());
}
