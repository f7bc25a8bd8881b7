//! Tests for the process-backed loader against real child processes.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use hwgrade::{
    CheckDefinition, CheckStatus, CheckSuite, LoadFailureKind, ProcessLoader, Submission,
    loader::{TIMEOUT_COMMENT, load_with_deadline},
    runner::run_checks,
};
use uuid::Uuid;

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("hwgrade-process-{}", Uuid::new_v4()));
    fs::create_dir_all(&root).expect("create temp root");
    root
}

fn sh_loader(root: &Path, load_script: &str) -> ProcessLoader {
    ProcessLoader::builder()
        .interpreter("/bin/sh")
        .dir(root)
        .load_args(vec!["-c".to_string(), load_script.to_string()])
        .failure_exit_code(1)
        .build()
}

fn sh_check(name: &str, script: &str) -> CheckDefinition {
    CheckDefinition::new(name, format!("{name}\n\npoints=1"))
        .expect("check")
        .with_command(["{interpreter}", "-c", script])
}

#[tokio::test]
async fn load_substitutes_module_and_path() {
    let root = temp_root();
    fs::write(root.join("doe_john_hw1.py"), "a = 1\n").expect("write");
    let loader = sh_loader(&root, "test -f {path} && test {module} = doe_john_hw1");

    let loaded =
        load_with_deadline(&loader, &Submission::single("doe_john_hw1", "py"), Duration::from_secs(5))
            .await;
    assert!(loaded.is_ok());

    let missing =
        load_with_deadline(&loader, &Submission::single("roe_jane_hw1", "py"), Duration::from_secs(5))
            .await;
    assert_eq!(missing.err().map(|f| f.kind), Some(LoadFailureKind::ImportError));

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn slow_load_is_abandoned_at_the_deadline() {
    let root = temp_root();
    let loader = sh_loader(&root, "sleep 5");

    let started = Instant::now();
    let failure = load_with_deadline(
        &loader,
        &Submission::single("doe_john_hw1", "py"),
        Duration::from_millis(200),
    )
    .await
    .err()
    .expect("timeout");
    assert_eq!(failure.kind, LoadFailureKind::Timeout);
    assert_eq!(failure.comment, TIMEOUT_COMMENT);
    assert!(started.elapsed() < Duration::from_secs(3));

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn nonzero_load_exit_is_an_import_error() {
    let root = temp_root();
    let loader = sh_loader(&root, "echo 'SyntaxError: invalid syntax' >&2; exit 2");

    let failure =
        load_with_deadline(&loader, &Submission::single("doe_john_hw1", "py"), Duration::from_secs(5))
            .await
            .err()
            .expect("import error");
    assert_eq!(failure.kind, LoadFailureKind::ImportError);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn check_exit_codes_map_to_statuses() {
    let root = temp_root();
    fs::write(root.join("doe_john_hw1.py"), "a = 1\n").expect("write");
    let loader = sh_loader(&root, "true");
    let artifact =
        load_with_deadline(&loader, &Submission::single("doe_john_hw1", "py"), Duration::from_secs(5))
            .await
            .ok()
            .expect("loaded");

    let suite = CheckSuite::new([
        sh_check("runs_in_dir", "test -f {module}.py"),
        sh_check("asserts", "echo 'AssertionError: wrong' >&2; exit 1"),
        sh_check("crashes", "echo 'ZeroDivisionError: division by zero' >&2; exit 3"),
        sh_check("silent", "exit 3"),
    ])
    .expect("suite");

    let results = run_checks(&artifact, &suite, None).await;
    let summary: Vec<(&str, CheckStatus, Option<&str>)> = results
        .iter()
        .map(|r| (r.check_name.as_str(), r.status, r.diagnostic.as_deref()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("runs_in_dir", CheckStatus::Pass, None),
            ("asserts", CheckStatus::Fail, Some("wrong")),
            ("crashes", CheckStatus::Error, Some("division by zero")),
            ("silent", CheckStatus::Error, None),
        ]
    );
    assert_eq!(results[3].raw_trace.as_deref(), Some("process exited with code 3"));

    let _ = fs::remove_dir_all(root);
}
