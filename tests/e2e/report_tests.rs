//! JSON run reports.

use crate::common::*;
use board_test_harness::report::RecordingReporter;
use board_test_harness::{Harness, HarnessError, SuiteSpec};
use pretty_assertions::assert_eq;
use serde_json::Value;

fn finished_harness() -> Harness {
    let primary = PrimaryScript::new("MOCK0")
        .test(&["TEST NAME foo", "ASSERT EQ 4 4 (foo) (3)", "DONE"])
        .test(&["TEST NAME bar", "ASSERT EQ 4 5 (bar) (7)", "DONE"])
        .build();
    let provider = ScriptedProvider::new(1).then(vec![primary]);
    let mut harness = Harness::new(Box::new(provider), fast_options());
    harness.add_suite(SuiteSpec::new("arith", 1));
    harness.add_suite(SuiteSpec::new("pair", 2));
    harness.run_all(&mut RecordingReporter::default());
    harness
}

#[test]
fn test_report_written_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");

    finished_harness().report().save(&path).unwrap();

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["exit_code"], 1);
    assert_eq!(json["totals"]["suites_run"], 1);
    assert_eq!(json["totals"]["suites_skipped"], 1);
    assert_eq!(json["totals"]["assertions_failed"], 1);
    assert_eq!(json["suites"][0]["name"], "arith");
    assert_eq!(json["suites"][0]["tests"][1]["name"], "bar");
    assert_eq!(json["suites"][0]["tests"][1]["passed"], false);
    assert!(json["suites"][0]["elapsed_secs"].is_number());
    assert_eq!(json["skipped"][0]["name"], "pair");
    assert!(json["started_at"].is_string());
}

#[test]
fn test_report_to_unwritable_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("report.json");

    let err = finished_harness().report().save(&path).unwrap_err();
    assert!(matches!(err, HarnessError::Report { .. }));
}
