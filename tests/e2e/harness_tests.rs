//! Whole harness runs: several suites, skips, aborts and the exit status.

use crate::common::*;
use board_test_harness::port::MockSerialPort;
use board_test_harness::report::{RecordingReporter, Reported};
use board_test_harness::{ConsoleReporter, Harness, SuiteGate, SuiteSpec};
use pretty_assertions::assert_eq;
use std::time::Duration;

#[test]
fn test_failed_assertion_sets_exit_code() {
    let primary = PrimaryScript::new("P")
        .test(&["TEST NAME foo", "ASSERT EQ 4 4 (foo) (3)", "DONE"])
        .test(&["TEST NAME bar", "ASSERT EQ 4 5 (bar) (7)", "DONE"])
        .build();
    let provider = ScriptedProvider::new(1).then(vec![primary]);
    let mut harness = Harness::new(Box::new(provider), fast_options());
    harness.add_suite(SuiteSpec::new("arith", 1));

    harness.run_all(&mut RecordingReporter::default());

    let totals = harness.totals();
    assert_eq!(totals.suites_run, 1);
    assert_eq!(totals.tests_passed, 1);
    assert_eq!(totals.tests_failed, 1);
    assert_eq!(totals.assertions_passed, 1);
    assert_eq!(totals.assertions_failed, 1);
    assert_eq!(harness.exit_code(), 1);
}

#[test]
fn test_clean_run_exits_zero() {
    let provider = ScriptedProvider::new(2)
        .then(vec![passing_primary("MOCK0", "first")])
        .then(vec![passing_primary("MOCK0", "second"), secondary("MOCK1", &[])])
        .then(vec![PrimaryScript::new("MOCK0").build()]);
    let mut harness = Harness::new(Box::new(provider), fast_options());
    harness.add_suite(SuiteSpec::new("one", 1));
    harness.add_suite(SuiteSpec::new("two", 2));
    harness.add_suite(SuiteSpec::new("none", 1));

    let mut reporter = RecordingReporter::default();
    harness.run_all(&mut reporter);
    harness.summarize(&mut reporter);

    assert_eq!(harness.exit_code(), 0);
    let totals = harness.totals();
    assert_eq!(totals.suites_run, 3);
    assert_eq!(totals.tests(), 2);
    assert_eq!(totals.assertions(), 2);
    assert_eq!(reporter.events.last(), Some(&Reported::Summary(totals)));

    let names: Vec<&str> = harness.results().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["one", "two", "none"]);
}

#[test]
fn test_insufficient_boards_skips_and_continues() {
    let provider = ScriptedProvider::new(1).then(vec![passing_primary("MOCK0", "only")]);
    let mut harness = Harness::new(Box::new(provider), fast_options());
    harness.add_suite(SuiteSpec::new("pair", 2));
    harness.add_suite(SuiteSpec::new("solo", 1));

    let mut reporter = RecordingReporter::default();
    harness.run_all(&mut reporter);

    assert!(reporter.events.contains(&Reported::SuiteSkipped {
        name: "pair".to_string(),
        reason: "requires 1 more board(s)".to_string(),
    }));
    assert_eq!(harness.totals().suites_skipped, 1);
    assert_eq!(harness.totals().suites_run, 1);
    assert_eq!(harness.exit_code(), 0);
}

#[test]
fn test_setup_failure_skips_suite() {
    let provider = ScriptedProvider::new(1)
        .then(vec![PrimaryScript::new("MOCK0").build_with_count("ready")])
        .then(vec![passing_primary("MOCK0", "after")]);
    let mut harness = Harness::new(Box::new(provider), fast_options());
    harness.add_suite(SuiteSpec::new("garbled", 1));
    harness.add_suite(SuiteSpec::new("fine", 1));

    let mut reporter = RecordingReporter::default();
    harness.run_all(&mut reporter);

    assert_eq!(reporter.skipped(), vec!["garbled"]);
    assert_eq!(harness.results().len(), 1);
    assert_eq!(harness.results()[0].name, "fine");
}

#[test]
fn test_mid_suite_fault_aborts_and_next_suite_runs() {
    let mut flaky_peer = secondary("MOCK1", &["boot"]);
    flaky_peer.set_read_fault(true);
    let provider = ScriptedProvider::new(2)
        .then(vec![
            PrimaryScript::new("MOCK0").test(&["TEST NAME t"]).build(),
            flaky_peer,
        ])
        .then(vec![passing_primary("MOCK0", "after")]);
    let mut harness = Harness::new(Box::new(provider), fast_options());
    harness.add_suite(SuiteSpec::new("flaky", 2));
    harness.add_suite(SuiteSpec::new("steady", 1));

    let mut reporter = RecordingReporter::default();
    harness.run_all(&mut reporter);

    assert!(reporter
        .events
        .iter()
        .any(|e| matches!(e, Reported::SuiteAborted { name, .. } if name == "flaky")));
    let totals = harness.totals();
    assert_eq!(totals.suites_aborted, 1);
    assert_eq!(totals.suites_run, 1);
    assert_eq!(harness.report().aborted[0].name, "flaky");
}

#[test]
fn test_failures_before_an_abort_still_fail_the_run() {
    let primary = PrimaryScript::new("MOCK0")
        .test(&["TEST NAME bad", "ASSERT EQ 4 5 (bad) (7)", "DONE"])
        .test(&["TEST NAME hang"])
        .build();
    let provider = ScriptedProvider::new(1).then(vec![primary]);
    let mut options = fast_options();
    options.test_deadline = Some(Duration::from_millis(50));
    let mut harness = Harness::new(Box::new(provider), options);
    harness.add_suite(SuiteSpec::new("stuck", 1));

    harness.run_all(&mut RecordingReporter::default());

    let totals = harness.totals();
    assert_eq!(totals.suites_run, 0);
    assert_eq!(totals.suites_aborted, 1);
    assert_eq!(totals.tests_failed, 1);
    assert_eq!(totals.assertions_failed, 1);
    assert_eq!(harness.exit_code(), 1);

    let aborted = &harness.report().aborted[0];
    assert_eq!(aborted.partial.tests[0].name, "bad");
    assert!(aborted.error.contains("after 1 finished test(s)"));
}

struct NotWired;

impl SuiteGate for NotWired {
    fn admit(&mut self, _suite: &SuiteSpec) -> bool {
        true
    }

    fn ready(&mut self, _suite: &SuiteSpec) -> bool {
        false
    }
}

#[test]
fn test_unconfirmed_wiring_skips_before_opening() {
    let provider = ScriptedProvider::new(1);
    let mut harness = Harness::new(Box::new(provider), fast_options()).with_gate(Box::new(NotWired));
    harness.add_suite(SuiteSpec::new("uart", 1));

    let mut reporter = RecordingReporter::default();
    harness.run_all(&mut reporter);

    assert_eq!(
        harness.report().skipped[0].reason,
        "wiring not confirmed".to_string()
    );
    assert_eq!(harness.totals().suites_run, 0);
}

#[test]
fn test_console_transcript() {
    let primary = PrimaryScript::new("MOCK0")
        .test(&["TEST NAME foo", "ASSERT EQ 4 4 (foo) (3)", "DONE"])
        .test(&["TEST NAME bar", "ASSERT EQ 4 5 (bar) (7)", "DONE"])
        .build();
    let provider = ScriptedProvider::new(1).then(vec![primary]);
    let mut harness = Harness::new(Box::new(provider), fast_options());
    harness.add_suite(SuiteSpec::new("arith", 1));
    harness.add_suite(SuiteSpec::new("pair", 2));

    let mut console = ConsoleReporter::new(Vec::new());
    harness.run_all(&mut console);
    harness.summarize(&mut console);
    let out = String::from_utf8(console.into_inner()).unwrap();

    assert!(out.contains("Test suite 'arith' on 1 board(s)\n"));
    assert!(out.contains("Test: foo\nTest complete - Passed\n"));
    assert!(out.contains(
        "Test: bar\nIn function 'bar', line 7\n    Error: ASSERT_EQ failed (4, 5)\nTest complete - Failed\n"
    ));
    assert!(out.contains("    Passed: 1 / 2\n    Failed: 1 / 2\n"));
    assert!(out.contains("Skipping test suite 'pair', requires 1 more board(s).\n"));
    assert!(out.contains("Testing summary:\n    Total passed: 1 / 2\n    Total failed: 1 / 2\n"));
    assert!(out.contains("    Skipped: pair (requires 1 more board(s))\n"));
}

#[test]
fn test_console_summary_omitted_without_assertions() {
    let provider = ScriptedProvider::new(1).then(vec![PrimaryScript::new("MOCK0").build()]);
    let mut harness = Harness::new(Box::new(provider), fast_options());
    harness.add_suite(SuiteSpec::new("empty", 1));

    let mut console = ConsoleReporter::new(Vec::new());
    harness.run_all(&mut console);
    harness.summarize(&mut console);
    let out = String::from_utf8(console.into_inner()).unwrap();

    assert!(out.contains("Test suite 'empty' complete\n"));
    assert!(!out.contains("Testing summary"));
}

#[test]
fn test_three_board_suite() {
    let provider = ScriptedProvider::new(3).then(vec![
        passing_primary("MOCK0", "t"),
        MockSerialPort::new("MOCK1"),
        MockSerialPort::new("MOCK2"),
    ]);
    let mut harness = Harness::new(Box::new(provider), fast_options());
    harness.add_suite(SuiteSpec::new("trio", 3));

    harness.run_all(&mut RecordingReporter::default());

    let result = &harness.results()[0];
    assert_eq!(result.boards, 3);
    assert_eq!(result.assertions_passed, 1);
}
