//! Suites spanning a primary and secondary boards.

use crate::common::*;
use board_test_harness::report::{RecordingReporter, Reported};
use board_test_harness::run::{MuxMode, Multiplexer};
use board_test_harness::{MultiplexPolicy, SuiteRunner};
use pretty_assertions::assert_eq;

#[test]
fn test_assertions_from_every_board_count() {
    let primary = PrimaryScript::new("P")
        .test(&["TEST NAME link", "ASSERT TRUE 1 (a)(1)", "DONE"])
        .build();
    let peer = secondary("S", &["ASSERT TRUE 0 (b)(2)"]);
    let runner =
        SuiteRunner::new("link", channels(&[primary.clone(), peer.clone()]), fast_options())
            .unwrap();

    let mut reporter = RecordingReporter::default();
    let result = runner.run(&mut reporter).unwrap();

    assert_eq!(result.boards, 2);
    assert_eq!(result.assertions_passed, 1);
    assert_eq!(result.assertions_failed, 1);
    assert!(!result.tests[0].passed);

    let failed = reporter.events.iter().find_map(|e| match e {
        Reported::AssertionFailed(a) => Some(a.site.function.clone()),
        _ => None,
    });
    assert_eq!(failed.as_deref(), Some("b"));

    assert_eq!(primary.written_text(), vec!["COUNT\r\n", "START\r\n"]);
    assert_eq!(peer.written_text(), vec!["COUNT\r\n", "KILL\r\n"]);
}

#[test]
fn test_secondary_failure_after_primary_pass_still_fails_the_test() {
    // Boards are read in turn, so the primary's pass lands first and the
    // secondary's failure arrives between its chatter and the primary's DONE.
    let primary = PrimaryScript::new("P")
        .test(&["ASSERT TRUE 1 (a)(1)", "idle", "DONE"])
        .build();
    let peer = secondary("S", &["boot", "ASSERT TRUE 0 (b)(2)"]);
    let runner =
        SuiteRunner::new("late", channels(&[primary, peer]), fast_options()).unwrap();

    let result = runner.run(&mut RecordingReporter::default()).unwrap();

    assert_eq!(result.assertions_passed, 1);
    assert_eq!(result.assertions_failed, 1);
    assert_eq!(result.tests.len(), 1);
    assert!(!result.tests[0].passed);
}

#[test]
fn test_done_from_a_secondary_finishes_the_test() {
    let primary = PrimaryScript::new("P")
        .test(&["TEST NAME relay", "ASSERT TRUE 1 (a)(1)"])
        .build();
    let peer = secondary("S", &["ASSERT TRUE 0 (b)(2)", "DONE"]);
    let runner =
        SuiteRunner::new("relay", channels(&[primary.clone(), peer.clone()]), fast_options())
            .unwrap();

    let result = runner.run(&mut RecordingReporter::default()).unwrap();

    assert_eq!(result.tests.len(), 1);
    assert_eq!(result.tests[0].name, "relay");
    assert_eq!(result.assertions_passed, 1);
    assert_eq!(result.assertions_failed, 1);
    assert_eq!(primary.written_text(), vec!["COUNT\r\n", "START\r\n"]);
    assert_eq!(peer.written_text(), vec!["COUNT\r\n", "KILL\r\n"]);
}

#[test]
fn test_secondary_telemetry_is_tagged_with_its_board() {
    let primary = PrimaryScript::new("P")
        .test(&["TEST NAME echo", "ASSERT TRUE 1 (a) (1)", "DONE"])
        .build();
    let peer = secondary("S", &["rx 4 bytes"]);
    let runner =
        SuiteRunner::new("echo", channels(&[primary, peer]), fast_options()).unwrap();

    let mut reporter = RecordingReporter::default();
    runner.run(&mut reporter).unwrap();

    assert!(reporter.events.contains(&Reported::Telemetry {
        board: 1,
        raw: "rx 4 bytes\r\n".to_string()
    }));
}

#[test]
fn test_blind_backend_degrades_to_primary_only() {
    let primary = PrimaryScript::new("P")
        .test(&["TEST NAME solo", "ASSERT TRUE 1 (a) (1)", "DONE"])
        .build();
    let mut peer = secondary("S", &["ASSERT TRUE 0 (b) (2)"]);
    peer.set_readiness_unsupported(true);

    let boards = channels(&[primary.clone(), peer.clone()]);
    let mux = Multiplexer::select(&boards, MultiplexPolicy::Auto, fast_options().poll_interval);
    assert_eq!(mux.mode(), MuxMode::PrimaryOnly);

    let runner = SuiteRunner::new("solo", boards, fast_options()).unwrap();
    let result = runner.run(&mut RecordingReporter::default()).unwrap();

    // The secondary's failure is never read.
    assert_eq!(result.assertions_passed, 1);
    assert_eq!(result.assertions_failed, 0);
    assert_eq!(peer.written_text(), vec!["COUNT\r\n", "KILL\r\n"]);
}

#[test]
fn test_primary_only_policy_ignores_secondaries() {
    let primary = PrimaryScript::new("P")
        .test(&["TEST NAME solo", "DONE"])
        .build();
    let peer = secondary("S", &["ASSERT EQ 1 2 (b) (2)"]);
    let mut options = fast_options();
    options.multiplex = MultiplexPolicy::PrimaryOnly;

    let runner = SuiteRunner::new("solo", channels(&[primary, peer.clone()]), options).unwrap();
    let result = runner.run(&mut RecordingReporter::default()).unwrap();

    assert_eq!(result.assertions_failed, 0);
    assert_eq!(peer.available_bytes(), "ASSERT EQ 1 2 (b) (2)\r\n".len());
}

#[test]
fn test_secondary_disconnect_aborts_with_its_index() {
    let primary = PrimaryScript::new("P")
        .test(&["TEST NAME t", "DONE"])
        .build();
    let mut peer = secondary("S", &["hello"]);
    peer.set_read_fault(true);

    let runner =
        SuiteRunner::new("broken", channels(&[primary, peer.clone()]), fast_options()).unwrap();
    let err = runner.run(&mut RecordingReporter::default()).unwrap_err();

    assert!(!err.is_setup());
    assert!(err.to_string().contains("board 1 (S)"));
    assert_eq!(peer.written_text(), vec!["COUNT\r\n", "KILL\r\n"]);
}
