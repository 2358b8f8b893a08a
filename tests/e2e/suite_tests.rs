//! Single-board suites driven straight through `SuiteRunner`.

use crate::common::*;
use board_test_harness::report::{RecordingReporter, Reported};
use board_test_harness::run::SuiteState;
use board_test_harness::{AssertKind, SuiteError, SuiteRunner, TimingVerdict};
use pretty_assertions::assert_eq;
use std::time::Duration;

#[test]
fn test_pass_and_fail_are_tallied_per_test() {
    let primary = PrimaryScript::new("P")
        .test(&["TEST NAME foo", "ASSERT EQ 4 4 (foo) (3)", "DONE"])
        .test(&["TEST NAME bar", "ASSERT EQ 4 5 (bar) (7)", "DONE"])
        .build();
    let runner = SuiteRunner::new("arith", channels(&[primary.clone()]), fast_options()).unwrap();

    let mut reporter = RecordingReporter::default();
    let result = runner.run(&mut reporter).unwrap();

    assert_eq!(result.tests.len(), 2);
    assert_eq!(result.tests_passed(), 1);
    assert_eq!(result.tests_failed(), 1);
    assert_eq!(result.assertions_passed, 1);
    assert_eq!(result.assertions_failed, 1);
    assert_eq!(result.tests[0].name, "foo");
    assert!(result.tests[0].passed);
    assert_eq!(result.tests[1].name, "bar");
    assert!(!result.tests[1].passed);

    let failures: Vec<_> = reporter
        .events
        .iter()
        .filter_map(|e| match e {
            Reported::AssertionFailed(a) => Some(a.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, AssertKind::Eq(4, 5));
    assert_eq!(failures[0].site.function, "bar");
    assert_eq!(failures[0].site.line, 7);

    assert_eq!(primary.written_text(), vec!["COUNT\r\n", "START\r\n", "START\r\n"]);
}

#[test]
fn test_empty_suite_sends_no_start() {
    let primary = PrimaryScript::new("P").build();
    let runner = SuiteRunner::new("empty", channels(&[primary.clone()]), fast_options()).unwrap();

    let mut reporter = RecordingReporter::default();
    let result = runner.run(&mut reporter).unwrap();

    assert!(result.tests.is_empty());
    assert_eq!(result.assertions_passed + result.assertions_failed, 0);
    assert_eq!(primary.written_text(), vec!["COUNT\r\n"]);
    assert!(matches!(reporter.events.last(), Some(Reported::SuiteFinished(_))));
}

#[test]
fn test_unnamed_test_keeps_default_name() {
    let primary = PrimaryScript::new("P")
        .test(&["ASSERT FALSE 0 (anon) (1)", "DONE"])
        .build();
    let runner = SuiteRunner::new("anon", channels(&[primary]), fast_options()).unwrap();

    let result = runner.run(&mut RecordingReporter::default()).unwrap();
    assert_eq!(result.tests[0].name, "Unknown");
    assert!(result.tests[0].passed);
}

#[test]
fn test_timing_counts_as_an_assertion() {
    let primary = PrimaryScript::new("P")
        .test(&["TEST NAME quick", "TIME MIN 0 MAX 5", "DONE"])
        .test(&["TEST NAME slow", "TIME 5", "DONE"])
        .build();
    let runner = SuiteRunner::new("timing", channels(&[primary]), fast_options()).unwrap();

    let mut reporter = RecordingReporter::default();
    let result = runner.run(&mut reporter).unwrap();

    assert_eq!(result.assertions_passed, 1);
    assert_eq!(result.assertions_failed, 1);
    assert!(result.tests[0].passed);
    assert!(!result.tests[1].passed);

    let missed: Vec<_> = reporter
        .events
        .iter()
        .filter(|e| matches!(e, Reported::TimingMissed(TimingVerdict::Missed { .. })))
        .collect();
    assert_eq!(missed.len(), 1);
}

#[test]
fn test_floating_point_compared_at_wire_precision() {
    let primary = PrimaryScript::new("P")
        .test(&[
            "TEST NAME fp",
            "ASSERT FP EQ 1.0001 1.0004 (fp) (1)",
            "ASSERT FP NEQ 1.000 1.002 (fp) (2)",
            "ASSERT FP GT 2.5 2.4996 (fp) (3)",
            "DONE",
        ])
        .build();
    let runner = SuiteRunner::new("fp", channels(&[primary]), fast_options()).unwrap();

    let result = runner.run(&mut RecordingReporter::default()).unwrap();
    assert_eq!(result.assertions_passed, 2);
    assert_eq!(result.assertions_failed, 1);
}

#[test]
fn test_telemetry_and_garbage_are_reported_not_counted() {
    let primary = PrimaryScript::new("P")
        .test(&[
            "TEST NAME chatty",
            "adc channel 3 = 512",
            "ASSERT GT 3 (chatty) (4)",
            "ASSERT STR EQ ok ok (chatty) (5)",
            "DONE",
        ])
        .build();
    let runner = SuiteRunner::new("chatty", channels(&[primary]), fast_options()).unwrap();

    let mut reporter = RecordingReporter::default();
    let result = runner.run(&mut reporter).unwrap();

    assert_eq!(result.assertions_passed, 1);
    assert_eq!(result.assertions_failed, 0);
    assert!(reporter.events.contains(&Reported::Telemetry {
        board: 0,
        raw: "adc channel 3 = 512\r\n".to_string()
    }));
    assert!(reporter
        .events
        .iter()
        .any(|e| matches!(e, Reported::ProtocolError { board: 0, .. })));
}

#[test]
fn test_lines_after_done_belong_to_next_test() {
    let primary = PrimaryScript::new("P")
        .test(&["TEST NAME first", "DONE", "ASSERT TRUE 0 (late) (9)"])
        .test(&["TEST NAME second", "DONE"])
        .build();
    let runner = SuiteRunner::new("spill", channels(&[primary]), fast_options()).unwrap();

    let result = runner.run(&mut RecordingReporter::default()).unwrap();
    assert!(result.tests[0].passed);
    assert_eq!(result.tests[1].name, "second");
    assert_eq!(result.tests[1].assertions_failed, 1);
}

#[test]
fn test_count_errors_are_setup_failures() {
    let garbled = PrimaryScript::new("P").build_with_count("many");
    let runner = SuiteRunner::new("garbled", channels(&[garbled]), fast_options()).unwrap();
    let err = runner.run(&mut RecordingReporter::default()).unwrap_err();
    assert!(matches!(err, SuiteError::InvalidCount { .. }));
    assert!(err.is_setup());

    let silent = board_test_harness::port::MockSerialPort::new("P");
    let runner = SuiteRunner::new("silent", channels(&[silent]), fast_options()).unwrap();
    let err = runner.run(&mut RecordingReporter::default()).unwrap_err();
    assert!(matches!(err, SuiteError::CountTimeout { .. }));
}

#[test]
fn test_deadline_stops_a_hung_test() {
    let primary = PrimaryScript::new("P")
        .test(&["TEST NAME hang", "ASSERT TRUE 1 (hang) (2)"])
        .build();
    let mut options = fast_options();
    options.test_deadline = Some(Duration::from_millis(50));
    let runner = SuiteRunner::new("hang", channels(&[primary]), options).unwrap();
    assert_eq!(runner.state(), SuiteState::Idle);

    let err = runner.run(&mut RecordingReporter::default()).unwrap_err();
    match err {
        SuiteError::Aborted { ref cause, .. } => match **cause {
            SuiteError::DeadlineExceeded { test, ref name, .. } => {
                assert_eq!(test, 1);
                assert_eq!(name, "hang");
            }
            ref other => panic!("expected deadline error, got {other:?}"),
        },
        ref other => panic!("expected an aborted suite, got {other:?}"),
    }
    assert!(!err.is_setup());

    // The hung test never finished, but its passing assertion still counts.
    let partial = err.partial().unwrap();
    assert!(partial.tests.is_empty());
    assert_eq!(partial.assertions_passed, 1);
}
