//! Operator-facing output.
//!
//! The engine never prints. Everything the operator sees goes through a
//! [`Reporter`]: [`ConsoleReporter`] writes the familiar text console,
//! [`RecordingReporter`] keeps events for assertions in tests, and
//! [`RunReport`] is the machine-readable document written with `--report`.

use crate::error::HarnessError;
use crate::harness::HarnessTotals;
use crate::protocol::{Assertion, ProtocolError};
use crate::run::{SuiteError, SuiteResult, TestReport, TimingVerdict};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Width of the separator line between tests and suites.
pub const SEPARATOR_WIDTH: usize = 80;

/// Serialize a duration as fractional seconds.
pub fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Sink for everything that happens during a run.
pub trait Reporter {
    fn suite_started(&mut self, name: &str, boards: usize);
    fn test_named(&mut self, name: &str);
    fn assertion_failed(&mut self, assertion: &Assertion);
    fn timing_missed(&mut self, verdict: &TimingVerdict);
    /// A line carried a protocol prefix but broke its grammar.
    fn protocol_error(&mut self, board: usize, error: &ProtocolError);
    /// Free-form board output, terminator included.
    fn telemetry(&mut self, board: usize, raw: &str);
    fn test_finished(&mut self, report: &TestReport);
    fn suite_finished(&mut self, result: &SuiteResult);
    fn suite_skipped(&mut self, name: &str, reason: &str);
    fn suite_aborted(&mut self, name: &str, error: &SuiteError);
    fn summary(&mut self, report: &RunReport);
}

/// Plain-text console in the format operators are used to.
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) {
        if let Err(e) = self.out.write_fmt(args).and_then(|()| self.out.flush()) {
            warn!("Console write failed: {}", e);
        }
    }

    fn separator(&mut self) {
        self.emit(format_args!("{}\n", "-".repeat(SEPARATOR_WIDTH)));
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn suite_started(&mut self, name: &str, boards: usize) {
        self.separator();
        self.emit(format_args!("Test suite '{name}' on {boards} board(s)\n"));
    }

    fn test_named(&mut self, name: &str) {
        self.emit(format_args!("Test: {name}\n"));
    }

    fn assertion_failed(&mut self, assertion: &Assertion) {
        self.emit(format_args!(
            "{}\n    Error: {} failed ({})\n",
            assertion.site,
            assertion.kind.label(),
            assertion.kind.operands()
        ));
    }

    fn timing_missed(&mut self, verdict: &TimingVerdict) {
        self.emit(format_args!("    Error: {verdict}\n"));
    }

    fn protocol_error(&mut self, board: usize, error: &ProtocolError) {
        self.emit(format_args!("    Warning: board {board}: {error}\n"));
    }

    fn telemetry(&mut self, _board: usize, raw: &str) {
        self.emit(format_args!("{raw}"));
    }

    fn test_finished(&mut self, report: &TestReport) {
        let outcome = if report.passed { "Passed" } else { "Failed" };
        self.emit(format_args!("Test complete - {outcome}\n"));
        self.separator();
    }

    fn suite_finished(&mut self, result: &SuiteResult) {
        let total = result.tests.len();
        self.emit(format_args!(
            "Test suite '{}' complete\n    Time elapsed: {:.3} s\n    Passed: {} / {}\n    Failed: {} / {}\n    Assertions: {} passed, {} failed\n",
            result.name,
            result.elapsed.as_secs_f64(),
            result.tests_passed(),
            total,
            result.tests_failed(),
            total,
            result.assertions_passed,
            result.assertions_failed
        ));
        self.separator();
    }

    fn suite_skipped(&mut self, name: &str, reason: &str) {
        self.emit(format_args!("Skipping test suite '{name}', {reason}.\n"));
    }

    fn suite_aborted(&mut self, name: &str, error: &SuiteError) {
        self.emit(format_args!("Test suite '{name}' aborted: {error}\n"));
        self.separator();
    }

    fn summary(&mut self, report: &RunReport) {
        let totals = &report.totals;
        if totals.assertions() > 0 {
            self.emit(format_args!(
                "Testing summary:\n    Total passed: {} / {}\n    Total failed: {} / {}\n    Assertions: {} passed, {} failed\n",
                totals.tests_passed,
                totals.tests(),
                totals.tests_failed,
                totals.tests(),
                totals.assertions_passed,
                totals.assertions_failed
            ));
        }
        for skipped in &report.skipped {
            self.emit(format_args!("    Skipped: {} ({})\n", skipped.name, skipped.reason));
        }
        for aborted in &report.aborted {
            self.emit(format_args!("    Aborted: {} ({})\n", aborted.name, aborted.error));
        }
    }
}

/// One reporter call, as captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reported {
    SuiteStarted { name: String, boards: usize },
    TestNamed(String),
    AssertionFailed(Assertion),
    TimingMissed(TimingVerdict),
    ProtocolError { board: usize, error: ProtocolError },
    Telemetry { board: usize, raw: String },
    TestFinished(TestReport),
    SuiteFinished(SuiteResult),
    SuiteSkipped { name: String, reason: String },
    SuiteAborted { name: String, error: String },
    Summary(HarnessTotals),
}

/// Keeps every call in order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<Reported>,
}

impl RecordingReporter {
    /// Names of the suites that were skipped, in order.
    pub fn skipped(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Reported::SuiteSkipped { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn finished_tests(&self) -> Vec<&TestReport> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Reported::TestFinished(report) => Some(report),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn suite_started(&mut self, name: &str, boards: usize) {
        self.events.push(Reported::SuiteStarted {
            name: name.to_string(),
            boards,
        });
    }

    fn test_named(&mut self, name: &str) {
        self.events.push(Reported::TestNamed(name.to_string()));
    }

    fn assertion_failed(&mut self, assertion: &Assertion) {
        self.events.push(Reported::AssertionFailed(assertion.clone()));
    }

    fn timing_missed(&mut self, verdict: &TimingVerdict) {
        self.events.push(Reported::TimingMissed(*verdict));
    }

    fn protocol_error(&mut self, board: usize, error: &ProtocolError) {
        self.events.push(Reported::ProtocolError {
            board,
            error: error.clone(),
        });
    }

    fn telemetry(&mut self, board: usize, raw: &str) {
        self.events.push(Reported::Telemetry {
            board,
            raw: raw.to_string(),
        });
    }

    fn test_finished(&mut self, report: &TestReport) {
        self.events.push(Reported::TestFinished(report.clone()));
    }

    fn suite_finished(&mut self, result: &SuiteResult) {
        self.events.push(Reported::SuiteFinished(result.clone()));
    }

    fn suite_skipped(&mut self, name: &str, reason: &str) {
        self.events.push(Reported::SuiteSkipped {
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }

    fn suite_aborted(&mut self, name: &str, error: &SuiteError) {
        self.events.push(Reported::SuiteAborted {
            name: name.to_string(),
            error: error.to_string(),
        });
    }

    fn summary(&mut self, report: &RunReport) {
        self.events.push(Reported::Summary(report.totals));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSuite {
    pub name: String,
    pub reason: String,
}

/// A suite that stopped early, with whatever it finished before the fault.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbortedSuite {
    pub name: String,
    pub error: String,
    pub partial: SuiteResult,
}

/// Everything a run produced, for `--report`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub suites: Vec<SuiteResult>,
    pub skipped: Vec<SkippedSuite>,
    pub aborted: Vec<AbortedSuite>,
    pub totals: HarnessTotals,
    pub exit_code: u8,
}

impl RunReport {
    pub fn to_json(&self) -> Result<String, HarnessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), HarnessError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| HarnessError::Report {
            path: path.to_path_buf(),
            source,
        })
    }
}
