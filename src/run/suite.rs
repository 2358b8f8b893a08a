//! Suite runner: drives every test of one suite across its boards.
//!
//! ```text
//! Idle -> AwaitingCount -> Running(0) -> ... -> Running(n-1) -> Draining -> Complete
//! ```
//!
//! `COUNT` goes to every board and the primary's reply sizes the suite. Each
//! test starts with `START` on the primary; lines from all boards are then
//! decoded and applied to the current test until some board sends `DONE`.
//! Afterwards the secondaries get `KILL` and every channel is closed.
//!
//! Without a configured test deadline a board that never sends `DONE` stalls
//! the suite forever. Each individual read still times out, but the runner
//! keeps waiting.

use super::mux::{BoardLine, ChannelFault, MultiplexPolicy, Multiplexer};
use super::test_run::{Applied, TestReport, TestRun};
use crate::channel::BoardChannel;
use crate::port::PortError;
use crate::protocol::{decode, decode_count, Command, ProtocolError};
use crate::report::{serialize_secs, Reporter};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Knobs for one suite run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub multiplex: MultiplexPolicy,
    /// Sleep between readiness sweeps when no board has data.
    pub poll_interval: Duration,
    /// Give up on a test that has not sent `DONE` after this long.
    pub test_deadline: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            multiplex: MultiplexPolicy::Auto,
            poll_interval: Duration::from_millis(5),
            test_deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteState {
    Idle,
    AwaitingCount,
    /// Zero-based index of the test in progress.
    Running(usize),
    Draining,
    Complete,
}

/// Errors that end a suite early.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("suite has no boards")]
    NoBoards,

    #[error("cannot open board {board} on {port}: {source}")]
    Open {
        board: usize,
        port: String,
        #[source]
        source: PortError,
    },

    #[error("preparing board {board} failed: {message}")]
    Prepare { board: usize, message: String },

    #[error("link failed before testing started: {0}")]
    Unresponsive(#[source] ChannelFault),

    #[error("no reply to COUNT from {port} within {timeout:?}")]
    CountTimeout { port: String, timeout: Duration },

    #[error("invalid test count from primary board: {source}")]
    InvalidCount {
        #[source]
        source: ProtocolError,
    },

    #[error("link failed mid-suite: {0}")]
    Channel(#[from] ChannelFault),

    #[error("test {test} ('{name}') sent no DONE within {deadline:?}")]
    DeadlineExceeded {
        test: usize,
        name: String,
        deadline: Duration,
    },

    /// A running suite stopped early. `partial` holds every finished test
    /// plus the assertions the interrupted test had already reported.
    #[error("{cause} (after {} finished test(s))", .partial.tests.len())]
    Aborted {
        #[source]
        cause: Box<SuiteError>,
        partial: Box<SuiteResult>,
    },
}

impl SuiteError {
    /// Setup errors mean the suite never ran; the rest abort a running suite.
    pub fn is_setup(&self) -> bool {
        !matches!(
            self,
            Self::Channel(_) | Self::DeadlineExceeded { .. } | Self::Aborted { .. }
        )
    }

    /// What the suite had tallied before it stopped, if it got that far.
    pub fn partial(&self) -> Option<&SuiteResult> {
        match self {
            Self::Aborted { partial, .. } => Some(&**partial),
            _ => None,
        }
    }
}

/// Tally of one suite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteResult {
    pub name: String,
    pub boards: usize,
    pub tests: Vec<TestReport>,
    pub assertions_passed: u32,
    pub assertions_failed: u32,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl SuiteResult {
    pub fn new(name: impl Into<String>, boards: usize) -> Self {
        Self {
            name: name.into(),
            boards,
            tests: Vec::new(),
            assertions_passed: 0,
            assertions_failed: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Fold a finished test into the tally.
    pub fn absorb(&mut self, run: &TestRun) {
        self.assertions_passed += run.assertions_passed();
        self.assertions_failed += run.assertions_failed();
        self.tests.push(run.report());
    }

    /// Count the assertions of a test that never sent `DONE`.
    pub fn absorb_unfinished(&mut self, run: &TestRun) {
        self.assertions_passed += run.assertions_passed();
        self.assertions_failed += run.assertions_failed();
    }

    pub fn tests_passed(&self) -> usize {
        self.tests.iter().filter(|t| t.passed).count()
    }

    pub fn tests_failed(&self) -> usize {
        self.tests.len() - self.tests_passed()
    }
}

/// Runs one suite over channels it owns exclusively.
#[derive(Debug)]
pub struct SuiteRunner {
    name: String,
    channels: Vec<BoardChannel>,
    options: RunOptions,
    state: SuiteState,
}

impl SuiteRunner {
    /// `channels[0]` is the primary board.
    pub fn new(
        name: impl Into<String>,
        channels: Vec<BoardChannel>,
        options: RunOptions,
    ) -> Result<Self, SuiteError> {
        if channels.is_empty() {
            return Err(SuiteError::NoBoards);
        }
        Ok(Self {
            name: name.into(),
            channels,
            options,
            state: SuiteState::Idle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SuiteState {
        self.state
    }

    fn transition(&mut self, next: SuiteState) {
        debug!("Suite '{}': {:?} -> {:?}", self.name, self.state, next);
        self.state = next;
    }

    /// Run the suite to completion.
    ///
    /// Channels are drained and closed whether or not the run succeeds. A
    /// failure after testing started comes back as [`SuiteError::Aborted`]
    /// carrying the partial tally.
    pub fn run(mut self, reporter: &mut dyn Reporter) -> Result<SuiteResult, SuiteError> {
        let started = Instant::now();
        reporter.suite_started(&self.name, self.channels.len());

        let mut result = SuiteResult::new(&self.name, self.channels.len());
        let outcome = match self.request_count() {
            Ok(count) => self.run_tests(count, &mut result, reporter),
            Err(e) => Err(e),
        };
        self.drain();
        result.elapsed = started.elapsed();

        match outcome {
            Ok(()) => {}
            Err(e) if e.is_setup() => return Err(e),
            Err(cause) => {
                return Err(SuiteError::Aborted {
                    cause: Box::new(cause),
                    partial: Box::new(result),
                })
            }
        }
        self.transition(SuiteState::Complete);

        info!(
            "Suite '{}' complete in {:.3} s: {} assertion(s) passed, {} failed",
            self.name,
            result.elapsed.as_secs_f64(),
            result.assertions_passed,
            result.assertions_failed
        );
        reporter.suite_finished(&result);
        Ok(result)
    }

    fn request_count(&mut self) -> Result<u32, SuiteError> {
        self.transition(SuiteState::AwaitingCount);

        let mut first_fault = None;
        for (board, channel) in self.channels.iter_mut().enumerate() {
            if let Err(e) = channel.send(Command::Count) {
                warn!("Could not send COUNT to board {} ({}): {}", board, channel.name(), e);
                if first_fault.is_none() {
                    first_fault = Some(ChannelFault::new(board, channel, e));
                }
            }
        }
        if let Some(fault) = first_fault {
            return Err(SuiteError::Unresponsive(fault));
        }

        let primary = &mut self.channels[0];
        let reply = match primary.read_line() {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                return Err(SuiteError::CountTimeout {
                    port: primary.name().to_string(),
                    timeout: primary.timeout(),
                })
            }
            Err(e) => return Err(SuiteError::Unresponsive(ChannelFault::new(0, primary, e))),
        };

        let count = decode_count(&reply).map_err(|source| SuiteError::InvalidCount { source })?;
        info!("Suite '{}' reports {} test(s)", self.name, count);
        Ok(count)
    }

    fn run_tests(
        &mut self,
        count: u32,
        result: &mut SuiteResult,
        reporter: &mut dyn Reporter,
    ) -> Result<(), SuiteError> {
        let mut mux = Multiplexer::select(
            &self.channels,
            self.options.multiplex,
            self.options.poll_interval,
        );

        for index in 0..count as usize {
            self.transition(SuiteState::Running(index));

            let mut run = TestRun::new();
            if let Err(e) = self.channels[0].send(Command::Start) {
                return Err(ChannelFault::new(0, &self.channels[0], e).into());
            }
            run.start();

            let deadline = self.options.test_deadline.map(|d| Instant::now() + d);
            while !run.is_complete() {
                let line = match mux.next_line(&mut self.channels, deadline) {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        warn!("Test {} of suite '{}' missed its deadline", index + 1, self.name);
                        result.absorb_unfinished(&run);
                        return Err(SuiteError::DeadlineExceeded {
                            test: index + 1,
                            name: run.name().to_string(),
                            deadline: self.options.test_deadline.unwrap_or_default(),
                        });
                    }
                    Err(fault) => {
                        result.absorb_unfinished(&run);
                        return Err(fault.into());
                    }
                };
                route(&mut run, line, reporter);
            }

            reporter.test_finished(&run.report());
            result.absorb(&run);
        }

        Ok(())
    }

    /// Release the boards: `KILL` to every secondary, then close all.
    fn drain(&mut self) {
        if matches!(self.state, SuiteState::Draining | SuiteState::Complete) {
            return;
        }
        self.transition(SuiteState::Draining);

        for (board, channel) in self.channels.iter_mut().enumerate().skip(1) {
            if let Err(e) = channel.send(Command::Kill) {
                warn!("Could not send KILL to board {} ({}): {}", board, channel.name(), e);
            }
        }
        for channel in &mut self.channels {
            channel.close();
        }
    }
}

/// Decode one line and apply it to the current test.
fn route(run: &mut TestRun, line: BoardLine, reporter: &mut dyn Reporter) {
    debug!("board {}: {:?}", line.board, line.text);

    let event = match decode(&line.text) {
        Ok(event) => event,
        Err(err) => {
            warn!("Board {}: {}", line.board, err);
            reporter.protocol_error(line.board, &err);
            return;
        }
    };

    match run.apply(event) {
        Applied::Renamed => reporter.test_named(run.name()),
        Applied::AssertionFailed(assertion) => reporter.assertion_failed(&assertion),
        Applied::Finished(verdict) if verdict.is_missed() => reporter.timing_missed(&verdict),
        Applied::Passthrough => reporter.telemetry(line.board, &line.text),
        _ => {}
    }
}
