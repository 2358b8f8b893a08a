//! Lifecycle of a single on-device test.

use super::timing::{TimingExpectation, TimingVerdict};
use crate::protocol::{Assertion, Event};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Name shown until the board sends `TEST NAME`.
pub const UNKNOWN_TEST_NAME: &str = "Unknown";

/// What applying an event did to the run.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Renamed,
    TimingInstalled(TimingExpectation),
    /// A timing line that declares nothing (`TIME 0`).
    TimingIgnored,
    AssertionPassed,
    AssertionFailed(Assertion),
    Finished(TimingVerdict),
    /// Not a test event; the caller echoes it.
    Passthrough,
    /// The run already finished; the event changed nothing.
    Frozen,
}

/// One test as reported by the firmware.
#[derive(Debug, Clone)]
pub struct TestRun {
    name: String,
    assertions_passed: u32,
    assertions_failed: u32,
    timing: TimingExpectation,
    started: Option<Instant>,
    elapsed: Option<Duration>,
    complete: bool,
}

/// Frozen summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestReport {
    pub name: String,
    pub assertions_passed: u32,
    pub assertions_failed: u32,
    pub elapsed_secs: f64,
    pub passed: bool,
}

impl Default for TestRun {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRun {
    pub fn new() -> Self {
        Self {
            name: UNKNOWN_TEST_NAME.to_string(),
            assertions_passed: 0,
            assertions_failed: 0,
            timing: TimingExpectation::None,
            started: None,
            elapsed: None,
            complete: false,
        }
    }

    /// Record the start time and reset the counters.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        self.started = Some(now);
        self.assertions_passed = 0;
        self.assertions_failed = 0;
        self.elapsed = None;
        self.complete = false;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn assertions_passed(&self) -> u32 {
        self.assertions_passed
    }

    pub fn assertions_failed(&self) -> u32 {
        self.assertions_failed
    }

    pub fn timing(&self) -> TimingExpectation {
        self.timing
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// A test passes when none of its assertions failed.
    pub fn passed(&self) -> bool {
        self.assertions_failed == 0
    }

    /// Route one decoded event into this run.
    pub fn apply(&mut self, event: Event) -> Applied {
        if self.complete {
            warn!("Event for finished test '{}' ignored: {:?}", self.name, event);
            return Applied::Frozen;
        }

        match event {
            Event::Done => Applied::Finished(self.finish()),
            Event::TestName(name) => {
                debug!("Test renamed to '{}'", name);
                self.name = name;
                Applied::Renamed
            }
            Event::TimeExpect(_) | Event::TimeRange { .. } => {
                match TimingExpectation::from_event(&event) {
                    Some(expectation) => {
                        self.timing = expectation;
                        Applied::TimingInstalled(expectation)
                    }
                    None => Applied::TimingIgnored,
                }
            }
            Event::Assert(assertion) => {
                if assertion.passed() {
                    self.assertions_passed += 1;
                    Applied::AssertionPassed
                } else {
                    self.assertions_failed += 1;
                    Applied::AssertionFailed(assertion)
                }
            }
            Event::Unstructured(_) => Applied::Passthrough,
        }
    }

    /// Close the run, checking any timing expectation against now.
    pub fn finish(&mut self) -> TimingVerdict {
        self.finish_at(Instant::now())
    }

    /// Close the run as of `now`.
    ///
    /// A declared timing expectation counts as one more assertion, passed or
    /// failed. Calling this on a finished run changes nothing.
    pub fn finish_at(&mut self, now: Instant) -> TimingVerdict {
        if self.complete {
            return TimingVerdict::Unchecked;
        }

        let elapsed = self
            .started
            .map(|s| now.saturating_duration_since(s))
            .unwrap_or_default();
        let verdict = self.timing.evaluate(elapsed);
        match verdict {
            TimingVerdict::Unchecked => {}
            TimingVerdict::Met => self.assertions_passed += 1,
            TimingVerdict::Missed { .. } => self.assertions_failed += 1,
        }

        self.elapsed = Some(elapsed);
        self.complete = true;
        verdict
    }

    pub fn report(&self) -> TestReport {
        TestReport {
            name: self.name.clone(),
            assertions_passed: self.assertions_passed,
            assertions_failed: self.assertions_failed,
            elapsed_secs: self.elapsed.unwrap_or_default().as_secs_f64(),
            passed: self.passed(),
        }
    }
}
