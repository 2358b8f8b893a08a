//! Top-level driver: runs suites one after another and keeps the totals.
//!
//! Boards are shared between suites, so suites never overlap: each one gets
//! exclusive channels from the [`BoardProvider`], and they are closed again
//! before the next suite starts.

use crate::channel::BoardChannel;
use crate::error::HarnessError;
use crate::port::BoardPorts;
use crate::report::{AbortedSuite, Reporter, RunReport, SkippedSuite};
use crate::run::{RunOptions, SuiteError, SuiteResult, SuiteRunner};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command as Process;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A suite to run and the number of boards it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSpec {
    pub name: String,
    /// Firmware sources, handed to the flash command.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_boards")]
    pub boards: usize,
}

fn default_boards() -> usize {
    1
}

impl SuiteSpec {
    pub fn new(name: impl Into<String>, boards: usize) -> Self {
        Self {
            name: name.into(),
            path: None,
            boards,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// `NAME:BOARDS[:PATH]`, as given on the command line.
impl FromStr for SuiteSpec {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let name = parts.next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(HarnessError::invalid_suite(s, "missing name"));
        }
        let boards = match parts.next() {
            Some(n) => n
                .trim()
                .parse()
                .map_err(|_| HarnessError::invalid_suite(s, format!("bad board count '{n}'")))?,
            None => default_boards(),
        };
        let path = parts.next().filter(|p| !p.is_empty()).map(PathBuf::from);

        Ok(Self {
            name: name.to_string(),
            path,
            boards,
        })
    }
}

/// Source of board channels.
pub trait BoardProvider {
    /// Every board wired to this host, primary first.
    fn boards(&self) -> &[BoardPorts];

    /// Open channels to `ports`, in order.
    fn open(&mut self, ports: &[BoardPorts]) -> Result<Vec<BoardChannel>, SuiteError>;
}

/// Boards on real serial ports.
#[derive(Debug, Clone)]
pub struct SerialBoardProvider {
    boards: Vec<BoardPorts>,
    read_timeout: Duration,
}

impl SerialBoardProvider {
    pub fn new(boards: Vec<BoardPorts>, read_timeout: Duration) -> Self {
        Self {
            boards,
            read_timeout,
        }
    }
}

impl BoardProvider for SerialBoardProvider {
    fn boards(&self) -> &[BoardPorts] {
        &self.boards
    }

    fn open(&mut self, ports: &[BoardPorts]) -> Result<Vec<BoardChannel>, SuiteError> {
        ports
            .iter()
            .enumerate()
            .map(|(board, p)| {
                BoardChannel::open(&p.uart, self.read_timeout).map_err(|source| SuiteError::Open {
                    board,
                    port: p.uart.clone(),
                    source,
                })
            })
            .collect()
    }
}

/// Gets boards ready for a suite, typically by flashing its firmware.
#[cfg_attr(test, mockall::automock)]
pub trait SuitePreparer {
    fn prepare(&self, suite: &SuiteSpec, boards: &[BoardPorts]) -> Result<(), SuiteError>;
}

/// For boards that are flashed out of band.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPreparer;

impl SuitePreparer for NoopPreparer {
    fn prepare(&self, _suite: &SuiteSpec, _boards: &[BoardPorts]) -> Result<(), SuiteError> {
        Ok(())
    }
}

/// Runs an external command once per board.
///
/// The argv template may use `{suite}`, `{path}`, `{board}` (1-based) and
/// `{port}` (the board's programming port).
#[derive(Debug, Clone)]
pub struct CommandPreparer {
    argv: Vec<String>,
}

impl CommandPreparer {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    pub fn render(&self, suite: &SuiteSpec, board: usize, port: &str) -> Vec<String> {
        let path = suite
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let number = (board + 1).to_string();

        self.argv
            .iter()
            .map(|arg| {
                arg.replace("{suite}", &suite.name)
                    .replace("{path}", &path)
                    .replace("{board}", &number)
                    .replace("{port}", port)
            })
            .collect()
    }
}

impl SuitePreparer for CommandPreparer {
    fn prepare(&self, suite: &SuiteSpec, boards: &[BoardPorts]) -> Result<(), SuiteError> {
        for (board, ports) in boards.iter().enumerate() {
            let argv = self.render(suite, board, &ports.programming);
            let Some((program, args)) = argv.split_first() else {
                return Ok(());
            };

            info!("Preparing board {} of '{}': {:?}", board + 1, suite.name, argv);
            let status = Process::new(program)
                .args(args)
                .status()
                .map_err(|e| SuiteError::Prepare {
                    board,
                    message: format!("cannot run '{program}': {e}"),
                })?;
            if !status.success() {
                return Err(SuiteError::Prepare {
                    board,
                    message: format!("'{program}' exited with {status}"),
                });
            }
        }
        Ok(())
    }
}

/// Decides whether a suite may proceed.
pub trait SuiteGate {
    /// Before the boards are prepared.
    fn admit(&mut self, suite: &SuiteSpec) -> bool;

    /// After preparation, before the boards are opened.
    fn ready(&mut self, suite: &SuiteSpec) -> bool;
}

/// Never asks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unattended;

impl SuiteGate for Unattended {
    fn admit(&mut self, _suite: &SuiteSpec) -> bool {
        true
    }

    fn ready(&mut self, _suite: &SuiteSpec) -> bool {
        true
    }
}

/// Cumulative counts over every suite that ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HarnessTotals {
    pub suites_run: usize,
    pub suites_skipped: usize,
    pub suites_aborted: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub assertions_passed: u64,
    pub assertions_failed: u64,
}

impl HarnessTotals {
    pub fn absorb(&mut self, result: &SuiteResult) {
        self.suites_run += 1;
        self.add_counts(result);
    }

    /// Count what an aborted suite managed before it stopped.
    pub fn absorb_aborted(&mut self, partial: &SuiteResult) {
        self.suites_aborted += 1;
        self.add_counts(partial);
    }

    fn add_counts(&mut self, result: &SuiteResult) {
        self.tests_passed += result.tests_passed();
        self.tests_failed += result.tests_failed();
        self.assertions_passed += u64::from(result.assertions_passed);
        self.assertions_failed += u64::from(result.assertions_failed);
    }

    pub fn tests(&self) -> usize {
        self.tests_passed + self.tests_failed
    }

    pub fn assertions(&self) -> u64 {
        self.assertions_passed + self.assertions_failed
    }

    /// Nonzero exactly when some assertion failed.
    pub fn exit_code(&self) -> u8 {
        u8::from(self.assertions_failed > 0)
    }
}

pub struct Harness {
    provider: Box<dyn BoardProvider>,
    preparer: Box<dyn SuitePreparer>,
    gate: Box<dyn SuiteGate>,
    options: RunOptions,
    suites: Vec<SuiteSpec>,
    results: Vec<SuiteResult>,
    skipped: Vec<SkippedSuite>,
    aborted: Vec<AbortedSuite>,
    totals: HarnessTotals,
    started_at: DateTime<Utc>,
}

impl Harness {
    pub fn new(provider: Box<dyn BoardProvider>, options: RunOptions) -> Self {
        Self {
            provider,
            preparer: Box::new(NoopPreparer),
            gate: Box::new(Unattended),
            options,
            suites: Vec::new(),
            results: Vec::new(),
            skipped: Vec::new(),
            aborted: Vec::new(),
            totals: HarnessTotals::default(),
            started_at: Utc::now(),
        }
    }

    pub fn with_preparer(mut self, preparer: Box<dyn SuitePreparer>) -> Self {
        self.preparer = preparer;
        self
    }

    pub fn with_gate(mut self, gate: Box<dyn SuiteGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn add_suite(&mut self, suite: SuiteSpec) {
        debug!("Queued suite '{}' ({} board(s))", suite.name, suite.boards);
        self.suites.push(suite);
    }

    pub fn suites(&self) -> &[SuiteSpec] {
        &self.suites
    }

    /// Run every queued suite, strictly one at a time.
    pub fn run_all(&mut self, reporter: &mut dyn Reporter) {
        self.started_at = Utc::now();
        let suites = std::mem::take(&mut self.suites);
        for suite in &suites {
            self.run_suite(suite, reporter);
        }
        self.suites = suites;
    }

    fn run_suite(&mut self, suite: &SuiteSpec, reporter: &mut dyn Reporter) {
        let available = self.provider.boards().len();
        if suite.boards == 0 {
            return self.skip(suite, "it declares no boards", reporter);
        }
        if suite.boards > available {
            let reason = format!("requires {} more board(s)", suite.boards - available);
            return self.skip(suite, &reason, reporter);
        }
        if !self.gate.admit(suite) {
            return self.skip(suite, "declined by operator", reporter);
        }

        let ports = self.provider.boards()[..suite.boards].to_vec();
        if let Err(e) = self.preparer.prepare(suite, &ports) {
            return self.skip(suite, &e.to_string(), reporter);
        }
        if !self.gate.ready(suite) {
            return self.skip(suite, "wiring not confirmed", reporter);
        }

        let outcome = self
            .provider
            .open(&ports)
            .and_then(|channels| SuiteRunner::new(&suite.name, channels, self.options.clone()))
            .and_then(|runner| runner.run(&mut *reporter));

        match outcome {
            Ok(result) => {
                self.totals.absorb(&result);
                self.results.push(result);
            }
            Err(e) if e.is_setup() => self.skip(suite, &e.to_string(), reporter),
            Err(e) => {
                warn!("Suite '{}' aborted: {}", suite.name, e);
                reporter.suite_aborted(&suite.name, &e);
                let partial = e
                    .partial()
                    .cloned()
                    .unwrap_or_else(|| SuiteResult::new(&suite.name, suite.boards));
                self.totals.absorb_aborted(&partial);
                self.aborted.push(AbortedSuite {
                    name: suite.name.clone(),
                    error: e.to_string(),
                    partial,
                });
            }
        }
    }

    fn skip(&mut self, suite: &SuiteSpec, reason: &str, reporter: &mut dyn Reporter) {
        warn!("Skipping suite '{}': {}", suite.name, reason);
        reporter.suite_skipped(&suite.name, reason);
        self.totals.suites_skipped += 1;
        self.skipped.push(SkippedSuite {
            name: suite.name.clone(),
            reason: reason.to_string(),
        });
    }

    /// Hand the cumulative totals to `reporter`.
    pub fn summarize(&self, reporter: &mut dyn Reporter) {
        reporter.summary(&self.report());
    }

    pub fn totals(&self) -> HarnessTotals {
        self.totals
    }

    pub fn results(&self) -> &[SuiteResult] {
        &self.results
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            started_at: self.started_at,
            suites: self.results.clone(),
            skipped: self.skipped.clone(),
            aborted: self.aborted.clone(),
            totals: self.totals,
            exit_code: self.exit_code(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.totals.exit_code()
    }
}
