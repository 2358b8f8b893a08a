//! Board Test Harness Library
//!
//! Drives firmware test suites running on one or more microcontroller boards
//! over serial links, and collects their pass/fail reports.
//!
//! # Modules
//!
//! - `protocol`: line codec for the board wire protocol
//! - `run`: single test runs, timing checks, multiplexing and the suite runner
//! - `channel`: line-framed serial link to one board
//! - `harness`: sequential suite driver, board providers and preparation
//! - `report`: console and JSON reporting
//! - `prompt`: bounded operator confirmation
//! - `port`: serial port abstraction (real and mock)
//! - `config`: TOML configuration with environment overrides
//! - `error`: top-level error type

pub mod channel;
pub mod config;
pub mod error;
pub mod harness;
pub mod port;
pub mod prompt;
pub mod protocol;
pub mod report;
pub mod run;

pub use channel::BoardChannel;
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
pub use error::{HarnessError, HarnessResult};
pub use harness::{
    BoardProvider, CommandPreparer, Harness, HarnessTotals, NoopPreparer, SerialBoardProvider,
    SuiteGate, SuitePreparer, SuiteSpec, Unattended,
};
pub use port::{
    BoardPorts, MockSerialPort, PortConfiguration, PortError, SerialPortAdapter, SyncSerialPort,
};
pub use protocol::{decode, AssertKind, Assertion, Command, Event, ProtocolError};
pub use report::{ConsoleReporter, RecordingReporter, Reporter, RunReport};
pub use run::{
    MultiplexPolicy, RunOptions, SuiteError, SuiteResult, SuiteRunner, SuiteState, TestReport,
    TestRun, TimingExpectation, TimingVerdict,
};
