//! Test execution: single tests, timing checks, multiplexing and suites.

pub mod mux;
pub mod suite;
pub mod test_run;
pub mod timing;

pub use mux::{BoardLine, ChannelFault, MultiplexPolicy, Multiplexer, MuxMode};
pub use suite::{RunOptions, SuiteError, SuiteResult, SuiteRunner, SuiteState};
pub use test_run::{Applied, TestReport, TestRun, UNKNOWN_TEST_NAME};
pub use timing::{TimingExpectation, TimingVerdict, TIMING_TOLERANCE};
