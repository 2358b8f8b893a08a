//! Wire protocol spoken between the host and the boards.
//!
//! Host to board: `COUNT`, `START`, `KILL`, each terminated by `\r\n`.
//! Board to host: structured lines decoded by [`codec::decode`], plus free-form
//! telemetry that is echoed to the operator.

pub mod codec;
pub mod event;

pub use codec::{decode, decode_count, ProtocolError};
pub use event::{AssertKind, Assertion, CallSite, Event};

/// Line terminator on the wire, both directions.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Control commands the host sends to boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Ask for the number of tests the board will run.
    Count,
    /// Run the next test.
    Start,
    /// Tell a secondary board to stop participating.
    Kill,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Start => "START",
            Self::Kill => "KILL",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
