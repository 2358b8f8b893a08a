//! Core traits for serial port abstraction.
//!
//! Defines the `SerialPortAdapter` trait so that real boards and scripted
//! mocks can sit behind the same `BoardChannel`.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Baud rate mandated by the target MCU data sheet. Not negotiable.
pub const BOARD_BAUD_RATE: u32 = 9600;

/// Parameters used when opening a board link.
///
/// Framing is always 8N1 without flow control; only the timeout varies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Per-read timeout.
    pub timeout: Duration,
}

impl PortConfiguration {
    /// Board configuration with the given read timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: BOARD_BAUD_RATE,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Trait for serial port I/O operations.
///
/// Implementations are synchronous: `read_bytes` may block up to the
/// configured timeout and then fail with a "quiet" error (see
/// [`PortError::is_quiet`]).
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the serial port.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the serial port into the provided buffer.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Set the read/write timeout for this port.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Discard any unread data in the receive buffer.
    fn clear_input(&mut self) -> Result<(), PortError>;

    /// Bytes waiting in the receive buffer, if the backend can tell.
    ///
    /// Returning `None` means readiness cannot be probed without blocking,
    /// which forces the multiplexer into primary-only mode.
    fn bytes_to_read(&self) -> Option<usize> {
        None
    }
}
