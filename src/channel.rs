//! One serial link to one board, framed into text lines.
//!
//! A `BoardChannel` is either open (it owns an adapter) or closed (it owns
//! nothing). There is no half-open state: every I/O call on a closed channel
//! fails with [`PortError::NotOpen`].

use crate::port::{PortConfiguration, PortError, SerialPortAdapter, SyncSerialPort};
use crate::protocol::{Command, LINE_TERMINATOR};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Back-off between retries when a backend reports `WouldBlock`.
const READ_BACKOFF: Duration = Duration::from_millis(1);

/// Longest run of bytes held back while waiting for a newline.
pub const MAX_LINE_LEN: usize = 4096;

pub struct BoardChannel {
    name: String,
    port: Option<Box<dyn SerialPortAdapter>>,
    /// Bytes received but not yet returned as a complete line.
    pending: Vec<u8>,
    timeout: Duration,
}

impl BoardChannel {
    /// Open a board at the fixed board baud rate.
    ///
    /// Anything the board printed before we attached (boot banners, a
    /// previous run's tail) is discarded.
    pub fn open(port_name: &str, timeout: Duration) -> Result<Self, PortError> {
        let mut port = SyncSerialPort::open(port_name, PortConfiguration::with_timeout(timeout))?;
        port.clear_input()?;
        debug!("Opened board channel {}", port_name);
        Self::from_adapter(Box::new(port), timeout)
    }

    /// Wrap an already-open adapter.
    pub fn from_adapter(
        mut port: Box<dyn SerialPortAdapter>,
        timeout: Duration,
    ) -> Result<Self, PortError> {
        port.set_timeout(timeout)?;
        Ok(Self {
            name: port.name().to_string(),
            port: Some(port),
            pending: Vec::new(),
            timeout,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPortAdapter>, PortError> {
        self.port.as_mut().ok_or(PortError::NotOpen)
    }

    /// Write `text` followed by the wire terminator.
    pub fn write_line(&mut self, text: &str) -> Result<(), PortError> {
        let mut data = text.as_bytes().to_vec();
        if !text.ends_with(LINE_TERMINATOR) {
            data.extend_from_slice(LINE_TERMINATOR.as_bytes());
        }

        let port = self.port_mut()?;
        let mut written = 0;
        while written < data.len() {
            match port.write_bytes(&data[written..])? {
                0 => {
                    return Err(PortError::Io(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "board accepted no bytes",
                    )))
                }
                n => written += n,
            }
        }
        trace!("{} <- {:?}", self.name, text);
        Ok(())
    }

    pub fn send(&mut self, command: Command) -> Result<(), PortError> {
        debug!("Sending {} to {}", command, self.name);
        self.write_line(command.as_str())
    }

    /// Whether a line can be read without waiting for more input.
    ///
    /// `None` means the backend cannot report pending bytes; the caller has
    /// to block on `read_line` to find out.
    pub fn readiness(&self) -> Option<bool> {
        let Some(port) = self.port.as_ref() else {
            return Some(false);
        };
        if self.line_ready() {
            return Some(true);
        }
        port.bytes_to_read().map(|n| n > 0)
    }

    /// Read one line, terminator included, waiting at most the channel timeout.
    ///
    /// Returns `Ok(None)` when nothing complete arrived in time; partial input
    /// stays buffered for the next call. A board that streams more than
    /// [`MAX_LINE_LEN`] bytes without a newline has that run handed out as a
    /// line of its own. Any other failure means the link is broken.
    pub fn read_line(&mut self) -> Result<Option<String>, PortError> {
        let deadline = Instant::now() + self.timeout;
        let mut chunk = [0u8; 256];

        loop {
            if let Some(line) = self.take_line() {
                trace!("{} -> {:?}", self.name, line);
                return Ok(Some(line));
            }

            let port = self.port_mut()?;
            let received = match port.read_bytes(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.is_quiet() => 0,
                Err(e) => return Err(e),
            };
            self.pending.extend_from_slice(&chunk[..received]);
            if self.line_ready() {
                continue;
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            if received == 0 {
                std::thread::sleep(READ_BACKOFF.min(deadline - now));
            }
        }
    }

    fn line_ready(&self) -> bool {
        self.pending.len() >= MAX_LINE_LEN || memchr::memchr(b'\n', &self.pending).is_some()
    }

    fn take_line(&mut self) -> Option<String> {
        let end = match memchr::memchr(b'\n', &self.pending) {
            Some(newline) => newline + 1,
            None if self.pending.len() >= MAX_LINE_LEN => {
                debug!("{}: no newline in {} bytes, splitting", self.name, MAX_LINE_LEN);
                MAX_LINE_LEN
            }
            None => return None,
        };
        let bytes: Vec<u8> = self.pending.drain(..end).collect();
        // Encoding glitches on the link are dropped rather than rejected.
        Some(String::from_utf8_lossy(&bytes).replace(char::REPLACEMENT_CHARACTER, ""))
    }

    /// Release the port. Closing twice is harmless.
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("Closed board channel {}", self.name);
        }
        self.pending.clear();
    }
}

impl std::fmt::Debug for BoardChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardChannel")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .field("pending_bytes", &self.pending.len())
            .finish()
    }
}
