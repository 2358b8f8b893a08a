//! Mock serial port implementation for testing.
//!
//! `MockSerialPort` stands in for a flashed board. Bytes can be queued up
//! front, or released only when the host writes a given command, which is how
//! firmware answers `COUNT` and `START`.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes returned by subsequent reads.
    read_queue: VecDeque<u8>,
    /// Every write, in order.
    write_log: Vec<Vec<u8>>,
    /// Replies released when the host writes the matching command.
    /// Each command maps to a FIFO of replies, one consumed per write.
    scripted: HashMap<Vec<u8>, VecDeque<Vec<u8>>>,
    should_timeout: bool,
    disconnected: bool,
    read_fault: bool,
    readiness_unsupported: bool,
    timeout: Duration,
    input_cleared: bool,
}

/// Mock serial port implementation for testing.
///
/// Clones share state, so a test can keep one handle for inspection while the
/// harness owns another.
///
/// # Example
/// ```
/// use board_test_harness::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut board = MockSerialPort::new("MOCK0");
/// board.on_write(b"COUNT\r\n", b"1\r\n");
///
/// board.write_bytes(b"COUNT\r\n").unwrap();
/// let mut buffer = [0u8; 8];
/// let n = board.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"1\r\n");
/// assert_eq!(board.get_write_log(), vec![b"COUNT\r\n".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_secs(1),
                ..Default::default()
            })),
        }
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Enqueue a sequence of lines, each terminated with `\r\n`.
    pub fn enqueue_lines(&mut self, lines: &[&str]) {
        let mut state = self.state.lock();
        for line in lines {
            state.read_queue.extend(line.as_bytes());
            state.read_queue.extend(b"\r\n");
        }
    }

    /// Release `reply` into the read queue the next time `command` is written.
    ///
    /// Registering the same command several times queues replies in order.
    pub fn on_write(&mut self, command: &[u8], reply: &[u8]) {
        self.state
            .lock()
            .scripted
            .entry(command.to_vec())
            .or_default()
            .push_back(reply.to_vec());
    }

    /// Like [`on_write`](Self::on_write), with the reply given as `\r\n` lines.
    pub fn on_write_lines(&mut self, command: &[u8], lines: &[&str]) {
        let reply: Vec<u8> = lines
            .iter()
            .flat_map(|line| line.bytes().chain(*b"\r\n"))
            .collect();
        self.on_write(command, &reply);
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Writes decoded as text, for readable assertions.
    pub fn written_text(&self) -> Vec<String> {
        self.state
            .lock()
            .write_log
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    /// Set whether the next read/write operation should time out.
    pub fn set_should_timeout(&mut self, should_timeout: bool) {
        self.state.lock().should_timeout = should_timeout;
    }

    /// Make every subsequent operation fail as if the cable were pulled.
    pub fn set_disconnected(&mut self, disconnected: bool) {
        self.state.lock().disconnected = disconnected;
    }

    /// Make reads fail while writes keep working.
    pub fn set_read_fault(&mut self, fault: bool) {
        self.state.lock().read_fault = fault;
    }

    /// Pretend the backend cannot report pending bytes.
    pub fn set_readiness_unsupported(&mut self, unsupported: bool) {
        self.state.lock().readiness_unsupported = unsupported;
    }

    /// Whether the input buffer was cleared.
    pub fn was_cleared(&self) -> bool {
        self.state.lock().input_cleared
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }
}

fn disconnected_error() -> PortError {
    PortError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "device disconnected",
    ))
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.disconnected {
            return Err(disconnected_error());
        }
        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::timeout(state.timeout));
        }

        state.write_log.push(data.to_vec());

        let reply = state
            .scripted
            .get_mut(data)
            .and_then(|replies| replies.pop_front());
        if let Some(reply) = reply {
            state.read_queue.extend(reply);
        }

        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.disconnected || state.read_fault {
            return Err(disconnected_error());
        }
        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::timeout(state.timeout));
        }

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(queued) => {
                    *byte = queued;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read == 0 {
            // Behave like a non-blocking descriptor with nothing pending.
            Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "No data available",
            )))
        } else {
            Ok(bytes_read)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.read_queue.clear();
        state.input_cleared = true;
        Ok(())
    }

    fn bytes_to_read(&self) -> Option<usize> {
        let state = self.state.lock();
        if state.readiness_unsupported {
            None
        } else {
            Some(state.read_queue.len())
        }
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
