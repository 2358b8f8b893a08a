//! Port abstraction layer for board serial links.
//!
//! Provides the adapter trait the harness talks through, a real backend on top
//! of the `serialport` crate, and a scripted mock used by the test suites.

pub mod error;
pub mod mock;
pub mod naming;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::MockSerialPort;
pub use naming::{default_uart_offset, derive_uart_port, pair_ports, BoardPorts, PortNameError};
pub use sync_port::SyncSerialPort;
pub use traits::{PortConfiguration, SerialPortAdapter, BOARD_BAUD_RATE};
