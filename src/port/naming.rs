//! Board port naming.
//!
//! Each board exposes two serial devices: the programmer used for flashing
//! and the UART the firmware talks on. When only programming ports are given,
//! the UART is found by shifting the port's trailing number by a fixed,
//! platform dependent offset.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortNameError {
    #[error("port '{0}' has no trailing number to derive a UART port from")]
    NoTrailingNumber(String),

    #[error("offset {offset} moves port '{port}' below zero")]
    OutOfRange { port: String, offset: i64 },

    #[error("{prog} programming port(s) but {uart} UART port(s)")]
    CountMismatch { prog: usize, uart: usize },
}

/// The two ports of one board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardPorts {
    pub programming: String,
    pub uart: String,
}

/// Offset from programming port number to UART port number on this host.
pub fn default_uart_offset() -> i64 {
    if cfg!(windows) {
        -1
    } else {
        2
    }
}

/// Derive a UART port from a programming port, e.g. `/dev/ttyACM0` -> `/dev/ttyACM2`.
pub fn derive_uart_port(prog: &str, offset: i64) -> Result<String, PortNameError> {
    let head = prog.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &prog[head.len()..];
    if digits.is_empty() {
        return Err(PortNameError::NoTrailingNumber(prog.to_string()));
    }

    let out_of_range = || PortNameError::OutOfRange {
        port: prog.to_string(),
        offset,
    };
    let number: i64 = digits.parse().map_err(|_| out_of_range())?;
    let shifted = number.checked_add(offset).filter(|n| *n >= 0).ok_or_else(out_of_range)?;

    // Keep zero padding such as `usbmodem0011`.
    let width = if digits.len() > 1 && digits.starts_with('0') {
        digits.len()
    } else {
        0
    };
    Ok(format!("{head}{shifted:0width$}"))
}

/// Pair programming and UART ports board by board.
///
/// Missing UART ports are derived with `offset`; missing programming ports
/// fall back to the UART port, for boards that are flashed out of band.
pub fn pair_ports(
    prog: &[String],
    uart: &[String],
    offset: i64,
) -> Result<Vec<BoardPorts>, PortNameError> {
    match (prog.is_empty(), uart.is_empty()) {
        (_, true) => prog
            .iter()
            .map(|p| -> Result<BoardPorts, PortNameError> {
                Ok(BoardPorts {
                    programming: p.clone(),
                    uart: derive_uart_port(p, offset)?,
                })
            })
            .collect(),
        (true, false) => Ok(uart
            .iter()
            .map(|u| BoardPorts {
                programming: u.clone(),
                uart: u.clone(),
            })
            .collect()),
        (false, false) if prog.len() != uart.len() => Err(PortNameError::CountMismatch {
            prog: prog.len(),
            uart: uart.len(),
        }),
        (false, false) => Ok(prog
            .iter()
            .zip(uart)
            .map(|(p, u)| BoardPorts {
                programming: p.clone(),
                uart: u.clone(),
            })
            .collect()),
    }
}
