//! Configuration schema definitions.
//!
//! Every section has defaults, so an empty file (or no file) is valid.

use super::error::{ConfigError, ConfigResult};
use crate::harness::SuiteSpec;
use crate::port::default_uart_offset;
use crate::run::{MultiplexPolicy, RunOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub run: RunConfig,
    pub flash: FlashConfig,
    pub logging: LoggingConfig,
    pub suites: Vec<SuiteSpec>,
}

impl Config {
    /// Reject values the harness cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.read_timeout_ms == 0 {
            return Err(ConfigError::validation("serial.read_timeout_ms", "must be positive"));
        }
        if self.serial.poll_interval_ms == 0 {
            return Err(ConfigError::validation("serial.poll_interval_ms", "must be positive"));
        }
        if let Some(secs) = self.run.test_deadline_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(ConfigError::validation(
                    "run.test_deadline_secs",
                    format!("must be a positive number of seconds, got {secs}"),
                ));
            }
        }
        let prog = self.serial.prog_ports.len();
        let uart = self.serial.uart_ports.len();
        if prog > 0 && uart > 0 && prog != uart {
            return Err(ConfigError::validation(
                "serial.uart_ports",
                format!("{uart} UART port(s) for {prog} programming port(s)"),
            ));
        }
        if let Some(suite) = self.suites.iter().find(|s| s.name.trim().is_empty()) {
            return Err(ConfigError::validation(
                "suites",
                format!("suite with {} board(s) has no name", suite.boards),
            ));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Engine options derived from the `[serial]` and `[run]` sections.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            multiplex: self.run.multiplex,
            poll_interval: self.serial.poll_interval(),
            test_deadline: self.run.test_deadline(),
        }
    }
}

/// Board serial links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// UART ports, primary board first.
    pub uart_ports: Vec<String>,
    /// Programming ports, primary board first.
    pub prog_ports: Vec<String>,
    /// Per-line read timeout in milliseconds.
    pub read_timeout_ms: u64,
    /// Sleep between readiness sweeps in milliseconds.
    pub poll_interval_ms: u64,
    /// Programming port number to UART port number; platform default if unset.
    pub uart_offset: Option<i64>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            uart_ports: Vec::new(),
            prog_ports: Vec::new(),
            read_timeout_ms: 10_000,
            poll_interval_ms: 5,
            uart_offset: None,
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn uart_offset(&self) -> i64 {
        self.uart_offset.unwrap_or_else(default_uart_offset)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Abort a test that has not finished after this many seconds.
    /// Unset waits forever.
    pub test_deadline_secs: Option<f64>,
    pub multiplex: MultiplexPolicy,
    /// Ask the operator before each suite.
    pub confirm: bool,
}

impl RunConfig {
    pub fn test_deadline(&self) -> Option<Duration> {
        self.test_deadline_secs
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// External flashing step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashConfig {
    /// Argv template run once per board. Empty means the boards are already
    /// flashed.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}
