//! Harness configuration.
//!
//! A TOML file with `[serial]`, `[run]`, `[flash]`, `[logging]` and
//! `[[suites]]` sections, resolved in this order:
//!
//! 1. `BOARD_HARNESS_CONFIG` environment variable (explicit path)
//! 2. `./harness.toml`
//! 3. `harness.toml` in the platform config directory
//!    (`~/.config/board-harness/` on Linux, `%APPDATA%\board-harness\config\` on Windows)
//! 4. Built-in defaults
//!
//! Individual values can then be overridden with
//! `BOARD_HARNESS_<SECTION>_<KEY>`, e.g. `BOARD_HARNESS_RUN_MULTIPLEX=primary-only`.
//! Command-line flags win over both. The merged result is validated once, after
//! the flags are in.
//!
//! # Example
//!
//! ```toml
//! [serial]
//! prog_ports = ["/dev/ttyACM0", "/dev/ttyACM1"]
//! read_timeout_ms = 10000
//!
//! [run]
//! test_deadline_secs = 60.0
//!
//! [flash]
//! command = ["make", "-C", "{path}", "upload", "BOARD={board}", "PORT={port}"]
//!
//! [[suites]]
//! name = "can"
//! path = "harness_tests/can"
//! boards = 2
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, FlashConfig, LogFormat, LoggingConfig, RunConfig, SerialConfig};
