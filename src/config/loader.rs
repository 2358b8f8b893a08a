//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "BOARD_HARNESS";

/// Config file name
const CONFIG_FILE_NAME: &str = "harness.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "BOARD_HARNESS_CONFIG";

/// A loaded configuration and where it came from.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// 1. `BOARD_HARNESS_CONFIG` (explicit path)
    /// 2. `./harness.toml`
    /// 3. `harness.toml` in the platform config directory
    /// 4. Built-in defaults
    ///
    /// Environment overrides are applied on top. The result is not validated
    /// yet: callers layer their own overrides first, then call
    /// [`Config::validate`].
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };
        apply_env_overrides(&mut config)?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Defaults plus environment overrides, no file.
    pub fn with_defaults() -> ConfigResult<Self> {
        let mut config = Config::default();
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: None,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        debug!("{} points at missing file {}", CONFIG_PATH_ENV, path.display());
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|p| p.exists())
}

/// Platform config directory for the harness.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "board-harness").map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!("Loading configuration from {}", path.display());
    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn env_var(key: &str) -> (String, Option<String>) {
    let var = format!("{ENV_PREFIX}_{key}");
    let value = std::env::var(&var).ok();
    (var, value)
}

fn env_parse<T: FromStr>(key: &str, what: &str) -> ConfigResult<Option<T>> {
    match env_var(key) {
        (var, Some(raw)) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::env_parse(var, format!("invalid {what}: '{raw}'"))),
        (_, None) => Ok(None),
    }
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env_var(key).1.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

/// Apply `BOARD_HARNESS_<SECTION>_<KEY>` overrides, e.g.
/// `BOARD_HARNESS_SERIAL_READ_TIMEOUT_MS=2000` or
/// `BOARD_HARNESS_SERIAL_UART_PORTS=/dev/ttyACM2,/dev/ttyACM3`.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Some(ports) = env_list("SERIAL_UART_PORTS") {
        config.serial.uart_ports = ports;
    }
    if let Some(ports) = env_list("SERIAL_PROG_PORTS") {
        config.serial.prog_ports = ports;
    }
    if let Some(ms) = env_parse("SERIAL_READ_TIMEOUT_MS", "timeout")? {
        config.serial.read_timeout_ms = ms;
    }
    if let Some(ms) = env_parse("SERIAL_POLL_INTERVAL_MS", "poll interval")? {
        config.serial.poll_interval_ms = ms;
    }
    if let Some(offset) = env_parse("SERIAL_UART_OFFSET", "offset")? {
        config.serial.uart_offset = Some(offset);
    }

    if let Some(secs) = env_parse("RUN_TEST_DEADLINE_SECS", "deadline")? {
        config.run.test_deadline_secs = Some(secs);
    }
    if let Some(mode) = env_parse("RUN_MULTIPLEX", "multiplex mode")? {
        config.run.multiplex = mode;
    }
    if let Some(confirm) = env_parse("RUN_CONFIRM", "flag")? {
        config.run.confirm = confirm;
    }

    if let (_, Some(level)) = env_var("LOGGING_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = env_parse("LOGGING_FORMAT", "log format")? {
        config.logging.format = format;
    }

    Ok(())
}
