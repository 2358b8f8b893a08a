use crate::config::ConfigError;
use crate::port::PortNameError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the harness as a whole.
///
/// Per-suite problems are [`SuiteError`](crate::run::SuiteError)s and only
/// skip or abort that suite; these end the process.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid board ports: {0}")]
    PortName(#[from] PortNameError),

    #[error("No suites to run")]
    NoSuites,

    #[error("Invalid suite '{spec}': {message}")]
    InvalidSuite { spec: String, message: String },

    #[error("Cannot write report '{path}': {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    pub fn invalid_suite(spec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSuite {
            spec: spec.into(),
            message: message.into(),
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
