//! CLI-specific error types
//!
//! Every CLI error is fatal: the process prints it and exits 1.

use std::fmt;
use std::io;

use crate::engine::EngineError;
use crate::transform::TransformError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout, stranded output, store root)
    IoError,
    /// Operation mode not recognized
    UnknownOperationMode,
    /// Transform name not registered
    UnknownTransform,
    /// Async runtime could not start
    RuntimeError,
    /// Batch aborted by a fatal engine error
    RunFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "DOCSHIFT_CLI_CONFIG_ERROR",
            Self::IoError => "DOCSHIFT_CLI_IO_ERROR",
            Self::UnknownOperationMode => "DOCSHIFT_CLI_UNKNOWN_OPERATION_MODE",
            Self::UnknownTransform => "DOCSHIFT_CLI_UNKNOWN_TRANSFORM",
            Self::RuntimeError => "DOCSHIFT_CLI_RUNTIME_ERROR",
            Self::RunFailed => "DOCSHIFT_CLI_RUN_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn runtime_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RuntimeError, msg)
    }

    pub fn run_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RunFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<TransformError> for CliError {
    fn from(e: TransformError) -> Self {
        match e {
            TransformError::UnknownTransform(_) => {
                Self::new(CliErrorCode::UnknownTransform, e.to_string())
            }
            other => Self::config_error(other.to_string()),
        }
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::UnknownOperationMode(_) => {
                Self::new(CliErrorCode::UnknownOperationMode, e.to_string())
            }
            EngineError::InvalidOptions(_) => Self::config_error(e.to_string()),
            EngineError::Query { .. } => Self::run_failed(format!("{} ({})", e, e.code())),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
