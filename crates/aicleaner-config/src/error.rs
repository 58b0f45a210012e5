//! Configuration and migration error types

use std::path::PathBuf;
use thiserror::Error;

use crate::migration::MigrationState;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File read/write failed
    #[error("IO error on {path} ({operation}): {source}")]
    Io {
        path: PathBuf,
        operation: IoOperation,
        source: std::io::Error,
    },

    /// A configuration file could not be parsed
    #[error("Failed to parse {path} as {format}: {message}")]
    Parse {
        path: PathBuf,
        format: String,
        message: String,
    },

    /// The merged or loaded configuration breaks the schema
    #[error("Configuration validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    /// A backup or restored file does not match its recorded checksum
    #[error("Integrity check failed for {path}: expected {expected}, got {actual}; manual intervention required")]
    RollbackIntegrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Migration state machine refused a step
    #[error("Invalid migration transition from {from} to {to}")]
    InvalidTransition {
        from: MigrationState,
        to: MigrationState,
    },

    /// Backup manifest missing or unreadable
    #[error("Backup manifest error: {0}")]
    BackupManifest(String),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// IO operation type for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    Read,
    Write,
    Delete,
    Move,
    Metadata,
}

impl std::fmt::Display for IoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoOperation::Read => write!(f, "read"),
            IoOperation::Write => write!(f, "write"),
            IoOperation::Delete => write!(f, "delete"),
            IoOperation::Move => write!(f, "move"),
            IoOperation::Metadata => write!(f, "metadata"),
        }
    }
}

impl ConfigError {
    /// Create an IO error
    pub fn io_error(path: impl Into<PathBuf>, operation: IoOperation, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Create a parse error
    pub fn parse_error(
        path: impl Into<PathBuf>,
        format: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ConfigError::Parse {
            path: path.into(),
            format: format.into(),
            message: message.into(),
        }
    }

    /// Create a validation error with a single message
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Validation {
            errors: vec![format!("{}: {}", field.into(), message.into())],
        }
    }

    /// Whether the error needs a human to look at the files
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConfigError::RollbackIntegrity { .. })
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Serialization(err.to_string())
    }
}
