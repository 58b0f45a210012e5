// CLI errors and the messages shown for them

use std::path::PathBuf;

use aicleaner_config::ConfigError;
use aicleaner_providers::SelectorError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] SelectorError),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("No configuration found in {}", .0.display())]
    NoConfiguration(PathBuf),

    #[error("No migration backup found in {}", .0.display())]
    NoBackup(PathBuf),

    #[error("Rollback incomplete: {failed} file(s) not restored")]
    RollbackIncomplete { failed: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::InvalidArgument { message } => {
                format!(
                    "Invalid argument: {}\n\nRun 'aicleaner --help' for usage information.",
                    message
                )
            }
            CliError::Io(e) => format!("File operation failed: {}", e),
            CliError::Config(e @ ConfigError::RollbackIntegrity { .. }) => {
                format!(
                    "{}\n\nThe backup or the restored files were changed on disk. Inspect the backup directory before retrying.",
                    e
                )
            }
            CliError::Config(e @ ConfigError::Validation { .. }) => {
                format!("{}\n\nRun 'aicleaner validate' to list every problem.", e)
            }
            CliError::Config(e) => format!("Configuration error: {}", e),
            CliError::Provider(e) => e.user_message(),
            CliError::Migration(msg) => {
                format!(
                    "Migration failed: {}\n\nLegacy files were left in place. Fix them and run 'aicleaner migrate' again.",
                    msg
                )
            }
            CliError::NoConfiguration(dir) => {
                format!(
                    "No configuration found in {}\n\nSet AICLEANER_CONFIG_DIR or pass --config-dir.",
                    dir.display()
                )
            }
            CliError::NoBackup(dir) => {
                format!(
                    "No migration backup found in {}\n\nPass the backup directory explicitly: 'aicleaner rollback <DIR>'.",
                    dir.display()
                )
            }
            CliError::RollbackIncomplete { failed } => {
                format!(
                    "Rollback incomplete: {} file(s) not restored\n\nThe backup is untouched; copy the remaining files from it by hand.",
                    failed
                )
            }
            CliError::Serialization(e) => format!("Could not render output: {}", e),
        }
    }

    /// Get technical details for verbose mode
    pub fn technical_details(&self) -> String {
        format!("{:?}", self)
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_providers_message() {
        let err = CliError::from(SelectorError::AllProvidersExhausted { attempts: Vec::new() });
        assert_eq!(err.user_message(), "AI analysis unavailable");
    }

    #[test]
    fn test_validation_message_points_to_validate() {
        let err = CliError::from(ConfigError::validation_error("name", "is required"));
        let message = err.user_message();
        assert!(message.contains("name: is required"));
        assert!(message.contains("aicleaner validate"));
    }

    #[test]
    fn test_missing_configuration_mentions_directory() {
        let err = CliError::NoConfiguration(PathBuf::from("/config"));
        assert!(err.user_message().contains("/config"));
        assert!(err.user_message().contains("AICLEANER_CONFIG_DIR"));
    }
}
