// Command handlers for the aicleaner CLI

pub mod analyze;
pub mod backups;
pub mod detect;
pub mod migrate;
pub mod providers;
pub mod rollback;
pub mod runtime;
pub mod validate;

pub use analyze::AnalyzeCommand;
pub use backups::BackupsCommand;
pub use detect::DetectCommand;
pub use migrate::MigrateCommand;
pub use providers::ProvidersCommand;
pub use rollback::RollbackCommand;
pub use runtime::{load_runtime_config, ConfigSource, RuntimeConfig};
pub use validate::ValidateCommand;

use crate::error::CliResult;

/// Trait for command handlers
#[async_trait::async_trait]
pub trait Command: Send + Sync {
    /// Execute the command
    async fn execute(&self) -> CliResult<()>;
}
