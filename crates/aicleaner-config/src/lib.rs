//! AICleaner configuration
//!
//! Loads and validates the unified add-on configuration and migrates the
//! three legacy files older releases wrote:
//!
//! - `config.yaml` in the configuration root
//! - `aicleaner/config.json`
//! - `aicleaner/config.yaml`
//!
//! Migration backs every file up with a checksum before anything is
//! rewritten, and a backup can be restored byte for byte with
//! [`ConfigMigrator::rollback_migration`].
//!
//! ```ignore
//! use aicleaner_config::{ConfigMigrator, RuntimeSettings};
//!
//! let settings = RuntimeSettings::from_env();
//! let migrator = ConfigMigrator::from_settings(&settings);
//! let result = migrator.migrate_configuration().await;
//! if !result.success {
//!     eprintln!("{}", result.error_message.unwrap_or_default());
//! }
//! ```

pub mod config;
pub mod error;
pub mod migration;
pub mod types;

pub use config::{
    ConfigLoader, ConfigMerger, ConfigValidator, MergeDecision, MergeInput, RuntimeSettings,
    ValidationError, DEFAULT_CONFIG_DIR,
};
pub use error::{ConfigError, ConfigResult, IoOperation};
pub use migration::{
    AtomicWriter, BackupEntry, BackupManager, ConfigMigrator, FileRestoreStatus, LegacyConfigSet,
    LegacyFallback, LegacyFile, LegacyPaths, LegacySource, MigrationBackup, MigrationResult,
    MigrationState, MigrationTracker, RestoreStatus, RollbackResult, MIGRATION_MARKER,
};
pub use types::{AddonOptions, AiEnhancements, ConfigFormat, MqttConfig, UnifiedConfig, ZoneConfig};
