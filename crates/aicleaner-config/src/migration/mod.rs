//! Migration of legacy configuration files into the unified file

pub mod backup;
pub mod legacy;
pub mod migrator;
pub mod state;
pub mod verifier;
pub mod writer;

pub use backup::{BackupEntry, BackupManager, MigrationBackup, MANIFEST_FILE};
pub use legacy::{LegacyConfigSet, LegacyFile, LegacyPaths, LegacySource, MIGRATION_MARKER};
pub use migrator::{
    ConfigMigrator, FileRestoreStatus, LegacyFallback, MigrationResult, RestoreStatus,
    RollbackResult,
};
pub use state::{MigrationState, MigrationTracker};
pub use verifier::{compute_checksum, file_checksum, verify_file};
pub use writer::{AtomicWriter, RETIRED_SUFFIX, ROLLED_BACK_SUFFIX};
