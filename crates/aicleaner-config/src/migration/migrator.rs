//! Legacy configuration migration with backup and rollback
//!
//! A run moves through backup, merge, validation and write. Nothing a
//! legacy file contains is lost: originals are copied into a checksummed
//! backup first and renamed to `.old` only after the unified file has been
//! validated and staged.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use aicleaner_providers::ProviderConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, error, info, warn};

use super::backup::{BackupManager, MigrationBackup};
use super::legacy::{exists, LegacyConfigSet, LegacyPaths, MIGRATION_MARKER};
use super::state::{MigrationState, MigrationTracker};
use super::verifier::{compute_checksum, verify_file};
use super::writer::{with_suffix, AtomicWriter, RETIRED_SUFFIX, ROLLED_BACK_SUFFIX};
use crate::config::{ConfigLoader, ConfigMerger, MergeDecision, RuntimeSettings};
use crate::error::{ConfigError, ConfigResult, IoOperation};
use crate::types::{AiEnhancements, ConfigFormat, UnifiedConfig};

/// Outcome of [`ConfigMigrator::migrate_configuration`]
#[derive(Debug, Clone)]
pub struct MigrationResult {
    pub success: bool,
    pub state: MigrationState,
    /// Last step that completed; equals `state` unless the run failed
    pub last_completed: MigrationState,
    pub unified_config: Option<UnifiedConfig>,
    pub error_message: Option<String>,
    /// Backup taken by this run, needed for a rollback
    pub backup: Option<MigrationBackup>,
    pub warnings: Vec<String>,
    pub decisions: Vec<MergeDecision>,
    /// The marker showed an earlier run already migrated
    pub already_migrated: bool,
}

impl MigrationResult {
    fn skipped(state: MigrationState, already_migrated: bool) -> Self {
        Self {
            success: true,
            state,
            last_completed: state,
            unified_config: None,
            error_message: None,
            backup: None,
            warnings: Vec::new(),
            decisions: Vec::new(),
            already_migrated,
        }
    }
}

/// Per-file outcome of a rollback
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreStatus {
    Restored,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileRestoreStatus {
    pub path: PathBuf,
    pub status: RestoreStatus,
}

/// Outcome of [`ConfigMigrator::rollback_migration`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollbackResult {
    pub success: bool,
    pub files: Vec<FileRestoreStatus>,
    /// `.old` files and the marker removed after restoring
    pub removed: Vec<PathBuf>,
    /// Unified file moved aside because it was not an original
    pub moved_aside: Option<PathBuf>,
}

/// In-memory merge of the legacy files, used when migration cannot finish
#[derive(Debug, Clone)]
pub struct LegacyFallback {
    pub config: Value,
    pub decisions: Vec<MergeDecision>,
    pub warnings: Vec<String>,
}

impl LegacyFallback {
    /// The merged configuration, if it happens to be valid
    pub fn unified(&self) -> Option<UnifiedConfig> {
        ConfigLoader::to_unified(self.config.clone()).ok()
    }

    /// Provider entries that parse, skipping broken ones
    pub fn providers(&self) -> Vec<ProviderConfig> {
        self.config
            .pointer("/options/providers")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match serde_json::from_value(item.clone()) {
                        Ok(provider) => Some(provider),
                        Err(e) => {
                            warn!("Skipping invalid provider entry in legacy configuration: {}", e);
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Breaker settings, defaulting when absent or malformed
    pub fn ai_enhancements(&self) -> AiEnhancements {
        self.config
            .pointer("/options/ai_enhancements")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

/// Contents of the migration marker
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MigrationMarker {
    migrated_at: DateTime<Utc>,
    backup_dir: PathBuf,
    unified_path: PathBuf,
}

/// Runs legacy detection, migration and rollback for one configuration directory
pub struct ConfigMigrator {
    paths: LegacyPaths,
    backups: BackupManager,
    writer: AtomicWriter,
    tracker: Mutex<MigrationTracker>,
}

impl ConfigMigrator {
    pub fn new(paths: LegacyPaths, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            paths,
            backups: BackupManager::new(backup_root),
            writer: AtomicWriter::new(),
            tracker: Mutex::new(MigrationTracker::default()),
        }
    }

    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self::new(settings.legacy_paths(), settings.backup_root())
    }

    pub fn paths(&self) -> &LegacyPaths {
        &self.paths
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Current state of this migrator
    pub fn state(&self) -> MigrationState {
        self.tracker().state()
    }

    fn tracker(&self) -> MutexGuard<'_, MigrationTracker> {
        self.tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn advance(&self, next: MigrationState) -> ConfigResult<()> {
        self.tracker().advance(next)
    }

    /// Legacy files waiting to be migrated, `None` if there is nothing to do
    pub async fn detect_legacy_files(&self) -> ConfigResult<Option<LegacyConfigSet>> {
        LegacyConfigSet::detect(&self.paths).await
    }

    /// Merge, validate and write the unified configuration
    ///
    /// Failures are reported in the result rather than returned; legacy files
    /// are only touched once the unified configuration has validated.
    pub async fn migrate_configuration(&self) -> MigrationResult {
        let set = match self.detect_legacy_files().await {
            Ok(Some(set)) => set,
            Ok(None) => return self.nothing_to_do().await,
            Err(e) => return self.failure(e, None, Vec::new(), Vec::new()),
        };

        {
            let mut tracker = self.tracker();
            match tracker.state() {
                MigrationState::BackedUp | MigrationState::Merged | MigrationState::Validated => {
                    let from = tracker.state();
                    drop(tracker);
                    return self.failure(
                        ConfigError::InvalidTransition {
                            from,
                            to: MigrationState::BackedUp,
                        },
                        None,
                        Vec::new(),
                        Vec::new(),
                    );
                }
                _ => *tracker = MigrationTracker::default(),
            }
        }

        let unified_path = self.paths.unified();
        info!(
            files = set.files.len(),
            unified = %unified_path.display(),
            "Migrating legacy configuration"
        );
        let warnings = set.parse_warnings();

        let mut to_back_up = set.paths();
        match exists(&unified_path).await {
            Ok(true) if !to_back_up.contains(&unified_path) => to_back_up.push(unified_path.clone()),
            Ok(_) => {}
            Err(e) => return self.failure(e, None, warnings, Vec::new()),
        }
        let backup = match self.backups.create_backup(&to_back_up, &unified_path).await {
            Ok(backup) => backup,
            Err(e) => return self.failure(e, None, warnings, Vec::new()),
        };
        if let Err(e) = self.advance(MigrationState::BackedUp) {
            return self.failure(e, Some(backup), warnings, Vec::new());
        }

        let (merged, decisions) = ConfigMerger::merge(set.merge_inputs());
        if let Err(e) = self.advance(MigrationState::Merged) {
            return self.failure(e, Some(backup), warnings, decisions);
        }

        let unified = match ConfigLoader::to_unified(merged) {
            Ok(unified) => unified,
            Err(e) => return self.failure(e, Some(backup), warnings, decisions),
        };
        if let Err(e) = self.advance(MigrationState::Validated) {
            return self.failure(e, Some(backup), warnings, decisions);
        }

        if let Err(e) = self.write_unified(&set, &unified, &backup).await {
            error!(
                backup = %backup.dir.display(),
                "Writing unified configuration failed, legacy files left in place: {}",
                e
            );
            return self.failure(e, Some(backup), warnings, decisions);
        }
        if let Err(e) = self.advance(MigrationState::Written) {
            return self.failure(e, Some(backup), warnings, decisions);
        }

        info!(
            unified = %unified_path.display(),
            backup = %backup.dir.display(),
            decisions = decisions.len(),
            "Configuration migration complete"
        );
        MigrationResult {
            success: true,
            state: MigrationState::Written,
            last_completed: MigrationState::Written,
            unified_config: Some(unified),
            error_message: None,
            backup: Some(backup),
            warnings,
            decisions,
            already_migrated: false,
        }
    }

    async fn nothing_to_do(&self) -> MigrationResult {
        let marker = self.paths.marker();
        let already_migrated = exists(&marker).await.unwrap_or(false);
        let mut result = MigrationResult::skipped(self.state(), already_migrated);

        let unified_path = self.paths.unified();
        if exists(&unified_path).await.unwrap_or(false) {
            match ConfigLoader::load_unified(&unified_path).await {
                Ok(config) => result.unified_config = Some(config),
                Err(e) => result
                    .warnings
                    .push(format!("unified configuration is not valid: {}", e)),
            }
        }
        if already_migrated {
            debug!(marker = %marker.display(), "Configuration already migrated");
        } else {
            result.warnings.push("no legacy configuration found".to_string());
        }
        result
    }

    fn failure(
        &self,
        error: ConfigError,
        backup: Option<MigrationBackup>,
        warnings: Vec<String>,
        decisions: Vec<MergeDecision>,
    ) -> MigrationResult {
        let (state, last_completed) = {
            let mut tracker = self.tracker();
            tracker.fail();
            (tracker.state(), tracker.last_completed())
        };
        warn!(
            state = %state,
            last_completed = %last_completed,
            "Configuration migration failed: {}",
            error
        );
        MigrationResult {
            success: false,
            state,
            last_completed,
            unified_config: None,
            error_message: Some(error.to_string()),
            backup,
            warnings,
            decisions,
            already_migrated: false,
        }
    }

    async fn write_unified(
        &self,
        set: &LegacyConfigSet,
        config: &UnifiedConfig,
        backup: &MigrationBackup,
    ) -> ConfigResult<()> {
        let content = ConfigLoader::serialize(config, ConfigFormat::Yaml)?;
        let target = self.paths.unified();
        let created = !set.paths().contains(&target) && !exists(&target).await?;
        let staged = self.writer.stage(&target, content.as_bytes()).await?;

        let mut moved = Vec::with_capacity(set.files.len());
        for file in &set.files {
            match self.writer.set_aside(&file.path, RETIRED_SUFFIX).await {
                Ok(aside) => moved.push((file.path.clone(), aside)),
                Err(e) => {
                    self.writer.discard(&staged).await;
                    self.put_back(&moved).await;
                    return Err(e);
                }
            }
        }
        if let Err(e) = self.writer.commit(&staged, &target).await {
            self.writer.discard(&staged).await;
            self.put_back(&moved).await;
            return Err(e);
        }

        if let Err(e) = self.finish_write(&target, content.as_bytes(), backup).await {
            if created {
                if let Err(remove) = fs::remove_file(&target).await {
                    warn!(path = %target.display(), "Could not remove unified file: {}", remove);
                }
            }
            self.put_back(&moved).await;
            return Err(e);
        }
        Ok(())
    }

    async fn finish_write(
        &self,
        target: &Path,
        content: &[u8],
        backup: &MigrationBackup,
    ) -> ConfigResult<()> {
        verify_file(target, &compute_checksum(content)).await?;

        let marker = MigrationMarker {
            migrated_at: Utc::now(),
            backup_dir: backup.dir.clone(),
            unified_path: target.to_path_buf(),
        };
        self.writer
            .write(&self.paths.marker(), &serde_json::to_vec_pretty(&marker)?)
            .await
    }

    /// Undo `.old` renames after a failed write, newest first
    async fn put_back(&self, moved: &[(PathBuf, PathBuf)]) {
        for (original, aside) in moved.iter().rev() {
            match fs::rename(aside, original).await {
                Ok(()) => debug!(path = %original.display(), "Restored legacy file after failed write"),
                Err(e) => error!(
                    path = %original.display(),
                    aside = %aside.display(),
                    "Could not restore legacy file: {}",
                    e
                ),
            }
        }
    }

    /// Re-open a backup from its manifest
    pub async fn load_backup(&self, dir: &Path) -> ConfigResult<MigrationBackup> {
        MigrationBackup::load(dir).await
    }

    /// Restore the pre-migration files from `backup`
    ///
    /// Every copy is checked before anything is restored, and every restored
    /// file is checked again; a mismatch is an integrity error that needs
    /// manual intervention. Other per-file failures are reported in the
    /// result.
    pub async fn rollback_migration(&self, backup: &MigrationBackup) -> ConfigResult<RollbackResult> {
        let marker = backup
            .unified_path
            .parent()
            .map(|parent| parent.join(MIGRATION_MARKER))
            .unwrap_or_else(|| PathBuf::from(MIGRATION_MARKER));

        {
            let mut tracker = self.tracker();
            if tracker.state() == MigrationState::NotStarted {
                // Fresh process: infer the outcome of the earlier run from disk
                let inferred = if marker.exists() {
                    MigrationState::Written
                } else {
                    MigrationState::Failed
                };
                *tracker = MigrationTracker::starting_at(inferred);
            }
            if !tracker.state().can_transition_to(MigrationState::RolledBack) {
                return Err(ConfigError::InvalidTransition {
                    from: tracker.state(),
                    to: MigrationState::RolledBack,
                });
            }
        }

        backup.verify().await?;
        info!(backup = %backup.dir.display(), files = backup.entries.len(), "Rolling back migration");

        let mut result = RollbackResult::default();
        let unified = &backup.unified_path;
        if !backup.contains(unified) && exists(unified).await? {
            match self.writer.set_aside(unified, ROLLED_BACK_SUFFIX).await {
                Ok(aside) => result.moved_aside = Some(aside),
                Err(e) => result.files.push(FileRestoreStatus {
                    path: unified.clone(),
                    status: RestoreStatus::Failed(e.to_string()),
                }),
            }
        }

        for entry in &backup.entries {
            let original = &entry.original_path;
            let restored = match fs::read(backup.copy_path(entry)).await {
                Ok(content) => self.writer.write(original, &content).await,
                Err(e) => Err(ConfigError::io_error(backup.copy_path(entry), IoOperation::Read, e)),
            };
            if let Err(e) = restored {
                warn!(path = %original.display(), "Failed to restore file: {}", e);
                result.files.push(FileRestoreStatus {
                    path: original.clone(),
                    status: RestoreStatus::Failed(e.to_string()),
                });
                continue;
            }

            verify_file(original, &entry.checksum).await?;
            result.files.push(FileRestoreStatus {
                path: original.clone(),
                status: RestoreStatus::Restored,
            });

            let retired = with_suffix(original, RETIRED_SUFFIX);
            if exists(&retired).await? {
                fs::remove_file(&retired)
                    .await
                    .map_err(|e| ConfigError::io_error(&retired, IoOperation::Delete, e))?;
                result.removed.push(retired);
            }
        }

        result.success = result
            .files
            .iter()
            .all(|f| f.status == RestoreStatus::Restored);

        if result.success {
            if exists(&marker).await? {
                fs::remove_file(&marker)
                    .await
                    .map_err(|e| ConfigError::io_error(&marker, IoOperation::Delete, e))?;
                result.removed.push(marker);
            }
            self.advance(MigrationState::RolledBack)?;
            info!(restored = result.files.len(), "Rollback complete");
        } else {
            error!(backup = %backup.dir.display(), "Rollback incomplete; some files were not restored");
        }

        Ok(result)
    }

    /// Merge the legacy files in memory without writing anything
    pub async fn load_legacy_merged(&self) -> ConfigResult<LegacyFallback> {
        let set = LegacyConfigSet::scan(&self.paths).await?;
        let mut warnings = set.parse_warnings();
        if set.is_empty() {
            warnings.push("no legacy configuration found".to_string());
        }
        let (config, decisions) = ConfigMerger::merge(set.merge_inputs());
        Ok(LegacyFallback {
            config,
            decisions,
            warnings,
        })
    }
}
