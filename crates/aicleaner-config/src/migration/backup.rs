//! Pre-migration backups with checksums and a manifest
//!
//! Each backup is a directory holding byte copies of the files a migration
//! is about to touch plus `manifest.json`. Backups are never deleted by the
//! migrator.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use super::verifier::{compute_checksum, verify_file};
use super::writer::AtomicWriter;
use crate::error::{ConfigError, ConfigResult, IoOperation};

/// File name of the manifest inside a backup directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// One file captured in a backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Where the file lived before migration
    pub original_path: PathBuf,
    /// Name of the copy inside the backup directory
    pub backup_file: String,
    /// SHA-256 of the original bytes
    pub checksum: String,
    pub size: u64,
}

/// A timestamped snapshot of the pre-migration state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationBackup {
    pub id: String,
    /// Directory holding the copies; not stored in the manifest
    #[serde(skip)]
    pub dir: PathBuf,
    pub created_at: DateTime<Utc>,
    /// Unified file the migration was going to write
    pub unified_path: PathBuf,
    pub entries: Vec<BackupEntry>,
}

impl MigrationBackup {
    /// Location of an entry's copy
    pub fn copy_path(&self, entry: &BackupEntry) -> PathBuf {
        self.dir.join(&entry.backup_file)
    }

    /// Whether a path was captured by this backup
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|e| e.original_path == path)
    }

    /// Check every copy against its recorded checksum
    pub async fn verify(&self) -> ConfigResult<()> {
        for entry in &self.entries {
            verify_file(&self.copy_path(entry), &entry.checksum).await?;
        }
        Ok(())
    }

    /// Re-open a backup from its manifest
    pub async fn load(dir: &Path) -> ConfigResult<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&manifest_path).await.map_err(|e| {
            ConfigError::BackupManifest(format!("cannot read {}: {}", manifest_path.display(), e))
        })?;
        let mut backup: MigrationBackup = serde_json::from_str(&content).map_err(|e| {
            ConfigError::BackupManifest(format!("invalid {}: {}", manifest_path.display(), e))
        })?;
        backup.dir = dir.to_path_buf();
        Ok(backup)
    }
}

/// Creates and lists migration backups under one root directory
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_root: PathBuf,
    writer: AtomicWriter,
}

impl BackupManager {
    /// Creates a new BackupManager instance
    pub fn new(backup_root: impl Into<PathBuf>) -> Self {
        BackupManager {
            backup_root: backup_root.into(),
            writer: AtomicWriter::new(),
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Copy `files` into a new timestamped backup directory
    ///
    /// Each copy is checked against the checksum of the original bytes before
    /// the manifest is written, so a backup with a manifest is complete.
    pub async fn create_backup(
        &self,
        files: &[PathBuf],
        unified_path: &Path,
    ) -> ConfigResult<MigrationBackup> {
        let created_at = Utc::now();
        let id = format!("migration-{}", created_at.format("%Y%m%d_%H%M%S_%f"));
        let dir = self.backup_root.join(&id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ConfigError::io_error(&dir, IoOperation::Write, e))?;

        let mut entries = Vec::with_capacity(files.len());
        for (index, path) in files.iter().enumerate() {
            let content = fs::read(path)
                .await
                .map_err(|e| ConfigError::io_error(path, IoOperation::Read, e))?;
            let checksum = compute_checksum(&content);
            let backup_file = format!(
                "{:02}-{}",
                index,
                path.file_name().and_then(|n| n.to_str()).unwrap_or("file")
            );

            let copy = dir.join(&backup_file);
            fs::write(&copy, &content)
                .await
                .map_err(|e| ConfigError::io_error(&copy, IoOperation::Write, e))?;
            verify_file(&copy, &checksum).await?;

            entries.push(BackupEntry {
                original_path: path.clone(),
                backup_file,
                checksum,
                size: content.len() as u64,
            });
        }

        let backup = MigrationBackup {
            id,
            dir,
            created_at,
            unified_path: unified_path.to_path_buf(),
            entries,
        };
        let manifest = serde_json::to_vec_pretty(&backup)?;
        self.writer
            .write(&backup.dir.join(MANIFEST_FILE), &manifest)
            .await?;

        info!(
            backup = %backup.dir.display(),
            files = backup.entries.len(),
            "Created migration backup"
        );
        Ok(backup)
    }

    /// All readable backups, newest first
    pub async fn list_backups(&self) -> ConfigResult<Vec<MigrationBackup>> {
        let mut entries = match fs::read_dir(&self.backup_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ConfigError::io_error(&self.backup_root, IoOperation::Read, e)),
        };

        let mut backups = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ConfigError::io_error(&self.backup_root, IoOperation::Read, e))?
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match MigrationBackup::load(&path).await {
                Ok(backup) => backups.push(backup),
                Err(e) => warn!(path = %path.display(), "Skipping unreadable backup: {}", e),
            }
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// Most recent readable backup
    pub async fn latest(&self) -> ConfigResult<Option<MigrationBackup>> {
        Ok(self.list_backups().await?.into_iter().next())
    }
}
