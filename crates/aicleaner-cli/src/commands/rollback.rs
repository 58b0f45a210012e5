//! `aicleaner rollback`: restore the files a migration replaced

use std::path::PathBuf;

use aicleaner_config::{ConfigMigrator, RestoreStatus, RuntimeSettings};
use async_trait::async_trait;

use crate::commands::Command;
use crate::error::{CliError, CliResult};
use crate::output::{self, OutputStyle};

pub struct RollbackCommand {
    settings: RuntimeSettings,
    /// Backup directory; the newest backup when absent
    backup: Option<PathBuf>,
}

impl RollbackCommand {
    pub fn new(settings: RuntimeSettings, backup: Option<PathBuf>) -> Self {
        Self { settings, backup }
    }
}

#[async_trait]
impl Command for RollbackCommand {
    async fn execute(&self) -> CliResult<()> {
        let style = OutputStyle::default();
        let migrator = ConfigMigrator::from_settings(&self.settings);

        let backup = match &self.backup {
            Some(dir) => migrator.load_backup(dir).await?,
            None => migrator
                .backups()
                .latest()
                .await?
                .ok_or_else(|| CliError::NoBackup(migrator.backups().backup_root().to_path_buf()))?,
        };
        output::print_info(&format!("Restoring from {}", backup.dir.display()));

        let result = migrator.rollback_migration(&backup).await?;

        for file in &result.files {
            let line = match &file.status {
                RestoreStatus::Restored => style.success(&file.path.display().to_string()),
                RestoreStatus::Failed(reason) => {
                    style.error(&format!("{}: {}", file.path.display(), reason))
                }
            };
            output::print_plain(&line);
        }
        if let Some(aside) = &result.moved_aside {
            output::print_info(&format!("Unified file moved to {}", aside.display()));
        }
        for removed in &result.removed {
            output::print_detail(&style.list_item(&format!("removed {}", removed.display())));
        }

        if result.success {
            output::print_success("Rollback complete");
            Ok(())
        } else {
            let failed = result
                .files
                .iter()
                .filter(|f| f.status != RestoreStatus::Restored)
                .count();
            Err(CliError::RollbackIncomplete { failed })
        }
    }
}
