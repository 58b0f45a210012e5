//! `aicleaner backups`: list migration backups

use aicleaner_config::{BackupManager, RuntimeSettings};
use async_trait::async_trait;

use crate::commands::Command;
use crate::error::CliResult;
use crate::output::{self, OutputStyle};

pub struct BackupsCommand {
    settings: RuntimeSettings,
}

impl BackupsCommand {
    pub fn new(settings: RuntimeSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Command for BackupsCommand {
    async fn execute(&self) -> CliResult<()> {
        let style = OutputStyle::default();
        let manager = BackupManager::new(self.settings.backup_root());
        let backups = manager.list_backups().await?;

        if backups.is_empty() {
            output::print_info(&format!(
                "No backups in {}",
                manager.backup_root().display()
            ));
            return Ok(());
        }

        for backup in &backups {
            output::print_plain(&style.list_item(&format!(
                "{}  {}  {} file(s)",
                backup.dir.display(),
                backup.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                backup.entries.len()
            )));
            for entry in &backup.entries {
                output::print_detail(&format!(
                    "      {} ({} bytes, sha256 {})",
                    entry.original_path.display(),
                    entry.size,
                    entry.checksum
                ));
            }
        }
        Ok(())
    }
}
