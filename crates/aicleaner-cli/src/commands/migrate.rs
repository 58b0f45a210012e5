//! `aicleaner migrate`: merge the legacy files into the unified file

use aicleaner_config::{
    ConfigMigrator, ConfigValidator, MergeDecision, MigrationResult, RuntimeSettings,
};
use async_trait::async_trait;

use crate::commands::Command;
use crate::error::{CliError, CliResult};
use crate::output::{self, OutputStyle};

pub struct MigrateCommand {
    settings: RuntimeSettings,
    dry_run: bool,
}

impl MigrateCommand {
    pub fn new(settings: RuntimeSettings, dry_run: bool) -> Self {
        Self { settings, dry_run }
    }

    /// Show what a migration would produce without touching any file
    async fn preview(&self, migrator: &ConfigMigrator) -> CliResult<()> {
        let style = OutputStyle::default();
        let fallback = migrator.load_legacy_merged().await?;
        for warning in &fallback.warnings {
            output::print_warning(warning);
        }
        print_decisions(&style, &fallback.decisions, true);

        let errors = ConfigValidator::new().collect_errors(&fallback.config);
        if errors.is_empty() {
            output::print_success(&format!(
                "Merged configuration is valid and would be written to {}",
                migrator.paths().unified().display()
            ));
        } else {
            output::print_plain(&style.section("Validation errors"));
            for error in &errors {
                output::print_plain(&style.list_item(&error.to_string()));
            }
            output::print_warning("Migration would fail; legacy files would be left untouched");
        }
        Ok(())
    }

    fn report(&self, migrator: &ConfigMigrator, result: &MigrationResult) {
        let style = OutputStyle::default();
        for warning in &result.warnings {
            output::print_warning(warning);
        }
        if result.already_migrated {
            output::print_success("Configuration already migrated; nothing to do");
            return;
        }
        print_decisions(&style, &result.decisions, false);
        if let Some(backup) = &result.backup {
            output::print_plain(&style.key_value("backup", &backup.dir.display().to_string()));
        }
        if result.success && result.unified_config.is_some() {
            output::print_success(&format!(
                "Unified configuration written to {}",
                migrator.paths().unified().display()
            ));
        }
    }
}

fn print_decisions(style: &OutputStyle, decisions: &[MergeDecision], always: bool) {
    if decisions.is_empty() {
        return;
    }
    let print: fn(&str) = if always {
        output::print_plain
    } else {
        output::print_detail
    };
    print(&style.section("Merge decisions"));
    for decision in decisions {
        print(&style.list_item(&format!(
            "{} = {} (from {})",
            decision.key, decision.value, decision.source
        )));
    }
}

#[async_trait]
impl Command for MigrateCommand {
    async fn execute(&self) -> CliResult<()> {
        let migrator = ConfigMigrator::from_settings(&self.settings);
        if self.dry_run {
            return self.preview(&migrator).await;
        }

        let result = migrator.migrate_configuration().await;
        self.report(&migrator, &result);
        if result.success {
            Ok(())
        } else {
            Err(CliError::Migration(
                result
                    .error_message
                    .unwrap_or_else(|| format!("stopped after {}", result.last_completed)),
            ))
        }
    }
}
