//! `aicleaner detect`: list legacy files and whether a migration is pending

use aicleaner_config::{LegacyConfigSet, RuntimeSettings};
use async_trait::async_trait;

use crate::commands::Command;
use crate::error::CliResult;
use crate::output::{self, OutputStyle};

pub struct DetectCommand {
    settings: RuntimeSettings,
}

impl DetectCommand {
    pub fn new(settings: RuntimeSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Command for DetectCommand {
    async fn execute(&self) -> CliResult<()> {
        let style = OutputStyle::default();
        let paths = self.settings.legacy_paths();
        let set = LegacyConfigSet::scan(&paths).await?;
        let marker = paths.marker();

        output::print_plain(&style.section("Legacy configuration"));
        if set.is_empty() {
            output::print_info("No legacy configuration files found");
        }
        for file in &set.files {
            let status = match &file.parse_error {
                None => "parsed".to_string(),
                Some(e) => format!("unparseable ({})", e),
            };
            output::print_plain(&style.list_item(&format!(
                "{} [{}] modified {}",
                file.path.display(),
                status,
                file.modified.format("%Y-%m-%d %H:%M:%S UTC")
            )));
        }

        output::print_plain(&style.key_value("unified file", &paths.unified().display().to_string()));
        if marker.exists() {
            output::print_success(&format!(
                "Already migrated (marker at {})",
                marker.display()
            ));
        } else if !set.is_empty() {
            output::print_warning("Migration pending; run 'aicleaner migrate'");
        }
        Ok(())
    }
}
