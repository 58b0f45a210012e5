//! `aicleaner validate`: check a configuration file against the schema

use std::path::PathBuf;

use aicleaner_config::{ConfigError, ConfigLoader, ConfigValidator, RuntimeSettings};
use async_trait::async_trait;
use serde_json::Value;

use crate::commands::Command;
use crate::error::CliResult;
use crate::output::{self, OutputStyle};

pub struct ValidateCommand {
    settings: RuntimeSettings,
    /// File to check; the unified file when absent
    file: Option<PathBuf>,
}

impl ValidateCommand {
    pub fn new(settings: RuntimeSettings, file: Option<PathBuf>) -> Self {
        Self { settings, file }
    }

    fn target(&self) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| self.settings.legacy_paths().unified())
    }
}

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self) -> CliResult<()> {
        let style = OutputStyle::default();
        let path = self.target();
        let mapping = ConfigLoader::load_mapping(&path).await?;
        let value = Value::Object(mapping);

        let errors = ConfigValidator::new().collect_errors(&value);
        if !errors.is_empty() {
            output::print_plain(&style.section(&format!("{}", path.display())));
            for error in &errors {
                output::print_plain(&style.list_item(&error.to_string()));
            }
            return Err(ConfigError::Validation {
                errors: errors.iter().map(|e| e.to_string()).collect(),
            }
            .into());
        }

        let config = ConfigLoader::to_unified(value)?;
        output::print_success(&format!("{} is valid", path.display()));
        output::print_plain(&style.key_value("name", &format!("{} {}", config.name, config.version)));
        output::print_plain(&style.key_value("zones", &config.options.zones.len().to_string()));
        output::print_plain(&style.key_value("providers", &config.providers().len().to_string()));
        for zone in &config.options.zones {
            output::print_detail(&style.list_item(&format!(
                "{}: {} -> {}",
                zone.name, zone.camera_entity, zone.todo_list_entity
            )));
        }
        Ok(())
    }
}
