//! Startup configuration: migrate if needed, then load what the selector runs from

use std::fmt;
use std::path::PathBuf;

use aicleaner_config::{
    ConfigLoader, ConfigMigrator, LegacyConfigSet, RuntimeSettings, UnifiedConfig,
};
use aicleaner_providers::{ProviderConfig, ProviderSelector, SelectorConfig};
use tracing::{info, warn};

use crate::error::{CliError, CliResult};

/// Where the running configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Existing unified file
    Unified(PathBuf),
    /// Unified file written by this run's migration
    Migrated(PathBuf),
    /// In-memory merge of legacy files after a failed or skipped migration
    LegacyFallback,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Unified(path) => write!(f, "{}", path.display()),
            ConfigSource::Migrated(path) => write!(f, "{} (migrated now)", path.display()),
            ConfigSource::LegacyFallback => write!(f, "legacy files (not migrated)"),
        }
    }
}

/// Everything needed to build a provider selector
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub source: ConfigSource,
    pub providers: Vec<ProviderConfig>,
    pub selector: SelectorConfig,
    pub warnings: Vec<String>,
}

impl RuntimeConfig {
    fn from_unified(source: ConfigSource, config: &UnifiedConfig, warnings: Vec<String>) -> Self {
        Self {
            source,
            providers: config.providers().to_vec(),
            selector: config.options.ai_enhancements.selector_config(),
            warnings,
        }
    }

    /// Build the selector for these providers
    pub fn selector(&self) -> CliResult<ProviderSelector> {
        Ok(ProviderSelector::from_configs(
            &self.providers,
            self.selector.clone(),
        )?)
    }
}

/// Resolve the configuration the process runs from
///
/// Migration runs first unless `skip_migration` is set. A failed migration
/// leaves the legacy files in place, so the process falls back to merging
/// them in memory instead of refusing to start.
pub async fn load_runtime_config(settings: &RuntimeSettings) -> CliResult<RuntimeConfig> {
    let migrator = ConfigMigrator::from_settings(settings);

    if !settings.skip_migration {
        let result = migrator.migrate_configuration().await;
        if result.success {
            if let Some(config) = &result.unified_config {
                let path = migrator.paths().unified();
                let source = if result.backup.is_some() {
                    ConfigSource::Migrated(path)
                } else {
                    ConfigSource::Unified(path)
                };
                return Ok(RuntimeConfig::from_unified(source, config, result.warnings));
            }
        } else {
            warn!(
                "Migration failed, running from the legacy files: {}",
                result.error_message.as_deref().unwrap_or("unknown error")
            );
            return legacy_fallback(&migrator, settings).await;
        }
    }

    let unified = migrator.paths().unified();
    if unified.exists() {
        match ConfigLoader::load_unified(&unified).await {
            Ok(config) => {
                return Ok(RuntimeConfig::from_unified(
                    ConfigSource::Unified(unified),
                    &config,
                    Vec::new(),
                ))
            }
            Err(e) => warn!(path = %unified.display(), "Unified configuration not usable: {}", e),
        }
    }

    legacy_fallback(&migrator, settings).await
}

async fn legacy_fallback(
    migrator: &ConfigMigrator,
    settings: &RuntimeSettings,
) -> CliResult<RuntimeConfig> {
    if LegacyConfigSet::scan(migrator.paths()).await?.is_empty() {
        return Err(CliError::NoConfiguration(settings.config_dir.clone()));
    }

    let fallback = migrator.load_legacy_merged().await?;
    let providers = fallback.providers();
    info!(providers = providers.len(), "Using merged legacy configuration");
    Ok(RuntimeConfig {
        source: ConfigSource::LegacyFallback,
        providers,
        selector: fallback.ai_enhancements().selector_config(),
        warnings: fallback.warnings,
    })
}
