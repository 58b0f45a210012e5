//! Runtime settings from `AICLEANER_` environment variables
//!
//! Settings are read once at startup and passed explicitly to the components
//! that need them.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::warn;

use crate::migration::LegacyPaths;

const PREFIX: &str = "AICLEANER_";

/// Default directory the add-on configuration lives in
pub const DEFAULT_CONFIG_DIR: &str = "/config";

/// Process-wide settings resolved at startup
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    /// Directory holding the legacy files (`AICLEANER_CONFIG_DIR`)
    pub config_dir: PathBuf,
    /// Unified file location (`AICLEANER_UNIFIED_CONFIG`), defaults to the add-on YAML
    pub unified_path: Option<PathBuf>,
    /// Where migration backups go (`AICLEANER_BACKUP_DIR`)
    pub backup_dir: Option<PathBuf>,
    /// Log level name (`AICLEANER_LOG_LEVEL`)
    pub log_level: Option<String>,
    /// Skip the automatic startup migration (`AICLEANER_SKIP_MIGRATION`)
    pub skip_migration: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            unified_path: None,
            backup_dir: None,
            log_level: None,
            skip_migration: false,
        }
    }
}

impl RuntimeSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build settings from explicit variables
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let overrides: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(key, value)| {
                key.as_ref()
                    .strip_prefix(PREFIX)
                    .map(|name| (name.to_lowercase(), value.into()))
            })
            .collect();

        let mut settings = Self::default();
        for (name, value) in &overrides {
            settings.apply(name, value);
        }
        settings
    }

    fn apply(&mut self, name: &str, value: &str) {
        let value = value.trim();
        match name {
            "config_dir" if !value.is_empty() => self.config_dir = PathBuf::from(value),
            "unified_config" if !value.is_empty() => self.unified_path = Some(PathBuf::from(value)),
            "backup_dir" if !value.is_empty() => self.backup_dir = Some(PathBuf::from(value)),
            "log_level" if !value.is_empty() => self.log_level = Some(value.to_lowercase()),
            "skip_migration" => match parse_bool(value) {
                Some(flag) => self.skip_migration = flag,
                None => warn!(value = %value, "Ignoring non-boolean AICLEANER_SKIP_MIGRATION"),
            },
            _ => {}
        }
    }

    /// Override the configuration directory
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// Override the unified file location
    pub fn with_unified_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.unified_path = Some(path.into());
        self
    }

    /// Override the backup directory
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    /// Legacy and unified file locations
    pub fn legacy_paths(&self) -> LegacyPaths {
        let paths = LegacyPaths::new(&self.config_dir);
        match &self.unified_path {
            Some(unified) => paths.with_unified_path(unified),
            None => paths,
        }
    }

    /// Directory backups are written under
    pub fn backup_root(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.config_dir.join(".aicleaner_backups"))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
