//! Discovery of legacy configuration files

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::{ConfigLoader, MergeInput};
use crate::error::{ConfigError, ConfigResult, IoOperation};
use crate::types::ConfigFormat;

/// Name of the marker written after a successful migration
pub const MIGRATION_MARKER: &str = ".aicleaner_migrated";

/// The three places older releases kept configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LegacySource {
    /// `config.yaml` in the configuration root
    RootYaml,
    /// `aicleaner/config.json`
    AddonJson,
    /// `aicleaner/config.yaml`
    AddonYaml,
}

impl LegacySource {
    /// All sources, lowest precedence first
    pub fn all() -> [LegacySource; 3] {
        [
            LegacySource::RootYaml,
            LegacySource::AddonJson,
            LegacySource::AddonYaml,
        ]
    }

    /// Path relative to the configuration directory
    pub fn relative_path(&self) -> &'static str {
        match self {
            LegacySource::RootYaml => "config.yaml",
            LegacySource::AddonJson => "aicleaner/config.json",
            LegacySource::AddonYaml => "aicleaner/config.yaml",
        }
    }

    /// Tie-breaker when two files share a modification time
    pub fn precedence(&self) -> u8 {
        match self {
            LegacySource::RootYaml => 0,
            LegacySource::AddonJson => 1,
            LegacySource::AddonYaml => 2,
        }
    }

    pub fn format(&self) -> ConfigFormat {
        match self {
            LegacySource::AddonJson => ConfigFormat::Json,
            LegacySource::RootYaml | LegacySource::AddonYaml => ConfigFormat::Yaml,
        }
    }
}

impl std::fmt::Display for LegacySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.relative_path())
    }
}

/// Legacy and unified file locations under one configuration directory
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyPaths {
    base_dir: PathBuf,
    unified: Option<PathBuf>,
}

impl LegacyPaths {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            unified: None,
        }
    }

    /// Write the unified file somewhere other than the add-on YAML
    pub fn with_unified_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.unified = Some(path.into());
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute path of a legacy source
    pub fn source(&self, source: LegacySource) -> PathBuf {
        self.base_dir.join(source.relative_path())
    }

    /// Path of the unified configuration file
    pub fn unified(&self) -> PathBuf {
        self.unified
            .clone()
            .unwrap_or_else(|| self.source(LegacySource::AddonYaml))
    }

    /// Marker next to the unified file
    pub fn marker(&self) -> PathBuf {
        let unified = self.unified();
        match unified.parent() {
            Some(parent) => parent.join(MIGRATION_MARKER),
            None => PathBuf::from(MIGRATION_MARKER),
        }
    }
}

/// One discovered legacy file
#[derive(Debug, Clone)]
pub struct LegacyFile {
    pub source: LegacySource,
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    /// Parsed content, `None` when the file could not be parsed
    pub content: Option<Map<String, Value>>,
    /// Why parsing failed
    pub parse_error: Option<String>,
}

impl LegacyFile {
    /// Read and parse one legacy file; parse failures are kept, not returned
    pub async fn read(source: LegacySource, path: PathBuf) -> ConfigResult<Self> {
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ConfigError::io_error(&path, IoOperation::Metadata, e))?;
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::UNIX_EPOCH));

        let (content, parse_error) = match tokio::fs::read_to_string(&path).await {
            Ok(text) => match ConfigLoader::parse_mapping(&text, source.format(), &path) {
                Ok(mapping) => (Some(mapping), None),
                Err(e) => (None, Some(e.to_string())),
            },
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                (None, Some(format!("{} is not valid UTF-8", path.display())))
            }
            Err(e) => return Err(ConfigError::io_error(&path, IoOperation::Read, e)),
        };

        if let Some(error) = &parse_error {
            warn!(path = %path.display(), "Legacy configuration could not be parsed: {}", error);
        }

        Ok(Self {
            source,
            path,
            modified,
            content,
            parse_error,
        })
    }

    pub fn is_parsed(&self) -> bool {
        self.content.is_some()
    }

    /// Merge input for this file; unparseable files contribute nothing
    pub fn merge_input(&self) -> MergeInput {
        MergeInput {
            label: self.source.to_string(),
            modified: self.modified,
            precedence: self.source.precedence(),
            mapping: self.content.clone().unwrap_or_default(),
        }
    }
}

/// Every legacy file found in a configuration directory
#[derive(Debug, Clone, Default)]
pub struct LegacyConfigSet {
    pub files: Vec<LegacyFile>,
}

impl LegacyConfigSet {
    /// Discover legacy files, ignoring the migration marker
    pub async fn scan(paths: &LegacyPaths) -> ConfigResult<Self> {
        let mut files = Vec::new();
        for source in LegacySource::all() {
            let path = paths.source(source);
            if !exists(&path).await? {
                continue;
            }
            debug!(path = %path.display(), source = %source, "Found legacy configuration");
            files.push(LegacyFile::read(source, path).await?);
        }
        Ok(Self { files })
    }

    /// Discover legacy files unless a migration already happened
    ///
    /// Returns `None` when the marker exists or no legacy file is present.
    pub async fn detect(paths: &LegacyPaths) -> ConfigResult<Option<Self>> {
        let marker = paths.marker();
        if exists(&marker).await? {
            debug!(marker = %marker.display(), "Migration marker present, skipping detection");
            return Ok(None);
        }

        let set = Self::scan(paths).await?;
        Ok(if set.is_empty() { None } else { Some(set) })
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    pub fn get(&self, source: LegacySource) -> Option<&LegacyFile> {
        self.files.iter().find(|f| f.source == source)
    }

    /// Warnings for files that will contribute nothing
    pub fn parse_warnings(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|f| {
                f.parse_error
                    .as_ref()
                    .map(|e| format!("{} ignored: {}", f.source, e))
            })
            .collect()
    }

    pub fn merge_inputs(&self) -> Vec<MergeInput> {
        self.files
            .iter()
            .filter(|f| f.is_parsed())
            .map(LegacyFile::merge_input)
            .collect()
    }
}

pub(crate) async fn exists(path: &Path) -> ConfigResult<bool> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ConfigError::io_error(path, IoOperation::Metadata, e)),
    }
}
