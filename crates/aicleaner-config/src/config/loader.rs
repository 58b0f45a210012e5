//! Configuration file loader supporting YAML and JSON
//!
//! Legacy files are read as generic mappings so that unknown keys survive the
//! merge. The unified file is additionally validated and typed.

use std::path::Path;

use serde_json::{Map, Value};

use super::validation::ConfigValidator;
use crate::error::{ConfigError, ConfigResult, IoOperation};
use crate::types::{ConfigFormat, UnifiedConfig};

/// Configuration loader for multiple formats
pub struct ConfigLoader;

impl ConfigLoader {
    /// Detect the format of a path from its extension
    pub fn format_for(path: &Path) -> ConfigResult<ConfigFormat> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| ConfigError::parse_error(path, "unknown", "File has no extension"))?;

        ConfigFormat::from_extension(extension).ok_or_else(|| {
            ConfigError::parse_error(
                path,
                "unknown",
                format!("Unsupported file format: {}", extension),
            )
        })
    }

    /// Parse content into a top-level mapping
    ///
    /// An empty document is an empty mapping; any other non-mapping root is a
    /// parse error.
    pub fn parse_mapping(
        content: &str,
        format: ConfigFormat,
        path: &Path,
    ) -> ConfigResult<Map<String, Value>> {
        let value: Value = match format {
            ConfigFormat::Yaml => {
                if content.trim().is_empty() {
                    Value::Null
                } else {
                    serde_yaml::from_str(content)
                        .map_err(|e| ConfigError::parse_error(path, "YAML", e.to_string()))?
                }
            }
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::parse_error(path, "JSON", e.to_string()))?,
        };

        match value {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(ConfigError::parse_error(
                path,
                format.to_string(),
                format!("expected a mapping at the top level, found {}", kind_of(&other)),
            )),
        }
    }

    /// Read and parse a file into a top-level mapping
    pub async fn load_mapping(path: &Path) -> ConfigResult<Map<String, Value>> {
        let format = Self::format_for(path)?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::io_error(path, IoOperation::Read, e))?;
        Self::parse_mapping(&content, format, path)
    }

    /// Validate a generic mapping and convert it to the typed schema
    pub fn to_unified(value: Value) -> ConfigResult<UnifiedConfig> {
        ConfigValidator::new().validate(&value)?;
        serde_json::from_value(value).map_err(|e| ConfigError::Validation {
            errors: vec![e.to_string()],
        })
    }

    /// Load, validate and type the unified configuration file
    pub async fn load_unified(path: &Path) -> ConfigResult<UnifiedConfig> {
        let mapping = Self::load_mapping(path).await?;
        Self::to_unified(Value::Object(mapping))
    }

    /// Serialize the unified configuration in the given format
    pub fn serialize(config: &UnifiedConfig, format: ConfigFormat) -> ConfigResult<String> {
        match format {
            ConfigFormat::Yaml => Ok(serde_yaml::to_string(config)?),
            ConfigFormat::Json => Ok(serde_json::to_string_pretty(config)?),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_yaml_mapping() {
        let map = ConfigLoader::parse_mapping(
            "display_name: Home\nzones: []\n",
            ConfigFormat::Yaml,
            Path::new("config.yaml"),
        )
        .unwrap();
        assert_eq!(map.get("display_name"), Some(&Value::from("Home")));
    }

    #[test]
    fn test_empty_yaml_is_empty_mapping() {
        let map =
            ConfigLoader::parse_mapping("  \n", ConfigFormat::Yaml, Path::new("config.yaml")).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_non_mapping_root_rejected() {
        let err = ConfigLoader::parse_mapping("[1, 2]", ConfigFormat::Json, Path::new("config.json"))
            .unwrap_err();
        match err {
            ConfigError::Parse { path, format, message } => {
                assert_eq!(path, PathBuf::from("config.json"));
                assert_eq!(format, "JSON");
                assert!(message.contains("a list"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_broken_json_is_parse_error() {
        let err = ConfigLoader::parse_mapping("{\"name\": ", ConfigFormat::Json, Path::new("c.json"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(ConfigLoader::format_for(Path::new("config.toml")).is_err());
        assert!(ConfigLoader::format_for(Path::new("config")).is_err());
    }

    #[tokio::test]
    async fn test_load_unified_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        tokio::fs::write(&path, "name: AICleaner\nversion: '1'\nslug: aicleaner\narch: []\n")
            .await
            .unwrap();

        let err = ConfigLoader::load_unified(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }
}
