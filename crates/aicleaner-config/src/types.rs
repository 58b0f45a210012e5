//! Unified configuration schema and shared types

use std::collections::BTreeMap;
use std::time::Duration;

use aicleaner_providers::{ProviderConfig, SelectorConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigFormat {
    /// YAML format (.yaml, .yml)
    Yaml,
    /// JSON format (.json)
    Json,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Json => "json",
        }
    }

    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigFormat::Yaml => write!(f, "YAML"),
            ConfigFormat::Json => write!(f, "JSON"),
        }
    }
}

/// The single configuration file the add-on runs from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedConfig {
    pub name: String,
    pub version: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub arch: Vec<String>,
    #[serde(default)]
    pub options: AddonOptions,
    /// Add-on manifest keys we do not interpret, kept verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl UnifiedConfig {
    /// Enabled and disabled providers, in file order
    pub fn providers(&self) -> &[ProviderConfig] {
        &self.options.providers
    }

    /// Zone by name
    pub fn zone(&self, name: &str) -> Option<&ZoneConfig> {
        self.options.zones.iter().find(|z| z.name == name)
    }
}

/// User-facing add-on options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddonOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttConfig>,
    #[serde(default)]
    pub ai_enhancements: AiEnhancements,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderConfig>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A monitored area of the home
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub name: String,
    pub camera_entity: String,
    pub todo_list_entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_rules: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Broker settings for the discovery bridge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_prefix: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown_secs() -> u64 {
    60
}

/// Tunables for AI behavior, including the provider circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiEnhancements {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for AiEnhancements {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            extra: BTreeMap::new(),
        }
    }
}

impl AiEnhancements {
    /// Breaker settings for the provider selector
    pub fn selector_config(&self) -> SelectorConfig {
        SelectorConfig::default()
            .with_failure_threshold(self.failure_threshold)
            .with_cooldown(Duration::from_secs(self.cooldown_secs))
    }
}
