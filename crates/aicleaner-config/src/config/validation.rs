//! Schema validation for the unified configuration
//!
//! Validation works on the generic mapping so every problem can be reported
//! with its field path, and all problems are collected before failing.

use std::collections::HashSet;

use aicleaner_providers::ProviderConfig;
use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub value: Option<Value>,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>, value: Option<&Value>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: value.cloned(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error at '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Checks a configuration mapping against the unified schema
#[derive(Debug, Clone, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Create a new configuration validator
    pub fn new() -> Self {
        ConfigValidator
    }

    /// Validate, failing with every collected problem
    pub fn validate(&self, config: &Value) -> ConfigResult<()> {
        let errors = self.collect_errors(config);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation {
                errors: errors.into_iter().map(|e| e.to_string()).collect(),
            })
        }
    }

    /// All schema violations, in document order
    pub fn collect_errors(&self, config: &Value) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let root = match config.as_object() {
            Some(root) => root,
            None => {
                errors.push(ValidationError::new("", "configuration must be a mapping", Some(config)));
                return errors;
            }
        };

        for field in ["name", "version", "slug"] {
            Self::require_string(root, field, field, &mut errors);
        }
        Self::validate_arch(root.get("arch"), &mut errors);

        match root.get("options") {
            None | Some(Value::Null) => {}
            Some(Value::Object(options)) => self.validate_options(options, &mut errors),
            Some(other) => errors.push(ValidationError::new(
                "options",
                "must be a mapping",
                Some(other),
            )),
        }

        errors
    }

    fn validate_arch(arch: Option<&Value>, errors: &mut Vec<ValidationError>) {
        match arch {
            Some(Value::Array(items)) if !items.is_empty() => {
                for (i, item) in items.iter().enumerate() {
                    if !item.as_str().map(|s| !s.trim().is_empty()).unwrap_or(false) {
                        errors.push(ValidationError::new(
                            format!("arch[{}]", i),
                            "must be a non-empty string",
                            Some(item),
                        ));
                    }
                }
            }
            Some(Value::Array(_)) => {
                errors.push(ValidationError::new("arch", "must list at least one architecture", None))
            }
            Some(other) => errors.push(ValidationError::new("arch", "must be a list of strings", Some(other))),
            None => errors.push(ValidationError::new("arch", "is required", None)),
        }
    }

    fn validate_options(&self, options: &Map<String, Value>, errors: &mut Vec<ValidationError>) {
        match options.get("zones") {
            None | Some(Value::Null) => {}
            Some(Value::Array(zones)) => {
                for (i, zone) in zones.iter().enumerate() {
                    self.validate_zone(i, zone, errors);
                }
            }
            Some(other) => errors.push(ValidationError::new(
                "options.zones",
                "must be a list",
                Some(other),
            )),
        }

        if let Some(mqtt) = options.get("mqtt") {
            if !mqtt.is_object() && !mqtt.is_null() {
                errors.push(ValidationError::new("options.mqtt", "must be a mapping", Some(mqtt)));
            }
        }

        match options.get("providers") {
            None | Some(Value::Null) => {}
            Some(Value::Array(providers)) => self.validate_providers(providers, errors),
            Some(other) => errors.push(ValidationError::new(
                "options.providers",
                "must be a list",
                Some(other),
            )),
        }
    }

    fn validate_zone(&self, index: usize, zone: &Value, errors: &mut Vec<ValidationError>) {
        let field = format!("options.zones[{}]", index);
        let zone = match zone.as_object() {
            Some(zone) => zone,
            None => {
                errors.push(ValidationError::new(field, "must be a mapping", Some(zone)));
                return;
            }
        };

        for key in ["name", "camera_entity", "todo_list_entity"] {
            Self::require_string(zone, key, &format!("{}.{}", field, key), errors);
        }

        if let Some(interval) = zone.get("interval_minutes") {
            let valid = interval
                .as_u64()
                .map(|n| n > 0 && n <= u64::from(u32::MAX))
                .unwrap_or(false);
            if !valid {
                errors.push(ValidationError::new(
                    format!("{}.interval_minutes", field),
                    "must be a positive integer",
                    Some(interval),
                ));
            }
        }

        if let Some(rules) = zone.get("ignore_rules") {
            let valid = rules
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false);
            if !valid {
                errors.push(ValidationError::new(
                    format!("{}.ignore_rules", field),
                    "must be a list of strings",
                    Some(rules),
                ));
            }
        }
    }

    fn validate_providers(&self, providers: &[Value], errors: &mut Vec<ValidationError>) {
        let mut seen = HashSet::new();
        for (i, provider) in providers.iter().enumerate() {
            let field = format!("options.providers[{}]", i);
            match serde_json::from_value::<ProviderConfig>(provider.clone()) {
                Ok(config) => {
                    if config.id.trim().is_empty() {
                        errors.push(ValidationError::new(
                            format!("{}.id", field),
                            "must be a non-empty string",
                            provider.get("id"),
                        ));
                    } else if !seen.insert(config.id.clone()) {
                        errors.push(ValidationError::new(
                            format!("{}.id", field),
                            format!("duplicate provider id '{}'", config.id),
                            provider.get("id"),
                        ));
                    }
                }
                Err(e) => errors.push(ValidationError::new(field, e.to_string(), None)),
            }
        }
    }

    fn require_string(
        map: &Map<String, Value>,
        key: &str,
        field: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        match map.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(Value::String(_)) => {
                errors.push(ValidationError::new(field, "must not be empty", map.get(key)))
            }
            Some(other) => errors.push(ValidationError::new(field, "must be a string", Some(other))),
            None => errors.push(ValidationError::new(field, "is required", None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "name": "AICleaner",
            "version": "2.0.0",
            "slug": "aicleaner",
            "arch": ["amd64", "aarch64"],
            "options": {
                "display_name": "Home",
                "zones": [
                    {
                        "name": "Kitchen",
                        "camera_entity": "camera.kitchen",
                        "todo_list_entity": "todo.kitchen",
                        "interval_minutes": 30,
                        "ignore_rules": ["dish rack"]
                    }
                ],
                "providers": [
                    {"id": "local", "kind": "ollama", "priority": 1},
                    {"id": "cloud", "kind": "gemini", "priority": 2, "api_key": "k"}
                ]
            }
        })
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(ConfigValidator::new().validate(&valid()).is_ok());
    }

    #[test]
    fn test_missing_camera_entity_reported() {
        let mut config = valid();
        config["options"]["zones"][0]
            .as_object_mut()
            .unwrap()
            .remove("camera_entity");

        let errors = ConfigValidator::new().collect_errors(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "options.zones[0].camera_entity");
    }

    #[test]
    fn test_all_problems_collected() {
        let config = json!({
            "name": "",
            "slug": 7,
            "arch": [],
            "options": {
                "zones": [{"name": "Hall", "camera_entity": "camera.hall", "todo_list_entity": "todo.hall", "interval_minutes": 0, "ignore_rules": "shoes"}]
            }
        });
        let fields: Vec<String> = ConfigValidator::new()
            .collect_errors(&config)
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            vec![
                "name",
                "version",
                "slug",
                "arch",
                "options.zones[0].interval_minutes",
                "options.zones[0].ignore_rules"
            ]
        );
    }

    #[test]
    fn test_provider_problems() {
        let mut config = valid();
        config["options"]["providers"] = json!([
            {"id": "dup", "kind": "ollama"},
            {"id": "dup", "kind": "openai", "api_key": "k"},
            {"id": "odd", "kind": "watson"}
        ]);

        let errors = ConfigValidator::new().collect_errors(&config);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("duplicate provider id"));
        assert_eq!(errors[1].field, "options.providers[2]");
    }

    #[test]
    fn test_providers_may_be_absent() {
        let mut config = valid();
        config["options"].as_object_mut().unwrap().remove("providers");
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }
}
