//! Merging of overlapping legacy configuration sources
//!
//! Sources are applied oldest first, so the most recently modified file wins
//! every scalar. Equal modification times fall back to a fixed precedence.
//! Zones are merged by name field by field, and the MQTT block is taken whole
//! from the most complete source.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Keys that flat legacy files keep at the top level but belong under `options`
pub const OPTION_KEYS: &[&str] = &["display_name", "zones", "mqtt", "ai_enhancements", "providers"];

const SECRET_MARKERS: &[&str] = &["password", "api_key", "token", "secret"];

/// One parsed source to merge
#[derive(Debug, Clone)]
pub struct MergeInput {
    /// Human readable origin, recorded on every decision
    pub label: String,
    /// Last modification time of the source
    pub modified: DateTime<Utc>,
    /// Tie-breaker for equal modification times; higher wins
    pub precedence: u8,
    pub mapping: Map<String, Value>,
}

/// Merge decision for logging
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeDecision {
    /// The key that was merged
    pub key: String,
    /// The source of the value
    pub source: String,
    /// The value that was applied (secrets masked)
    pub value: String,
}

/// Configuration merger
pub struct ConfigMerger;

impl ConfigMerger {
    /// Merge sources into one mapping in the unified layout
    ///
    /// Returns the merged mapping and every decision taken, in the order the
    /// decisions were made.
    pub fn merge(inputs: Vec<MergeInput>) -> (Value, Vec<MergeDecision>) {
        let mut inputs = inputs;
        inputs.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then(a.precedence.cmp(&b.precedence))
        });

        let sources: Vec<(String, Map<String, Value>)> = inputs
            .into_iter()
            .map(|input| (input.label, Self::hoist_options(input.mapping)))
            .collect();

        let mut decisions = Vec::new();
        let mut result = Map::new();
        let mut options = Map::new();
        let mut zones: Vec<Value> = Vec::new();

        for (label, mapping) in &sources {
            for (key, value) in mapping {
                if key == "options" {
                    continue;
                }
                Self::merge_value(&mut result, key, key, value, label, &mut decisions);
            }

            let source_options = match mapping.get("options") {
                Some(Value::Object(source_options)) => source_options,
                _ => continue,
            };
            for (key, value) in source_options {
                let path = format!("options.{}", key);
                match key.as_str() {
                    "zones" => Self::merge_zones(&mut zones, value, label, &mut decisions),
                    "mqtt" => {}
                    _ => Self::merge_value(&mut options, key, &path, value, label, &mut decisions),
                }
            }
        }

        if let Some((label, mqtt)) = Self::most_complete_mqtt(&sources) {
            decisions.push(MergeDecision {
                key: "options.mqtt".to_string(),
                source: label.to_string(),
                value: format!("{} fields", completeness(mqtt)),
            });
            options.insert("mqtt".to_string(), mqtt.clone());
        }
        if !zones.is_empty() {
            options.insert("zones".to_string(), Value::Array(zones));
        }
        result.insert("options".to_string(), Value::Object(options));

        // Log merge decisions
        for decision in &decisions {
            debug!(
                key = %decision.key,
                source = %decision.source,
                value = %decision.value,
                "Configuration merged"
            );
        }

        (Value::Object(result), decisions)
    }

    /// Move option keys found at the top level of a flat file under `options`
    ///
    /// A key present both flat and nested keeps the nested value.
    pub fn hoist_options(mut mapping: Map<String, Value>) -> Map<String, Value> {
        let mut options = match mapping.remove("options") {
            Some(Value::Object(options)) => options,
            Some(Value::Null) | None => Map::new(),
            Some(other) => {
                warn!("Ignoring non-mapping 'options' value in legacy configuration");
                mapping.insert("options".to_string(), other);
                return mapping;
            }
        };

        for key in OPTION_KEYS {
            if let Some(value) = mapping.remove(*key) {
                options.entry(key.to_string()).or_insert(value);
            }
        }

        if !options.is_empty() {
            mapping.insert("options".to_string(), Value::Object(options));
        }
        mapping
    }

    fn merge_value(
        target: &mut Map<String, Value>,
        key: &str,
        path: &str,
        value: &Value,
        source: &str,
        decisions: &mut Vec<MergeDecision>,
    ) {
        if value.is_null() {
            return;
        }

        if let (Value::Object(incoming), Some(Value::Object(existing))) = (value, target.get_mut(key)) {
            for (sub_key, sub_value) in incoming {
                let sub_path = format!("{}.{}", path, sub_key);
                Self::merge_value(existing, sub_key, &sub_path, sub_value, source, decisions);
            }
            return;
        }

        if target.get(key) != Some(value) {
            decisions.push(MergeDecision {
                key: path.to_string(),
                source: source.to_string(),
                value: display_value(path, value),
            });
            target.insert(key.to_string(), value.clone());
        }
    }

    fn merge_zones(
        zones: &mut Vec<Value>,
        incoming: &Value,
        source: &str,
        decisions: &mut Vec<MergeDecision>,
    ) {
        let items = match incoming {
            Value::Array(items) => items,
            Value::Null => return,
            _ => {
                warn!(source = %source, "Ignoring 'zones' that is not a list");
                return;
            }
        };

        for item in items {
            let name = item.get("name").and_then(Value::as_str).map(str::to_string);
            let position = name.as_deref().and_then(|name| {
                zones
                    .iter()
                    .position(|zone| zone.get("name").and_then(Value::as_str) == Some(name))
            });

            match (position.and_then(|index| zones.get_mut(index)), item) {
                (Some(Value::Object(existing)), Value::Object(fields)) => {
                    let zone_path = format!("options.zones[{}]", name.as_deref().unwrap_or_default());
                    for (field, value) in fields {
                        if value.is_null() || existing.get(field) == Some(value) {
                            continue;
                        }
                        let path = format!("{}.{}", zone_path, field);
                        decisions.push(MergeDecision {
                            key: path.clone(),
                            source: source.to_string(),
                            value: display_value(&path, value),
                        });
                        existing.insert(field.clone(), value.clone());
                    }
                }
                _ => {
                    let label = name.unwrap_or_else(|| format!("#{}", zones.len()));
                    decisions.push(MergeDecision {
                        key: format!("options.zones[{}]", label),
                        source: source.to_string(),
                        value: "added".to_string(),
                    });
                    zones.push(item.clone());
                }
            }
        }
    }

    fn most_complete_mqtt(sources: &[(String, Map<String, Value>)]) -> Option<(&str, &Value)> {
        let mut best: Option<(&str, &Value, usize)> = None;
        for (label, mapping) in sources {
            let mqtt = match mapping
                .get("options")
                .and_then(|options| options.get("mqtt"))
            {
                Some(mqtt) if mqtt.is_object() => mqtt,
                _ => continue,
            };
            let score = completeness(mqtt);
            // Sources are ordered oldest first, so `>=` lets the newest win ties
            if best.map(|(_, _, top)| score >= top).unwrap_or(true) {
                best = Some((label.as_str(), mqtt, score));
            }
        }
        best.map(|(label, mqtt, _)| (label, mqtt))
    }
}

/// Number of non-empty fields in a mapping
fn completeness(value: &Value) -> usize {
    value
        .as_object()
        .map(|fields| fields.values().filter(|v| !is_empty_value(v)).count())
        .unwrap_or(0)
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

fn display_value(path: &str, value: &Value) -> String {
    let leaf = path.rsplit('.').next().unwrap_or(path).to_lowercase();
    if SECRET_MARKERS.iter().any(|marker| leaf.contains(marker)) {
        return "***".to_string();
    }
    let rendered = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if rendered.chars().count() > 80 {
        format!("{}...", rendered.chars().take(77).collect::<String>())
    } else {
        rendered
    }
}
