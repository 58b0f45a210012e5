//! Data models for providers and cleaning analysis

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SelectorError;

/// Largest image accepted for analysis
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Image types every adapter can forward
pub const SUPPORTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Kind of AI backend, fixed when the configuration is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions
    #[serde(alias = "open_ai", alias = "gpt")]
    OpenAi,
    /// Anthropic messages API
    #[serde(alias = "claude")]
    Anthropic,
    /// Google Gemini generateContent
    #[serde(alias = "google")]
    Gemini,
    /// Local Ollama server
    #[serde(alias = "local")]
    Ollama,
}

impl ProviderKind {
    /// Model used when the configuration names none
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Anthropic => "claude-3-5-sonnet-20241022",
            ProviderKind::Gemini => "gemini-1.5-flash",
            ProviderKind::Ollama => "llava:13b",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open_ai" | "gpt" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "ollama" | "local" => Ok(ProviderKind::Ollama),
            other => Err(format!("unknown provider kind '{}'", other)),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

/// Configuration of one provider, as stored in the unified config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique identifier
    pub id: String,
    /// Backend kind
    pub kind: ProviderKind,
    /// Lower values are tried first
    #[serde(default)]
    pub priority: i64,
    /// Whether the provider takes part in selection
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// API key for cloud providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Override for the API endpoint (required in practice for local servers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Model name; defaults per kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Upper bound for a single call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Local request budget per minute, unlimited when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_minute: Option<u32>,
}

impl ProviderConfig {
    /// Create a config with defaults for everything but identity and order
    pub fn new(id: impl Into<String>, kind: ProviderKind, priority: i64) -> Self {
        Self {
            id: id.into(),
            kind,
            priority,
            enabled: true,
            api_key: None,
            base_url: None,
            model: None,
            timeout_secs: default_timeout_secs(),
            rate_limit_per_minute: None,
        }
    }

    /// Set the API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the local rate limit
    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = Some(per_minute);
        self
    }

    /// Set enabled state
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Per-call timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Model to request
    pub fn model_name(&self) -> String {
        self.model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.kind.default_model().to_string())
    }
}

/// Raw image bytes plus their MIME type
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    /// Wrap bytes with an explicit MIME type
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Guess the MIME type from the leading magic bytes, defaulting to JPEG
    pub fn sniff(data: Vec<u8>) -> Self {
        let mime = if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            "image/png"
        } else if data.starts_with(b"GIF8") {
            "image/gif"
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            "image/webp"
        } else {
            "image/jpeg"
        };
        Self::new(data, mime)
    }

    /// Base64 encoding of the bytes
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

/// A snapshot to analyze plus the instructions for the model
#[derive(Debug, Clone, PartialEq)]
pub struct CleaningRequest {
    pub image: ImagePayload,
    pub prompt: String,
    /// Zone the snapshot belongs to, used only for context and logs
    pub zone: Option<String>,
}

impl CleaningRequest {
    /// Create a request without zone context
    pub fn new(image: ImagePayload, prompt: impl Into<String>) -> Self {
        Self {
            image,
            prompt: prompt.into(),
            zone: None,
        }
    }

    /// Attach a zone name
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Reject requests no provider could serve
    pub fn validate(&self) -> Result<(), SelectorError> {
        if self.prompt.trim().is_empty() {
            return Err(SelectorError::ValidationError(
                "prompt must not be empty".to_string(),
            ));
        }
        if self.image.data.is_empty() {
            return Err(SelectorError::ValidationError(
                "image payload is empty".to_string(),
            ));
        }
        if self.image.data.len() > MAX_IMAGE_BYTES {
            return Err(SelectorError::ValidationError(format!(
                "image is {} bytes, limit is {}",
                self.image.data.len(),
                MAX_IMAGE_BYTES
            )));
        }
        if !SUPPORTED_MIME_TYPES.contains(&self.image.mime_type.as_str()) {
            return Err(SelectorError::ValidationError(format!(
                "unsupported image type '{}'",
                self.image.mime_type
            )));
        }
        Ok(())
    }

    /// Prompt text sent to the model, including zone context and output format
    pub fn full_prompt(&self) -> String {
        let mut prompt = String::new();
        if let Some(zone) = &self.zone {
            prompt.push_str(&format!("Zone: {}\n\n", zone));
        }
        prompt.push_str(self.prompt.trim());
        prompt.push_str(
            "\n\nRespond with JSON: {\"description\": string, \"tasks\": [string]}.",
        );
        prompt
    }
}

/// Outcome of a successful analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningResult {
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<String>,
    /// Provider that produced the result
    pub provider_id: String,
    /// Model that produced the result
    pub model: String,
}

#[derive(Deserialize)]
struct StructuredAnalysis {
    #[serde(default, alias = "summary", alias = "analysis")]
    description: String,
    #[serde(default, alias = "cleaning_tasks", alias = "todo")]
    tasks: Vec<String>,
}

/// Split free-form model output into a description and task list
///
/// JSON (bare or inside a fenced block) is preferred; otherwise bullet and
/// numbered lines become tasks and everything else is the description.
pub fn parse_analysis(text: &str) -> (String, Vec<String>) {
    if let Some(structured) = extract_json(text) {
        let tasks = structured
            .tasks
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        return (structured.description.trim().to_string(), tasks);
    }

    let mut description = Vec::new();
    let mut tasks = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match strip_list_marker(trimmed) {
            Some(task) if !task.is_empty() => tasks.push(task.to_string()),
            _ => description.push(trimmed),
        }
    }
    (description.join(" "), tasks)
}

fn extract_json(text: &str) -> Option<StructuredAnalysis> {
    let trimmed = text.trim();
    let candidate = if let Some(start) = trimmed.find("```") {
        let rest = &trimmed[start + 3..];
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let end = rest.find("```")?;
        &rest[..end]
    } else {
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        if end < start {
            return None;
        }
        &trimmed[start..=end]
    };
    serde_json::from_str(candidate.trim()).ok()
}

fn strip_list_marker(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest.trim());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg() -> ImagePayload {
        ImagePayload::new(vec![0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg")
    }

    #[test]
    fn test_validate_rejects_empty_prompt() {
        let request = CleaningRequest::new(jpeg(), "   ");
        assert!(matches!(
            request.validate(),
            Err(SelectorError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_image() {
        let request = CleaningRequest::new(ImagePayload::new(vec![], "image/jpeg"), "tidy?");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unsupported_mime() {
        let request = CleaningRequest::new(ImagePayload::new(vec![1, 2, 3], "text/plain"), "tidy?");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_well_formed_request() {
        let request = CleaningRequest::new(jpeg(), "What needs cleaning?").with_zone("Kitchen");
        assert!(request.validate().is_ok());
        assert!(request.full_prompt().starts_with("Zone: Kitchen"));
    }

    #[test]
    fn test_sniff_png() {
        let payload = ImagePayload::sniff(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A]);
        assert_eq!(payload.mime_type, "image/png");
    }

    #[test]
    fn test_parse_analysis_json() {
        let (description, tasks) =
            parse_analysis(r#"{"description": "Messy counter", "tasks": ["Wipe counter", " "]}"#);
        assert_eq!(description, "Messy counter");
        assert_eq!(tasks, vec!["Wipe counter".to_string()]);
    }

    #[test]
    fn test_parse_analysis_fenced_json() {
        let text = "Here you go:\n```json\n{\"description\": \"ok\", \"tasks\": [\"Load dishwasher\"]}\n```";
        let (description, tasks) = parse_analysis(text);
        assert_eq!(description, "ok");
        assert_eq!(tasks, vec!["Load dishwasher".to_string()]);
    }

    #[test]
    fn test_parse_analysis_bullets() {
        let text = "The sink is full.\n- Wash dishes\n2. Take out trash\n";
        let (description, tasks) = parse_analysis(text);
        assert_eq!(description, "The sink is full.");
        assert_eq!(
            tasks,
            vec!["Wash dishes".to_string(), "Take out trash".to_string()]
        );
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("claude".parse::<ProviderKind>(), Ok(ProviderKind::Anthropic));
        assert_eq!("Ollama".parse::<ProviderKind>(), Ok(ProviderKind::Ollama));
        assert!("watson".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_config_deserialize_defaults() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"id": "local", "kind": "ollama"}"#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.priority, 0);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.model_name(), "llava:13b");
    }
}
