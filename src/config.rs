//! Client settings
//!
//! `GeminiSettings` is the settings store the rest of the crate reads from:
//! credentials, request defaults, and transport knobs.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::LlmError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Where the API key travels on each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyPlacement {
    /// `x-goog-api-key` header
    #[default]
    Header,
    /// `?key=` query parameter
    Query,
}

/// Gemini client settings
#[derive(Clone)]
pub struct GeminiSettings {
    /// API key for authentication (securely stored)
    pub api_key: SecretString,
    pub default_model: String,
    pub default_temperature: f32,
    pub default_max_tokens: u32,
    pub use_streaming: bool,
    /// Base URL, without the `/models/...` suffix
    pub base_url: String,
    /// Per-attempt HTTP timeout
    pub timeout: Duration,
    pub api_key_placement: ApiKeyPlacement,
}

impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_key_present", &self.has_api_key())
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("use_streaming", &self.use_streaming)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("api_key_placement", &self.api_key_placement)
            .finish()
    }
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: SecretString::from(String::new()),
            default_model: DEFAULT_MODEL.to_string(),
            default_temperature: 0.7,
            default_max_tokens: 1000,
            use_streaming: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            api_key_placement: ApiKeyPlacement::Header,
        }
    }
}

/// On-disk shape of the settings; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    api_key: Option<String>,
    default_model: Option<String>,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
    use_streaming: Option<bool>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    api_key_placement: Option<ApiKeyPlacement>,
}

impl GeminiSettings {
    /// Create settings with the given API key and defaults for everything else
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            ..Default::default()
        }
    }

    /// Read `GEMINI_API_KEY`, and optionally `GEMINI_MODEL` and `GEMINI_BASE_URL`.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            LlmError::ConfigurationError("GEMINI_API_KEY is not set".to_string())
        })?;
        let mut settings = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            settings.default_model = model;
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            settings.base_url = base_url;
        }
        Ok(settings)
    }

    /// Parse a persisted JSON settings object. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, LlmError> {
        let file: SettingsFile = serde_json::from_str(json)
            .map_err(|e| LlmError::ConfigurationError(format!("Invalid settings: {e}")))?;
        let defaults = Self::default();
        Ok(Self {
            api_key: file
                .api_key
                .map(SecretString::from)
                .unwrap_or(defaults.api_key),
            default_model: file.default_model.unwrap_or(defaults.default_model),
            default_temperature: file
                .default_temperature
                .unwrap_or(defaults.default_temperature),
            default_max_tokens: file
                .default_max_tokens
                .unwrap_or(defaults.default_max_tokens),
            use_streaming: file.use_streaming.unwrap_or(defaults.use_streaming),
            base_url: file.base_url.unwrap_or(defaults.base_url),
            timeout: file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            api_key_placement: file
                .api_key_placement
                .unwrap_or(defaults.api_key_placement),
        })
    }

    /// Load a JSON settings file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LlmError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LlmError::ConfigurationError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = SecretString::from(api_key.into());
        self
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.default_model = model.into();
        self
    }

    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = temperature;
        self
    }

    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    pub const fn with_streaming(mut self, use_streaming: bool) -> Self {
        self.use_streaming = use_streaming;
        self
    }

    /// Set the base URL (trailing slashes are ignored)
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn with_api_key_placement(mut self, placement: ApiKeyPlacement) -> Self {
        self.api_key_placement = placement;
        self
    }
}
