use std::time::Duration;

use crate::config::{ApiKeyPlacement, GeminiSettings};
use crate::error::LlmError;
use crate::retry::RetryPolicy;

use super::client::GeminiClient;

/// Builder for configuring Gemini clients.
///
/// Unset fields fall back to [`GeminiSettings::default`]. Without an explicit
/// API key, `GEMINI_API_KEY` is consulted at build time.
///
/// # Example
/// ```rust,no_run
/// use gemini_chat::providers::gemini::GeminiBuilder;
///
/// # fn main() -> Result<(), gemini_chat::LlmError> {
/// let client = GeminiBuilder::new()
///     .api_key("your-api-key")
///     .model("gemini-2.5-flash")
///     .temperature(0.7)
///     .max_tokens(8192)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct GeminiBuilder {
    settings: Option<GeminiSettings>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    use_streaming: Option<bool>,
    timeout: Option<Duration>,
    api_key_placement: Option<ApiKeyPlacement>,
    retry_policy: Option<RetryPolicy>,
    http_client: Option<reqwest::Client>,
}

impl GeminiBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing settings; later calls override individual fields
    pub fn settings(mut self, settings: GeminiSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set temperature (0.0 to 1.0)
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set maximum output tokens
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub const fn streaming(mut self, use_streaming: bool) -> Self {
        self.use_streaming = Some(use_streaming);
        self
    }

    /// Connect timeout, and the deadline for each non-streaming attempt
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub const fn api_key_placement(mut self, placement: ApiKeyPlacement) -> Self {
        self.api_key_placement = Some(placement);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Use a preconfigured HTTP client; its connect timeout is kept as is
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Resolve the settings this builder would produce
    pub fn build_settings(&self) -> Result<GeminiSettings, LlmError> {
        let mut settings = self.settings.clone().unwrap_or_default();

        if let Some(key) = &self.api_key {
            settings = settings.with_api_key(key.clone());
        } else if !settings.has_api_key() {
            if let Ok(key) = std::env::var("GEMINI_API_KEY") {
                settings = settings.with_api_key(key);
            }
        }
        if let Some(base_url) = &self.base_url {
            settings = settings.with_base_url(base_url.clone());
        }
        if let Some(model) = &self.model {
            settings = settings.with_model(model.clone());
        }
        if let Some(temperature) = self.temperature {
            settings = settings.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            settings = settings.with_max_tokens(max_tokens);
        }
        if let Some(use_streaming) = self.use_streaming {
            settings = settings.with_streaming(use_streaming);
        }
        if let Some(timeout) = self.timeout {
            settings = settings.with_timeout(timeout);
        }
        if let Some(placement) = self.api_key_placement {
            settings = settings.with_api_key_placement(placement);
        }

        if !settings.has_api_key() {
            return Err(LlmError::ConfigurationError(
                "Gemini API key is required (set it on the builder or GEMINI_API_KEY)".to_string(),
            ));
        }
        Ok(settings)
    }

    /// Build the client
    pub fn build(self) -> Result<GeminiClient, LlmError> {
        let settings = self.build_settings()?;
        let client = match self.http_client {
            Some(http) => GeminiClient::with_http_client(settings, http),
            None => GeminiClient::new(settings)?,
        };
        Ok(match self.retry_policy {
            Some(policy) => client.with_retry_policy(policy),
            None => client,
        })
    }
}
