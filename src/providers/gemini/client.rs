//! Gemini Client Implementation
//!
//! Transport for the `generateContent` family: request validation, HTTP
//! status mapping, retry of transient 500s, and hand-off of streaming bodies
//! to the frame decoder.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use secrecy::ExposeSecret;

use crate::config::{ApiKeyPlacement, GeminiSettings};
use crate::error::LlmError;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::traits::ChatCapability;
use crate::types::{ChatRequest, ChatResponse, ChatStreamHandle, Usage};
use crate::utils::cancel::CancelHandle;
use crate::utils::url::{append_query, join_url};

use super::compat::{LegacyChatCompletion, to_legacy};
use super::convert::{build_request_body, validate_request};
use super::streaming::{StreamHandler, decode_byte_stream, drive_byte_stream};
use super::types::{GenerateContentRequest, GenerateContentResponse};

const API_KEY_HEADER: &str = "x-goog-api-key";
const SNIPPET_LEN: usize = 200;

/// Gemini client
///
/// Cheap to clone; clones share the underlying connection pool.
///
/// # Example
/// ```rust,no_run
/// use gemini_chat::prelude::*;
///
/// # async fn example() -> Result<(), LlmError> {
/// let client = GeminiClient::new(GeminiSettings::from_env()?)?;
/// let request = client.request().with_message(ChatMessage::user("Hello"));
/// let response = client.chat(&request).await?;
/// println!("{}", response.text);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http_client: HttpClient,
    settings: GeminiSettings,
    retry_policy: RetryPolicy,
}

impl GeminiClient {
    /// Create a client from settings.
    ///
    /// `settings.timeout` bounds connecting and each non-streaming attempt.
    /// Streaming bodies have no overall deadline.
    pub fn new(settings: GeminiSettings) -> Result<Self, LlmError> {
        let http_client = HttpClient::builder()
            .connect_timeout(settings.timeout)
            .build()
            .map_err(|e| {
                LlmError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self::with_http_client(settings, http_client))
    }

    /// Create a client with a custom HTTP client
    pub fn with_http_client(settings: GeminiSettings, http_client: HttpClient) -> Self {
        Self {
            http_client,
            settings,
            retry_policy: RetryPolicy::gemini_default(),
        }
    }

    /// Replace the retry policy used for non-streaming calls
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub const fn settings(&self) -> &GeminiSettings {
        &self.settings
    }

    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// A request pre-filled with the settings' defaults.
    pub fn request(&self) -> ChatRequest {
        ChatRequest::from_settings(&self.settings)
    }

    /// Endpoint for `model`, without credentials.
    pub fn endpoint(&self, model: &str, stream: bool) -> String {
        let action = if stream {
            "streamGenerateContent?alt=sse"
        } else {
            "generateContent"
        };
        join_url(&self.settings.base_url, &format!("models/{model}:{action}"))
    }

    fn post(&self, endpoint: &str, body: &GenerateContentRequest) -> reqwest::RequestBuilder {
        let api_key = self.settings.api_key.expose_secret();
        let builder = match self.settings.api_key_placement {
            ApiKeyPlacement::Header => self
                .http_client
                .post(endpoint)
                .header(API_KEY_HEADER, api_key),
            ApiKeyPlacement::Query => self
                .http_client
                .post(append_query(endpoint, "key", api_key)),
        };
        builder.header(CONTENT_TYPE, "application/json").json(body)
    }

    async fn send_once(
        &self,
        endpoint: &str,
        body: &GenerateContentRequest,
    ) -> Result<String, LlmError> {
        tracing::debug!(target: "gemini_chat::http", url = %endpoint, stream = false, "sending request");

        let response = self
            .post(endpoint, body)
            .timeout(self.settings.timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(target: "gemini_chat::http", url = %endpoint, err = %e, "request error");
                LlmError::ConnectionError(format!("Request failed: {e}"))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            LlmError::ConnectionError(format!("Failed to read response body: {e}"))
        })?;
        tracing::debug!(target: "gemini_chat::http", url = %endpoint, status = status.as_u16(), "response received");

        if !status.is_success() {
            tracing::error!(
                target: "gemini_chat::http",
                status = status.as_u16(),
                body = %text,
                "Gemini API error"
            );
            return Err(LlmError::from_status(status.as_u16(), text));
        }
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        tracing::trace!(target: "gemini_chat::http", body = %text, "response body");
        Ok(text)
    }

    /// Send a non-streaming request and return the raw JSON body.
    ///
    /// HTTP 500 is retried according to the client's [`RetryPolicy`].
    pub async fn chat_raw(&self, request: &ChatRequest) -> Result<String, LlmError> {
        validate_request(&self.settings, request)?;

        let body = build_request_body(request);
        let endpoint = self.endpoint(&request.model, false);
        tracing::trace!(target: "gemini_chat::http", payload = ?body, "request payload");

        RetryExecutor::new(self.retry_policy)
            .execute(|| self.send_once(&endpoint, &body))
            .await
    }

    /// Send a request and parse the full response.
    pub async fn generate(&self, request: &ChatRequest) -> Result<GenerateContentResponse, LlmError> {
        let raw = self.chat_raw(request).await?;
        serde_json::from_str(&raw).map_err(|e| {
            let snippet: String = raw.chars().take(SNIPPET_LEN).collect();
            tracing::debug!(target: "gemini_chat::http", response = %snippet, "unparseable response");
            LlmError::ParseError(format!("Failed to parse API response: {e}"))
        })
    }

    /// Send a request and aggregate the reply.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let response = self.generate(request).await?;
        Ok(ChatResponse {
            text: response.text(),
            finish_reason: response.finish_reason().map(str::to_string),
            usage: response.usage_metadata.map(Usage::from),
            model_version: response.model_version,
        })
    }

    /// Send a request and return the reply in the legacy `choices`/`usage` shape.
    pub async fn chat_legacy(&self, request: &ChatRequest) -> Result<LegacyChatCompletion, LlmError> {
        Ok(to_legacy(&self.generate(request).await?))
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<reqwest::Response, LlmError> {
        let body = build_request_body(request);
        let endpoint = self.endpoint(&request.model, true);
        tracing::debug!(target: "gemini_chat::http", url = %endpoint, stream = true, "sending request");

        let response = self
            .post(&endpoint, &body)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                target: "gemini_chat::http",
                status = status.as_u16(),
                body = %error_text,
                "Gemini streaming API error"
            );
            return Err(LlmError::from_status(status.as_u16(), error_text));
        }
        Ok(response)
    }

    /// Open a streaming request.
    ///
    /// Streaming calls are not retried. Cancelling the returned handle ends
    /// the stream immediately, even while the server is silent.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStreamHandle, LlmError> {
        validate_request(&self.settings, request)?;
        let response = self.open_stream(request).await?;

        let cancel = CancelHandle::new();
        let stream = decode_byte_stream(response.bytes_stream(), cancel.clone());
        Ok(ChatStreamHandle { stream, cancel })
    }

    /// Stream a request through callbacks.
    ///
    /// Only validation errors are returned as `Err`. A failure to open the
    /// stream, like any later transport failure, reaches `handler.on_error`
    /// exactly once. Nothing is delivered after `cancel` fires, and firing it
    /// while the connection is still opening abandons the request.
    pub async fn chat_stream_with_handler<H: StreamHandler>(
        &self,
        request: &ChatRequest,
        mut handler: H,
        cancel: CancelHandle,
    ) -> Result<H, LlmError> {
        validate_request(&self.settings, request)?;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(handler),
            opened = self.open_stream(request) => opened,
        };
        match opened {
            Ok(response) => Ok(drive_byte_stream(response.bytes_stream(), handler, cancel).await),
            Err(e) => {
                if !cancel.is_cancelled() {
                    handler.on_error(&e.to_string());
                }
                Ok(handler)
            }
        }
    }
}

#[async_trait]
impl ChatCapability for GeminiClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        GeminiClient::chat(self, request).await
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStreamHandle, LlmError> {
        GeminiClient::chat_stream(self, request).await
    }
}
