//! Gemini request conversion helpers (pure functions)
//!
//! These helpers validate a [`ChatRequest`] and convert it into Gemini's
//! typed request structure without performing HTTP calls.

use crate::config::GeminiSettings;
use crate::error::LlmError;
use crate::types::{ChatMessage, ChatRequest, MessageRole};

use super::types::{Content, GenerateContentRequest, GenerationConfig, Part};

/// Default nucleus sampling sent with every request
pub const DEFAULT_TOP_P: f32 = 0.95;
/// Default top-k sent with every request
pub const DEFAULT_TOP_K: u32 = 40;

/// Reject requests that must never reach the network.
pub fn validate_request(settings: &GeminiSettings, request: &ChatRequest) -> Result<(), LlmError> {
    if !settings.has_api_key() {
        return Err(LlmError::InvalidRequest(
            "API key is not set in GeminiSettings".to_string(),
        ));
    }
    if request.model.trim().is_empty() {
        return Err(LlmError::InvalidRequest(
            "Model is required for API request".to_string(),
        ));
    }
    if request.messages.is_empty() {
        return Err(LlmError::InvalidRequest(
            "At least one message is required for API request".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&request.temperature) {
        return Err(LlmError::InvalidRequest(format!(
            "Temperature must be within [0, 1], got {}",
            request.temperature
        )));
    }
    if request.max_tokens == 0 {
        return Err(LlmError::InvalidRequest(
            "max_tokens must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Gemini calls the assistant `model`; everything else is `user`.
pub const fn gemini_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::Assistant => "model",
        MessageRole::User => "user",
    }
}

/// Convert `ChatMessage` to Gemini Content
pub fn convert_message_to_content(message: &ChatMessage) -> Content {
    Content {
        role: Some(gemini_role(message.role).to_string()),
        parts: vec![Part::text(message.content.clone())],
    }
}

/// Build the request body for Gemini API from a unified request
pub fn build_request_body(request: &ChatRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: request
            .messages
            .iter()
            .map(convert_message_to_content)
            .collect(),
        generation_config: GenerationConfig {
            temperature: Some(request.temperature),
            max_output_tokens: Some(request.max_tokens),
            top_p: Some(DEFAULT_TOP_P),
            top_k: Some(DEFAULT_TOP_K),
        },
    }
}
