//! Chat request and response types

use serde::{Deserialize, Serialize};

use crate::config::GeminiSettings;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    User,
    Assistant,
}

impl MessageRole {
    /// Parse a role string. Anything other than `assistant` is a user turn.
    pub fn parse(role: &str) -> Self {
        if role == "assistant" {
            Self::Assistant
        } else {
            Self::User
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Provider-agnostic chat request.
///
/// Built fresh for every call and not mutated after it is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier, e.g. `gemini-2.5-flash`
    pub model: String,
    /// Conversation turns, oldest first
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature in `[0, 1]`
    pub temperature: f32,
    /// Output token cap
    pub max_tokens: u32,
    /// Whether the caller wants incremental deltas
    pub stream: bool,
}

impl Default for ChatRequest {
    fn default() -> Self {
        Self {
            model: String::new(),
            messages: Vec::new(),
            temperature: 0.7,
            max_tokens: 1000,
            stream: false,
        }
    }
}

impl ChatRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Seed model, temperature, token cap and streaming flag from settings.
    pub fn from_settings(settings: &GeminiSettings) -> Self {
        Self {
            model: settings.default_model.clone(),
            messages: Vec::new(),
            temperature: settings.default_temperature,
            max_tokens: settings.default_max_tokens,
            stream: settings.use_streaming,
        }
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub const fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Token accounting reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Aggregated result of a non-streaming call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
    pub model_version: Option<String>,
}

impl ChatResponse {
    pub fn text(&self) -> &str {
        &self.text
    }
}
