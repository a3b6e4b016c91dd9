//! Error Handling Module
//!
//! A single error enum covers local validation, HTTP status mapping,
//! transport failures, and streaming decode failures.
//!
//! # Example
//!
//! ```rust
//! use gemini_chat::error::LlmError;
//!
//! let error = LlmError::from_status(429, "quota");
//! assert!(matches!(error, LlmError::RateLimited(_)));
//! assert!(!error.is_retryable());
//! ```

use thiserror::Error;

/// Errors surfaced by the Gemini client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Rejected locally or by the API with HTTP 400
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// HTTP 401
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// HTTP 403
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// HTTP 429
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// HTTP 500, surfaced after retries are exhausted
    #[error("Server error: {0}")]
    ServerError(String),

    /// No connection, timeout, or the body could not be read
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Success status with an empty body
    #[error("Received empty response from Gemini API")]
    EmptyResponse,

    /// A single streaming event could not be decoded
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Fatal streaming failure
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Any other non-success status
    #[error("API error (HTTP {status}): {message}")]
    UnknownError { status: u16, message: String },

    /// Client could not be configured
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A complete (non-streaming) response body could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl LlmError {
    /// Map a non-success HTTP status and its body onto the taxonomy.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            400 => Self::InvalidRequest(body),
            401 => Self::AuthError(body),
            403 => Self::Forbidden(body),
            429 => Self::RateLimited(body),
            500 => Self::ServerError(body),
            _ => Self::UnknownError {
                status,
                message: body,
            },
        }
    }

    /// Only HTTP 500 is worth another attempt.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ServerError(_))
    }

    /// HTTP status this error was mapped from, if any.
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::AuthError(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::RateLimited(_) => Some(429),
            Self::ServerError(_) => Some(500),
            Self::UnknownError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidRequest(_) => "Invalid request format.".to_string(),
            Self::AuthError(_) => "Invalid API key. Please check your Gemini API key.".to_string(),
            Self::Forbidden(_) => {
                "Access forbidden. Please verify your API key permissions.".to_string()
            }
            Self::RateLimited(_) => {
                "Rate limit exceeded. Please wait before making another request.".to_string()
            }
            Self::ServerError(_) => "Gemini API server error. Please try again later.".to_string(),
            Self::ConnectionError(_) => {
                "Unable to connect to Gemini API. Please check your internet connection."
                    .to_string()
            }
            Self::EmptyResponse => "Received empty response from Gemini API.".to_string(),
            Self::DecodeError(_) | Self::ParseError(_) => {
                "Error processing response from Gemini API.".to_string()
            }
            Self::StreamError(msg) => format!("Streaming error: {msg}"),
            Self::UnknownError { status, message } => {
                format!("API error (HTTP {status}): {message}")
            }
            Self::ConfigurationError(msg) => format!("Configuration error: {msg}"),
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return Self::ParseError(err.to_string());
        }
        Self::ConnectionError(err.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}
