//! # gemini-chat
//!
//! Async client for Google's Gemini `generateContent` API.
//!
//! - Requests are validated locally and converted to Gemini's
//!   `contents`/`generationConfig` shape.
//! - Non-streaming calls retry HTTP 500 with bounded exponential backoff;
//!   other failures map onto [`LlmError`].
//! - Streaming calls run the body through a bounded [`FrameDecoder`] that
//!   emits text deltas, survives malformed events, and stays silent after
//!   cancellation.
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use gemini_chat::prelude::*;
//!
//! # async fn example() -> Result<(), LlmError> {
//! let client = GeminiClient::new(GeminiSettings::from_env()?)?;
//! let request = ChatRequest::new("gemini-2.5-flash").with_message(ChatMessage::user("Hello"));
//!
//! let mut handle = client.chat_stream(&request).await?;
//! while let Some(event) = handle.stream.next().await {
//!     if let ChatStreamEvent::ContentDelta { delta } = event? {
//!         print!("{delta}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`FrameDecoder`]: providers::gemini::FrameDecoder

pub mod config;
pub mod error;
pub mod providers;
pub mod retry;
pub mod session;
pub mod traits;
pub mod types;
pub mod utils;

pub use config::{ApiKeyPlacement, GeminiSettings};
pub use error::LlmError;
pub use providers::gemini::{GeminiBuilder, GeminiClient};
pub use session::{ChatSession, SessionCanceller};
pub use types::*;

/// Commonly used types
pub mod prelude {
    pub use crate::config::{ApiKeyPlacement, GeminiSettings};
    pub use crate::error::LlmError;
    pub use crate::providers::gemini::{
        CallbackHandler, GeminiBuilder, GeminiClient, StreamHandler,
    };
    pub use crate::retry::RetryPolicy;
    pub use crate::session::{ChatSession, SessionCanceller};
    pub use crate::traits::ChatCapability;
    pub use crate::types::{
        ChatMessage, ChatRequest, ChatResponse, ChatStream, ChatStreamEvent, ChatStreamHandle,
        MessageRole, Usage, collect_stream_text,
    };
    pub use crate::utils::cancel::CancelHandle;
}
