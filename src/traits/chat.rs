//! Chat capability trait

use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse, ChatStreamHandle};
use async_trait::async_trait;

#[async_trait]
pub trait ChatCapability: Send + Sync {
    /// Send a request and wait for the complete reply.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Send a request and receive the reply as incremental deltas.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStreamHandle, LlmError>;
}
