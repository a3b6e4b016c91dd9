//! Core Streaming Types

use futures::Stream;
use std::pin::Pin;

use crate::error::LlmError;
use crate::utils::cancel::CancelHandle;

/// Events delivered while a streaming response is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStreamEvent {
    /// Incremental text to append to the reply
    ContentDelta { delta: String },
    /// The stream finished, via `[DONE]` or connection close
    StreamEnd,
    /// The stream terminated with a fatal error
    Error { message: String },
}

/// Pinned, boxed stream of chat events.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatStreamEvent, LlmError>> + Send>>;

/// Chat stream paired with the handle that cancels it.
///
/// # Example
/// ```rust,no_run
/// # use gemini_chat::prelude::*;
/// # async fn example(client: GeminiClient) -> Result<(), LlmError> {
/// let request = ChatRequest::new("gemini-2.5-flash").with_message(ChatMessage::user("Hello"));
/// let handle = client.chat_stream(&request).await?;
///
/// // Cancel from anywhere, including another task
/// handle.cancel.cancel();
/// # Ok(())
/// # }
/// ```
pub struct ChatStreamHandle {
    pub stream: ChatStream,
    pub cancel: CancelHandle,
}

impl std::fmt::Debug for ChatStreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStreamHandle")
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl ChatStreamHandle {
    /// Drain the stream and concatenate every delta.
    pub async fn collect_text(self) -> Result<String, LlmError> {
        collect_stream_text(self.stream).await
    }
}

/// Drain a stream, concatenating deltas until it ends.
///
/// A terminal `Error` event is surfaced as `LlmError::StreamError`.
pub async fn collect_stream_text(mut stream: ChatStream) -> Result<String, LlmError> {
    use futures::StreamExt;

    let mut text = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            ChatStreamEvent::ContentDelta { delta } => text.push_str(&delta),
            ChatStreamEvent::StreamEnd => break,
            ChatStreamEvent::Error { message } => return Err(LlmError::StreamError(message)),
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_of(events: Vec<Result<ChatStreamEvent, LlmError>>) -> ChatStream {
        Box::pin(futures::stream::iter(events))
    }

    #[tokio::test]
    async fn collects_deltas_until_end() {
        let stream = stream_of(vec![
            Ok(ChatStreamEvent::ContentDelta { delta: "Hel".into() }),
            Ok(ChatStreamEvent::ContentDelta { delta: "lo".into() }),
            Ok(ChatStreamEvent::StreamEnd),
            Ok(ChatStreamEvent::ContentDelta { delta: "ignored".into() }),
        ]);
        assert_eq!(collect_stream_text(stream).await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn error_event_surfaces_as_stream_error() {
        let stream = stream_of(vec![
            Ok(ChatStreamEvent::ContentDelta { delta: "partial".into() }),
            Ok(ChatStreamEvent::Error {
                message: "reset".into(),
            }),
        ]);
        let err = collect_stream_text(stream).await.unwrap_err();
        assert_eq!(err, LlmError::StreamError("reset".into()));
    }
}
