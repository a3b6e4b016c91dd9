//! Conversation session
//!
//! Keeps the running history, dispatches each turn as a streaming or
//! non-streaming call, and folds streamed deltas into the final assistant
//! message. History is never trimmed here.

use futures::StreamExt;
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::traits::ChatCapability;
use crate::types::{ChatMessage, ChatRequest, ChatStreamEvent};
use crate::utils::cancel::CancelHandle;

/// Cancels whatever stream the owning session currently has in flight.
///
/// Obtain it once with [`ChatSession::canceller`] and hand it to any
/// external trigger (shutdown hooks, UI buttons, other tasks).
#[derive(Clone, Debug, Default)]
pub struct SessionCanceller {
    active: Arc<Mutex<Option<CancelHandle>>>,
}

impl SessionCanceller {
    /// Returns `true` if a live stream was cancelled by this call.
    pub fn cancel(&self) -> bool {
        self.active
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(CancelHandle::cancel))
            .unwrap_or(false)
    }

    pub fn is_streaming(&self) -> bool {
        self.active.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    fn set(&self, handle: Option<CancelHandle>) {
        if let Ok(mut guard) = self.active.lock() {
            *guard = handle;
        }
    }
}

/// A conversation with one model.
pub struct ChatSession<C> {
    client: C,
    template: ChatRequest,
    history: Vec<ChatMessage>,
    canceller: SessionCanceller,
}

impl<C: ChatCapability> ChatSession<C> {
    /// `template` supplies model, temperature, token cap and the streaming flag.
    pub fn new(client: C, template: ChatRequest) -> Self {
        Self {
            client,
            template: ChatRequest {
                messages: Vec::new(),
                ..template
            },
            history: Vec::new(),
            canceller: SessionCanceller::default(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub const fn is_streaming_enabled(&self) -> bool {
        self.template.stream
    }

    /// Switch modes; an in-flight stream is cancelled when streaming is turned off.
    pub fn set_streaming(&mut self, stream: bool) {
        if !stream {
            self.canceller.cancel();
        }
        self.template.stream = stream;
    }

    pub fn canceller(&self) -> SessionCanceller {
        self.canceller.clone()
    }

    /// Cancel any active stream and forget the conversation.
    pub fn clear(&mut self) {
        self.canceller.cancel();
        self.canceller.set(None);
        self.history.clear();
    }

    /// Send a user turn and return the assistant reply.
    pub async fn send(&mut self, text: &str) -> Result<String, LlmError> {
        self.send_with(text, |_| {}).await
    }

    /// Like [`send`](Self::send), calling `on_token` for every streamed delta.
    ///
    /// The user turn stays in history even if the call fails; the reply is
    /// appended only on success.
    pub async fn send_with<F>(&mut self, text: &str, mut on_token: F) -> Result<String, LlmError>
    where
        F: FnMut(&str) + Send,
    {
        if text.trim().is_empty() {
            return Err(LlmError::InvalidRequest(
                "Cannot send empty message".to_string(),
            ));
        }

        self.history.push(ChatMessage::user(text));
        let request = ChatRequest {
            messages: self.history.clone(),
            ..self.template.clone()
        };

        let reply = if request.stream {
            self.stream_reply(&request, &mut on_token).await?
        } else {
            self.client.chat(&request).await?.text
        };

        self.history.push(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }

    async fn stream_reply<F>(&self, request: &ChatRequest, on_token: &mut F) -> Result<String, LlmError>
    where
        F: FnMut(&str) + Send,
    {
        // Registered before opening so a cancel during the handshake is seen.
        let turn = CancelHandle::new();
        self.canceller.set(Some(turn.clone()));
        let result = self.consume_stream(request, &turn, on_token).await;
        self.canceller.set(None);
        result
    }

    async fn consume_stream<F>(
        &self,
        request: &ChatRequest,
        turn: &CancelHandle,
        on_token: &mut F,
    ) -> Result<String, LlmError>
    where
        F: FnMut(&str) + Send,
    {
        let cancelled = || LlmError::StreamError("Stream cancelled".to_string());

        let handle = tokio::select! {
            biased;
            _ = turn.cancelled() => return Err(cancelled()),
            opened = self.client.chat_stream(request) => opened?,
        };

        let mut stream = handle.stream;
        let mut content = String::new();
        loop {
            let event = tokio::select! {
                biased;
                _ = turn.cancelled() => {
                    handle.cancel.cancel();
                    return Err(cancelled());
                }
                event = stream.next() => event,
            };
            match event {
                Some(Ok(ChatStreamEvent::ContentDelta { delta })) => {
                    on_token(&delta);
                    content.push_str(&delta);
                }
                Some(Ok(ChatStreamEvent::StreamEnd)) if content.is_empty() => {
                    return Err(LlmError::EmptyResponse);
                }
                Some(Ok(ChatStreamEvent::StreamEnd)) => return Ok(content),
                Some(Ok(ChatStreamEvent::Error { message })) => {
                    return Err(LlmError::StreamError(message));
                }
                Some(Err(e)) => return Err(e),
                None if handle.cancel.is_cancelled() => return Err(cancelled()),
                None => {
                    return Err(LlmError::StreamError(
                        "Stream ended without completion".to_string(),
                    ));
                }
            }
        }
    }
}
