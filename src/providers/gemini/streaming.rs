//! Gemini streaming frame decoder
//!
//! `streamGenerateContent?alt=sse` answers with newline-delimited frames:
//!
//! ```text
//! data: {"candidates":[{"content":{"parts":[{"text":"Hel"}]}}]}
//!
//! data: {"candidates":[{"content":{"parts":[{"text":"lo"}]}}]}
//!
//! data: [DONE]
//! ```
//!
//! [`FrameDecoder`] turns arbitrarily split byte chunks back into lines and
//! forwards text deltas to a [`StreamHandler`]. Its buffer is bounded by
//! [`MAX_BUFFER_SIZE`]. A malformed event is skipped and never ends the
//! stream. Once the decoder completes, errors, or is disposed, no further
//! callback fires.

use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;

use crate::error::LlmError;
use crate::types::{ChatStream, ChatStreamEvent};
use crate::utils::cancel::CancelHandle;

use super::types::GeminiStreamResponse;

/// Ceiling for the unprocessed trailing fragment, in bytes.
pub const MAX_BUFFER_SIZE: usize = 65536;
/// Prefix of every payload-carrying line.
pub const DATA_PREFIX: &str = "data: ";
/// Payload marking the end of the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Receives decoded stream callbacks.
///
/// Each stream delivers any number of `on_token` calls followed by at most
/// one of `on_complete` / `on_error`.
pub trait StreamHandler: Send {
    fn on_token(&mut self, token: &str);
    fn on_complete(&mut self);
    fn on_error(&mut self, message: &str);
}

/// Adapts three closures into a [`StreamHandler`].
pub struct CallbackHandler<T, C, E> {
    on_token: T,
    on_complete: C,
    on_error: E,
}

impl<T, C, E> CallbackHandler<T, C, E>
where
    T: FnMut(&str) + Send,
    C: FnMut() + Send,
    E: FnMut(&str) + Send,
{
    pub const fn new(on_token: T, on_complete: C, on_error: E) -> Self {
        Self {
            on_token,
            on_complete,
            on_error,
        }
    }
}

impl<T, C, E> StreamHandler for CallbackHandler<T, C, E>
where
    T: FnMut(&str) + Send,
    C: FnMut() + Send,
    E: FnMut(&str) + Send,
{
    fn on_token(&mut self, token: &str) {
        (self.on_token)(token);
    }

    fn on_complete(&mut self) {
        (self.on_complete)();
    }

    fn on_error(&mut self, message: &str) {
        (self.on_error)(message);
    }
}

/// Buffers callbacks as [`ChatStreamEvent`]s so they can be yielded from a stream.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<ChatStreamEvent>,
}

impl EventQueue {
    pub fn take(&mut self) -> Vec<ChatStreamEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl StreamHandler for EventQueue {
    fn on_token(&mut self, token: &str) {
        self.events.push_back(ChatStreamEvent::ContentDelta {
            delta: token.to_string(),
        });
    }

    fn on_complete(&mut self) {
        self.events.push_back(ChatStreamEvent::StreamEnd);
    }

    fn on_error(&mut self, message: &str) {
        self.events.push_back(ChatStreamEvent::Error {
            message: message.to_string(),
        });
    }
}

/// Lifecycle of a [`FrameDecoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Active,
    Completed,
    Errored,
    Disposed,
}

/// Incremental decoder bound to exactly one stream.
pub struct FrameDecoder<H> {
    handler: H,
    buffer: Vec<u8>,
    state: DecoderState,
    cancel: Option<CancelHandle>,
    max_buffer_size: usize,
}

impl<H: std::fmt::Debug> std::fmt::Debug for FrameDecoder<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDecoder")
            .field("handler", &self.handler)
            .field("buffered", &self.buffer.len())
            .field("state", &self.state)
            .finish()
    }
}

impl<H: StreamHandler> FrameDecoder<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            buffer: Vec::with_capacity(1024),
            state: DecoderState::Active,
            cancel: None,
            max_buffer_size: MAX_BUFFER_SIZE,
        }
    }

    /// Observe `cancel`; once triggered the decoder behaves as disposed.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub const fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state != DecoderState::Active
    }

    /// Bytes held for the trailing incomplete line.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub const fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Feed the next chunk of the response body.
    pub fn ingest(&mut self, chunk: &[u8]) {
        if !self.ensure_active() {
            return;
        }

        let mut buf = std::mem::take(&mut self.buffer);
        buf.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(pos) = buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + pos;
            self.process_line(&buf[start..end]);
            start = end + 1;
            if self.is_terminal() {
                return;
            }
        }

        buf.drain(..start);
        if buf.len() > self.max_buffer_size {
            tracing::warn!(
                target: "gemini_chat::stream",
                buffered = buf.len(),
                limit = self.max_buffer_size,
                "streaming buffer size exceeded limit, buffer cleared"
            );
            buf.clear();
        }
        self.buffer = buf;
    }

    /// The connection delivered all content.
    ///
    /// A trailing unterminated line is processed before completing.
    pub fn finish(&mut self) {
        if !self.ensure_active() {
            return;
        }
        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            self.process_line(&rest);
        }
        self.complete();
    }

    /// The transport failed; fires `on_error` once if still active.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.error(&message);
    }

    /// Stop the stream. Safe in any state and idempotent; no callback fires
    /// afterwards.
    pub fn dispose(&mut self) {
        if self.state == DecoderState::Active {
            self.state = DecoderState::Disposed;
            tracing::debug!(target: "gemini_chat::stream", "decoder disposed");
        }
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
        self.release_buffer();
    }

    fn process_line(&mut self, raw: &[u8]) {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(e) => {
                self.error(&format!("Streaming error: invalid UTF-8 in frame: {e}"));
                return;
            }
        };

        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            if !line.is_empty() {
                tracing::trace!(target: "gemini_chat::stream", line, "ignoring non-data line");
            }
            return;
        };

        if payload == DONE_SENTINEL {
            self.complete();
            return;
        }

        match serde_json::from_str::<GeminiStreamResponse>(payload) {
            Ok(event) => {
                if let Some(text) = event.first_text() {
                    self.emit_token(text);
                }
            }
            Err(e) => {
                let err = LlmError::DecodeError(e.to_string());
                tracing::warn!(
                    target: "gemini_chat::stream",
                    err = %err,
                    "failed to parse streaming chunk, skipping"
                );
            }
        }
    }

    /// Re-checks the cancel handle so a cancellation from another task wins
    /// over any pending callback.
    fn ensure_active(&mut self) -> bool {
        if self.state == DecoderState::Active
            && self.cancel.as_ref().is_some_and(CancelHandle::is_cancelled)
        {
            self.state = DecoderState::Disposed;
            self.release_buffer();
        }
        self.state == DecoderState::Active
    }

    fn emit_token(&mut self, token: &str) {
        if self.ensure_active() {
            self.handler.on_token(token);
        }
    }

    fn complete(&mut self) {
        if self.ensure_active() {
            self.state = DecoderState::Completed;
            self.release_buffer();
            self.handler.on_complete();
        }
    }

    fn error(&mut self, message: &str) {
        if self.ensure_active() {
            tracing::error!(target: "gemini_chat::stream", reason = message, "stream failed");
            self.state = DecoderState::Errored;
            self.release_buffer();
            self.handler.on_error(message);
        }
    }

    fn release_buffer(&mut self) {
        self.buffer = Vec::new();
    }
}

/// Decode a response body into a [`ChatStream`].
///
/// The stream ends after `StreamEnd` or `Error`, or as soon as `cancel` is
/// triggered, even while the body is idle. Dropping it drops the body and
/// closes the connection.
pub fn decode_byte_stream<S, B, E>(byte_stream: S, cancel: CancelHandle) -> ChatStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let s = async_stream::stream! {
        let mut byte_stream = Box::pin(byte_stream);
        let mut decoder = FrameDecoder::new(EventQueue::default()).with_cancel(cancel.clone());

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = byte_stream.next() => Some(item),
            };
            let Some(item) = next else {
                decoder.dispose();
                break;
            };
            match item {
                Some(Ok(chunk)) => decoder.ingest(chunk.as_ref()),
                Some(Err(e)) => decoder.fail(format!("Streaming error: {e}")),
                None => decoder.finish(),
            }

            let done = decoder.is_terminal();
            for event in decoder.handler_mut().take() {
                if cancel.is_cancelled() {
                    break;
                }
                yield Ok::<ChatStreamEvent, LlmError>(event);
            }
            if done {
                break;
            }
        }
    };
    Box::pin(s)
}

/// Drive a response body through `handler`, returning it once the stream
/// is over.
pub async fn drive_byte_stream<S, B, E, H>(byte_stream: S, handler: H, cancel: CancelHandle) -> H
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]>,
    E: Display,
    H: StreamHandler,
{
    let mut byte_stream = Box::pin(byte_stream);
    let mut decoder = FrameDecoder::new(handler).with_cancel(cancel.clone());

    while !decoder.is_terminal() {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            item = byte_stream.next() => Some(item),
        };
        let Some(item) = next else {
            decoder.dispose();
            break;
        };
        match item {
            Some(Ok(chunk)) => decoder.ingest(chunk.as_ref()),
            Some(Err(e)) => decoder.fail(format!("Streaming error: {e}")),
            None => decoder.finish(),
        }
    }
    decoder.into_handler()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const HI_FRAME: &str = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"hi\"}]}}]}\n";

    fn frame(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
        )
    }

    #[derive(Debug, Default)]
    struct Recorder {
        tokens: Vec<String>,
        completions: usize,
        errors: Vec<String>,
    }

    impl StreamHandler for Recorder {
        fn on_token(&mut self, token: &str) {
            self.tokens.push(token.to_string());
        }
        fn on_complete(&mut self) {
            self.completions += 1;
        }
        fn on_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }
    }

    fn decoder() -> FrameDecoder<Recorder> {
        FrameDecoder::new(Recorder::default())
    }

    #[test]
    fn single_frame_yields_one_token() {
        let mut d = decoder();
        d.ingest(HI_FRAME.as_bytes());
        assert_eq!(d.handler().tokens, ["hi"]);
        assert_eq!(d.handler().completions, 0);
        assert_eq!(d.buffered_len(), 0);
        assert_eq!(d.state(), DecoderState::Active);
    }

    #[test]
    fn frames_split_across_chunks_are_reassembled() {
        let body = format!("{}{}", frame("Hel"), frame("lo"));
        let mut d = decoder();
        for chunk in body.as_bytes().chunks(7) {
            d.ingest(chunk);
        }
        assert_eq!(d.handler().tokens, ["Hel", "lo"]);
    }

    #[test]
    fn multibyte_text_split_mid_character_survives() {
        let body = frame("héllo wörld ✓");
        let bytes = body.as_bytes();
        let mut d = decoder();
        for chunk in bytes.chunks(3) {
            d.ingest(chunk);
        }
        assert_eq!(d.handler().tokens, ["héllo wörld ✓"]);
        assert!(d.handler().errors.is_empty());
    }

    #[test]
    fn crlf_and_noise_lines_are_ignored() {
        let mut d = decoder();
        d.ingest(b": keep-alive\r\nevent: message\r\n\r\n");
        d.ingest(frame("ok").replace('\n', "\r\n").as_bytes());
        assert_eq!(d.handler().tokens, ["ok"]);
    }

    #[test]
    fn done_sentinel_completes_once_and_silences_later_bytes() {
        let mut d = decoder();
        d.ingest(format!("{}data: [DONE]\n{}", frame("a"), frame("b")).as_bytes());
        d.ingest(frame("c").as_bytes());
        d.finish();

        assert_eq!(d.handler().tokens, ["a"]);
        assert_eq!(d.handler().completions, 1);
        assert_eq!(d.state(), DecoderState::Completed);
        assert_eq!(d.buffered_len(), 0);
    }

    #[test]
    fn connection_close_completes_and_flushes_trailing_line() {
        let mut d = decoder();
        d.ingest(frame("one").as_bytes());
        d.ingest(frame("two").trim_end().as_bytes());
        d.finish();
        d.finish();

        assert_eq!(d.handler().tokens, ["one", "two"]);
        assert_eq!(d.handler().completions, 1);
    }

    #[test]
    #[tracing_test::traced_test]
    fn malformed_event_does_not_end_the_stream() {
        let mut d = decoder();
        d.ingest(b"data: {\"candidates\": [oops\n");
        d.ingest(frame("still here").as_bytes());

        assert_eq!(d.handler().tokens, ["still here"]);
        assert!(d.handler().errors.is_empty());
        assert_eq!(d.state(), DecoderState::Active);
        assert!(logs_contain("failed to parse streaming chunk"));
        assert!(logs_contain("Decode error:"));
    }

    #[test]
    fn events_without_text_emit_nothing() {
        let mut d = decoder();
        d.ingest(b"data: {\"candidates\":[{\"finishReason\":\"STOP\"}]}\n");
        d.ingest(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"\"}]}}]}\n");
        assert!(d.handler().tokens.is_empty());
    }

    #[test]
    #[tracing_test::traced_test]
    fn oversized_fragment_is_cleared_and_decoding_recovers() {
        let mut d = decoder();
        let junk = vec![b'x'; MAX_BUFFER_SIZE + 10];
        d.ingest(&junk);
        assert_eq!(d.buffered_len(), 0);
        assert!(logs_contain("streaming buffer size exceeded limit"));

        d.ingest(b"\n");
        d.ingest(HI_FRAME.as_bytes());
        assert_eq!(d.handler().tokens, ["hi"]);
        assert!(d.handler().errors.is_empty());
    }

    #[test]
    fn buffer_stays_bounded_under_many_small_chunks() {
        let mut d = decoder();
        for _ in 0..(MAX_BUFFER_SIZE / 100 + 10) {
            d.ingest(&[b'y'; 100]);
            assert!(d.buffered_len() <= MAX_BUFFER_SIZE);
        }
    }

    #[test]
    fn complete_lines_before_an_oversized_tail_are_kept() {
        let mut d = decoder();
        let mut chunk = HI_FRAME.as_bytes().to_vec();
        chunk.extend(std::iter::repeat_n(b'z', MAX_BUFFER_SIZE + 1));
        d.ingest(&chunk);
        assert_eq!(d.handler().tokens, ["hi"]);
        assert_eq!(d.buffered_len(), 0);
    }

    #[test]
    fn invalid_utf8_line_errors_once() {
        let mut d = decoder();
        d.ingest(b"data: \xff\xfe\n");
        d.ingest(HI_FRAME.as_bytes());
        d.fail("late failure");

        assert_eq!(d.state(), DecoderState::Errored);
        assert_eq!(d.handler().errors.len(), 1);
        assert!(d.handler().tokens.is_empty());
        assert_eq!(d.handler().completions, 0);
    }

    #[test]
    fn transport_failure_errors_once_then_stays_quiet() {
        let mut d = decoder();
        d.ingest(frame("a").as_bytes());
        d.fail("connection reset");
        d.fail("again");
        d.finish();
        d.ingest(frame("b").as_bytes());

        assert_eq!(d.handler().tokens, ["a"]);
        assert_eq!(d.handler().errors, ["connection reset"]);
        assert_eq!(d.handler().completions, 0);
    }

    #[test]
    fn dispose_then_ingest_produces_no_callbacks() {
        let mut d = decoder();
        d.dispose();
        d.dispose();
        d.ingest(HI_FRAME.as_bytes());
        d.ingest(b"data: [DONE]\n");
        d.finish();
        d.fail("late");

        let h = d.handler();
        assert!(h.tokens.is_empty());
        assert_eq!(h.completions, 0);
        assert!(h.errors.is_empty());
        assert_eq!(d.state(), DecoderState::Disposed);
    }

    #[test]
    fn dispose_after_completion_keeps_terminal_state() {
        let mut d = decoder();
        d.ingest(b"data: [DONE]\n");
        d.dispose();
        assert_eq!(d.state(), DecoderState::Completed);
        assert_eq!(d.handler().completions, 1);
    }

    #[test]
    fn external_cancel_wins_over_inflight_bytes() {
        let cancel = CancelHandle::new();
        let mut d = decoder().with_cancel(cancel.clone());
        d.ingest(frame("before").as_bytes());

        cancel.cancel();
        d.ingest(frame("after").as_bytes());
        d.finish();

        assert_eq!(d.handler().tokens, ["before"]);
        assert_eq!(d.handler().completions, 0);
        assert_eq!(d.state(), DecoderState::Disposed);
    }

    #[test]
    fn dispose_triggers_attached_cancel_handle() {
        let cancel = CancelHandle::new();
        let mut d = decoder().with_cancel(cancel.clone());
        d.dispose();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn callback_handler_forwards_to_closures() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tokens = seen.clone();
        let done = seen.clone();
        let handler = CallbackHandler::new(
            move |t: &str| tokens.lock().unwrap().push(format!("token:{t}")),
            move || done.lock().unwrap().push("complete".to_string()),
            |_: &str| {},
        );

        let mut d = FrameDecoder::new(handler);
        d.ingest(format!("{}data: [DONE]\n", frame("x")).as_bytes());

        assert_eq!(*seen.lock().unwrap(), ["token:x", "complete"]);
    }

    #[tokio::test]
    async fn decoded_stream_yields_deltas_then_end() {
        let body = format!("{}{}data: [DONE]\n", frame("Hello "), frame("world"));
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = body
            .as_bytes()
            .chunks(5)
            .map(|c| Ok(c.to_vec()))
            .collect();

        let events: Vec<_> = decode_byte_stream(futures::stream::iter(chunks), CancelHandle::new())
            .collect()
            .await;

        let events: Vec<_> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            events,
            [
                ChatStreamEvent::ContentDelta {
                    delta: "Hello ".into()
                },
                ChatStreamEvent::ContentDelta {
                    delta: "world".into()
                },
                ChatStreamEvent::StreamEnd,
            ]
        );
    }

    #[tokio::test]
    async fn decoded_stream_reports_transport_error() {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(frame("partial").into_bytes()),
            Err(std::io::Error::other("connection reset")),
            Ok(frame("never").into_bytes()),
        ];

        let events: Vec<_> = decode_byte_stream(futures::stream::iter(chunks), CancelHandle::new())
            .map(Result::unwrap)
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            ChatStreamEvent::Error { message } if message.contains("connection reset")
        ));
    }

    #[tokio::test]
    async fn cancelled_before_first_chunk_yields_nothing() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![Ok(frame("x").into_bytes())];

        let events: Vec<_> = decode_byte_stream(futures::stream::iter(chunks), cancel)
            .collect()
            .await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn drive_completes_on_connection_close() {
        let chunks: Vec<Result<&'static [u8], std::io::Error>> = vec![Ok(HI_FRAME.as_bytes())];
        let recorder =
            drive_byte_stream(futures::stream::iter(chunks), Recorder::default(), CancelHandle::new())
                .await;
        assert_eq!(recorder.tokens, ["hi"]);
        assert_eq!(recorder.completions, 1);
    }

    fn hi_then_idle() -> impl Stream<Item = Result<&'static [u8], std::io::Error>> + Send {
        futures::stream::iter(vec![Ok(HI_FRAME.as_bytes())])
            .chain(futures::stream::pending())
    }

    fn cancel_after(cancel: &CancelHandle, delay_ms: u64) {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            cancel.cancel();
        });
    }

    #[tokio::test]
    async fn cancel_ends_decoded_stream_while_body_is_idle() {
        let cancel = CancelHandle::new();
        let mut stream = decode_byte_stream(hi_then_idle(), cancel.clone());

        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            ChatStreamEvent::ContentDelta { delta: "hi".into() }
        );
        cancel_after(&cancel, 20);

        let next = tokio::time::timeout(std::time::Duration::from_secs(2), stream.next()).await;
        assert!(matches!(next, Ok(None)));
    }

    #[tokio::test]
    async fn cancel_ends_drive_while_body_is_idle() {
        let cancel = CancelHandle::new();
        cancel_after(&cancel, 20);

        let recorder = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            drive_byte_stream(hi_then_idle(), Recorder::default(), cancel),
        )
        .await
        .expect("drive returns once cancelled");

        assert_eq!(recorder.tokens, ["hi"]);
        assert_eq!(recorder.completions, 0);
        assert!(recorder.errors.is_empty());
    }
}
