//! Test fixtures utilities: load SSE streaming bodies and drive the frame decoder

use futures_util::StreamExt;
use gemini_chat::providers::gemini::decode_byte_stream;
use gemini_chat::types::ChatStreamEvent;
use gemini_chat::utils::cancel::CancelHandle;
use std::io;

/// Load an `.sse` fixture and cut it into `chunk_size`-byte pieces, ignoring
/// frame and UTF-8 boundaries the way a network read would.
pub fn load_sse_fixture_chunks(
    path: &str,
    chunk_size: usize,
) -> io::Result<Vec<Result<Vec<u8>, io::Error>>> {
    let raw = std::fs::read(path)?;
    Ok(raw
        .chunks(chunk_size.max(1))
        .map(|c| Ok(c.to_vec()))
        .collect())
}

/// Run chunks through the decoder and collect every emitted event.
pub async fn collect_events(bytes: Vec<Result<Vec<u8>, io::Error>>) -> Vec<ChatStreamEvent> {
    let mut stream = decode_byte_stream(futures_util::stream::iter(bytes), CancelHandle::new());
    let mut events = Vec::new();
    while let Some(item) = stream.next().await {
        events.push(item.expect("decoder yields events, not errors"));
    }
    events
}

/// Concatenated deltas of an event sequence.
pub fn deltas(events: &[ChatStreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            ChatStreamEvent::ContentDelta { delta } => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}
