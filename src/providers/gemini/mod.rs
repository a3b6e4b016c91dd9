//! Google Gemini provider
//!
//! - `convert`: request validation and the `contents`/`generationConfig` body
//! - `client`: transport, retry and status mapping
//! - `streaming`: the bounded frame decoder behind streaming calls
//! - `compat`: translation to the legacy `choices`/`usage` shape

pub mod builder;
pub mod client;
pub mod compat;
pub mod convert;
pub mod streaming;
pub mod types;

pub use builder::GeminiBuilder;
pub use client::GeminiClient;
pub use compat::{LegacyChatCompletion, LegacyChoice, to_legacy};
pub use convert::{build_request_body, validate_request};
pub use streaming::{
    CallbackHandler, DecoderState, EventQueue, FrameDecoder, MAX_BUFFER_SIZE, StreamHandler,
    decode_byte_stream, drive_byte_stream,
};
pub use types::{GenerateContentRequest, GenerateContentResponse};
