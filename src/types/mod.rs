//! Shared request, response and stream types

pub mod chat;
pub mod stream;

pub use chat::*;
pub use stream::*;
