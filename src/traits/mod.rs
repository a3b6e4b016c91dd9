//! Capability traits

pub mod chat;

pub use chat::ChatCapability;
