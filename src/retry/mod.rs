//! Retry module
//! - policy.rs: bounded exponential-backoff retries

pub mod policy;

pub use policy::*;
