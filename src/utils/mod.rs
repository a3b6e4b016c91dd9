//! Utility modules
//!
//! Cancellation handles and URL helpers shared by the client.

pub mod cancel;
pub mod url;

pub use cancel::{CancelHandle, make_cancellable_stream};
pub use url::*;
