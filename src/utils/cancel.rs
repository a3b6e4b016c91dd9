//! Cancellation utilities
//!
//! First-class cancellation handles for streams. A handle can be cloned and
//! triggered from any task or thread; triggering it more than once is a no-op.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::types::ChatStream;

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Create a fresh, untriggered handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Wrapped streams stop immediately, even while
    /// waiting on the network, and no further callbacks fire. Dropping the
    /// stream closes the HTTP connection.
    ///
    /// Returns `true` if the handle was not already cancelled.
    pub fn cancel(&self) -> bool {
        let first = !self.token.is_cancelled();
        self.token.cancel();
        first
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Make a ChatStream cancellable and return its cancel handle.
pub fn make_cancellable_stream(stream: ChatStream) -> (ChatStream, CancelHandle) {
    let handle = CancelHandle::new();
    let token = handle.token.clone();
    let mut inner = stream;
    let s = async_stream::stream! {
        use futures::StreamExt;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                item = inner.next() => {
                    let Some(item) = item else { break };
                    yield item;
                }
            }
        }
    };
    (Box::pin(s), handle)
}
