//! Shared helpers for racing a parked operation against a timeout.

use nbio_core::error::{StreamError, StreamResult};
use tokio::sync::oneshot;

/// Await a wake handle, racing it against an optional timeout.
///
/// A sender drop without sending (the stream was freed without resolving
/// this specific ticket) is surfaced as [`StreamError::closed`].
pub(crate) async fn await_wake<T>(
    rx: oneshot::Receiver<StreamResult<T>>,
    timeout: Option<std::time::Duration>,
) -> StreamResult<T> {
    match timeout {
        None => rx.await.unwrap_or_else(|_| Err(StreamError::closed())),
        Some(d) => {
            tokio::select! {
                res = rx => res.unwrap_or_else(|_| Err(StreamError::closed())),
                _ = tokio::time::sleep(d) => Err(StreamError::Timeout),
            }
        }
    }
}
